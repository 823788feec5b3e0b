use embassy_futures::select::{Either, select};
use embassy_time::{Instant, Timer};

use crate::button::FirmwareDebouncer;
use crate::telemetry::{HistoryLog, log_expiry};
use crate::timer::{TimerSignal, TimerSlot};

/// Owns the debounce deadline and finalises windows as they expire.
#[embassy_executor::task]
pub async fn run(
    commands: &'static TimerSignal,
    debouncer: &'static FirmwareDebouncer,
    history: &'static HistoryLog,
) -> ! {
    let mut slot = TimerSlot::new();

    loop {
        let Some(deadline) = slot.deadline() else {
            let command = commands.wait().await;
            slot.apply(command, Instant::now());
            continue;
        };

        match select(Timer::at(deadline), commands.wait()).await {
            Either::First(()) => {
                let now = Instant::now();
                if let Some(handle) = slot.expire(now) {
                    let outcome = debouncer.on_timer_expire(handle);
                    log_expiry(outcome);
                    history.record_expiry(outcome, now);
                }
            }
            Either::Second(command) => slot.apply(command, Instant::now()),
        }
    }
}
