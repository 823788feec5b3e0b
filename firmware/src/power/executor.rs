use core::marker::PhantomData;

use button_core::line::LineSampler;
use button_core::telemetry::TelemetryEventKind;
use button_core::wake::{SleepExit, WakeOutcome};
use cortex_m::asm;
use embassy_executor::{Spawner, raw};
use embassy_time::Instant;

use super::{PendFlag, SleepInhibitCount, classify_wake};
use crate::button::FirmwareDispatcher;
use crate::telemetry::{HistoryLog, log_sleep_exit};

static PENDED: PendFlag = PendFlag::new();

#[unsafe(export_name = "__pender")]
fn __pender(_context: *mut ()) {
    PENDED.raise();
    asm::sev();
}

/// Thread-mode executor that brackets idle periods with the sleep hooks.
///
/// Light sleep is Sleep mode entered with `WFE`; TIM1 keeps counting so
/// timer wakes and timestamps stay valid. While any inhibitor holds
/// [`SleepInhibitCount`] the executor still idles on `WFE` but the hooks do
/// not run and the interval is not accounted as sleep. The same holds when a
/// task was pended during the poll pass.
pub struct LightSleepExecutor<P: 'static> {
    inner: raw::Executor,
    inhibit: &'static SleepInhibitCount,
    dispatcher: &'static FirmwareDispatcher<P>,
    history: &'static HistoryLog,
    not_send: PhantomData<*mut ()>,
}

impl<P: LineSampler> LightSleepExecutor<P> {
    pub fn new(
        inhibit: &'static SleepInhibitCount,
        dispatcher: &'static FirmwareDispatcher<P>,
        history: &'static HistoryLog,
    ) -> Self {
        Self {
            inner: raw::Executor::new(core::ptr::null_mut()),
            inhibit,
            dispatcher,
            history,
            not_send: PhantomData,
        }
    }

    /// Spawns the initial tasks through `init` and runs forever.
    pub fn run(&'static mut self, init: impl FnOnce(Spawner)) -> ! {
        let this: &'static Self = self;
        init(this.inner.spawner());

        loop {
            PENDED.clear();
            unsafe { this.inner.poll() };

            if this.inhibit.may_light_sleep(&PENDED) {
                this.light_sleep();
            } else {
                // Consumes the latched SEV when a task was pended.
                asm::wfe();
            }
        }
    }

    fn light_sleep(&self) {
        let line = self.dispatcher.line();
        self.dispatcher.on_sleep_enter(None);

        let level_before = line.read_level();
        let entered_at = Instant::now();
        asm::wfe();
        let slept = Instant::now().saturating_duration_since(entered_at);

        let cause = classify_wake(level_before, line.read_level());
        let exit = SleepExit::new(core::time::Duration::from_micros(slept.as_micros()), cause);
        let outcome = self.dispatcher.on_sleep_exit(exit);

        log_sleep_exit(cause, slept.as_micros(), outcome);
        if let WakeOutcome::Synthesized { level, .. } = outcome {
            self.history
                .record(TelemetryEventKind::WakeSynthesized(level), Instant::now());
        }
    }
}
