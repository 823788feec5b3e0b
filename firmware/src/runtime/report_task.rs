use button_core::telemetry::TelemetryCounters;
use embassy_time::Ticker;

use crate::button::REPORT_INTERVAL;
use crate::telemetry::log_report;

/// Drains the counters once per interval and logs the totals.
#[embassy_executor::task]
pub async fn run(counters: &'static TelemetryCounters) -> ! {
    let mut ticker = Ticker::every(REPORT_INTERVAL);
    loop {
        ticker.next().await;
        log_report(counters.drain());
    }
}
