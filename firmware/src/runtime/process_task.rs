use button_core::debounce::process_edges;
use embassy_time::Instant;

use crate::button::{EdgeQueue, FirmwareDebouncer};
use crate::telemetry::{HistoryLog, log_edge};

#[embassy_executor::task]
pub async fn run(
    edges: &'static EdgeQueue,
    debouncer: &'static FirmwareDebouncer,
    history: &'static HistoryLog,
) -> ! {
    process_edges(edges, debouncer, |event, outcome| {
        log_edge(event, outcome);
        history.record_edge(event, outcome, Instant::now());
    })
    .await
}
