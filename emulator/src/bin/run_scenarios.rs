use std::io;

#[allow(dead_code)]
#[path = "../device.rs"]
mod device;
#[allow(dead_code)]
#[path = "../grammar.rs"]
mod grammar;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use button_core::debounce::DebounceConfig;
use button_core::edge::EdgeChannel;
use button_core::telemetry::TelemetryCounters;
use device::{Device, REPORT_INTERVAL};
use session::{Session, TranscriptLogger, TranscriptProfile};

fn main() -> io::Result<()> {
    for profile in TranscriptProfile::SCRIPTED {
        record_profile(profile)?;
    }
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let counters = TelemetryCounters::new();
    let edges = EdgeChannel::new(&counters);
    let device = Device::new(
        &counters,
        &edges,
        DebounceConfig::default(),
        Some(REPORT_INTERVAL),
    );
    let mut session = Session::new(device, Some(TranscriptLogger::new(profile)?));

    println!("# {}", profile.header());
    for line in session.run_script(profile)? {
        println!("{line}");
    }
    println!("# written to {}", profile.log_path());
    println!();
    Ok(())
}
