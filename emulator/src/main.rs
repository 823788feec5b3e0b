mod device;
mod grammar;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use button_core::debounce::DebounceConfig;
use button_core::edge::EdgeChannel;
use button_core::telemetry::TelemetryCounters;
use device::{Device, REPORT_INTERVAL};
use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    let profile = parse_profile().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: button-emulator [--profile <interactive|press|bounce|wake>] | button-emulator <profile>"
        );
        process::exit(2);
    });

    let counters = TelemetryCounters::new();
    let edges = EdgeChannel::new(&counters);
    let device = Device::new(
        &counters,
        &edges,
        DebounceConfig::default(),
        Some(REPORT_INTERVAL),
    );
    let mut session = Session::new(device, None);

    let stdout = io::stdout();
    let mut writer = stdout.lock();

    if profile != TranscriptProfile::Interactive {
        writeln!(writer, "# {}", profile.header())?;
        for line in session.run_script(profile)? {
            writeln!(writer, "{line}")?;
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Sleepy button emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let responses = session.handle_command(&line)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }

        if session.is_closed() {
            break;
        }
    }

    Ok(())
}

fn parse_profile() -> Result<TranscriptProfile, String> {
    let mut args = env::args().skip(1);
    if let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            TranscriptProfile::from_tag(value)
        } else if arg == "--profile" {
            if let Some(value) = args.next() {
                TranscriptProfile::from_tag(&value)
            } else {
                Err("Expected value after --profile".to_string())
            }
        } else {
            TranscriptProfile::from_tag(&arg)
        }
    } else {
        Ok(TranscriptProfile::Interactive)
    }
}
