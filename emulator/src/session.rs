use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use crate::device::{Device, format_duration, format_timestamp};
use crate::grammar::{self, Command, HELP_TOPICS};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    Press,
    Bounce,
    Wake,
}

impl TranscriptProfile {
    pub const SCRIPTED: [TranscriptProfile; 3] = [
        TranscriptProfile::Press,
        TranscriptProfile::Bounce,
        TranscriptProfile::Wake,
    ];

    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "transcripts/emulator-interactive.log",
            TranscriptProfile::Press => "transcripts/emulator-press.log",
            TranscriptProfile::Bounce => "transcripts/emulator-bounce.log",
            TranscriptProfile::Wake => "transcripts/emulator-wake.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "Sleepy button emulator interactive transcript",
            TranscriptProfile::Press => "Sleepy button emulator clean press transcript",
            TranscriptProfile::Bounce => "Sleepy button emulator bounce train transcript",
            TranscriptProfile::Wake => "Sleepy button emulator light-sleep wake transcript",
        }
    }

    /// Commands replayed for a scripted profile.
    pub fn script(self) -> &'static [&'static str] {
        match self {
            TranscriptProfile::Interactive => &[],
            TranscriptProfile::Press => &[
                "high",
                "wait 199ms",
                "status",
                "wait 1ms",
                "status",
                "low",
                "wait 250ms",
                "report",
            ],
            TranscriptProfile::Bounce => &[
                "bounce 5 12ms",
                "wait 152ms",
                "status",
                "wait 100ms",
                "status",
                "release",
                "wait 300ms",
                "report",
                "history",
            ],
            TranscriptProfile::Wake => &[
                "wait 2500ms",
                "press",
                "wait 250ms",
                "release",
                "wait 250ms",
                "status",
                "history",
            ],
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("interactive") {
            Ok(Self::Interactive)
        } else if tag.eq_ignore_ascii_case("press") {
            Ok(Self::Press)
        } else if tag.eq_ignore_ascii_case("bounce") {
            Ok(Self::Bounce)
        } else if tag.eq_ignore_ascii_case("wake") {
            Ok(Self::Wake)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

/// Console front-end over a [`Device`].
pub struct Session<'a> {
    device: Device<'a>,
    transcript: Option<TranscriptLogger>,
    closed: bool,
}

impl<'a> Session<'a> {
    pub fn new(device: Device<'a>, transcript: Option<TranscriptLogger>) -> Self {
        Self {
            device,
            transcript,
            closed: false,
        }
    }

    /// Returns `true` once `exit` was handled.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn device(&self) -> &Device<'a> {
        &self.device
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let started_at = self.device.now();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(started_at, TranscriptRole::Host, trimmed)?;
        }

        let mut lines = match grammar::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        let mut traced: Vec<String> = self
            .device
            .take_traces()
            .iter()
            .map(ToString::to_string)
            .collect();
        traced.append(&mut lines);

        if let Some(transcript) = self.transcript.as_mut() {
            for line in &traced {
                transcript.append_line(self.device.now(), TranscriptRole::Emulator, line)?;
            }
        }
        Ok(traced)
    }

    /// Replays a scripted profile, returning the console output.
    pub fn run_script(&mut self, profile: TranscriptProfile) -> io::Result<Vec<String>> {
        let mut output = Vec::new();
        for command in profile.script() {
            output.push(format!("> {command}"));
            output.extend(self.handle_command(command)?);
        }
        Ok(output)
    }

    fn execute(&mut self, command: Command) -> Vec<String> {
        match command {
            Command::Level(level) => {
                self.device.set_line(level);
                Vec::new()
            }
            Command::Press => {
                self.device.press();
                Vec::new()
            }
            Command::Release => {
                self.device.release();
                Vec::new()
            }
            Command::Bounce { count, interval } => {
                self.device.bounce(count, interval);
                vec![format!(
                    "OK bounce {count} edges {} apart",
                    format_duration(interval)
                )]
            }
            Command::Wait(duration) => {
                self.device.advance(duration);
                vec![format!(
                    "OK now {}",
                    format_timestamp(self.device.now())
                )]
            }
            Command::Report => vec![self.device.report().to_string()],
            Command::Status => self.device.status().lines(),
            Command::History => {
                let history = self.device.history();
                if history.is_empty() {
                    vec!["history empty".to_string()]
                } else {
                    history
                }
            }
            Command::Help => HELP_TOPICS
                .iter()
                .map(|(_, line)| (*line).to_string())
                .collect(),
            Command::Exit => {
                self.closed = true;
                vec!["Session closed.".to_string()]
            }
        }
    }
}

pub struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(self.writer, "# Timestamps are virtual device time")?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, at: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[{}] {} {}",
            format_timestamp(at),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::REPORT_INTERVAL;
    use button_core::debounce::DebounceConfig;
    use button_core::edge::EdgeChannel;
    use button_core::telemetry::TelemetryCounters;

    #[test]
    fn press_profile_confirms_at_window_edge() {
        let counters = TelemetryCounters::new();
        let edges = EdgeChannel::new(&counters);
        let device = Device::new(&counters, &edges, DebounceConfig::default(), None);
        let mut session = Session::new(device, None);

        let output = session.run_script(TranscriptProfile::Press).unwrap();
        let joined = output.join("\n");

        assert!(joined.contains("debounce started timer#1"), "{joined}");
        assert!(joined.contains("[+   200.000 ms] settled high (pressed)"), "{joined}");
        assert!(joined.contains("settled low (released), press counted"), "{joined}");
        assert!(joined.contains("Counter: 1;"), "{joined}");
        assert!(session.device().invariant_holds());
    }

    #[test]
    fn bounce_profile_confirms_from_last_edge() {
        let counters = TelemetryCounters::new();
        let edges = EdgeChannel::new(&counters);
        let device = Device::new(&counters, &edges, DebounceConfig::default(), None);
        let mut session = Session::new(device, None);

        let output = session.run_script(TranscriptProfile::Bounce).unwrap();
        let joined = output.join("\n");

        assert!(joined.contains("debounce restarted timer#5"), "{joined}");
        assert!(joined.contains("[+   248.000 ms] settled high (pressed)"), "{joined}");
        assert!(!joined.contains("[+   200.000 ms] settled"), "{joined}");
    }

    #[test]
    fn wake_profile_synthesizes_edge() {
        let counters = TelemetryCounters::new();
        let edges = EdgeChannel::new(&counters);
        let device = Device::new(
            &counters,
            &edges,
            DebounceConfig::default(),
            Some(REPORT_INTERVAL),
        );
        let mut session = Session::new(device, None);

        let output = session.run_script(TranscriptProfile::Wake).unwrap();
        let joined = output.join("\n");

        assert!(
            joined.contains("wake line after 500ms, synthesized high edge"),
            "{joined}"
        );
        assert!(joined.contains("edge wake high -> debounce started"), "{joined}");
        assert!(joined.contains("edge irq high -> ignored"), "{joined}");
        assert!(joined.contains("Counter: 1;"), "{joined}");
    }

    #[test]
    fn syntax_errors_are_reported_and_exit_closes() {
        let counters = TelemetryCounters::new();
        let edges = EdgeChannel::new(&counters);
        let device = Device::new(&counters, &edges, DebounceConfig::default(), None);
        let mut session = Session::new(device, None);

        let output = session.handle_command("wait forever").unwrap();
        assert!(output[0].starts_with("ERR syntax"), "{output:?}");
        assert!(!session.is_closed());

        let output = session.handle_command("exit").unwrap();
        assert_eq!(output, vec!["Session closed.".to_string()]);
        assert!(session.is_closed());
    }
}
