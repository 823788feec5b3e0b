//! Command grammar for the emulator console.
//!
//! Lines are parsed with `winnow` straight from the input text. Keywords are
//! case-insensitive and durations carry a `us`, `ms`, or `s` suffix.

use std::fmt;
use std::time::Duration;

use winnow::ascii::{Caseless, digit1, space0, space1};
use winnow::combinator::{alt, cut_err, eof, preceded, terminated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;

/// Upper bound for a single `bounce` burst.
pub const MAX_BOUNCE_EDGES: u32 = 64;

/// Longest duration a single command may name.
pub const MAX_DURATION: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    /// Drive the line to a raw electrical level.
    Level(bool),
    /// Chattering transition to the active level.
    Press,
    /// Chattering transition back to the idle level.
    Release,
    /// Toggle the line `count` times, `interval` apart.
    Bounce { count: u32, interval: Duration },
    /// Advance virtual time.
    Wait(Duration),
    Report,
    Status,
    History,
    Help,
    Exit,
}

/// Parse failure with the offending column.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (column {})", self.message, self.offset + 1)
    }
}

/// Parses one console line.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let end_of_line = eof::<&str, ErrMode<ContextError>>.context(StrContext::Expected(
        StrContextValue::Description("end of line"),
    ));
    terminated(preceded(space0, command), (space0, end_of_line))
        .parse(line)
        .map_err(|err| CommandError {
            offset: err.offset(),
            message: describe(err.inner()),
        })
}

fn describe(error: &ContextError) -> String {
    let mut expected = error.context().filter_map(|context| match context {
        StrContext::Expected(value) => Some(value.to_string()),
        _ => None,
    });
    let label = error.context().find_map(|context| match context {
        StrContext::Label(label) => Some(*label),
        _ => None,
    });

    match (label, expected.next()) {
        (Some(label), Some(value)) => format!("invalid {label}, expected {value}"),
        (Some(label), None) => format!("invalid {label}"),
        (None, Some(value)) => format!("expected {value}"),
        (None, None) => "unknown command".to_string(),
    }
}

fn command(input: &mut &str) -> ModalResult<Command> {
    alt((
        bounce,
        wait,
        keyword("high").value(Command::Level(true)),
        keyword("low").value(Command::Level(false)),
        keyword("press").value(Command::Press),
        keyword("release").value(Command::Release),
        keyword("report").value(Command::Report),
        keyword("status").value(Command::Status),
        keyword("history").value(Command::History),
        keyword("help").value(Command::Help),
        alt((keyword("exit"), keyword("quit"))).value(Command::Exit),
    ))
    .parse_next(input)
}

fn keyword<'s>(name: &'static str) -> impl Parser<&'s str, &'s str, ErrMode<ContextError>> {
    Caseless(name)
}

fn bounce(input: &mut &str) -> ModalResult<Command> {
    let _ = keyword("bounce").parse_next(input)?;
    let (count, interval) = cut_err((
        preceded(space1, edge_count),
        preceded(space1, duration),
    ))
    .parse_next(input)?;
    Ok(Command::Bounce { count, interval })
}

fn wait(input: &mut &str) -> ModalResult<Command> {
    let _ = keyword("wait").parse_next(input)?;
    cut_err(preceded(space1, duration))
        .map(Command::Wait)
        .parse_next(input)
}

fn edge_count(input: &mut &str) -> ModalResult<u32> {
    digit1
        .try_map(str::parse::<u32>)
        .verify(|count: &u32| (1..=MAX_BOUNCE_EDGES).contains(count))
        .context(StrContext::Label("edge count"))
        .context(StrContext::Expected(StrContextValue::Description(
            "an integer between 1 and 64",
        )))
        .parse_next(input)
}

/// Duration literal such as `250ms`, `40us`, or `3s`.
pub fn duration(input: &mut &str) -> ModalResult<Duration> {
    (
        digit1.try_map(str::parse::<u64>),
        alt((
            Caseless("us").value(Duration::from_micros as fn(u64) -> Duration),
            Caseless("ms").value(Duration::from_millis as fn(u64) -> Duration),
            Caseless("s").value(Duration::from_secs as fn(u64) -> Duration),
        )),
    )
        .map(|(value, unit)| unit(value))
        .verify(|duration: &Duration| *duration <= MAX_DURATION)
        .context(StrContext::Label("duration"))
        .context(StrContext::Expected(StrContextValue::Description(
            "a number with a us, ms, or s suffix, at most 3600s",
        )))
        .parse_next(input)
}

/// One line per command for the `help` output.
pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("high", "high                       - drive the line high"),
    ("low", "low                        - drive the line low"),
    ("press", "press                      - bouncy press to the active level"),
    ("release", "release                    - bouncy release to the idle level"),
    ("bounce", "bounce <count> <interval>  - toggle the line <count> times"),
    ("wait", "wait <duration>            - advance virtual time (us, ms, s)"),
    ("report", "report                     - drain and print the counters"),
    ("status", "status                     - show line, debounce, and lock state"),
    ("history", "history                    - list recent debounce events"),
    ("help", "help                       - show this list"),
    ("exit", "exit                       - leave the emulator"),
];
