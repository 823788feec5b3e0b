//! Light-sleep hook bodies.
//!
//! While the CPU clock is gated the edge interrupt that would normally report
//! a press either never runs or was consumed by the wake path. The exit hook
//! therefore re-reads the line after a line-triggered wake and pushes a
//! synthesized [`EdgeEvent`] so the debounce machine sees the press exactly
//! as it would a live interrupt. If the real interrupt still fires, the
//! duplicate carries the same level and is ignored by the machine.

use core::fmt;
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::edge::{EdgeChannel, EdgeEvent};
use crate::line::LineSampler;
use crate::telemetry::TelemetryCounters;

/// Platform-reported reason the CPU resumed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WakeCause {
    /// The monitored input line.
    ExternalLine,
    /// A scheduled timer wake-up.
    Timer,
}

impl WakeCause {
    pub const fn is_external_line(self) -> bool {
        matches!(self, WakeCause::ExternalLine)
    }
}

impl fmt::Display for WakeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeCause::ExternalLine => f.write_str("line"),
            WakeCause::Timer => f.write_str("timer"),
        }
    }
}

/// Payload delivered to the sleep-exit hook.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SleepExit {
    pub slept: Duration,
    pub cause: WakeCause,
}

impl SleepExit {
    pub const fn new(slept: Duration, cause: WakeCause) -> Self {
        Self { slept, cause }
    }
}

/// What the exit hook did about the wake.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WakeOutcome {
    /// Wake was not caused by the line.
    NoEdge,
    /// An edge carrying `level` was synthesized; `queued` is `false` when the
    /// channel was full and the sample dropped.
    Synthesized { level: bool, queued: bool },
}

/// Context handed to the platform's sleep hook registration.
pub struct WakeDispatcher<'a, P, M: RawMutex, const N: usize> {
    line: P,
    edges: &'a EdgeChannel<'a, M, N>,
    counters: &'a TelemetryCounters,
}

impl<'a, P, M, const N: usize> WakeDispatcher<'a, P, M, N>
where
    P: LineSampler,
    M: RawMutex,
{
    pub const fn new(line: P, edges: &'a EdgeChannel<'a, M, N>, counters: &'a TelemetryCounters) -> Self {
        Self {
            line,
            edges,
            counters,
        }
    }

    /// Sleep-entry hook. The interval starts now; nothing to record.
    pub fn on_sleep_enter(&self, _time_to_sleep: Option<Duration>) {}

    /// Sleep-exit hook: accounts the interval and re-injects line wakes.
    pub fn on_sleep_exit(&self, exit: SleepExit) -> WakeOutcome {
        self.counters.record_sleep(exit.slept);

        if !exit.cause.is_external_line() {
            return WakeOutcome::NoEdge;
        }

        let level = self.line.read_level();
        let queued = self.edges.try_send(EdgeEvent::wake(level));
        WakeOutcome::Synthesized { level, queued }
    }

    pub fn line(&self) -> &P {
        &self.line
    }
}
