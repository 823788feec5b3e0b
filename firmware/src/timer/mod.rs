//! One-shot debounce timer backed by `embassy-time`.
//!
//! [`FirmwareTimer`] lives inside the debounce machine and only posts
//! commands; the timer task owns the deadline through [`TimerSlot`] and calls
//! back into the machine when it passes. The signal keeps just the newest
//! command, which is enough because a restart always posts `Stop` then `Arm`
//! and the `Arm` supersedes the deadline either way.

#![allow(dead_code)]

use button_core::timer::{OneShotTimer, TimerHandle};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant};

/// Request posted by [`FirmwareTimer`] to the timer task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerCommand {
    Arm { handle: TimerHandle, after: Duration },
    Stop { handle: TimerHandle },
}

pub type TimerSignal = Signal<CriticalSectionRawMutex, TimerCommand>;

fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = duration.as_micros();
    let micros = u64::try_from(micros).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

/// [`OneShotTimer`] that forwards to the timer task.
pub struct FirmwareTimer<'a> {
    signal: &'a TimerSignal,
    last: TimerHandle,
}

impl<'a> FirmwareTimer<'a> {
    pub const fn new(signal: &'a TimerSignal) -> Self {
        Self {
            signal,
            last: TimerHandle::new(0),
        }
    }
}

impl OneShotTimer for FirmwareTimer<'_> {
    fn arm(&mut self, after: core::time::Duration) -> TimerHandle {
        self.last = self.last.next();
        self.signal.signal(TimerCommand::Arm {
            handle: self.last,
            after: core_duration_to_embassy(after),
        });
        self.last
    }

    fn stop(&mut self, handle: TimerHandle) {
        self.signal.signal(TimerCommand::Stop { handle });
    }
}

/// Deadline bookkeeping for the timer task.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TimerSlot {
    armed: Option<(TimerHandle, Instant)>,
}

impl TimerSlot {
    pub const fn new() -> Self {
        Self { armed: None }
    }

    /// Applies a command received at `now`. Stopping anything but the armed
    /// handle is a no-op.
    pub fn apply(&mut self, command: TimerCommand, now: Instant) {
        match command {
            TimerCommand::Arm { handle, after } => {
                self.armed = Some((handle, now + after));
            }
            TimerCommand::Stop { handle } => {
                if matches!(self.armed, Some((armed, _)) if armed == handle) {
                    self.armed = None;
                }
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|(_, deadline)| deadline)
    }

    /// Takes the armed handle once its deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Option<TimerHandle> {
        match self.armed {
            Some((handle, deadline)) if deadline <= now => {
                self.armed = None;
                Some(handle)
            }
            _ => None,
        }
    }
}
