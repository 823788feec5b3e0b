//! One-shot timer abstraction consumed by the debounce machine.

use core::fmt;
use core::time::Duration;

/// Identifies one arming of a one-shot timer.
///
/// Platforms hand out a fresh handle on every [`OneShotTimer::arm`] call so an
/// expiry racing a re-arm can be recognised as stale.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TimerHandle(u32);

impl TimerHandle {
    /// Wraps a platform-assigned generation number.
    #[must_use]
    pub const fn new(generation: u32) -> Self {
        Self(generation)
    }

    /// Returns the raw generation number.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.0
    }

    /// Handle that follows `self`, wrapping on overflow.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Platform timer service driving debounce expiry.
pub trait OneShotTimer {
    /// Arms the timer to expire once after `after`, replacing any earlier arming.
    fn arm(&mut self, after: Duration) -> TimerHandle;

    /// Disarms `handle`. Stopping a handle that already fired or was replaced
    /// must be a silent no-op.
    fn stop(&mut self, handle: TimerHandle);
}
