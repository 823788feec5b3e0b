//! Fatal invariant violations.
//!
//! None of these are recoverable: each one means the lock/timer pairing has
//! already diverged, so continuing would either inhibit sleep forever or let
//! the CPU sleep through a debounce window. [`halt`] panics, and the firmware
//! panic handler stops the core.

use core::fmt;

/// Broken debounce/lock invariant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InvariantViolation {
    /// Acquire requested while the coordinator already holds the lock.
    LockAlreadyHeld,
    /// Release requested while the coordinator does not hold the lock.
    LockNotHeld,
    /// The platform rejected an acquire call.
    PlatformAcquireFailed,
    /// The platform rejected a release call.
    PlatformReleaseFailed,
    /// A pending timer exists without the lock, or the lock without a timer.
    LockTimerDiverged {
        timer_pending: bool,
        lock_held: bool,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::LockAlreadyHeld => {
                f.write_str("sleep inhibit lock acquired while already held")
            }
            InvariantViolation::LockNotHeld => {
                f.write_str("sleep inhibit lock released while not held")
            }
            InvariantViolation::PlatformAcquireFailed => {
                f.write_str("platform refused to acquire sleep inhibit lock")
            }
            InvariantViolation::PlatformReleaseFailed => {
                f.write_str("platform refused to release sleep inhibit lock")
            }
            InvariantViolation::LockTimerDiverged {
                timer_pending,
                lock_held,
            } => write!(
                f,
                "debounce timer pending={timer_pending} but sleep inhibit lock held={lock_held}"
            ),
        }
    }
}

/// Stops execution after an invariant violation.
#[cold]
#[track_caller]
pub fn halt(violation: InvariantViolation) -> ! {
    panic!("invariant violated: {violation}")
}
