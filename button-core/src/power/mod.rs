//! Sleep-inhibition lock protocol.
//!
//! The platform primitive is reference counted, but the debounce machine is
//! its only user, so [`PowerLock`] treats it as a plain held/not-held flag and
//! halts on any acquire or release that would push the count past one or
//! below zero.

use core::fmt::Debug;

use crate::error::{InvariantViolation, halt};

/// Platform primitive that keeps the CPU out of light sleep while held.
pub trait SleepInhibitLock {
    /// Platform-specific failure detail.
    type Error: Debug;

    /// Takes one reference on the lock.
    fn acquire(&mut self) -> Result<(), Self::Error>;

    /// Drops one reference on the lock.
    fn release(&mut self) -> Result<(), Self::Error>;
}

/// Lock that performs no platform interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSleepInhibitLock;

impl NoopSleepInhibitLock {
    pub const fn new() -> Self {
        Self
    }
}

impl SleepInhibitLock for NoopSleepInhibitLock {
    type Error = core::convert::Infallible;

    fn acquire(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Idempotence guard around a [`SleepInhibitLock`].
#[derive(Debug)]
pub struct PowerLock<L> {
    lock: L,
    held: bool,
}

impl<L: SleepInhibitLock> PowerLock<L> {
    /// Wraps a released platform lock.
    pub const fn new(lock: L) -> Self {
        Self { lock, held: false }
    }

    /// Returns `true` while the lock is held.
    pub const fn is_held(&self) -> bool {
        self.held
    }

    /// Acquires the lock. Halts when it is already held or the platform fails.
    #[track_caller]
    pub fn acquire(&mut self) {
        if self.held {
            halt(InvariantViolation::LockAlreadyHeld);
        }
        if self.lock.acquire().is_err() {
            halt(InvariantViolation::PlatformAcquireFailed);
        }
        self.held = true;
    }

    /// Releases the lock. Halts when it is not held or the platform fails.
    #[track_caller]
    pub fn release(&mut self) {
        if !self.held {
            halt(InvariantViolation::LockNotHeld);
        }
        if self.lock.release().is_err() {
            halt(InvariantViolation::PlatformReleaseFailed);
        }
        self.held = false;
    }
}
