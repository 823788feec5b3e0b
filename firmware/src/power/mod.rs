//! Sleep-inhibit reference count and the light-sleep executor.
//!
//! The executor only enters light sleep while [`SleepInhibitCount`] reads
//! zero. `button-core` holds at most one reference through
//! [`FirmwareSleepLock`] for the length of each debounce window.

#![allow(dead_code)]

use core::fmt;

use button_core::power::SleepInhibitLock;
use button_core::wake::WakeCause;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

#[cfg(target_os = "none")]
pub mod executor;

/// Failure reported by the platform reference count.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SleepLockError {
    /// Release requested with no outstanding reference.
    NotHeld,
    /// The count cannot grow any further.
    Saturated,
}

impl fmt::Display for SleepLockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepLockError::NotHeld => f.write_str("sleep inhibit count already zero"),
            SleepLockError::Saturated => f.write_str("sleep inhibit count saturated"),
        }
    }
}

/// Platform-wide count of light-sleep inhibitors.
pub struct SleepInhibitCount {
    holders: AtomicU32,
}

impl SleepInhibitCount {
    pub const fn new() -> Self {
        Self {
            holders: AtomicU32::new(0),
        }
    }

    /// Adds one holder and returns the new count.
    pub fn take(&self) -> Result<u32, SleepLockError> {
        self.holders
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |holders| {
                holders.checked_add(1)
            })
            .map(|previous| previous + 1)
            .map_err(|_| SleepLockError::Saturated)
    }

    /// Drops one holder and returns the new count.
    pub fn give(&self) -> Result<u32, SleepLockError> {
        self.holders
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |holders| {
                holders.checked_sub(1)
            })
            .map(|previous| previous - 1)
            .map_err(|_| SleepLockError::NotHeld)
    }

    pub fn holders(&self) -> u32 {
        self.holders.load(Ordering::Acquire)
    }

    /// Returns `true` when nothing inhibits light sleep.
    pub fn sleep_allowed(&self) -> bool {
        self.holders() == 0
    }

    /// Returns `true` when the idle step may run the sleep hooks: no holder
    /// and no task woken since the poll pass started.
    pub fn may_light_sleep(&self, pended: &PendFlag) -> bool {
        self.sleep_allowed() && !pended.is_raised()
    }
}

impl Default for SleepInhibitCount {
    fn default() -> Self {
        Self::new()
    }
}

/// Raised by the executor pender whenever a task becomes ready.
///
/// The pender also issues `SEV`, so a `WFE` after a raised flag returns at
/// once and must not be accounted as sleep.
pub struct PendFlag {
    raised: AtomicBool,
}

impl PendFlag {
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Cleared ahead of every poll pass.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

impl Default for PendFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// One reference on a [`SleepInhibitCount`], driven by the debounce machine.
#[derive(Copy, Clone)]
pub struct FirmwareSleepLock<'a> {
    count: &'a SleepInhibitCount,
}

impl<'a> FirmwareSleepLock<'a> {
    pub const fn new(count: &'a SleepInhibitCount) -> Self {
        Self { count }
    }
}

impl SleepInhibitLock for FirmwareSleepLock<'_> {
    type Error = SleepLockError;

    fn acquire(&mut self) -> Result<(), Self::Error> {
        self.count.take().map(|_| ())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        self.count.give().map(|_| ())
    }
}

/// Attributes a wake to the button when its level moved while the core slept.
///
/// The line and the TIM1 alarm are the only wake sources enabled on this board.
pub const fn classify_wake(level_before: bool, level_after: bool) -> WakeCause {
    if level_before == level_after {
        WakeCause::Timer
    } else {
        WakeCause::ExternalLine
    }
}
