//! Firmware bindings for the debounced button.
//!
//! Fixes the generic `button-core` types to the primitives this board uses:
//! the one-shot timer service, the reference-counted sleep-inhibit lock, and
//! a raw mutex that is only ever taken from thread mode.

#![allow(dead_code)]

use button_core::debounce::SharedDebouncer;
use button_core::edge::{EDGE_QUEUE_DEPTH, EdgeChannel};
use button_core::wake::WakeDispatcher;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_time::Duration;

use crate::power::FirmwareSleepLock;
use crate::timer::FirmwareTimer;

/// Interval between telemetry reports.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[cfg(target_os = "none")]
pub type ButtonMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
pub type ButtonMutex = NoopRawMutex;

/// Edge queue between the EXTI task, the sleep-exit hook, and the processing task.
pub type EdgeQueue = EdgeChannel<'static, ButtonMutex, EDGE_QUEUE_DEPTH>;

/// Debounce machine shared by the processing task and the timer service.
pub type FirmwareDebouncer =
    SharedDebouncer<'static, ButtonMutex, FirmwareTimer<'static>, FirmwareSleepLock<'static>>;

/// Sleep-hook context handed to the light-sleep executor.
pub type FirmwareDispatcher<P> = WakeDispatcher<'static, P, ButtonMutex, EDGE_QUEUE_DEPTH>;
