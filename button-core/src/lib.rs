#![no_std]

// Coordination logic for one debounced button on a light-sleeping MCU.
//
// The crate owns the debounce state machine, the sleep-inhibit lock protocol,
// and the sleep-exit re-injection of line wakes. It avoids the standard
// library so the same code runs in the STM32 firmware and in the host
// emulator; platform services enter through the traits in `line`, `timer`,
// and `power`.

pub mod debounce;
pub mod edge;
pub mod error;
pub mod line;
pub mod power;
pub mod telemetry;
pub mod timer;
pub mod wake;
