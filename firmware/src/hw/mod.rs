//! Direct register access for the button pin.
//!
//! The EXTI task owns the `ExtiInput` for PA0, but the sleep-exit hook runs in
//! the executor's idle path and needs its own view of the level. Reading IDR
//! has no side effects, so both can sample the pin concurrently.

use button_core::line::LineSampler;
use embassy_stm32::pac;
use embassy_stm32::pac::gpio::vals::Idr;

/// Pin index of the button on GPIOA.
pub const BUTTON_PIN: usize = 0;

/// [`LineSampler`] reading PA0 straight from the input data register.
#[derive(Copy, Clone, Debug, Default)]
pub struct Pa0Line;

impl LineSampler for Pa0Line {
    fn read_level(&self) -> bool {
        pac::GPIOA.idr().read().idr(BUTTON_PIN) == Idr::HIGH
    }
}
