use button_core::edge::EdgeEvent;
use embassy_stm32::exti::ExtiInput;

use crate::button::EdgeQueue;

/// Samples PA0 after every EXTI edge and hands the level to the processing task.
#[embassy_executor::task]
pub async fn run(mut button: ExtiInput<'static>, edges: &'static EdgeQueue) -> ! {
    loop {
        button.wait_for_any_edge().await;
        // A full queue is counted by the channel itself.
        let _ = edges.try_send(EdgeEvent::interrupt(button.is_high()));
    }
}
