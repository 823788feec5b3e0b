use button_core::debounce::{DebounceConfig, DebounceMachine, SharedDebouncer};
use button_core::edge::EdgeChannel;
use button_core::telemetry::TelemetryCounters;
use button_core::wake::WakeDispatcher;
use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Pull;
use embassy_sync::signal::Signal;
use static_cell::StaticCell;

use crate::button::{EdgeQueue, FirmwareDebouncer, FirmwareDispatcher};
use crate::hw::Pa0Line;
use crate::power::executor::LightSleepExecutor;
use crate::power::{FirmwareSleepLock, SleepInhibitCount};
use crate::telemetry::HistoryLog;
use crate::timer::{FirmwareTimer, TimerSignal};

mod edge_task;
mod process_task;
mod report_task;
mod timer_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

static TELEMETRY: TelemetryCounters = TelemetryCounters::new();
static EDGES: EdgeQueue = EdgeChannel::new(&TELEMETRY);
static SLEEP_INHIBIT: SleepInhibitCount = SleepInhibitCount::new();
static TIMER_COMMANDS: TimerSignal = Signal::new();
static HISTORY: HistoryLog = HistoryLog::new();

static DEBOUNCER: StaticCell<FirmwareDebouncer> = StaticCell::new();
static DISPATCHER: StaticCell<FirmwareDispatcher<Pa0Line>> = StaticCell::new();
static EXECUTOR: StaticCell<LightSleepExecutor<Pa0Line>> = StaticCell::new();

#[cortex_m_rt::entry]
fn main() -> ! {
    let hal::Peripherals { PA0, EXTI0, .. } = hal::init(hal::Config::default());

    let button = ExtiInput::new(PA0, EXTI0, Pull::Down);

    let debouncer: &'static FirmwareDebouncer =
        DEBOUNCER.init(SharedDebouncer::new(DebounceMachine::with_resting_level(
            DebounceConfig::default(),
            button.is_high(),
            FirmwareTimer::new(&TIMER_COMMANDS),
            FirmwareSleepLock::new(&SLEEP_INHIBIT),
            &TELEMETRY,
        )));
    let dispatcher: &'static FirmwareDispatcher<Pa0Line> =
        DISPATCHER.init(WakeDispatcher::new(Pa0Line, &EDGES, &TELEMETRY));

    let executor = EXECUTOR.init(LightSleepExecutor::new(
        &SLEEP_INHIBIT,
        dispatcher,
        &HISTORY,
    ));

    defmt::info!("sleepy-button: ready, button on PA0");

    executor.run(|spawner| {
        spawner
            .spawn(edge_task::run(button, &EDGES))
            .expect("failed to spawn edge task");
        spawner
            .spawn(process_task::run(&EDGES, debouncer, &HISTORY))
            .expect("failed to spawn processing task");
        spawner
            .spawn(timer_task::run(&TIMER_COMMANDS, debouncer, &HISTORY))
            .expect("failed to spawn timer task");
        spawner
            .spawn(report_task::run(&TELEMETRY))
            .expect("failed to spawn report task");
    })
}
