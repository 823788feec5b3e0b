use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use super::{DebounceMachine, DebounceState, EdgeOutcome, ExpiryOutcome};
use crate::edge::{EdgeChannel, EdgeEvent};
use crate::power::SleepInhibitLock;
use crate::timer::{OneShotTimer, TimerHandle};

/// [`DebounceMachine`] behind one blocking mutex.
///
/// The processing task and the timer service both go through this wrapper,
/// so each transition runs to completion before the other context can
/// observe the state. Pick an interrupt-safe `M` when the timer callback runs
/// in interrupt context.
pub struct SharedDebouncer<'a, M: RawMutex, T, L> {
    inner: Mutex<M, RefCell<DebounceMachine<'a, T, L>>>,
}

impl<'a, M, T, L> SharedDebouncer<'a, M, T, L>
where
    M: RawMutex,
    T: OneShotTimer,
    L: SleepInhibitLock,
{
    pub const fn new(machine: DebounceMachine<'a, T, L>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(machine)),
        }
    }

    /// Processing-task entry point.
    pub fn apply_edge(&self, event: EdgeEvent) -> EdgeOutcome {
        self.with(|machine| machine.apply_edge(event))
    }

    /// Timer-service entry point.
    pub fn on_timer_expire(&self, handle: TimerHandle) -> ExpiryOutcome {
        self.with(|machine| machine.on_timer_expire(handle))
    }

    /// Last confirmed level.
    pub fn stable_level(&self) -> bool {
        self.with(|machine| machine.stable_level())
    }

    /// Returns `true` while a debounce window holds the sleep-inhibit lock.
    pub fn lock_held(&self) -> bool {
        self.with(|machine| machine.lock_held())
    }

    pub fn state(&self) -> DebounceState {
        self.with(|machine| machine.state())
    }

    /// Runs `f` with exclusive access to the machine.
    pub fn with<R>(&self, f: impl FnOnce(&mut DebounceMachine<'a, T, L>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

/// Waits for one edge and applies it.
pub async fn process_next<M, C, T, L, const N: usize>(
    channel: &EdgeChannel<'_, C, N>,
    debouncer: &SharedDebouncer<'_, M, T, L>,
) -> (EdgeEvent, EdgeOutcome)
where
    M: RawMutex,
    C: RawMutex,
    T: OneShotTimer,
    L: SleepInhibitLock,
{
    let event = channel.receive().await;
    let outcome = debouncer.apply_edge(event);
    (event, outcome)
}

/// Processing-task body: applies every queued edge for the life of the process.
pub async fn process_edges<M, C, T, L, F, const N: usize>(
    channel: &EdgeChannel<'_, C, N>,
    debouncer: &SharedDebouncer<'_, M, T, L>,
    mut observe: F,
) -> !
where
    M: RawMutex,
    C: RawMutex,
    T: OneShotTimer,
    L: SleepInhibitLock,
    F: FnMut(EdgeEvent, EdgeOutcome),
{
    loop {
        let (event, outcome) = process_next(channel, debouncer).await;
        observe(event, outcome);
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;
    use crate::debounce::DebounceConfig;
    use crate::power::NoopSleepInhibitLock;
    use crate::telemetry::TelemetryCounters;

    struct CountingTimer(TimerHandle);

    impl OneShotTimer for CountingTimer {
        fn arm(&mut self, _: Duration) -> TimerHandle {
            self.0 = self.0.next();
            self.0
        }

        fn stop(&mut self, _: TimerHandle) {}
    }

    #[test]
    fn process_next_applies_queued_edge() {
        let counters = TelemetryCounters::new();
        let channel: EdgeChannel<'_, NoopRawMutex> = EdgeChannel::new(&counters);
        let debouncer: SharedDebouncer<'_, NoopRawMutex, _, _> = SharedDebouncer::new(
            DebounceMachine::new(
                DebounceConfig::default(),
                CountingTimer(TimerHandle::new(0)),
                NoopSleepInhibitLock::new(),
                &counters,
            ),
        );

        assert!(channel.try_send(EdgeEvent::interrupt(true)));
        let (event, outcome) = embassy_futures::block_on(process_next(&channel, &debouncer));

        assert_eq!(event, EdgeEvent::interrupt(true));
        assert_eq!(outcome, EdgeOutcome::Started(TimerHandle::new(1)));
        assert!(debouncer.lock_held());
        assert!(!debouncer.stable_level());

        debouncer.on_timer_expire(TimerHandle::new(1));
        assert!(debouncer.stable_level());
        assert!(!debouncer.state().is_settling());
    }
}
