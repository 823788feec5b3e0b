//! Debounce state machine for one input line.
//!
//! The machine has two states. **Idle**: no timer pending, lock released,
//! `raw_level == stable_level`. **Settling**: a one-shot timer is pending and
//! the sleep-inhibit lock is held. Every raw edge while settling restarts the
//! timer, so only the last edge of a bounce train decides when the level is
//! confirmed. The lock is taken before the first timer is armed and dropped
//! when that window finally expires, which keeps the CPU out of light sleep
//! for exactly as long as a debounce window is in flight.
//!
//! Transitions are plain `&mut self` functions that return an outcome value;
//! [`SharedDebouncer`] serialises the task and timer contexts around them.

use core::fmt;
use core::time::Duration;

use crate::edge::EdgeEvent;
use crate::error::{InvariantViolation, halt};
use crate::power::{PowerLock, SleepInhibitLock};
use crate::telemetry::TelemetryCounters;
use crate::timer::{OneShotTimer, TimerHandle};

mod shared;

pub use shared::{SharedDebouncer, process_edges, process_next};

/// Debounce window used by the reference hardware.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

/// Electrical level that means "pressed".
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinePolarity {
    /// Pulled down at rest, high while pressed.
    ActiveHigh,
    /// Pulled up at rest, low while pressed.
    ActiveLow,
}

impl LinePolarity {
    /// Returns `true` when `level` means pressed.
    pub const fn is_active(self, level: bool) -> bool {
        match self {
            LinePolarity::ActiveHigh => level,
            LinePolarity::ActiveLow => !level,
        }
    }

    /// Level the line rests at when untouched.
    pub const fn idle_level(self) -> bool {
        matches!(self, LinePolarity::ActiveLow)
    }
}

/// Which confirmed edge of an actuation increments the press counter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CountEdge {
    /// Count when idle → active is confirmed.
    Press,
    /// Count when active → idle is confirmed.
    Release,
}

/// Confirmed change of the stable level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Transition {
    Pressed,
    Released,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Pressed => f.write_str("pressed"),
            Transition::Released => f.write_str("released"),
        }
    }
}

impl CountEdge {
    /// Returns `true` when `transition` is the counted edge.
    pub const fn counts(self, transition: Transition) -> bool {
        matches!(
            (self, transition),
            (CountEdge::Press, Transition::Pressed) | (CountEdge::Release, Transition::Released)
        )
    }
}

/// Tunables for a [`DebounceMachine`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebounceConfig {
    window: Duration,
    polarity: LinePolarity,
    count_edge: CountEdge,
}

impl DebounceConfig {
    /// Creates a configuration with the provided window, active-high polarity,
    /// and counting on release.
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            polarity: LinePolarity::ActiveHigh,
            count_edge: CountEdge::Release,
        }
    }

    /// Overrides the line polarity.
    #[must_use]
    pub const fn with_polarity(mut self, polarity: LinePolarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Overrides the counted edge.
    #[must_use]
    pub const fn with_count_edge(mut self, count_edge: CountEdge) -> Self {
        self.count_edge = count_edge;
        self
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    pub const fn polarity(&self) -> LinePolarity {
        self.polarity
    }

    pub const fn count_edge(&self) -> CountEdge {
        self.count_edge
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}

/// Observable debounce state for one line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebounceState {
    pub raw_level: bool,
    pub stable_level: bool,
    pub pending_timer: Option<TimerHandle>,
}

impl DebounceState {
    /// Idle state resting at `level`.
    pub const fn resting(level: bool) -> Self {
        Self {
            raw_level: level,
            stable_level: level,
            pending_timer: None,
        }
    }

    /// Returns `true` while a debounce window is in flight.
    pub const fn is_settling(&self) -> bool {
        self.pending_timer.is_some()
    }
}

/// Result of [`DebounceMachine::apply_edge`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeOutcome {
    /// Same level as the last raw sample; nothing changed.
    Ignored,
    /// Idle → Settling: lock acquired and timer armed.
    Started(TimerHandle),
    /// Settling → Settling: previous timer stopped and a new one armed.
    Restarted(TimerHandle),
}

/// Result of [`DebounceMachine::on_timer_expire`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExpiryOutcome {
    /// The handle was superseded or already handled.
    Stale,
    /// Settling → Idle.
    Settled {
        level: bool,
        transition: Option<Transition>,
        counted: bool,
    },
}

/// Debounce machine owning the timer and the sleep-inhibit lock.
pub struct DebounceMachine<'a, T, L> {
    config: DebounceConfig,
    state: DebounceState,
    timer: T,
    lock: PowerLock<L>,
    counters: &'a TelemetryCounters,
}

impl<'a, T: OneShotTimer, L: SleepInhibitLock> DebounceMachine<'a, T, L> {
    /// Creates an idle machine resting at the polarity's idle level.
    pub fn new(config: DebounceConfig, timer: T, lock: L, counters: &'a TelemetryCounters) -> Self {
        Self::with_resting_level(config, config.polarity().idle_level(), timer, lock, counters)
    }

    /// Creates an idle machine assuming the line rests at `level`.
    pub fn with_resting_level(
        config: DebounceConfig,
        level: bool,
        timer: T,
        lock: L,
        counters: &'a TelemetryCounters,
    ) -> Self {
        Self {
            config,
            state: DebounceState::resting(level),
            timer,
            lock: PowerLock::new(lock),
            counters,
        }
    }

    /// Feeds one raw edge sample. Called only from the processing task.
    pub fn apply_edge(&mut self, event: EdgeEvent) -> EdgeOutcome {
        if event.level == self.state.raw_level {
            return EdgeOutcome::Ignored;
        }

        self.state.raw_level = event.level;

        let restarted = match self.state.pending_timer.take() {
            Some(previous) => {
                self.timer.stop(previous);
                true
            }
            None => {
                self.lock.acquire();
                false
            }
        };

        let handle = self.timer.arm(self.config.window());
        self.state.pending_timer = Some(handle);
        self.check_invariant();

        if restarted {
            EdgeOutcome::Restarted(handle)
        } else {
            EdgeOutcome::Started(handle)
        }
    }

    /// Finalises the window armed as `handle`. Called from the timer service.
    pub fn on_timer_expire(&mut self, handle: TimerHandle) -> ExpiryOutcome {
        if self.state.pending_timer != Some(handle) {
            return ExpiryOutcome::Stale;
        }

        self.lock.release();
        let previous = self.state.stable_level;
        self.state.stable_level = self.state.raw_level;
        self.state.pending_timer = None;
        self.check_invariant();

        let level = self.state.stable_level;
        let transition = (previous != level).then(|| {
            if self.config.polarity().is_active(level) {
                Transition::Pressed
            } else {
                Transition::Released
            }
        });

        let counted = transition.is_some_and(|transition| self.config.count_edge().counts(transition));
        if counted {
            self.counters.record_press();
        }

        ExpiryOutcome::Settled {
            level,
            transition,
            counted,
        }
    }

    /// Last confirmed level.
    pub const fn stable_level(&self) -> bool {
        self.state.stable_level
    }

    /// Returns `true` when the confirmed level means pressed.
    pub const fn is_pressed(&self) -> bool {
        self.config.polarity().is_active(self.state.stable_level)
    }

    pub const fn state(&self) -> DebounceState {
        self.state
    }

    /// Returns `true` while the sleep-inhibit lock is held.
    pub const fn lock_held(&self) -> bool {
        self.lock.is_held()
    }

    /// Returns `true` when the pending timer and the lock agree.
    pub const fn invariant_holds(&self) -> bool {
        self.state.pending_timer.is_some() == self.lock.is_held()
    }

    fn check_invariant(&self) {
        if !self.invariant_holds() {
            halt(InvariantViolation::LockTimerDiverged {
                timer_pending: self.state.pending_timer.is_some(),
                lock_held: self.lock.is_held(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::NoopSleepInhibitLock;

    #[derive(Default)]
    struct StubTimer {
        last: Option<TimerHandle>,
        armed: Option<TimerHandle>,
        stops: u32,
    }

    impl OneShotTimer for StubTimer {
        fn arm(&mut self, _: Duration) -> TimerHandle {
            let handle = self.last.map_or(TimerHandle::new(1), TimerHandle::next);
            self.last = Some(handle);
            self.armed = Some(handle);
            handle
        }

        fn stop(&mut self, handle: TimerHandle) {
            if self.armed == Some(handle) {
                self.armed = None;
            }
            self.stops += 1;
        }
    }

    fn machine(counters: &TelemetryCounters) -> DebounceMachine<'_, StubTimer, NoopSleepInhibitLock> {
        DebounceMachine::new(
            DebounceConfig::default(),
            StubTimer::default(),
            NoopSleepInhibitLock::new(),
            counters,
        )
    }

    #[test]
    fn starts_idle_at_polarity_rest_level() {
        let counters = TelemetryCounters::new();
        let idle_high = DebounceMachine::new(
            DebounceConfig::default().with_polarity(LinePolarity::ActiveLow),
            StubTimer::default(),
            NoopSleepInhibitLock::new(),
            &counters,
        );
        assert!(idle_high.stable_level());
        assert!(!idle_high.is_pressed());
        assert!(!machine(&counters).stable_level());
    }

    #[test]
    #[should_panic(expected = "debounce timer pending=true but sleep inhibit lock held=false")]
    fn timer_without_lock_halts() {
        let counters = TelemetryCounters::new();
        let mut debouncer = machine(&counters);
        assert!(debouncer.invariant_holds());

        debouncer.state.pending_timer = Some(TimerHandle::new(9));
        assert!(!debouncer.invariant_holds());
        debouncer.check_invariant();
    }

    #[test]
    #[should_panic(expected = "debounce timer pending=false but sleep inhibit lock held=true")]
    fn lock_without_timer_halts() {
        let counters = TelemetryCounters::new();
        let mut debouncer = machine(&counters);
        debouncer.apply_edge(EdgeEvent::interrupt(true));
        assert!(debouncer.invariant_holds());

        debouncer.state.pending_timer = None;
        debouncer.check_invariant();
    }

    #[test]
    fn same_level_edge_while_idle_is_ignored() {
        let counters = TelemetryCounters::new();
        let mut debouncer = machine(&counters);

        assert_eq!(debouncer.apply_edge(EdgeEvent::interrupt(false)), EdgeOutcome::Ignored);
        assert!(!debouncer.lock_held());
        assert!(debouncer.timer.last.is_none());
    }

    #[test]
    fn first_edge_takes_lock_then_arms() {
        let counters = TelemetryCounters::new();
        let mut debouncer = machine(&counters);

        let outcome = debouncer.apply_edge(EdgeEvent::interrupt(true));
        assert_eq!(outcome, EdgeOutcome::Started(TimerHandle::new(1)));
        assert!(debouncer.lock_held());
        assert_eq!(debouncer.state().pending_timer, Some(TimerHandle::new(1)));
        assert!(debouncer.invariant_holds());
    }

    #[test]
    fn bounce_restarts_timer_and_keeps_lock() {
        let counters = TelemetryCounters::new();
        let mut debouncer = machine(&counters);

        debouncer.apply_edge(EdgeEvent::interrupt(true));
        let outcome = debouncer.apply_edge(EdgeEvent::interrupt(false));

        assert_eq!(outcome, EdgeOutcome::Restarted(TimerHandle::new(2)));
        assert_eq!(debouncer.timer.stops, 1);
        assert!(debouncer.lock_held());
    }

    #[test]
    fn expiry_of_superseded_handle_is_stale() {
        let counters = TelemetryCounters::new();
        let mut debouncer = machine(&counters);

        debouncer.apply_edge(EdgeEvent::interrupt(true));
        debouncer.apply_edge(EdgeEvent::interrupt(false));
        debouncer.apply_edge(EdgeEvent::interrupt(true));

        assert_eq!(debouncer.on_timer_expire(TimerHandle::new(1)), ExpiryOutcome::Stale);
        assert!(debouncer.lock_held());
        assert!(debouncer.invariant_holds());

        let settled = debouncer.on_timer_expire(TimerHandle::new(3));
        assert_eq!(
            settled,
            ExpiryOutcome::Settled {
                level: true,
                transition: Some(Transition::Pressed),
                counted: false,
            }
        );
        assert!(!debouncer.lock_held());
    }

    #[test]
    fn expiry_while_idle_is_stale() {
        let counters = TelemetryCounters::new();
        let mut debouncer = machine(&counters);
        assert_eq!(debouncer.on_timer_expire(TimerHandle::new(7)), ExpiryOutcome::Stale);
        assert!(!debouncer.lock_held());
    }

    #[test]
    fn bounce_back_to_stable_level_settles_without_transition() {
        let counters = TelemetryCounters::new();
        let mut debouncer = machine(&counters);

        debouncer.apply_edge(EdgeEvent::interrupt(true));
        let EdgeOutcome::Restarted(handle) = debouncer.apply_edge(EdgeEvent::interrupt(false))
        else {
            panic!("expected restart");
        };

        assert_eq!(
            debouncer.on_timer_expire(handle),
            ExpiryOutcome::Settled {
                level: false,
                transition: None,
                counted: false,
            }
        );
        assert_eq!(counters.peek().confirmed_presses, 0);
    }

    #[test]
    fn count_edge_selects_exactly_one_edge() {
        assert!(CountEdge::Release.counts(Transition::Released));
        assert!(!CountEdge::Release.counts(Transition::Pressed));
        assert!(CountEdge::Press.counts(Transition::Pressed));
        assert!(!CountEdge::Press.counts(Transition::Released));
    }

    #[test]
    fn active_low_line_counts_release_on_rising_edge() {
        let counters = TelemetryCounters::new();
        let mut debouncer = DebounceMachine::new(
            DebounceConfig::default().with_polarity(LinePolarity::ActiveLow),
            StubTimer::default(),
            NoopSleepInhibitLock::new(),
            &counters,
        );

        let EdgeOutcome::Started(press) = debouncer.apply_edge(EdgeEvent::interrupt(false)) else {
            panic!("expected start");
        };
        debouncer.on_timer_expire(press);
        assert!(debouncer.is_pressed());

        let EdgeOutcome::Started(release) = debouncer.apply_edge(EdgeEvent::interrupt(true)) else {
            panic!("expected start");
        };
        let outcome = debouncer.on_timer_expire(release);

        assert_eq!(
            outcome,
            ExpiryOutcome::Settled {
                level: true,
                transition: Some(Transition::Released),
                counted: true,
            }
        );
        assert_eq!(counters.peek().confirmed_presses, 1);
    }
}
