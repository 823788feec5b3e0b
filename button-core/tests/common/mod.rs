#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use std::vec::Vec;

use button_core::debounce::{
    DebounceConfig, DebounceMachine, EdgeOutcome, ExpiryOutcome, SharedDebouncer,
};
use button_core::edge::{EdgeChannel, EdgeEvent};
use button_core::line::LineSampler;
use button_core::power::SleepInhibitLock;
use button_core::telemetry::TelemetryCounters;
use button_core::timer::{OneShotTimer, TimerHandle};
use button_core::wake::{SleepExit, WakeCause, WakeDispatcher, WakeOutcome};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

/// Virtual microsecond clock shared by the fakes.
#[derive(Default)]
pub struct Clock {
    now_us: Cell<u64>,
}

impl Clock {
    pub fn now_ms(&self) -> u64 {
        self.now_us.get() / 1_000
    }

    pub fn now_us(&self) -> u64 {
        self.now_us.get()
    }

    fn set(&self, micros: u64) {
        self.now_us.set(micros);
    }
}

#[derive(Default)]
pub struct TimerLog {
    pub last: Option<TimerHandle>,
    pub armed: Option<(TimerHandle, u64)>,
    pub arms: u32,
    pub stops: u32,
    pub stale_stops: u32,
}

pub struct VirtualTimer {
    clock: Rc<Clock>,
    log: Rc<RefCell<TimerLog>>,
}

impl OneShotTimer for VirtualTimer {
    fn arm(&mut self, after: Duration) -> TimerHandle {
        let mut log = self.log.borrow_mut();
        let handle = log.last.map_or(TimerHandle::new(1), TimerHandle::next);
        let deadline = self.clock.now_us() + u64::try_from(after.as_micros()).unwrap();
        log.last = Some(handle);
        log.armed = Some((handle, deadline));
        log.arms += 1;
        handle
    }

    fn stop(&mut self, handle: TimerHandle) {
        let mut log = self.log.borrow_mut();
        log.stops += 1;
        match log.armed {
            Some((armed, _)) if armed == handle => log.armed = None,
            _ => log.stale_stops += 1,
        }
    }
}

#[derive(Default)]
pub struct LockLog {
    pub held: bool,
    pub acquired_at_ms: Vec<u64>,
    pub released_at_ms: Vec<u64>,
}

pub struct RecordingLock {
    clock: Rc<Clock>,
    log: Rc<RefCell<LockLog>>,
}

impl SleepInhibitLock for RecordingLock {
    type Error = &'static str;

    fn acquire(&mut self) -> Result<(), Self::Error> {
        let mut log = self.log.borrow_mut();
        if log.held {
            return Err("already held");
        }
        log.held = true;
        log.acquired_at_ms.push(self.clock.now_ms());
        Ok(())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        let mut log = self.log.borrow_mut();
        if !log.held {
            return Err("not held");
        }
        log.held = false;
        log.released_at_ms.push(self.clock.now_ms());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct SimLine(Rc<Cell<bool>>);

impl SimLine {
    pub fn set(&self, level: bool) {
        self.0.set(level);
    }
}

impl LineSampler for SimLine {
    fn read_level(&self) -> bool {
        self.0.get()
    }
}

pub type BenchDebouncer<'a> = SharedDebouncer<'a, NoopRawMutex, VirtualTimer, RecordingLock>;

/// Drives the core with virtual time, playing the roles of the interrupt
/// handler, the timer service, the processing task, and the sleep manager.
pub struct Bench<'a> {
    pub clock: Rc<Clock>,
    pub timer: Rc<RefCell<TimerLog>>,
    pub lock: Rc<RefCell<LockLog>>,
    pub line: SimLine,
    pub counters: &'a TelemetryCounters,
    pub channel: &'a EdgeChannel<'a, NoopRawMutex>,
    pub debouncer: BenchDebouncer<'a>,
    pub edges: Vec<(u64, EdgeEvent, EdgeOutcome)>,
    pub expiries: Vec<(u64, ExpiryOutcome)>,
}

impl<'a> Bench<'a> {
    pub fn new(
        counters: &'a TelemetryCounters,
        channel: &'a EdgeChannel<'a, NoopRawMutex>,
        config: DebounceConfig,
    ) -> Self {
        let clock = Rc::new(Clock::default());
        let timer = Rc::new(RefCell::new(TimerLog::default()));
        let lock = Rc::new(RefCell::new(LockLog::default()));
        let line = SimLine::default();
        line.set(config.polarity().idle_level());

        let machine = DebounceMachine::new(
            config,
            VirtualTimer {
                clock: clock.clone(),
                log: timer.clone(),
            },
            RecordingLock {
                clock: clock.clone(),
                log: lock.clone(),
            },
            counters,
        );

        Self {
            clock,
            timer,
            lock,
            line,
            counters,
            channel,
            debouncer: SharedDebouncer::new(machine),
            edges: Vec::new(),
            expiries: Vec::new(),
        }
    }

    /// Physical edge: the line changes and the interrupt queues a sample.
    pub fn edge(&mut self, level: bool) {
        self.line.set(level);
        self.channel.try_send(EdgeEvent::interrupt(level));
        self.pump();
    }

    /// Lets the processing task drain the channel.
    pub fn pump(&mut self) {
        while let Some(event) = self.channel.try_receive() {
            let outcome = self.debouncer.apply_edge(event);
            self.edges.push((self.clock.now_ms(), event, outcome));
            self.assert_invariant();
        }
    }

    /// Advances virtual time, firing the timer when its deadline passes.
    pub fn advance(&mut self, by: Duration) {
        let target = self.clock.now_us() + u64::try_from(by.as_micros()).unwrap();
        loop {
            let armed = self.timer.borrow().armed;
            match armed {
                Some((handle, deadline)) if deadline <= target => {
                    self.clock.set(deadline);
                    self.timer.borrow_mut().armed = None;
                    let outcome = self.debouncer.on_timer_expire(handle);
                    self.expiries.push((self.clock.now_ms(), outcome));
                    self.assert_invariant();
                }
                _ => break,
            }
        }
        self.clock.set(target);
    }

    pub fn advance_ms(&mut self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Idle light sleep that ends when the line changes to `level` after `slept`.
    pub fn sleep_until_line(&mut self, slept: Duration, level: bool) -> WakeOutcome {
        assert!(
            !self.debouncer.lock_held(),
            "platform must not sleep while the inhibit lock is held"
        );
        let dispatcher = WakeDispatcher::new(self.line.clone(), self.channel, self.counters);
        dispatcher.on_sleep_enter(None);
        self.advance(slept);
        self.line.set(level);
        dispatcher.on_sleep_exit(SleepExit::new(slept, WakeCause::ExternalLine))
    }

    /// Idle light sleep ended by a timer wake-up.
    pub fn sleep_until_timer(&mut self, slept: Duration) -> WakeOutcome {
        assert!(!self.debouncer.lock_held());
        let dispatcher = WakeDispatcher::new(self.line.clone(), self.channel, self.counters);
        dispatcher.on_sleep_enter(Some(slept));
        self.advance(slept);
        dispatcher.on_sleep_exit(SleepExit::new(slept, WakeCause::Timer))
    }

    pub fn stable_level(&self) -> bool {
        self.debouncer.stable_level()
    }

    pub fn settled(&self) -> Vec<(u64, bool)> {
        self.expiries
            .iter()
            .filter_map(|(at, outcome)| match outcome {
                ExpiryOutcome::Settled { level, .. } => Some((*at, *level)),
                ExpiryOutcome::Stale => None,
            })
            .collect()
    }

    pub fn assert_invariant(&self) {
        let state = self.debouncer.state();
        let held = self.lock.borrow().held;
        assert_eq!(
            state.pending_timer.is_some(),
            held,
            "pending timer and inhibit lock diverged at t={}ms",
            self.clock.now_ms()
        );
        assert_eq!(held, self.debouncer.lock_held());
    }
}
