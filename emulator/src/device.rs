//! Virtual-time model of the board.
//!
//! The real `button-core` machine runs against fake platform primitives: a
//! microsecond clock that only moves when asked, a one-shot timer keyed by
//! that clock, and a reference-counted sleep-inhibit lock. The model enters
//! light sleep whenever the edge queue is empty and nothing holds the lock,
//! and wakes on a line change or on the periodic report tick.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use button_core::debounce::{
    DebounceConfig, DebounceMachine, EdgeOutcome, ExpiryOutcome, SharedDebouncer,
};
use button_core::edge::{EDGE_QUEUE_DEPTH, EdgeChannel, EdgeEvent};
use button_core::line::LineSampler;
use button_core::power::SleepInhibitLock;
use button_core::telemetry::{
    TelemetryCounters, TelemetryEventKind, TelemetryRecorder, TelemetrySnapshot,
};
use button_core::timer::{OneShotTimer, TimerHandle};
use button_core::wake::{SleepExit, WakeCause, WakeDispatcher, WakeOutcome};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

/// Interval of the automatic counter report.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Edges in a `press` or `release` actuation, including the final one.
pub const ACTUATION_EDGES: u32 = 5;

/// Gap between chatter edges during an actuation.
pub const CHATTER_GAP: Duration = Duration::from_millis(3);

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

#[derive(Default)]
struct Clock {
    now_us: Cell<u64>,
}

impl Clock {
    fn now_us(&self) -> u64 {
        self.now_us.get()
    }

    fn set(&self, micros: u64) {
        self.now_us.set(micros);
    }
}

struct TimerState {
    last: TimerHandle,
    armed: Option<(TimerHandle, u64)>,
}

/// One-shot timer whose deadline is polled by [`Device::advance`].
pub struct SimTimer {
    clock: Rc<Clock>,
    state: Rc<RefCell<TimerState>>,
}

impl OneShotTimer for SimTimer {
    fn arm(&mut self, after: Duration) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let handle = state.last.next();
        state.last = handle;
        state.armed = Some((handle, self.clock.now_us().saturating_add(micros(after))));
        handle
    }

    fn stop(&mut self, handle: TimerHandle) {
        let mut state = self.state.borrow_mut();
        if matches!(state.armed, Some((armed, _)) if armed == handle) {
            state.armed = None;
        }
    }
}

/// Failure of the simulated reference count.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LockError {
    NotHeld,
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::NotHeld => f.write_str("sleep inhibit count already zero"),
        }
    }
}

/// Reference-counted sleep-inhibit lock.
pub struct SimLock {
    holders: Rc<Cell<u32>>,
}

impl SleepInhibitLock for SimLock {
    type Error = LockError;

    fn acquire(&mut self) -> Result<(), Self::Error> {
        self.holders.set(self.holders.get() + 1);
        Ok(())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        let holders = self.holders.get().checked_sub(1).ok_or(LockError::NotHeld)?;
        self.holders.set(holders);
        Ok(())
    }
}

/// Electrical level of the simulated button pin.
#[derive(Clone, Default)]
pub struct SimLine(Rc<Cell<bool>>);

impl SimLine {
    fn set(&self, level: bool) {
        self.0.set(level);
    }
}

impl LineSampler for SimLine {
    fn read_level(&self) -> bool {
        self.0.get()
    }
}

/// Something the device did, in the order it happened.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceEvent {
    Edge { event: EdgeEvent, outcome: EdgeOutcome },
    Expiry(ExpiryOutcome),
    Wake {
        cause: WakeCause,
        slept: Duration,
        outcome: WakeOutcome,
    },
    Report(TelemetrySnapshot),
}

/// Timestamped [`DeviceEvent`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Trace {
    pub at: Duration,
    pub event: DeviceEvent,
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", format_timestamp(self.at))?;
        match self.event {
            DeviceEvent::Edge { event, outcome } => {
                write!(f, "edge {} {} -> ", event.source, level_label(event.level))?;
                match outcome {
                    EdgeOutcome::Ignored => f.write_str("ignored"),
                    EdgeOutcome::Started(handle) => write!(f, "debounce started {handle}"),
                    EdgeOutcome::Restarted(handle) => write!(f, "debounce restarted {handle}"),
                }
            }
            DeviceEvent::Expiry(ExpiryOutcome::Stale) => f.write_str("timer expired (stale)"),
            DeviceEvent::Expiry(ExpiryOutcome::Settled {
                level,
                transition,
                counted,
            }) => {
                write!(f, "settled {}", level_label(level))?;
                if let Some(transition) = transition {
                    write!(f, " ({transition})")?;
                }
                if counted {
                    f.write_str(", press counted")?;
                }
                Ok(())
            }
            DeviceEvent::Wake {
                cause,
                slept,
                outcome,
            } => {
                write!(f, "wake {cause} after {}", format_duration(slept))?;
                match outcome {
                    WakeOutcome::NoEdge => Ok(()),
                    WakeOutcome::Synthesized { level, queued: true } => {
                        write!(f, ", synthesized {} edge", level_label(level))
                    }
                    WakeOutcome::Synthesized { level, queued: false } => {
                        write!(f, ", dropped synthesized {} edge", level_label(level))
                    }
                }
            }
            DeviceEvent::Report(snapshot) => write!(f, "{snapshot}"),
        }
    }
}

/// Point-in-time view for the `status` command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeviceStatus {
    pub now: Duration,
    pub line: bool,
    pub stable: bool,
    pub pending_timer: Option<TimerHandle>,
    pub lock_holders: u32,
    pub asleep: bool,
    pub queued_edges: usize,
    pub counters: TelemetrySnapshot,
}

impl DeviceStatus {
    pub fn lines(&self) -> Vec<String> {
        let debounce = match self.pending_timer {
            Some(handle) => format!("settling ({handle})"),
            None => "idle".to_string(),
        };
        vec![
            format!("time: {}", format_timestamp(self.now)),
            format!(
                "line: {} stable: {} debounce: {debounce}",
                level_label(self.line),
                level_label(self.stable)
            ),
            format!(
                "sleep-inhibit holders: {} power: {} queued edges: {}",
                self.lock_holders,
                if self.asleep { "light-sleep" } else { "awake" },
                self.queued_edges
            ),
            format!("pending {}", self.counters),
        ]
    }
}

type SimDebouncer<'a> = SharedDebouncer<'a, NoopRawMutex, SimTimer, SimLock>;
type SimDispatcher<'a> = WakeDispatcher<'a, SimLine, NoopRawMutex, EDGE_QUEUE_DEPTH>;

/// Simulated board running the debounce core.
pub struct Device<'a> {
    clock: Rc<Clock>,
    line: SimLine,
    timer: Rc<RefCell<TimerState>>,
    holders: Rc<Cell<u32>>,
    counters: &'a TelemetryCounters,
    edges: &'a EdgeChannel<'a, NoopRawMutex>,
    debouncer: SimDebouncer<'a>,
    dispatcher: SimDispatcher<'a>,
    config: DebounceConfig,
    recorder: TelemetryRecorder<Duration>,
    report_interval: Option<Duration>,
    next_report_us: Option<u64>,
    asleep_since: Option<u64>,
    traces: Vec<Trace>,
}

impl<'a> Device<'a> {
    /// Powers the board up at t=0 with the line resting at its idle level.
    pub fn new(
        counters: &'a TelemetryCounters,
        edges: &'a EdgeChannel<'a, NoopRawMutex>,
        config: DebounceConfig,
        report_interval: Option<Duration>,
    ) -> Self {
        let clock = Rc::new(Clock::default());
        let line = SimLine::default();
        line.set(config.polarity().idle_level());
        let timer = Rc::new(RefCell::new(TimerState {
            last: TimerHandle::new(0),
            armed: None,
        }));
        let holders = Rc::new(Cell::new(0));
        let report_interval = report_interval.filter(|interval| micros(*interval) > 0);

        let machine = DebounceMachine::new(
            config,
            SimTimer {
                clock: clock.clone(),
                state: timer.clone(),
            },
            SimLock {
                holders: holders.clone(),
            },
            counters,
        );

        let mut device = Self {
            clock,
            line: line.clone(),
            timer,
            holders,
            counters,
            edges,
            debouncer: SharedDebouncer::new(machine),
            dispatcher: WakeDispatcher::new(line, edges, counters),
            config,
            recorder: TelemetryRecorder::new(),
            report_interval,
            next_report_us: report_interval.map(micros),
            asleep_since: None,
            traces: Vec::new(),
        };
        device.enter_sleep_if_idle();
        device
    }

    pub fn now(&self) -> Duration {
        Duration::from_micros(self.clock.now_us())
    }

    pub fn line_level(&self) -> bool {
        self.line.read_level()
    }

    pub fn stable_level(&self) -> bool {
        self.debouncer.stable_level()
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep_since.is_some()
    }

    pub fn lock_holders(&self) -> u32 {
        self.holders.get()
    }

    /// Returns `true` when the machine's pending timer, its lock flag, and the
    /// platform reference count all agree.
    pub fn invariant_holds(&self) -> bool {
        let (pending, held) = self
            .debouncer
            .with(|machine| (machine.state().is_settling(), machine.lock_held()));
        pending == held && u32::from(held) == self.holders.get()
    }

    /// Drives the pin to `level`. A change raises the edge interrupt and,
    /// when the core is in light sleep, wakes it first.
    pub fn set_line(&mut self, level: bool) {
        if self.line.read_level() == level {
            return;
        }
        self.line.set(level);
        self.wake(WakeCause::ExternalLine);
        // The interrupt is still delivered after the sleep-exit hook.
        self.edges.try_send(EdgeEvent::interrupt(level));
        self.run_processing();
    }

    /// Toggles the line `count` times, `interval` apart.
    pub fn bounce(&mut self, count: u32, interval: Duration) {
        for index in 0..count {
            if index > 0 {
                self.advance(interval);
            }
            let level = !self.line.read_level();
            self.set_line(level);
        }
    }

    /// Chattering transition to the active level.
    pub fn press(&mut self) {
        let active = !self.config.polarity().idle_level();
        self.actuate(active);
    }

    /// Chattering transition back to the idle level.
    pub fn release(&mut self) {
        let idle = self.config.polarity().idle_level();
        self.actuate(idle);
    }

    fn actuate(&mut self, target: bool) {
        if self.line.read_level() == target {
            return;
        }
        self.bounce(ACTUATION_EDGES, CHATTER_GAP);
    }

    /// Advances virtual time, firing the debounce timer and the report tick
    /// at their deadlines.
    pub fn advance(&mut self, by: Duration) {
        let target = self.clock.now_us().saturating_add(micros(by));

        loop {
            let timer_due = self
                .timer
                .borrow()
                .armed
                .filter(|(_, deadline)| *deadline <= target);
            let report_due = self.next_report_us.filter(|deadline| *deadline <= target);

            match (timer_due, report_due) {
                (Some((_, deadline)), Some(at)) if at < deadline => {
                    self.clock.set(at);
                    self.report_tick();
                }
                (Some((handle, deadline)), _) => {
                    self.clock.set(deadline);
                    self.fire_timer(handle);
                }
                (None, Some(at)) => {
                    self.clock.set(at);
                    self.report_tick();
                }
                (None, None) => break,
            }
        }

        self.clock.set(target);
    }

    /// Drains the counters immediately.
    pub fn report(&mut self) -> TelemetrySnapshot {
        self.counters.drain()
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            now: self.now(),
            line: self.line.read_level(),
            stable: self.debouncer.stable_level(),
            pending_timer: self.debouncer.state().pending_timer,
            lock_holders: self.holders.get(),
            asleep: self.is_asleep(),
            queued_edges: self.edges.len(),
            counters: self.counters.peek(),
        }
    }

    /// Recent debounce history, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.recorder
            .oldest_first()
            .map(|record| {
                format!(
                    "#{:<4} [{}] {}",
                    record.id,
                    format_timestamp(record.timestamp),
                    record.event
                )
            })
            .collect()
    }

    /// Takes everything traced since the previous call.
    pub fn take_traces(&mut self) -> Vec<Trace> {
        std::mem::take(&mut self.traces)
    }

    fn fire_timer(&mut self, handle: TimerHandle) {
        self.timer.borrow_mut().armed = None;
        let outcome = self.debouncer.on_timer_expire(handle);
        self.recorder.record_expiry(outcome, self.now());
        self.trace(DeviceEvent::Expiry(outcome));
        self.enter_sleep_if_idle();
    }

    fn report_tick(&mut self) {
        self.wake(WakeCause::Timer);
        let snapshot = self.counters.drain();
        self.trace(DeviceEvent::Report(snapshot));
        // No further tick once the schedule runs past the end of the clock.
        self.next_report_us = self
            .report_interval
            .zip(self.next_report_us)
            .and_then(|(interval, at)| at.checked_add(micros(interval)));
        self.enter_sleep_if_idle();
    }

    fn run_processing(&mut self) {
        while let Some(event) = self.edges.try_receive() {
            let outcome = self.debouncer.apply_edge(event);
            self.recorder.record_edge(event.source, outcome, self.now());
            self.trace(DeviceEvent::Edge { event, outcome });
        }
        self.enter_sleep_if_idle();
    }

    fn wake(&mut self, cause: WakeCause) {
        let Some(since) = self.asleep_since.take() else {
            return;
        };
        let slept = Duration::from_micros(self.clock.now_us().saturating_sub(since));
        let outcome = self.dispatcher.on_sleep_exit(SleepExit::new(slept, cause));
        if let WakeOutcome::Synthesized { level, .. } = outcome {
            self.recorder
                .record(TelemetryEventKind::WakeSynthesized(level), self.now());
        }
        self.trace(DeviceEvent::Wake {
            cause,
            slept,
            outcome,
        });
    }

    fn enter_sleep_if_idle(&mut self) {
        if self.asleep_since.is_some() || self.holders.get() != 0 || !self.edges.is_empty() {
            return;
        }
        let now = self.clock.now_us();
        let time_to_sleep = self
            .next_report_us
            .map(|at| Duration::from_micros(at.saturating_sub(now)));
        self.dispatcher.on_sleep_enter(time_to_sleep);
        self.asleep_since = Some(now);
    }

    fn trace(&mut self, event: DeviceEvent) {
        self.traces.push(Trace {
            at: self.now(),
            event,
        });
    }
}

fn level_label(level: bool) -> &'static str {
    if level { "high" } else { "low" }
}

/// `12.345 ms` style timestamp with microsecond resolution.
pub fn format_timestamp(at: Duration) -> String {
    let micros = at.as_micros();
    format!("+{:>6}.{:03} ms", micros / 1_000, micros % 1_000)
}

pub fn format_duration(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        if duration.subsec_micros() % 1_000 == 0 {
            format!("{}ms", duration.as_millis())
        } else {
            format!("{}us", duration.as_micros())
        }
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
