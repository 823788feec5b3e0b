//! Debounce history and logging helpers.
//!
//! The core returns an outcome value for every transition; this module turns
//! those outcomes into defmt lines on the target and stdout lines on the host,
//! and keeps the most recent ones in a shared [`TelemetryRecorder`] ring.

#![allow(dead_code)]

use core::cell::RefCell;

use button_core::debounce::{EdgeOutcome, ExpiryOutcome, Transition};
use button_core::edge::{EdgeEvent, EdgeSource};
use button_core::telemetry::{
    EventId, TELEMETRY_RING_CAPACITY, TelemetryEventKind, TelemetryRecorder, TelemetrySnapshot,
};
use button_core::wake::{WakeCause, WakeOutcome};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;

use crate::button::ButtonMutex;

/// Recorder keyed by Embassy's monotonic instant.
pub type FirmwareRecorder = TelemetryRecorder<Instant, TELEMETRY_RING_CAPACITY>;

/// Recorder shared by the processing task, the timer task, and the executor.
pub struct HistoryLog {
    inner: Mutex<ButtonMutex, RefCell<FirmwareRecorder>>,
}

impl HistoryLog {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(FirmwareRecorder::new())),
        }
    }

    pub fn record(&self, event: TelemetryEventKind, timestamp: Instant) -> EventId {
        self.inner
            .lock(|recorder| recorder.borrow_mut().record(event, timestamp))
    }

    pub fn record_edge(&self, event: EdgeEvent, outcome: EdgeOutcome, timestamp: Instant) -> EventId {
        self.inner.lock(|recorder| {
            recorder
                .borrow_mut()
                .record_edge(event.source, outcome, timestamp)
        })
    }

    pub fn record_expiry(&self, outcome: ExpiryOutcome, timestamp: Instant) -> EventId {
        self.inner
            .lock(|recorder| recorder.borrow_mut().record_expiry(outcome, timestamp))
    }

    pub fn len(&self) -> usize {
        self.inner.lock(|recorder| recorder.borrow().len())
    }

    /// Latest recorded event, if any.
    pub fn latest(&self) -> Option<TelemetryEventKind> {
        self.inner
            .lock(|recorder| recorder.borrow().latest().map(|record| record.event))
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_edge(event: EdgeEvent, outcome: EdgeOutcome) {
    let source = edge_source_label(event.source);
    let level = level_label(event.level);
    match outcome {
        EdgeOutcome::Ignored => emit_edge(source, level, "ignored", None),
        EdgeOutcome::Started(handle) => emit_edge(source, level, "started", Some(handle.generation())),
        EdgeOutcome::Restarted(handle) => {
            emit_edge(source, level, "restarted", Some(handle.generation()));
        }
    }
}

pub fn log_expiry(outcome: ExpiryOutcome) {
    match outcome {
        ExpiryOutcome::Stale => emit_stale(),
        ExpiryOutcome::Settled {
            level,
            transition,
            counted,
        } => emit_settled(level_label(level), transition.map(transition_label), counted),
    }
}

pub fn log_report(snapshot: TelemetrySnapshot) {
    emit_report(
        snapshot.confirmed_presses,
        snapshot.sleep_duration_us,
        snapshot.sleep_cycles,
        snapshot.dropped_edges,
    );
}

pub fn log_sleep_exit(cause: WakeCause, slept_us: u64, outcome: WakeOutcome) {
    if let WakeOutcome::Synthesized { level, queued } = outcome {
        emit_wake(wake_cause_label(cause), slept_us, Some((level_label(level), queued)));
    } else {
        emit_wake(wake_cause_label(cause), slept_us, None);
    }
}

#[cfg(target_os = "none")]
fn emit_edge(source: &'static str, level: &'static str, action: &'static str, timer: Option<u32>) {
    if let Some(generation) = timer {
        defmt::debug!("button:edge {} {} {} timer#{}", source, level, action, generation);
    } else {
        defmt::debug!("button:edge {} {} {}", source, level, action);
    }
}

#[cfg(not(target_os = "none"))]
fn emit_edge(source: &'static str, level: &'static str, action: &'static str, timer: Option<u32>) {
    if let Some(generation) = timer {
        println!("button:edge {source} {level} {action} timer#{generation}");
    } else {
        println!("button:edge {source} {level} {action}");
    }
}

#[cfg(target_os = "none")]
fn emit_stale() {
    defmt::debug!("button:expiry stale");
}

#[cfg(not(target_os = "none"))]
fn emit_stale() {
    println!("button:expiry stale");
}

#[cfg(target_os = "none")]
fn emit_settled(level: &'static str, transition: Option<&'static str>, counted: bool) {
    if let Some(transition) = transition {
        defmt::info!("button:settled {} {} counted={}", level, transition, counted);
    } else {
        defmt::info!("button:settled {} unchanged", level);
    }
}

#[cfg(not(target_os = "none"))]
fn emit_settled(level: &'static str, transition: Option<&'static str>, counted: bool) {
    if let Some(transition) = transition {
        println!("button:settled {level} {transition} counted={counted}");
    } else {
        println!("button:settled {level} unchanged");
    }
}

#[cfg(target_os = "none")]
fn emit_report(presses: u32, slept_us: u64, cycles: u32, dropped: u32) {
    defmt::info!(
        "Counter: {}; slept {} us; cycles {}; dropped {}",
        presses,
        slept_us,
        cycles,
        dropped
    );
}

#[cfg(not(target_os = "none"))]
fn emit_report(presses: u32, slept_us: u64, cycles: u32, dropped: u32) {
    println!("Counter: {presses}; slept {slept_us} us; cycles {cycles}; dropped {dropped}");
}

#[cfg(target_os = "none")]
fn emit_wake(cause: &'static str, slept_us: u64, edge: Option<(&'static str, bool)>) {
    match edge {
        Some((level, true)) => defmt::debug!("power:wake {} slept={}us edge={}", cause, slept_us, level),
        Some((level, false)) => {
            defmt::warn!("power:wake {} slept={}us edge={} dropped", cause, slept_us, level);
        }
        None => defmt::trace!("power:wake {} slept={}us", cause, slept_us),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_wake(cause: &'static str, slept_us: u64, edge: Option<(&'static str, bool)>) {
    match edge {
        Some((level, true)) => println!("power:wake {cause} slept={slept_us}us edge={level}"),
        Some((level, false)) => println!("power:wake {cause} slept={slept_us}us edge={level} dropped"),
        None => println!("power:wake {cause} slept={slept_us}us"),
    }
}

const fn level_label(level: bool) -> &'static str {
    if level { "high" } else { "low" }
}

const fn edge_source_label(source: EdgeSource) -> &'static str {
    match source {
        EdgeSource::Interrupt => "irq",
        EdgeSource::WakeSynthesized => "wake",
    }
}

const fn transition_label(transition: Transition) -> &'static str {
    match transition {
        Transition::Pressed => "pressed",
        Transition::Released => "released",
    }
}

const fn wake_cause_label(cause: WakeCause) -> &'static str {
    match cause {
        WakeCause::ExternalLine => "line",
        WakeCause::Timer => "timer",
    }
}
