//! Telemetry shared by the interrupt, timer, and task contexts.
//!
//! Two pieces live here. [`TelemetryCounters`] are independent atomics that
//! any context may bump and that a reporting collaborator drains with an
//! exchange-with-zero, so a sample is never counted in two windows and never
//! lost between two drains. [`TelemetryRecorder`] is a fixed-capacity history
//! of recent debounce events owned by a single context, mirrored to logs and
//! the emulator's `history` command.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};
use portable_atomic::{AtomicU32, AtomicU64, Ordering};

use crate::debounce::{EdgeOutcome, ExpiryOutcome, Transition};
use crate::edge::EdgeSource;

/// Identifier attached to each recorded event.
pub type EventId = u32;

/// Lock-free counters drained by the periodic reporter.
///
/// Fields are updated independently; a reader may observe a sleep duration
/// from one window next to a cycle count that already includes the next.
#[derive(Debug)]
pub struct TelemetryCounters {
    confirmed_presses: AtomicU32,
    sleep_duration_us: AtomicU64,
    sleep_cycles: AtomicU32,
    dropped_edges: AtomicU32,
}

impl TelemetryCounters {
    /// Creates zeroed counters, usable in a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            confirmed_presses: AtomicU32::new(0),
            sleep_duration_us: AtomicU64::new(0),
            sleep_cycles: AtomicU32::new(0),
            dropped_edges: AtomicU32::new(0),
        }
    }

    /// Counts one confirmed actuation.
    pub fn record_press(&self) {
        self.confirmed_presses.fetch_add(1, Ordering::Relaxed);
    }

    /// Accumulates one light-sleep interval.
    pub fn record_sleep(&self, slept: Duration) {
        let micros = u64::try_from(slept.as_micros()).unwrap_or(u64::MAX);
        self.sleep_duration_us.fetch_add(micros, Ordering::Relaxed);
        self.sleep_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an edge the channel had no room for.
    pub fn record_dropped_edge(&self) {
        self.dropped_edges.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads the counters without resetting them.
    #[must_use]
    pub fn peek(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            confirmed_presses: self.confirmed_presses.load(Ordering::Relaxed),
            sleep_duration_us: self.sleep_duration_us.load(Ordering::Relaxed),
            sleep_cycles: self.sleep_cycles.load(Ordering::Relaxed),
            dropped_edges: self.dropped_edges.load(Ordering::Relaxed),
        }
    }

    /// Atomically reads and zeroes every counter.
    pub fn drain(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            confirmed_presses: self.confirmed_presses.swap(0, Ordering::Relaxed),
            sleep_duration_us: self.sleep_duration_us.swap(0, Ordering::Relaxed),
            sleep_cycles: self.sleep_cycles.swap(0, Ordering::Relaxed),
            dropped_edges: self.dropped_edges.swap(0, Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Values captured by [`TelemetryCounters::drain`] or [`TelemetryCounters::peek`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TelemetrySnapshot {
    pub confirmed_presses: u32,
    pub sleep_duration_us: u64,
    pub sleep_cycles: u32,
    pub dropped_edges: u32,
}

impl TelemetrySnapshot {
    /// Total time spent in light sleep during the window.
    #[must_use]
    pub const fn sleep_duration(&self) -> Duration {
        Duration::from_micros(self.sleep_duration_us)
    }

    /// Returns `true` when nothing happened during the window.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.confirmed_presses == 0
            && self.sleep_duration_us == 0
            && self.sleep_cycles == 0
            && self.dropped_edges == 0
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Counter: {}; slept {} us; cycles {}; dropped {}",
            self.confirmed_presses, self.sleep_duration_us, self.sleep_cycles, self.dropped_edges
        )
    }
}

/// Debounce events retained in the history ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    DebounceStarted(EdgeSource),
    DebounceRestarted(EdgeSource),
    EdgeIgnored(EdgeSource),
    Settled(bool),
    PressCounted(Transition),
    StaleExpiry,
    WakeSynthesized(bool),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::DebounceStarted(source) => write!(f, "debounce-started {source}"),
            TelemetryEventKind::DebounceRestarted(source) => {
                write!(f, "debounce-restarted {source}")
            }
            TelemetryEventKind::EdgeIgnored(source) => write!(f, "edge-ignored {source}"),
            TelemetryEventKind::Settled(level) => {
                write!(f, "settled {}", if *level { "high" } else { "low" })
            }
            TelemetryEventKind::PressCounted(transition) => write!(f, "press-counted {transition}"),
            TelemetryEventKind::StaleExpiry => f.write_str("stale-expiry"),
            TelemetryEventKind::WakeSynthesized(level) => {
                write!(f, "wake-synthesized {}", if *level { "high" } else { "low" })
            }
        }
    }
}

/// Total number of events retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// History entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
}

/// Records debounce events into a fixed-size ring.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    /// Creates a recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Iterates the history in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Most recent record, if any.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an arbitrary event.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });
        id
    }

    /// Records what `apply_edge` did with an event from `source`.
    pub fn record_edge(
        &mut self,
        source: EdgeSource,
        outcome: EdgeOutcome,
        timestamp: TInstant,
    ) -> EventId {
        let event = match outcome {
            EdgeOutcome::Ignored => TelemetryEventKind::EdgeIgnored(source),
            EdgeOutcome::Started(_) => TelemetryEventKind::DebounceStarted(source),
            EdgeOutcome::Restarted(_) => TelemetryEventKind::DebounceRestarted(source),
        };
        self.record(event, timestamp)
    }

    /// Records what `on_timer_expire` did; a counted press adds a second entry.
    pub fn record_expiry(&mut self, outcome: ExpiryOutcome, timestamp: TInstant) -> EventId {
        match outcome {
            ExpiryOutcome::Stale => self.record(TelemetryEventKind::StaleExpiry, timestamp),
            ExpiryOutcome::Settled {
                level,
                transition,
                counted,
            } => {
                let id = self.record(TelemetryEventKind::Settled(level), timestamp);
                match transition {
                    Some(transition) if counted => {
                        self.record(TelemetryEventKind::PressCounted(transition), timestamp)
                    }
                    _ => id,
                }
            }
        }
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerHandle;

    #[test]
    fn drain_resets_every_counter() {
        let counters = TelemetryCounters::new();
        counters.record_press();
        counters.record_press();
        counters.record_sleep(Duration::from_millis(3));
        counters.record_dropped_edge();

        let first = counters.drain();
        assert_eq!(first.confirmed_presses, 2);
        assert_eq!(first.sleep_duration_us, 3_000);
        assert_eq!(first.sleep_cycles, 1);
        assert_eq!(first.dropped_edges, 1);

        let second = counters.drain();
        assert!(second.is_empty());
    }

    #[test]
    fn peek_leaves_counters_untouched() {
        let counters = TelemetryCounters::new();
        counters.record_sleep(Duration::from_micros(750));

        assert_eq!(counters.peek().sleep_duration_us, 750);
        assert_eq!(counters.drain().sleep_duration_us, 750);
    }

    #[test]
    fn snapshot_renders_report_line() {
        let snapshot = TelemetrySnapshot {
            confirmed_presses: 4,
            sleep_duration_us: 981_250,
            sleep_cycles: 6,
            dropped_edges: 0,
        };
        let mut line = heapless::String::<64>::new();
        core::fmt::write(&mut line, format_args!("{snapshot}")).unwrap();
        assert_eq!(line.as_str(), "Counter: 4; slept 981250 us; cycles 6; dropped 0");
    }

    #[test]
    fn counted_expiry_records_two_entries() {
        let mut recorder = TelemetryRecorder::<u64, 8>::new();
        recorder.record_edge(
            EdgeSource::Interrupt,
            EdgeOutcome::Started(TimerHandle::new(1)),
            0,
        );
        let id = recorder.record_expiry(
            ExpiryOutcome::Settled {
                level: false,
                transition: Some(Transition::Released),
                counted: true,
            },
            200_000,
        );

        assert_eq!(id, 2);
        assert_eq!(recorder.len(), 3);
        let latest = recorder.latest().copied().unwrap();
        assert_eq!(
            latest.event,
            TelemetryEventKind::PressCounted(Transition::Released)
        );
        assert_eq!(latest.timestamp, 200_000);
    }

    #[test]
    fn ring_keeps_only_most_recent_events() {
        let mut recorder = TelemetryRecorder::<u64, 2>::new();
        recorder.record(TelemetryEventKind::EdgeIgnored(EdgeSource::Interrupt), 1);
        recorder.record(TelemetryEventKind::StaleExpiry, 2);
        recorder.record(TelemetryEventKind::WakeSynthesized(true), 3);

        let stamps: heapless::Vec<u64, 2> =
            recorder.oldest_first().map(|record| record.timestamp).collect();
        assert_eq!(stamps.as_slice(), &[2, 3]);
    }
}
