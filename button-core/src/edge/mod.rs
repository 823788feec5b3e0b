//! Bounded hand-off queue from interrupt context to the processing task.
//!
//! The producer side never blocks and never allocates: a full queue drops the
//! sample and bumps [`TelemetryCounters::record_dropped_edge`]. Dropping a
//! bounce only delays confirmation, because the next real edge still arrives
//! or the line has already settled.

use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use crate::telemetry::TelemetryCounters;

/// Default queue depth; bounce storms on cheap switches stay under ten edges.
pub const EDGE_QUEUE_DEPTH: usize = 16;

/// Origin of an [`EdgeEvent`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeSource {
    /// Sampled by the edge interrupt handler.
    Interrupt,
    /// Synthesized by the sleep-exit hook after a line-triggered wake.
    WakeSynthesized,
}

impl fmt::Display for EdgeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeSource::Interrupt => f.write_str("irq"),
            EdgeSource::WakeSynthesized => f.write_str("wake"),
        }
    }
}

/// Raw level sample travelling through the channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EdgeEvent {
    pub level: bool,
    pub source: EdgeSource,
}

impl EdgeEvent {
    pub const fn new(level: bool, source: EdgeSource) -> Self {
        Self { level, source }
    }

    /// Sample taken by the interrupt handler.
    pub const fn interrupt(level: bool) -> Self {
        Self::new(level, EdgeSource::Interrupt)
    }

    /// Sample synthesized on wake.
    pub const fn wake(level: bool) -> Self {
        Self::new(level, EdgeSource::WakeSynthesized)
    }
}

/// FIFO of [`EdgeEvent`]s shared between interrupt and task contexts.
///
/// `M` must be interrupt-safe (`CriticalSectionRawMutex`) whenever the
/// producer runs in an interrupt handler.
pub struct EdgeChannel<'a, M: RawMutex, const N: usize = EDGE_QUEUE_DEPTH> {
    channel: Channel<M, EdgeEvent, N>,
    counters: &'a TelemetryCounters,
}

impl<'a, M: RawMutex, const N: usize> EdgeChannel<'a, M, N> {
    /// Creates an empty channel reporting drops into `counters`.
    pub const fn new(counters: &'a TelemetryCounters) -> Self {
        Self {
            channel: Channel::new(),
            counters,
        }
    }

    /// Queues `event` without blocking. Returns `false` when it was dropped.
    pub fn try_send(&self, event: EdgeEvent) -> bool {
        if self.channel.try_send(event).is_ok() {
            true
        } else {
            self.counters.record_dropped_edge();
            false
        }
    }

    /// Waits for the next event. Only the processing task calls this.
    pub async fn receive(&self) -> EdgeEvent {
        self.channel.receive().await
    }

    /// Pops the next event if one is queued.
    pub fn try_receive(&self) -> Option<EdgeEvent> {
        self.channel.try_receive().ok()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Queue capacity.
    pub const fn capacity(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn delivers_events_in_send_order() {
        let counters = TelemetryCounters::new();
        let channel: EdgeChannel<'_, NoopRawMutex, 4> = EdgeChannel::new(&counters);

        assert!(channel.try_send(EdgeEvent::interrupt(true)));
        assert!(channel.try_send(EdgeEvent::interrupt(false)));
        assert!(channel.try_send(EdgeEvent::wake(true)));

        assert_eq!(channel.try_receive(), Some(EdgeEvent::interrupt(true)));
        assert_eq!(channel.try_receive(), Some(EdgeEvent::interrupt(false)));
        assert_eq!(
            embassy_futures::block_on(channel.receive()),
            EdgeEvent::wake(true)
        );
        assert!(channel.is_empty());
    }

    #[test]
    fn full_channel_drops_silently_and_counts() {
        let counters = TelemetryCounters::new();
        let channel: EdgeChannel<'_, NoopRawMutex, 2> = EdgeChannel::new(&counters);

        assert!(channel.try_send(EdgeEvent::interrupt(true)));
        assert!(channel.try_send(EdgeEvent::interrupt(false)));
        assert!(!channel.try_send(EdgeEvent::interrupt(true)));
        assert!(!channel.try_send(EdgeEvent::interrupt(false)));

        assert_eq!(channel.len(), 2);
        assert_eq!(counters.peek().dropped_edges, 2);
        assert_eq!(channel.try_receive(), Some(EdgeEvent::interrupt(true)));
    }

    #[test]
    fn default_depth_absorbs_a_bounce_storm() {
        let counters = TelemetryCounters::new();
        let channel: EdgeChannel<'_, NoopRawMutex> = EdgeChannel::new(&counters);

        for index in 0..10 {
            assert!(channel.try_send(EdgeEvent::interrupt(index % 2 == 0)));
        }
        assert_eq!(counters.peek().dropped_edges, 0);
        assert!(channel.capacity() >= 10);
    }
}
