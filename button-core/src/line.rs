//! Access to the monitored input line.

/// Samples the raw level of the monitored line.
///
/// Implementations are called from interrupt context and from sleep-exit
/// hooks, so they must not block or allocate.
pub trait LineSampler {
    /// Returns `true` when the line currently reads high.
    fn read_level(&self) -> bool;
}

impl<T: LineSampler + ?Sized> LineSampler for &T {
    fn read_level(&self) -> bool {
        (**self).read_level()
    }
}
