//! T-state counting.

/// A count of CPU T-states.
///
/// One T-state is one tick of the 3.5 MHz Z80 clock; every duration in
/// the core is expressed in them. The wrapper keeps counter readings
/// from mixing freely with raw integers; intervals are taken with
/// [`Ticks::since`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(u64);

impl Ticks {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Interval between this counter reading and an `earlier` one.
    /// Readings compared out of order clamp to zero; the counter itself
    /// never rewinds.
    #[must_use]
    pub const fn since(self, earlier: Self) -> Self {
        Self(self.0.saturating_sub(earlier.0))
    }
}
