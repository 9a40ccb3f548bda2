use std::num::NonZeroU32;

/// Counts compaction decisions so that a compact-all fires exactly once every `period` decisions.
///
/// `position` is where we are in the current cycle, `0..period`. The number of decisions left
/// before firing is `period - 1 - position`, so the decision made at `position == period - 1`
/// fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyCycleCounter {
    period: NonZeroU32,
    position: u32,
}

impl PolicyCycleCounter {
    pub fn new(period: NonZeroU32) -> Self {
        Self {
            period,
            position: 0,
        }
    }

    /// Rebuilds a counter from its persisted countdown `value`. Values that don't fit the period
    /// are clamped so the counter fires as soon as possible rather than never.
    pub(crate) fn from_value(period: NonZeroU32, value: u32) -> Self {
        let last = period.get() - 1;
        Self {
            period,
            position: last - value.min(last),
        }
    }

    pub fn period(&self) -> NonZeroU32 {
        self.period
    }

    /// Decisions left before the counter fires. Zero means the next decision fires.
    pub fn value(&self) -> u32 {
        self.period.get() - 1 - self.position
    }

    /// Decisions made so far in the current cycle.
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn should_fire_this_cycle(&self) -> bool {
        self.value() == 0
    }

    /// Moves on to the next decision, wrapping into a fresh cycle after the firing one.
    pub fn advance(&mut self) {
        self.position = (self.position + 1) % self.period.get();
    }

    /// Parks the counter on the firing position. The following `advance` starts a fresh cycle, so
    /// the next forced firing is a full period away.
    pub fn reset(&mut self) {
        self.position = self.period.get() - 1;
    }

    /// Adopts a new period, keeping the countdown where it can.
    pub fn with_period(self, period: NonZeroU32) -> Self {
        if period == self.period {
            return self;
        }
        Self::from_value(period, self.value())
    }
}
