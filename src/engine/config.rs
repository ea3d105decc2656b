//! Engine tuning knobs, fixed at construction.

use crate::asset::DEFAULT_INSURANCE_RATIO;
use crate::math::Fixed;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on the in-memory event log; the oldest entries fall off first.
    pub max_events: usize,
    /// Print every event as it is emitted.
    pub verbose: bool,
    /// Share of accrued interest routed to each pool's insurance balance.
    pub insurance_ratio: Fixed,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
            insurance_ratio: DEFAULT_INSURANCE_RATIO,
        }
    }
}
