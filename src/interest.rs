//! Interest rate models.
//!
//! A model is a pure function from pool utilization to an annualized borrow
//! rate. The pool does the accrual bookkeeping; models only answer "at this
//! utilization, what does borrowing cost per year".

use crate::math::{Fixed, MathError};

pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

pub trait InterestRateModel: std::fmt::Debug {
    /// Annualized borrow rate for a utilization ratio in [0, 1].
    /// Utilization above 1 is clamped; it cannot occur while the pool's
    /// supply >= borrow invariant holds.
    fn annual_rate(&self, utilization: Fixed) -> Result<Fixed, MathError>;
}

/// Dual-slope curve: gentle up to the optimal utilization, steep past it.
/// - below the kink: `base + (u / optimal) * slope1`
/// - above the kink: `base + slope1 + ((u - optimal) / (1 - optimal)) * slope2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoSlopeModel {
    pub base_rate: Fixed,
    pub optimal_utilization: Fixed,
    pub slope1: Fixed,
    pub slope2: Fixed,
}

impl Default for TwoSlopeModel {
    fn default() -> Self {
        Self {
            base_rate: Fixed::percent(2),
            optimal_utilization: Fixed::percent(80),
            slope1: Fixed::percent(10),
            slope2: Fixed::percent(100),
        }
    }
}

impl InterestRateModel for TwoSlopeModel {
    fn annual_rate(&self, utilization: Fixed) -> Result<Fixed, MathError> {
        let utilization = utilization.min(Fixed::ONE);

        if utilization <= self.optimal_utilization {
            let ratio = utilization.div_floor(self.optimal_utilization)?;
            let variable = ratio.mul_floor(self.slope1)?;
            self.base_rate.add(variable)
        } else {
            let excess = utilization.sub(self.optimal_utilization)?;
            let remaining = Fixed::ONE.sub(self.optimal_utilization)?;
            let ratio = excess.div_floor(remaining)?;
            let variable = ratio.mul_floor(self.slope2)?;
            self.base_rate.add(self.slope1)?.add(variable)
        }
    }
}

/// Constant rate regardless of utilization. Handy in tests where interest
/// growth must be predictable by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatModel(pub Fixed);

impl InterestRateModel for FlatModel {
    fn annual_rate(&self, _utilization: Fixed) -> Result<Fixed, MathError> {
        Ok(self.0)
    }
}
