// 3.2: Fee discounts
//
// Holding the protocol's discount token scales trading fee rates down. The
// table is configuration, checked once at construction; lookup is a walk
// over at most a handful of tiers.

use crate::math::Fixed;
use crate::types::AssetId;
use serde::{Deserialize, Serialize};

/// No tier may scale fees below this, however much token is held.
pub const MIN_FEE_MULTIPLIER: Fixed = Fixed::percent(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscountError {
    #[error("tier {0} does not increase the balance threshold")]
    UnsortedTiers(usize),

    #[error("tier {0} multiplier outside [minimum, 1]")]
    MultiplierOutOfRange(usize),

    #[error("tier {0} multiplier exceeds the previous tier's")]
    MultiplierNotMonotone(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    /// Discount-token balance needed to enter this tier
    pub min_balance: Fixed,
    /// Fee rates are multiplied by this. 1 means no discount.
    pub multiplier: Fixed,
}

/// Step table mapping discount-token holdings to a fee multiplier.
/// Thresholds ascend, multipliers descend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTable {
    token: AssetId,
    tiers: Vec<DiscountTier>,
}

impl DiscountTable {
    pub fn new(token: AssetId, tiers: Vec<DiscountTier>) -> Result<Self, DiscountError> {
        let mut previous: Option<&DiscountTier> = None;
        for (index, tier) in tiers.iter().enumerate() {
            if tier.multiplier > Fixed::ONE || tier.multiplier < MIN_FEE_MULTIPLIER {
                return Err(DiscountError::MultiplierOutOfRange(index));
            }
            if let Some(previous) = previous {
                if tier.min_balance <= previous.min_balance {
                    return Err(DiscountError::UnsortedTiers(index));
                }
                if tier.multiplier > previous.multiplier {
                    return Err(DiscountError::MultiplierNotMonotone(index));
                }
            }
            previous = Some(tier);
        }
        Ok(Self { token, tiers })
    }

    /// Table that never discounts.
    pub fn flat(token: AssetId) -> Self {
        Self {
            token,
            tiers: Vec::new(),
        }
    }

    /// The asset whose holdings earn the discount.
    pub fn token(&self) -> AssetId {
        self.token
    }

    /// Multiplier for a trader holding `balance` of the discount token.
    /// Below the first tier the answer is 1.
    pub fn multiplier_for(&self, balance: Fixed) -> Fixed {
        let mut multiplier = Fixed::ONE;
        for tier in &self.tiers {
            if balance < tier.min_balance {
                break;
            }
            multiplier = tier.multiplier;
        }
        multiplier
    }
}
