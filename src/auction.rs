//! Liquidation auctions.
//!
//! An auction sells a liquidated account's remaining collateral for its
//! remaining debt. The payout ratio starts low and climbs every block, so
//! waiting is rewarded and the first acceptable price clears. The struct
//! here owns the arithmetic and the fill lifecycle; fund movement stays in
//! the engine.
//!
//! Risk parameters are copied from the market at creation time. A retuned
//! market never changes the terms of an auction already running.

use crate::math::{Fixed, MathError};
use crate::types::{AssetId, AuctionId, BlockNumber, MarketId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuctionError {
    #[error("{0} not found")]
    NotFound(AuctionId),

    #[error("{0} is already finished")]
    AlreadyFinished(AuctionId),

    #[error("fill amount must be positive")]
    EmptyFill,

    #[error(transparent)]
    Math(#[from] MathError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    /// Owner of the liquidated collateral account
    pub user: UserId,
    pub market: MarketId,
    /// Account that triggered the liquidation; earns the reward slice
    pub initiator: UserId,
    pub debt_asset: AssetId,
    pub collateral_asset: AssetId,
    pub initial_debt: Fixed,
    pub initial_collateral: Fixed,
    pub left_debt: Fixed,
    pub left_collateral: Fixed,
    pub start_block: BlockNumber,
    pub ratio_start: Fixed,
    pub ratio_per_block: Fixed,
    /// 1 + the market's max bad-debt ratio
    pub ratio_cap: Fixed,
    pub initiator_reward_ratio: Fixed,
    pub finished: bool,
}

/// What a fill will do, computed before anything moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillPlan {
    /// Debt actually repaid, capped at what is left
    pub usable: Fixed,
    pub ratio: Fixed,
    /// Collateral leaving the escrow in total
    pub collateral_out: Fixed,
    pub filler_collateral: Fixed,
    pub initiator_reward: Fixed,
    /// Filler compensation still owed, in debt-asset units, when the escrow
    /// could not cover the ratio-adjusted payout
    pub subsidy: Fixed,
}

impl Auction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AuctionId,
        user: UserId,
        market: MarketId,
        initiator: UserId,
        debt_asset: AssetId,
        collateral_asset: AssetId,
        debt_amount: Fixed,
        collateral_amount: Fixed,
        start_block: BlockNumber,
        ratio_start: Fixed,
        ratio_per_block: Fixed,
        max_bad_debt_ratio: Fixed,
        initiator_reward_ratio: Fixed,
    ) -> Result<Self, MathError> {
        Ok(Self {
            id,
            user,
            market,
            initiator,
            debt_asset,
            collateral_asset,
            initial_debt: debt_amount,
            initial_collateral: collateral_amount,
            left_debt: debt_amount,
            left_collateral: collateral_amount,
            start_block,
            ratio_start,
            ratio_per_block,
            ratio_cap: Fixed::ONE.add(max_bad_debt_ratio)?,
            initiator_reward_ratio,
            finished: false,
        })
    }

    /// Payout ratio at `block`: `ratio_start + ratio_per_block * elapsed`,
    /// capped once collateral would be paid out beyond the bad-debt limit.
    pub fn ratio(&self, block: BlockNumber) -> Result<Fixed, MathError> {
        let elapsed = Fixed::from_int(block.blocks_since(self.start_block));
        let climbed = self.ratio_start.add(self.ratio_per_block.mul_floor(elapsed)?)?;
        Ok(climbed.min(self.ratio_cap))
    }

    /// Price a prospective fill. Pure; prices come in, nothing moves.
    pub fn plan_fill(
        &self,
        debt_offered: Fixed,
        debt_price: Fixed,
        collateral_price: Fixed,
        block: BlockNumber,
    ) -> Result<FillPlan, AuctionError> {
        if self.finished || self.left_debt.is_zero() {
            return Err(AuctionError::AlreadyFinished(self.id));
        }
        if debt_offered.is_zero() {
            return Err(AuctionError::EmptyFill);
        }

        let usable = debt_offered.min(self.left_debt);
        let ratio = self.ratio(block)?;

        let payout_value = usable.mul_floor(debt_price)?.mul_floor(ratio)?;
        let wanted = payout_value.div_floor(collateral_price)?;
        let collateral_out = wanted.min(self.left_collateral);

        // escrow exhausted: the uncovered value comes back as a subsidy claim
        let subsidy = if wanted > collateral_out {
            wanted
                .sub(collateral_out)?
                .mul_floor(collateral_price)?
                .div_floor(debt_price)?
        } else {
            Fixed::ZERO
        };

        let initiator_reward = collateral_out.mul_floor(self.initiator_reward_ratio)?;
        let filler_collateral = collateral_out.sub(initiator_reward)?;

        Ok(FillPlan {
            usable,
            ratio,
            collateral_out,
            filler_collateral,
            initiator_reward,
            subsidy,
        })
    }

    /// Burn a planned fill into the auction. Finishing is irreversible.
    pub fn record_fill(&mut self, plan: &FillPlan) -> Result<(), AuctionError> {
        if self.finished {
            return Err(AuctionError::AlreadyFinished(self.id));
        }
        self.left_debt = self.left_debt.sub(plan.usable)?;
        self.left_collateral = self.left_collateral.sub(plan.collateral_out)?;
        if self.left_debt.is_zero() {
            self.finished = true;
        }
        Ok(())
    }
}
