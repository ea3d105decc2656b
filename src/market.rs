//! Market configuration.
//!
//! A market is an immutable (base, quote) asset pair plus the risk knobs
//! that drive collateral health and liquidation auctions. Balances inside a
//! market's collateral accounts are ring-fenced from the Common ledger.

use crate::math::Fixed;
use crate::types::{AssetId, MarketId};
use serde::{Deserialize, Serialize};

/// Static market configuration. Base/quote are frozen at creation; the risk
/// rates may be retuned by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub base_asset: AssetId,
    pub quote_asset: AssetId,
    /// Collateral below `debts * liquidate_rate` marks the account liquidatable
    pub liquidate_rate: Fixed,
    /// Withdrawals must keep collateral at or above `debts * withdraw_rate`
    pub withdraw_rate: Fixed,
    /// Auction payout ratio at the starting block
    pub auction_ratio_start: Fixed,
    /// Payout ratio growth per block
    pub auction_ratio_per_block: Fixed,
    /// Ratio cap above parity once collateral no longer covers debt
    pub max_bad_debt_ratio: Fixed,
    /// Slice of each auction payout routed to the liquidation initiator
    pub initiator_reward_ratio: Fixed,
    pub borrow_enable: bool,
}

impl Market {
    pub fn new(id: MarketId, base_asset: AssetId, quote_asset: AssetId) -> Result<Self, MarketError> {
        let market = Self {
            id,
            base_asset,
            quote_asset,
            liquidate_rate: Fixed::percent(110),
            withdraw_rate: Fixed::percent(120),
            auction_ratio_start: Fixed::percent(50),
            auction_ratio_per_block: Fixed::percent(1),
            max_bad_debt_ratio: Fixed::percent(20),
            initiator_reward_ratio: Fixed::percent(1),
            borrow_enable: true,
        };
        market.validate()?;
        Ok(market)
    }

    /// Risk-parameter sanity. Called on creation and again after any admin
    /// retune so a bad update cannot land.
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.base_asset == self.quote_asset {
            return Err(MarketError::DuplicateBaseQuote(self.base_asset));
        }
        if self.liquidate_rate < Fixed::ONE || self.withdraw_rate <= self.liquidate_rate {
            return Err(MarketError::InvalidRiskRates {
                id: self.id,
                liquidate_rate: self.liquidate_rate,
                withdraw_rate: self.withdraw_rate,
            });
        }
        if self.auction_ratio_start > Fixed::ONE {
            return Err(MarketError::InvalidAuctionRatio(self.id));
        }
        if self.initiator_reward_ratio >= Fixed::ONE {
            return Err(MarketError::InvalidAuctionRatio(self.id));
        }
        Ok(())
    }

    pub fn has_asset(&self, asset: AssetId) -> bool {
        self.base_asset == asset || self.quote_asset == asset
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("base and quote are both {0}")]
    DuplicateBaseQuote(AssetId),

    #[error("market for this asset pair already exists")]
    AlreadyExists,

    #[error("{0} not registered")]
    NotFound(MarketId),

    #[error("borrowing is disabled in {0}")]
    BorrowDisabled(MarketId),

    #[error("{0}: base/quote pair is frozen after creation")]
    ImmutablePair(MarketId),

    #[error("{id}: liquidate rate {liquidate_rate} and withdraw rate {withdraw_rate} out of order")]
    InvalidRiskRates {
        id: MarketId,
        liquidate_rate: Fixed,
        withdraw_rate: Fixed,
    },

    #[error("{0}: auction ratio parameters out of range")]
    InvalidAuctionRatio(MarketId),
}
