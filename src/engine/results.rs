// 9.0.2: result types and errors for engine operations.

use crate::asset::AssetError;
use crate::auction::AuctionError;
use crate::balances::{BalancePath, LedgerError};
use crate::collateral::CollateralError;
use crate::custody::TransferError;
use crate::lending::PoolError;
use crate::market::MarketError;
use crate::matching::{FillRecord, MatchError};
use crate::math::{Fixed, MathError};
use crate::oracle::OracleError;
use crate::signature::SignatureError;
use crate::types::{AssetId, AuctionId, MarketId, OrderHash, UserId};

/// What one `match_orders` call settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub taker_hash: OrderHash,
    pub fills: Vec<FillRecord>,
}

/// What `liquidate_account` did: same-asset repayments plus the auction
/// opened for any residual debt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationOutcome {
    pub user: UserId,
    pub market: MarketId,
    pub repaid: Vec<(AssetId, Fixed)>,
    pub auction: Option<AuctionId>,
}

/// What one auction fill moved, including how any collateral shortfall was
/// absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionFillOutcome {
    pub auction: AuctionId,
    pub debt_filled: Fixed,
    pub ratio: Fixed,
    pub collateral_to_filler: Fixed,
    pub initiator_reward: Fixed,
    pub insurance_used: Fixed,
    pub socialized_loss: Fixed,
    /// Shortfall nobody absorbed; stays on record as unbacked
    pub unbacked_loss: Fixed,
    pub finished: bool,
}

/// Per-asset conservation check: everything custodied plus pool cash must
/// equal lifetime inflow minus lifetime outflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditReport {
    pub asset: AssetId,
    pub ledger_total: Fixed,
    pub pool_cash: Fixed,
    pub lifetime_deposited: Fixed,
    pub lifetime_withdrawn: Fixed,
}

impl AuditReport {
    pub fn balanced(&self) -> bool {
        let held = self.ledger_total.add(self.pool_cash).ok();
        let expected = self.lifetime_deposited.sub(self.lifetime_withdrawn).ok();
        held.is_some() && held == expected
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("collateral account for {user} in {market} is not liquidatable")]
    AccountNotLiquidatable { user: UserId, market: MarketId },

    #[error("operation would leave the collateral account for {user} in {market} liquidatable")]
    AccountLiquidatable { user: UserId, market: MarketId },

    #[error("{path} is frozen while its auction runs")]
    LiquidatingAccount { path: BalancePath },

    #[error("only {transferable} of {asset} may leave {path}, requested {requested}")]
    TransferableAmountNotEnough {
        path: BalancePath,
        asset: AssetId,
        requested: Fixed,
        transferable: Fixed,
    },

    #[error("{path} does not belong to {user}")]
    PathOwnerMismatch { user: UserId, path: BalancePath },

    #[error("order {hash} does not belong to {user}")]
    NotOrderOwner { hash: OrderHash, user: UserId },

    #[error("{asset} is not part of {market}")]
    AssetNotInMarket { asset: AssetId, market: MarketId },

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Collateral(#[from] CollateralError),

    #[error(transparent)]
    Auction(#[from] AuctionError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Math(#[from] MathError),
}
