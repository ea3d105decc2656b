//! Read-side queries. Queries that depend on debt bring interest current
//! first, so the numbers they return are the ones a mutation would see.

use super::core::Engine;
use super::results::{AuditReport, EngineError};
use crate::auction::AuctionError;
use crate::balances::BalancePath;
use crate::collateral::{AccountDetails, AccountStatus, HealthEvaluator};
use crate::lending::{PoolError, PoolRates};
use crate::math::Fixed;
use crate::oracle::OracleError;
use crate::types::{AssetId, AuctionId, MarketId, OrderHash, UserId};

impl Engine {
    /// Health snapshot of a collateral account.
    pub fn account_details(
        &mut self,
        user: UserId,
        market_id: MarketId,
    ) -> Result<AccountDetails, EngineError> {
        self.accrue_market_pools(market_id)?;
        let status = self.status(user, market_id);
        let market = self.market_ref(market_id)?;
        let evaluator = HealthEvaluator {
            market,
            assets: &self.assets,
            pools: &self.pools,
            oracle: &self.oracle,
            now: self.current_time,
        };
        Ok(evaluator.account_details(&self.ledger, user, status)?)
    }

    /// How much of `asset` could leave the collateral account right now.
    pub fn transferable_amount(
        &mut self,
        user: UserId,
        market_id: MarketId,
        asset_id: AssetId,
    ) -> Result<Fixed, EngineError> {
        self.accrue_market_pools(market_id)?;
        let market = self.market_ref(market_id)?;
        let evaluator = HealthEvaluator {
            market,
            assets: &self.assets,
            pools: &self.pools,
            oracle: &self.oracle,
            now: self.current_time,
        };
        Ok(evaluator.transferable_amount(&self.ledger, user, asset_id)?)
    }

    /// Accounts in this market worth liquidating at current prices. Accounts
    /// already under auction are not candidates.
    pub fn liquidation_candidates(
        &mut self,
        market_id: MarketId,
    ) -> Result<Vec<UserId>, EngineError> {
        self.accrue_market_pools(market_id)?;
        let (base, quote) = {
            let market = self.market_ref(market_id)?;
            (market.base_asset, market.quote_asset)
        };

        let mut users: Vec<UserId> = Vec::new();
        for asset_id in [base, quote] {
            let pool = self.pool_ref(asset_id)?;
            users.extend(
                pool.debtors()
                    .filter(|(_, market)| *market == market_id)
                    .map(|(user, _)| user),
            );
        }
        users.sort_unstable_by_key(|user| user.0);
        users.dedup();

        let market = self.market_ref(market_id)?;
        let evaluator = HealthEvaluator {
            market,
            assets: &self.assets,
            pools: &self.pools,
            oracle: &self.oracle,
            now: self.current_time,
        };
        let mut candidates = Vec::new();
        for user in users {
            if self.status(user, market_id) == AccountStatus::Liquidating {
                continue;
            }
            let details = evaluator.account_details(&self.ledger, user, AccountStatus::Normal)?;
            if details.liquidatable {
                candidates.push(user);
            }
        }
        Ok(candidates)
    }

    pub fn balance(&self, asset_id: AssetId, path: BalancePath) -> Fixed {
        self.ledger.balance_of(asset_id, path)
    }

    pub fn order_filled_amount(&self, hash: &OrderHash) -> Fixed {
        self.tracker.filled_amount(hash)
    }

    pub fn order_cancelled(&self, hash: &OrderHash) -> bool {
        self.tracker.is_cancelled(hash)
    }

    /// Last price a feed accepted, ignoring expiry. For reporting only.
    pub fn last_price(&self, asset_id: AssetId) -> Result<Fixed, EngineError> {
        let feed = self
            .oracle
            .feed(asset_id)
            .ok_or(OracleError::NoFeed(asset_id))?;
        Ok(feed.last_price())
    }

    /// Payout ratio an auction clears at on the current block.
    pub fn auction_ratio(&self, auction_id: AuctionId) -> Result<Fixed, EngineError> {
        let auction = self
            .auctions
            .get(&auction_id)
            .ok_or(AuctionError::NotFound(auction_id))?;
        Ok(auction.ratio(self.current_block)?)
    }

    /// Annualized rates at the pool's current utilization.
    pub fn pool_rates(&self, asset_id: AssetId) -> Result<PoolRates, EngineError> {
        let model = self
            .models
            .get(&asset_id)
            .ok_or(PoolError::NotFound(asset_id))?;
        let pool = self.pool_ref(asset_id)?;
        Ok(pool.rates(model.as_ref())?)
    }

    /// Custody reconciliation for one asset: everything the ledger and the
    /// pool hold must equal everything deposited less everything withdrawn.
    pub fn audit(&self, asset_id: AssetId) -> Result<AuditReport, EngineError> {
        let pool = self.pool_ref(asset_id)?;
        Ok(AuditReport {
            asset: asset_id,
            ledger_total: self.ledger.asset_total(asset_id)?,
            pool_cash: pool.cash(),
            lifetime_deposited: self.ledger.lifetime_deposited(asset_id),
            lifetime_withdrawn: self.ledger.lifetime_withdrawn(asset_id),
        })
    }
}
