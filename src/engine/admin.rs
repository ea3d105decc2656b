//! Registration and parameter administration.

use super::core::Engine;
use super::results::EngineError;
use crate::asset::{Asset, AssetError};
use crate::balances::BalancePath;
use crate::custody::TokenTransfer;
use crate::discount::DiscountTable;
use crate::events::{
    AssetRegisteredEvent, EventPayload, InsuranceFundedEvent, MarketCreatedEvent,
    PriceUpdatedEvent,
};
use crate::interest::InterestRateModel;
use crate::lending::LendingPool;
use crate::market::{Market, MarketError};
use crate::math::Fixed;
use crate::oracle::{FeedGuard, PriceFeed};
use crate::signature::SignatureVerifier;
use crate::types::{AssetId, MarketId, UserId};

impl Engine {
    /// Register an asset together with its price feed, interest model and
    /// lending pool. Everything else in the engine refuses unknown assets.
    pub fn register_asset(
        &mut self,
        asset: Asset,
        model: Box<dyn InterestRateModel>,
        initial_price: Fixed,
        guard: FeedGuard,
    ) -> Result<AssetId, EngineError> {
        let asset_id = asset.id;
        if self.assets.contains_key(&asset_id) {
            return Err(AssetError::AlreadyExists(asset_id).into());
        }

        let feed = PriceFeed::new(asset_id, initial_price, self.current_time, guard)?;
        let symbol = asset.symbol.clone();

        self.oracle.register(feed);
        self.pools.insert(
            asset_id,
            LendingPool::new(asset_id, self.config.insurance_ratio, self.current_time),
        );
        self.models.insert(asset_id, model);
        self.assets.insert(asset_id, asset);

        self.emit_event(EventPayload::AssetRegistered(AssetRegisteredEvent {
            asset: asset_id,
            symbol,
        }));

        Ok(asset_id)
    }

    /// Create a market over two registered assets. One market per asset pair.
    pub fn create_market(
        &mut self,
        market_id: MarketId,
        base_asset: AssetId,
        quote_asset: AssetId,
    ) -> Result<MarketId, EngineError> {
        for asset_id in [base_asset, quote_asset] {
            if !self.assets.contains_key(&asset_id) {
                return Err(AssetError::NotFound(asset_id).into());
            }
        }
        if self.markets.contains_key(&market_id) {
            return Err(MarketError::AlreadyExists.into());
        }
        let duplicate_pair = self
            .markets
            .values()
            .any(|market| market.base_asset == base_asset && market.quote_asset == quote_asset);
        if duplicate_pair {
            return Err(MarketError::AlreadyExists.into());
        }

        let market = Market::new(market_id, base_asset, quote_asset)?;
        self.markets.insert(market_id, market);

        self.emit_event(EventPayload::MarketCreated(MarketCreatedEvent {
            market: market_id,
            base_asset,
            quote_asset,
        }));

        Ok(market_id)
    }

    /// Retune a market's risk parameters. The asset pair is frozen; running
    /// auctions keep the parameters they copied at creation.
    pub fn update_market(&mut self, updated: Market) -> Result<(), EngineError> {
        let existing = self.market_ref(updated.id)?;
        if updated.base_asset != existing.base_asset || updated.quote_asset != existing.quote_asset
        {
            return Err(MarketError::ImmutablePair(updated.id).into());
        }
        updated.validate()?;
        self.markets.insert(updated.id, updated);
        Ok(())
    }

    /// Retune the valuation weight of a registered asset.
    pub fn set_collateral_rate(
        &mut self,
        asset_id: AssetId,
        collateral_rate: Fixed,
    ) -> Result<(), EngineError> {
        let asset = self
            .assets
            .get_mut(&asset_id)
            .ok_or(AssetError::NotFound(asset_id))?;
        asset.collateral_rate = collateral_rate;
        Ok(())
    }

    /// Install the fee-discount table. Its token must be a registered asset.
    pub fn set_discount_table(&mut self, table: DiscountTable) -> Result<(), EngineError> {
        if !self.assets.contains_key(&table.token()) {
            return Err(AssetError::NotFound(table.token()).into());
        }
        self.discount = table;
        Ok(())
    }

    pub fn set_verifier(&mut self, verifier: Box<dyn SignatureVerifier>) {
        self.verifier = verifier;
    }

    pub fn set_token_transfer(&mut self, custody: Box<dyn TokenTransfer>) {
        self.custody = custody;
    }

    /// Swap an asset's interest model. The pool accrues at the outgoing
    /// rate first, so elapsed time is never repriced.
    pub fn set_interest_model(
        &mut self,
        asset_id: AssetId,
        model: Box<dyn InterestRateModel>,
    ) -> Result<(), EngineError> {
        self.accrue_pool(asset_id)?;
        self.models.insert(asset_id, model);
        Ok(())
    }

    /// Push a price through the feed guard. A rejected update leaves the
    /// last valid price standing.
    pub fn set_price(&mut self, asset_id: AssetId, price: Fixed) -> Result<(), EngineError> {
        self.oracle.set_price(asset_id, price, self.current_time)?;
        self.emit_event(EventPayload::PriceUpdated(PriceUpdatedEvent {
            asset: asset_id,
            price,
        }));
        Ok(())
    }

    /// Move funds from a user's Common balance into a pool's insurance
    /// balance. Custody total is unchanged; the funds just change till.
    pub fn fund_insurance(
        &mut self,
        funder: UserId,
        asset_id: AssetId,
        amount: Fixed,
    ) -> Result<(), EngineError> {
        self.pool_ref(asset_id)?;
        self.ledger
            .debit(asset_id, BalancePath::common(funder), amount)?;
        let pool = self.pool_mut(asset_id)?;
        pool.fund_insurance(amount)?;
        let insurance_balance = pool.insurance_balance();

        self.emit_event(EventPayload::InsuranceFunded(InsuranceFundedEvent {
            asset: asset_id,
            funder,
            amount,
            insurance_balance,
        }));
        Ok(())
    }
}
