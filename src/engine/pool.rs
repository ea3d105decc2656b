//! Lending pool operations: supply, redemption, borrowing and repayment.
//!
//! Every operation accrues the touched pools to the engine clock first, so
//! share prices and debts are current at the moment they are read. Supplied
//! funds move from the Common balance into pool cash; borrowed funds land
//! on the borrower's collateral account for the market securing the loan.

use super::core::Engine;
use super::results::EngineError;
use crate::balances::{BalancePath, StagedBalances};
use crate::collateral::{AccountStatus, HealthEvaluator};
use crate::events::{
    BorrowedEvent, EventPayload, InterestAccruedEvent, RepaidEvent, SuppliedEvent,
    UnsuppliedEvent,
};
use crate::lending::{Accrual, PoolError};
use crate::market::MarketError;
use crate::math::Fixed;
use crate::types::{AssetId, MarketId, UserId};

impl Engine {
    /// Roll one pool's indices forward to the engine clock.
    pub(super) fn accrue_pool(&mut self, asset_id: AssetId) -> Result<Accrual, EngineError> {
        let model = self
            .models
            .get(&asset_id)
            .ok_or(PoolError::NotFound(asset_id))?;
        let pool = self
            .pools
            .get_mut(&asset_id)
            .ok_or(PoolError::NotFound(asset_id))?;
        let accrual = pool.accrue(model.as_ref(), self.current_time)?;

        if !accrual.interest.is_zero() {
            self.emit_event(EventPayload::InterestAccrued(InterestAccruedEvent {
                asset: asset_id,
                interest: accrual.interest,
                to_insurance: accrual.to_insurance,
                borrow_index: accrual.borrow_index,
                supply_index: accrual.supply_index,
            }));
        }
        Ok(accrual)
    }

    /// Accrue both pools of a market before health is evaluated.
    pub(super) fn accrue_market_pools(&mut self, market_id: MarketId) -> Result<(), EngineError> {
        let (base, quote) = {
            let market = self.market_ref(market_id)?;
            (market.base_asset, market.quote_asset)
        };
        self.accrue_pool(base)?;
        self.accrue_pool(quote)?;
        Ok(())
    }

    /// Move Common funds into the pool, minting supply shares.
    pub fn supply(
        &mut self,
        user: UserId,
        asset_id: AssetId,
        amount: Fixed,
    ) -> Result<Fixed, EngineError> {
        self.accrue_pool(asset_id)?;
        self.ledger
            .debit(asset_id, BalancePath::common(user), amount)?;
        let pool = self.pool_mut(asset_id)?;
        let shares = pool.add_supply(user, amount)?;

        self.emit_event(EventPayload::Supplied(SuppliedEvent {
            asset: asset_id,
            user,
            amount,
            shares_minted: shares,
        }));
        Ok(shares)
    }

    /// Redeem supply shares back to the Common balance. An overshoot takes
    /// the full holding; the amount released is returned.
    pub fn unsupply(
        &mut self,
        user: UserId,
        asset_id: AssetId,
        amount: Fixed,
    ) -> Result<Fixed, EngineError> {
        self.accrue_pool(asset_id)?;
        let pool = self.pool_mut(asset_id)?;
        let shares_before = pool.supply_shares_of(user);
        let taken = pool.remove_supply(user, amount)?;
        let shares_burned = shares_before.sub(pool.supply_shares_of(user))?;
        self.ledger
            .credit(asset_id, BalancePath::common(user), taken)?;

        self.emit_event(EventPayload::Unsupplied(UnsuppliedEvent {
            asset: asset_id,
            user,
            amount: taken,
            shares_burned,
        }));
        Ok(taken)
    }

    /// Borrow pool funds against a market collateral account. The loan is
    /// gated on the account's post-borrow health: the borrowed funds count
    /// as collateral, the new debt counts against it.
    pub fn borrow(
        &mut self,
        user: UserId,
        market_id: MarketId,
        asset_id: AssetId,
        amount: Fixed,
    ) -> Result<(), EngineError> {
        let market = self.market_ref(market_id)?;
        if !market.has_asset(asset_id) {
            return Err(EngineError::AssetNotInMarket {
                asset: asset_id,
                market: market_id,
            });
        }
        if !market.borrow_enable {
            return Err(MarketError::BorrowDisabled(market_id).into());
        }
        let path = BalancePath::collateral(user, market_id);
        if self.status(user, market_id) == AccountStatus::Liquidating {
            return Err(EngineError::LiquidatingAccount { path });
        }
        self.accrue_market_pools(market_id)?;

        {
            let market = self.market_ref(market_id)?;
            let mut staged = StagedBalances::new(&self.ledger);
            staged.credit(asset_id, path, amount)?;
            let evaluator = HealthEvaluator {
                market,
                assets: &self.assets,
                pools: &self.pools,
                oracle: &self.oracle,
                now: self.current_time,
            };
            let details = evaluator.account_details_with_extra_debt(
                &staged,
                user,
                AccountStatus::Normal,
                Some((asset_id, amount)),
            )?;
            if details.liquidatable {
                return Err(EngineError::AccountLiquidatable {
                    user,
                    market: market_id,
                });
            }
        }

        let pool = self.pool_mut(asset_id)?;
        pool.add_debt(user, market_id, amount)?;
        self.ledger.credit(asset_id, path, amount)?;

        self.emit_event(EventPayload::Borrowed(BorrowedEvent {
            asset: asset_id,
            user,
            market: market_id,
            amount,
        }));
        Ok(())
    }

    /// Pay down market debt from the collateral account. An overshoot is
    /// truncated to the real debt; repaying it in full burns every share.
    pub fn repay(
        &mut self,
        user: UserId,
        market_id: MarketId,
        asset_id: AssetId,
        amount: Fixed,
    ) -> Result<Fixed, EngineError> {
        let market = self.market_ref(market_id)?;
        if !market.has_asset(asset_id) {
            return Err(EngineError::AssetNotInMarket {
                asset: asset_id,
                market: market_id,
            });
        }
        let path = BalancePath::collateral(user, market_id);
        if self.status(user, market_id) == AccountStatus::Liquidating {
            return Err(EngineError::LiquidatingAccount { path });
        }
        self.accrue_pool(asset_id)?;

        let owed = self.pool_ref(asset_id)?.debt_real(user, market_id)?;
        let paying = amount.min(owed);
        if paying.is_zero() {
            return Ok(Fixed::ZERO);
        }
        self.ledger.debit(asset_id, path, paying)?;
        let pool = self.pool_mut(asset_id)?;
        let paid = pool.remove_debt(user, market_id, paying)?;

        self.emit_event(EventPayload::Repaid(RepaidEvent {
            asset: asset_id,
            user,
            market: market_id,
            amount: paid,
        }));
        Ok(paid)
    }
}
