//! Collateral Account health evaluation.
//!
//! A collateral account is the (user, market) slice of the ledger plus the
//! (user, market) debt in each asset pool. Health is never stored; it is
//! recomputed from live balances, live oracle prices and live interest
//! indices every time someone asks. Only the Normal/Liquidating status flag
//! persists, because an account under auction must stay frozen even if
//! prices recover.

use crate::asset::Asset;
use crate::balances::{BalancePath, BalanceView};
use crate::lending::LendingPool;
use crate::market::Market;
use crate::math::{Fixed, MathError};
use crate::oracle::{OracleError, PriceOracle};
use crate::types::{AssetId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccountStatus {
    #[default]
    Normal,
    Liquidating,
}

/// Point-in-time health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountDetails {
    pub status: AccountStatus,
    pub liquidatable: bool,
    pub balances_usd: Fixed,
    pub debts_usd: Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollateralError {
    #[error("{0} not registered")]
    UnknownAsset(AssetId),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Math(#[from] MathError),
}

/// Borrowed view over everything health depends on. Callers accrue the
/// market's pools before evaluating, so debt reads are current.
pub struct HealthEvaluator<'a> {
    pub market: &'a Market,
    pub assets: &'a HashMap<AssetId, Asset>,
    pub pools: &'a HashMap<AssetId, LendingPool>,
    pub oracle: &'a dyn PriceOracle,
    pub now: Timestamp,
}

impl HealthEvaluator<'_> {
    pub fn account_details<B: BalanceView>(
        &self,
        balances: &B,
        user: UserId,
        status: AccountStatus,
    ) -> Result<AccountDetails, CollateralError> {
        self.account_details_with_extra_debt(balances, user, status, None)
    }

    /// Health with a hypothetical extra debt layered in. A borrow stages its
    /// balance credit and passes the prospective debt here, so the gate runs
    /// before anything mutates.
    pub fn account_details_with_extra_debt<B: BalanceView>(
        &self,
        balances: &B,
        user: UserId,
        status: AccountStatus,
        extra_debt: Option<(AssetId, Fixed)>,
    ) -> Result<AccountDetails, CollateralError> {
        let path = BalancePath::collateral(user, self.market.id);
        let mut balances_usd = Fixed::ZERO;
        let mut debts_usd = Fixed::ZERO;

        for asset_id in [self.market.base_asset, self.market.quote_asset] {
            let asset = self
                .assets
                .get(&asset_id)
                .ok_or(CollateralError::UnknownAsset(asset_id))?;
            let price = self.oracle.price(asset_id, self.now)?;

            let balance = balances.view_balance(asset_id, path);
            if !balance.is_zero() {
                let value = balance.mul_floor(price)?.mul_floor(asset.collateral_rate)?;
                balances_usd = balances_usd.add(value)?;
            }

            let mut debt = match self.pools.get(&asset_id) {
                Some(pool) => pool.debt_real(user, self.market.id)?,
                None => Fixed::ZERO,
            };
            if let Some((extra_asset, extra)) = extra_debt {
                if extra_asset == asset_id {
                    debt = debt.add(extra)?;
                }
            }
            if !debt.is_zero() {
                // debt valued upward so health is never overstated
                debts_usd = debts_usd.add(debt.mul_ceil(price)?)?;
            }
        }

        let liquidatable =
            !debts_usd.is_zero() && balances_usd < debts_usd.mul_floor(self.market.liquidate_rate)?;

        Ok(AccountDetails {
            status,
            liquidatable,
            balances_usd,
            debts_usd,
        })
    }

    /// How much of `asset` may leave the collateral account while the
    /// account stays at or above the withdraw threshold. Debt-free accounts
    /// move everything; zero-weight assets do not contribute to health, so
    /// they also move freely.
    pub fn transferable_amount<B: BalanceView>(
        &self,
        balances: &B,
        user: UserId,
        asset_id: AssetId,
    ) -> Result<Fixed, CollateralError> {
        let path = BalancePath::collateral(user, self.market.id);
        let balance = balances.view_balance(asset_id, path);
        if balance.is_zero() {
            return Ok(Fixed::ZERO);
        }

        let details = self.account_details(balances, user, AccountStatus::Normal)?;
        if details.debts_usd.is_zero() {
            return Ok(balance);
        }

        let required = details.debts_usd.mul_ceil(self.market.withdraw_rate)?;
        if details.balances_usd <= required {
            return Ok(Fixed::ZERO);
        }
        let headroom = details.balances_usd.sub(required)?;

        let asset = self
            .assets
            .get(&asset_id)
            .ok_or(CollateralError::UnknownAsset(asset_id))?;
        let price = self.oracle.price(asset_id, self.now)?;
        let unit_value = price.mul_ceil(asset.collateral_rate)?;
        if unit_value.is_zero() {
            return Ok(balance);
        }

        Ok(headroom.div_floor(unit_value)?.min(balance))
    }
}
