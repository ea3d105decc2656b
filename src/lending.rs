//! Lending Pool.
//!
//! One pool per asset. Suppliers hold shares that appreciate through the
//! supply index; borrowers owe shares that appreciate through the borrow
//! index. Both indices start at 1.0 and only grow. Every mutation accrues
//! interest first, so state is always current as of the supplied timestamp.
//!
//! Rounding always favors the pool: minted supply shares and burned debt
//! shares round down, minted debt shares and redeemed amounts round up where
//! the pool is owed. Debt is scoped to a (user, market) pair because loans
//! are collateralized per market; supply is market-agnostic.

use crate::interest::{InterestRateModel, SECONDS_PER_YEAR};
use crate::math::{Fixed, MathError};
use crate::types::{AssetId, MarketId, Timestamp, UserId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("pool for {asset} has {available} free, needs {requested}")]
    InsufficientLiquidity {
        asset: AssetId,
        requested: Fixed,
        available: Fixed,
    },

    #[error("no pool registered for {0}")]
    NotFound(AssetId),

    #[error(transparent)]
    Math(#[from] MathError),
}

/// What one accrual pass did. Zeroed when no time elapsed or nothing was
/// borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Accrual {
    pub interest: Fixed,
    pub to_insurance: Fixed,
    pub borrow_index: Fixed,
    pub supply_index: Fixed,
}

/// Point-in-time rate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRates {
    pub utilization: Fixed,
    pub borrow_rate: Fixed,
    pub supply_rate: Fixed,
}

#[derive(Debug, Clone)]
pub struct LendingPool {
    pub asset: AssetId,
    /// Share of accrued interest diverted to the insurance balance
    pub insurance_ratio: Fixed,
    /// Funds physically held by the pool right now
    cash: Fixed,
    total_supply_shares: Fixed,
    total_borrow_shares: Fixed,
    supply_index: Fixed,
    borrow_index: Fixed,
    last_update: Timestamp,
    insurance_balance: Fixed,
    supply_shares: HashMap<UserId, Fixed>,
    borrow_shares: HashMap<(UserId, MarketId), Fixed>,
}

impl LendingPool {
    pub fn new(asset: AssetId, insurance_ratio: Fixed, now: Timestamp) -> Self {
        Self {
            asset,
            insurance_ratio,
            cash: Fixed::ZERO,
            total_supply_shares: Fixed::ZERO,
            total_borrow_shares: Fixed::ZERO,
            supply_index: Fixed::ONE,
            borrow_index: Fixed::ONE,
            last_update: now,
            insurance_balance: Fixed::ZERO,
            supply_shares: HashMap::new(),
            borrow_shares: HashMap::new(),
        }
    }

    // ---- accrual ----

    /// Roll the indices forward to `now`. Idempotent within a timestamp.
    pub fn accrue(
        &mut self,
        model: &dyn InterestRateModel,
        now: Timestamp,
    ) -> Result<Accrual, PoolError> {
        let elapsed = now.elapsed_since(self.last_update);
        self.last_update = self.last_update.max(now);
        let total_borrow = self.total_borrow_real()?;
        if elapsed == 0 || total_borrow.is_zero() {
            return Ok(Accrual {
                borrow_index: self.borrow_index,
                supply_index: self.supply_index,
                ..Accrual::default()
            });
        }

        let annual_rate = model.annual_rate(self.utilization()?)?;
        let period_rate = annual_rate
            .mul_floor(Fixed::from_int(elapsed))?
            .div_floor(Fixed::from_int(SECONDS_PER_YEAR))?;
        let interest = total_borrow.mul_floor(period_rate)?;

        self.borrow_index = self.borrow_index.mul_ceil(Fixed::ONE.add(period_rate)?)?;

        let to_insurance = interest.mul_floor(self.insurance_ratio)?;
        let to_suppliers = interest.sub(to_insurance)?;
        let total_supply = self.total_supply_real()?;
        if !total_supply.is_zero() && !to_suppliers.is_zero() {
            let supply_growth = to_suppliers.div_floor(total_supply)?;
            self.supply_index = self
                .supply_index
                .mul_floor(Fixed::ONE.add(supply_growth)?)?;
        }
        self.insurance_balance = self.insurance_balance.add(to_insurance)?;

        Ok(Accrual {
            interest,
            to_insurance,
            borrow_index: self.borrow_index,
            supply_index: self.supply_index,
        })
    }

    // ---- supply side ----

    /// Take `amount` of already-debited user funds into the pool, minting
    /// shares at the current supply index. Caller accrues first.
    pub fn add_supply(&mut self, user: UserId, amount: Fixed) -> Result<Fixed, PoolError> {
        let shares = amount.div_floor(self.supply_index)?;
        let entry = self.supply_shares.entry(user).or_insert(Fixed::ZERO);
        *entry = entry.add(shares)?;
        self.total_supply_shares = self.total_supply_shares.add(shares)?;
        self.cash = self.cash.add(amount)?;
        Ok(shares)
    }

    /// Redeem up to `amount` for the user; an overshoot is truncated to the
    /// full holding. Returns the amount actually released, which the caller
    /// credits back to the user.
    pub fn remove_supply(&mut self, user: UserId, amount: Fixed) -> Result<Fixed, PoolError> {
        let held_shares = self.supply_shares_of(user);
        let held_real = held_shares.mul_floor(self.supply_index)?;
        let (take, burn) = if amount >= held_real {
            (held_real, held_shares)
        } else {
            (amount, amount.div_ceil(self.supply_index)?)
        };
        if take.is_zero() {
            return Ok(Fixed::ZERO);
        }

        let free = self.free_liquidity()?;
        if take > free {
            return Err(PoolError::InsufficientLiquidity {
                asset: self.asset,
                requested: take,
                available: free,
            });
        }

        let entry = self.supply_shares.entry(user).or_insert(Fixed::ZERO);
        *entry = entry.sub(burn)?;
        if entry.is_zero() {
            self.supply_shares.remove(&user);
        }
        self.total_supply_shares = self.total_supply_shares.sub(burn)?;
        self.cash = self.cash.sub(take)?;
        Ok(take)
    }

    // ---- borrow side ----

    /// Lend `amount` against the (user, market) collateral account. Debt
    /// shares round up. Caller accrues first, credits the collateral path,
    /// and health-checks the account.
    pub fn add_debt(
        &mut self,
        user: UserId,
        market: MarketId,
        amount: Fixed,
    ) -> Result<Fixed, PoolError> {
        if amount.is_zero() {
            return Ok(Fixed::ZERO);
        }
        let free = self.free_liquidity()?;
        if amount > free {
            return Err(PoolError::InsufficientLiquidity {
                asset: self.asset,
                requested: amount,
                available: free,
            });
        }
        let shares = amount.div_ceil(self.borrow_index)?;
        let entry = self
            .borrow_shares
            .entry((user, market))
            .or_insert(Fixed::ZERO);
        *entry = entry.add(shares)?;
        self.total_borrow_shares = self.total_borrow_shares.add(shares)?;
        self.cash = self.cash.sub(amount)?;
        Ok(shares)
    }

    /// Pay down the (user, market) debt with up to `amount`; an overshoot is
    /// truncated to the real debt. Returns the amount actually absorbed,
    /// which the caller debits from the payer.
    pub fn remove_debt(
        &mut self,
        user: UserId,
        market: MarketId,
        amount: Fixed,
    ) -> Result<Fixed, PoolError> {
        let held_shares = self.borrow_shares_of(user, market);
        let real_debt = held_shares.mul_ceil(self.borrow_index)?;
        let (pay, burn) = if amount >= real_debt {
            (real_debt, held_shares)
        } else {
            (amount, amount.div_floor(self.borrow_index)?)
        };
        if pay.is_zero() {
            return Ok(Fixed::ZERO);
        }

        let entry = self
            .borrow_shares
            .entry((user, market))
            .or_insert(Fixed::ZERO);
        *entry = entry.sub(burn)?;
        if entry.is_zero() {
            self.borrow_shares.remove(&(user, market));
        }
        self.total_borrow_shares = self.total_borrow_shares.sub(burn)?;
        self.cash = self.cash.add(pay)?;
        Ok(pay)
    }

    // ---- loss absorption ----

    /// Top up the insurance balance with externally provided funds.
    pub fn fund_insurance(&mut self, amount: Fixed) -> Result<(), PoolError> {
        self.insurance_balance = self.insurance_balance.add(amount)?;
        self.cash = self.cash.add(amount)?;
        Ok(())
    }

    /// Pay out up to `amount` from the insurance balance. Limited by pool
    /// cash since insurance is a claim, not a separate till.
    pub fn pay_from_insurance(&mut self, amount: Fixed) -> Result<Fixed, PoolError> {
        let covered = amount.min(self.insurance_balance).min(self.cash);
        if covered.is_zero() {
            return Ok(Fixed::ZERO);
        }
        self.insurance_balance = self.insurance_balance.sub(covered)?;
        self.cash = self.cash.sub(covered)?;
        Ok(covered)
    }

    /// Socialize a loss across suppliers by burning shares pro-rata and
    /// releasing the equivalent cash. Indices never move. The largest holder
    /// absorbs rounding dust; ties break on user id so the outcome is
    /// deterministic. Returns the amount covered.
    pub fn socialize_loss(&mut self, amount: Fixed) -> Result<Fixed, PoolError> {
        let total_real = self.total_supply_real()?;
        let covered = amount.min(total_real).min(self.cash);
        if covered.is_zero() {
            return Ok(Fixed::ZERO);
        }
        let shares_to_burn = covered
            .div_ceil(self.supply_index)?
            .min(self.total_supply_shares);

        let mut holders: Vec<(UserId, Fixed)> = self
            .supply_shares
            .iter()
            .map(|(user, shares)| (*user, *shares))
            .collect();
        holders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0 .0.cmp(&b.0 .0)));

        let total_shares = self.total_supply_shares;
        let mut burned_total = Fixed::ZERO;
        for (index, (user, held)) in holders.iter().enumerate() {
            let burn = if index == 0 {
                // placeholder, the largest holder is settled last
                Fixed::ZERO
            } else {
                held.mul_floor(shares_to_burn)?
                    .div_floor(total_shares)?
                    .min(*held)
            };
            if burn.is_zero() {
                continue;
            }
            self.burn_supply_shares(*user, burn)?;
            burned_total = burned_total.add(burn)?;
        }
        // dust lands on the largest holder
        if let Some((largest, held)) = holders.first() {
            let rest = shares_to_burn.sub(burned_total)?.min(*held);
            self.burn_supply_shares(*largest, rest)?;
        }

        self.cash = self.cash.sub(covered)?;
        Ok(covered)
    }

    fn burn_supply_shares(&mut self, user: UserId, shares: Fixed) -> Result<(), PoolError> {
        if shares.is_zero() {
            return Ok(());
        }
        let entry = self.supply_shares.entry(user).or_insert(Fixed::ZERO);
        *entry = entry.sub(shares)?;
        if entry.is_zero() {
            self.supply_shares.remove(&user);
        }
        self.total_supply_shares = self.total_supply_shares.sub(shares)?;
        Ok(())
    }

    // ---- views ----

    pub fn supply_shares_of(&self, user: UserId) -> Fixed {
        self.supply_shares
            .get(&user)
            .copied()
            .unwrap_or(Fixed::ZERO)
    }

    pub fn borrow_shares_of(&self, user: UserId, market: MarketId) -> Fixed {
        self.borrow_shares
            .get(&(user, market))
            .copied()
            .unwrap_or(Fixed::ZERO)
    }

    /// Redeemable amount for a supplier at the current index.
    pub fn supply_real(&self, user: UserId) -> Result<Fixed, MathError> {
        self.supply_shares_of(user).mul_floor(self.supply_index)
    }

    /// Outstanding debt for a (user, market) at the current index. Rounds
    /// up so debt is never understated.
    pub fn debt_real(&self, user: UserId, market: MarketId) -> Result<Fixed, MathError> {
        self.borrow_shares_of(user, market).mul_ceil(self.borrow_index)
    }

    pub fn total_supply_real(&self) -> Result<Fixed, MathError> {
        self.total_supply_shares.mul_floor(self.supply_index)
    }

    pub fn total_borrow_real(&self) -> Result<Fixed, MathError> {
        self.total_borrow_shares.mul_ceil(self.borrow_index)
    }

    pub fn free_liquidity(&self) -> Result<Fixed, MathError> {
        Ok(self
            .total_supply_real()?
            .saturating_sub(self.total_borrow_real()?))
    }

    pub fn utilization(&self) -> Result<Fixed, MathError> {
        let supply = self.total_supply_real()?;
        if supply.is_zero() {
            return Ok(Fixed::ZERO);
        }
        self.total_borrow_real()?.div_floor(supply)
    }

    /// Current annualized rates for display and monitoring.
    pub fn rates(&self, model: &dyn InterestRateModel) -> Result<PoolRates, MathError> {
        let utilization = self.utilization()?;
        let borrow_rate = model.annual_rate(utilization)?;
        let supply_rate = borrow_rate
            .mul_floor(utilization)?
            .mul_floor(Fixed::ONE.saturating_sub(self.insurance_ratio))?;
        Ok(PoolRates {
            utilization,
            borrow_rate,
            supply_rate,
        })
    }

    pub fn cash(&self) -> Fixed {
        self.cash
    }

    pub fn insurance_balance(&self) -> Fixed {
        self.insurance_balance
    }

    pub fn supply_index(&self) -> Fixed {
        self.supply_index
    }

    pub fn borrow_index(&self) -> Fixed {
        self.borrow_index
    }

    /// Debt holders with nonzero shares, for liquidation scans.
    pub fn debtors(&self) -> impl Iterator<Item = (UserId, MarketId)> + '_ {
        self.borrow_shares.keys().copied()
    }
}
