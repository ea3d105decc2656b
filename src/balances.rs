//! Balance Ledger.
//!
//! Every fund the engine custodies sits at an account path: either a user's
//! market-agnostic Common balance or a per-market collateral account. The
//! ledger is deliberately dumb: pure storage with checked moves. Health
//! gating and liquidation rules are enforced by the engine before it calls
//! in here.

use crate::math::{Fixed, MathError};
use crate::types::{AssetId, MarketId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Addressable unit of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalancePath {
    /// Market-agnostic funds; what trades settle against by default.
    Common { user: UserId },
    /// Funds pledged to one market; counted by the health evaluator.
    Collateral { user: UserId, market: MarketId },
}

impl BalancePath {
    pub fn common(user: UserId) -> Self {
        Self::Common { user }
    }

    pub fn collateral(user: UserId, market: MarketId) -> Self {
        Self::Collateral { user, market }
    }

    pub fn user(&self) -> UserId {
        match self {
            Self::Common { user } => *user,
            Self::Collateral { user, .. } => *user,
        }
    }

    pub fn market(&self) -> Option<MarketId> {
        match self {
            Self::Common { .. } => None,
            Self::Collateral { market, .. } => Some(*market),
        }
    }

    pub fn is_collateral(&self) -> bool {
        matches!(self, Self::Collateral { .. })
    }
}

impl fmt::Display for BalancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Common { user } => write!(f, "{user}/common"),
            Self::Collateral { user, market } => write!(f, "{user}/{market}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{path} holds {available} of {asset}, needs {needed}")]
    InsufficientBalance {
        asset: AssetId,
        path: BalancePath,
        needed: Fixed,
        available: Fixed,
    },

    #[error(transparent)]
    Math(#[from] MathError),
}

/// Per-(asset, path) balance store plus lifetime flow counters. The counters
/// never decrease; they anchor the conservation audit.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: HashMap<(AssetId, BalancePath), Fixed>,
    lifetime_deposits: HashMap<AssetId, Fixed>,
    lifetime_withdrawals: HashMap<AssetId, Fixed>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, asset: AssetId, path: BalancePath) -> Fixed {
        self.balances
            .get(&(asset, path))
            .copied()
            .unwrap_or(Fixed::ZERO)
    }

    /// Add to a path. Internal moves and external deposits both land here.
    pub fn credit(
        &mut self,
        asset: AssetId,
        path: BalancePath,
        amount: Fixed,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        let entry = self.balances.entry((asset, path)).or_insert(Fixed::ZERO);
        *entry = entry.add(amount)?;
        Ok(())
    }

    /// Remove from a path; fails if the balance cannot cover it.
    pub fn debit(
        &mut self,
        asset: AssetId,
        path: BalancePath,
        amount: Fixed,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        let available = self.balance_of(asset, path);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                asset,
                path,
                needed: amount,
                available,
            });
        }
        let entry = self.balances.entry((asset, path)).or_insert(Fixed::ZERO);
        *entry = entry.sub(amount)?;
        if entry.is_zero() {
            self.balances.remove(&(asset, path));
        }
        Ok(())
    }

    /// A deposit's failure modes without the mutation: balance and lifetime
    /// counter overflow. Callers move external tokens only after this passes.
    pub fn check_deposit(
        &self,
        asset: AssetId,
        path: BalancePath,
        amount: Fixed,
    ) -> Result<(), LedgerError> {
        self.balance_of(asset, path).add(amount)?;
        self.lifetime_deposited(asset).add(amount)?;
        Ok(())
    }

    /// External funds entering custody.
    pub fn deposit(
        &mut self,
        asset: AssetId,
        path: BalancePath,
        amount: Fixed,
    ) -> Result<(), LedgerError> {
        self.credit(asset, path, amount)?;
        let lifetime = self
            .lifetime_deposits
            .entry(asset)
            .or_insert(Fixed::ZERO);
        *lifetime = lifetime.add(amount)?;
        Ok(())
    }

    /// A withdrawal's failure modes without the mutation: insufficient
    /// balance and lifetime counter overflow.
    pub fn check_withdraw(
        &self,
        asset: AssetId,
        path: BalancePath,
        amount: Fixed,
    ) -> Result<(), LedgerError> {
        let available = self.balance_of(asset, path);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                asset,
                path,
                needed: amount,
                available,
            });
        }
        self.lifetime_withdrawn(asset).add(amount)?;
        Ok(())
    }

    /// Custodied funds leaving the system.
    pub fn withdraw(
        &mut self,
        asset: AssetId,
        path: BalancePath,
        amount: Fixed,
    ) -> Result<(), LedgerError> {
        self.debit(asset, path, amount)?;
        let lifetime = self
            .lifetime_withdrawals
            .entry(asset)
            .or_insert(Fixed::ZERO);
        *lifetime = lifetime.add(amount)?;
        Ok(())
    }

    /// Move between two paths without changing total custody.
    pub fn transfer(
        &mut self,
        asset: AssetId,
        from: BalancePath,
        to: BalancePath,
        amount: Fixed,
    ) -> Result<(), LedgerError> {
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)?;
        Ok(())
    }

    /// Sum of all path balances for an asset.
    pub fn asset_total(&self, asset: AssetId) -> Result<Fixed, LedgerError> {
        let mut total = Fixed::ZERO;
        for ((entry_asset, _), amount) in &self.balances {
            if *entry_asset == asset {
                total = total.add(*amount)?;
            }
        }
        Ok(total)
    }

    pub fn lifetime_deposited(&self, asset: AssetId) -> Fixed {
        self.lifetime_deposits
            .get(&asset)
            .copied()
            .unwrap_or(Fixed::ZERO)
    }

    pub fn lifetime_withdrawn(&self, asset: AssetId) -> Fixed {
        self.lifetime_withdrawals
            .get(&asset)
            .copied()
            .unwrap_or(Fixed::ZERO)
    }
}

/// Read access to balances, satisfied by the live ledger and by a staged
/// overlay. Health evaluation works against either.
pub trait BalanceView {
    fn view_balance(&self, asset: AssetId, path: BalancePath) -> Fixed;
}

impl BalanceView for Ledger {
    fn view_balance(&self, asset: AssetId, path: BalancePath) -> Fixed {
        self.balance_of(asset, path)
    }
}

/// Uncommitted moves layered over a ledger. A multi-leg settlement stages
/// every leg here, health-checks the resulting state, and only then commits.
/// Each staged debit is validated against the effective balance, so a commit
/// can never fail.
#[derive(Debug)]
pub struct StagedBalances<'a> {
    base: &'a Ledger,
    moves: Vec<StagedMove>,
    effective: HashMap<(AssetId, BalancePath), Fixed>,
}

#[derive(Debug, Clone, Copy)]
enum StagedMove {
    Credit(AssetId, BalancePath, Fixed),
    Debit(AssetId, BalancePath, Fixed),
}

impl<'a> StagedBalances<'a> {
    pub fn new(base: &'a Ledger) -> Self {
        Self {
            base,
            moves: Vec::new(),
            effective: HashMap::new(),
        }
    }

    fn effective_balance(&self, asset: AssetId, path: BalancePath) -> Fixed {
        self.effective
            .get(&(asset, path))
            .copied()
            .unwrap_or_else(|| self.base.balance_of(asset, path))
    }

    pub fn credit(
        &mut self,
        asset: AssetId,
        path: BalancePath,
        amount: Fixed,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        let updated = self.effective_balance(asset, path).add(amount)?;
        self.effective.insert((asset, path), updated);
        self.moves.push(StagedMove::Credit(asset, path, amount));
        Ok(())
    }

    pub fn debit(
        &mut self,
        asset: AssetId,
        path: BalancePath,
        amount: Fixed,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        let available = self.effective_balance(asset, path);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                asset,
                path,
                needed: amount,
                available,
            });
        }
        self.effective.insert((asset, path), available.sub(amount)?);
        self.moves.push(StagedMove::Debit(asset, path, amount));
        Ok(())
    }

    pub fn transfer(
        &mut self,
        asset: AssetId,
        from: BalancePath,
        to: BalancePath,
        amount: Fixed,
    ) -> Result<(), LedgerError> {
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }

    /// Collateral paths this staging touched, for the post-commit health pass.
    pub fn touched_collateral_paths(&self) -> Vec<BalancePath> {
        let mut paths: Vec<BalancePath> = self
            .moves
            .iter()
            .map(|mv| match mv {
                StagedMove::Credit(_, path, _) | StagedMove::Debit(_, path, _) => *path,
            })
            .filter(|path| path.is_collateral())
            .collect();
        paths.sort_by_key(|path| (path.user().0, path.market().map(|m| m.0)));
        paths.dedup();
        paths
    }

    /// Consume the staging, releasing its borrow of the ledger. The result
    /// is handed to [`Ledger::apply`].
    pub fn into_moves(self) -> SettlementMoves {
        SettlementMoves(self.moves)
    }
}

/// Validated moves detached from their staging borrow.
#[derive(Debug)]
pub struct SettlementMoves(Vec<StagedMove>);

impl Ledger {
    /// Replay staged moves. Every debit was validated at staging time, so
    /// failure here means the ledger changed between staging and apply,
    /// which the single-threaded engine rules out.
    pub fn apply(&mut self, moves: SettlementMoves) -> Result<(), LedgerError> {
        for mv in moves.0 {
            match mv {
                StagedMove::Credit(asset, path, amount) => self.credit(asset, path, amount)?,
                StagedMove::Debit(asset, path, amount) => self.debit(asset, path, amount)?,
            }
        }
        Ok(())
    }
}

impl BalanceView for StagedBalances<'_> {
    fn view_balance(&self, asset: AssetId, path: BalancePath) -> Fixed {
        self.effective_balance(asset, path)
    }
}
