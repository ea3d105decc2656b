//! Asset registry entries.
//!
//! An asset is anything the ledger can hold: the quote stablecoin, traded
//! tokens, the fee-discount token. Prices and interest models are attached
//! per asset at the engine level so an admin can swap them without touching
//! balances.

use crate::math::{Fixed, MathError, BASE};
use crate::types::AssetId;
use serde::{Deserialize, Serialize};

/// Static asset configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    /// Human-readable symbol (e.g., "USDT")
    pub symbol: String,
    /// Native token decimals; amounts are normalized to 18 at the boundary
    pub decimals: u8,
    /// Valuation weight applied to this asset when summing collateral value.
    /// 1.0 counts the full oracle value.
    pub collateral_rate: Fixed,
}

impl Asset {
    pub fn new(id: AssetId, symbol: &str, decimals: u8) -> Result<Self, AssetError> {
        if decimals > 18 {
            return Err(AssetError::UnsupportedDecimals { id, decimals });
        }
        Ok(Self {
            id,
            symbol: symbol.to_string(),
            decimals,
            collateral_rate: Fixed::ONE,
        })
    }

    /// Scale a native token amount up to the engine's 18-decimal fixed point.
    pub fn to_engine_amount(&self, native: u128) -> Result<Fixed, MathError> {
        let factor = 10u128.pow(18 - self.decimals as u32);
        native
            .checked_mul(factor)
            .map(Fixed::from_raw)
            .ok_or(MathError::Overflow)
    }

    /// Scale an engine amount back down to native decimals, truncating dust.
    pub fn to_native_amount(&self, amount: Fixed) -> u128 {
        let factor = 10u128.pow(18 - self.decimals as u32);
        amount.raw() / factor
    }
}

/// Share of accrued interest diverted to the per-asset insurance balance.
pub const DEFAULT_INSURANCE_RATIO: Fixed = Fixed::from_raw(BASE / 10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("{0} already registered")]
    AlreadyExists(AssetId),

    #[error("{0} not registered")]
    NotFound(AssetId),

    #[error("{id} declares {decimals} decimals; at most 18 supported")]
    UnsupportedDecimals { id: AssetId, decimals: u8 },
}
