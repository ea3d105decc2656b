//! Order types.
//!
//! Orders are built and priced off-chain and submitted to the engine by a
//! relayer. Every field is typed and hashed into a stable identity; the
//! engine tracks fill progress and cancellation against that hash, never
//! against the struct itself.

use crate::balances::BalancePath;
use crate::math::{Fixed, MathError};
use crate::types::{MarketId, OrderHash, Side, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current order encoding version. The version is part of the hash
/// preimage, so orders from older encodings can never collide.
pub const ORDER_VERSION: u8 = 2;

const ORDER_DOMAIN: &[u8] = b"margin-core/order/v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Fills at the stated base/quote price, possibly across many matches
    Limit,
    /// Spends a one-sided budget at whatever the makers quote. Never rests.
    Market,
}

impl OrderKind {
    fn tag(self) -> u8 {
        match self {
            OrderKind::Limit => 0,
            OrderKind::Market => 1,
        }
    }
}

/// Which balances an order trades out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BalanceSource {
    #[default]
    Common,
    /// The trader's collateral account in the order's market
    MarketCollateral,
}

impl BalanceSource {
    fn tag(self) -> u8 {
        match self {
            BalanceSource::Common => 0,
            BalanceSource::MarketCollateral => 1,
        }
    }

    pub fn path(self, trader: UserId, market: MarketId) -> BalancePath {
        match self {
            BalanceSource::Common => BalancePath::common(trader),
            BalanceSource::MarketCollateral => BalancePath::collateral(trader, market),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("unsupported order version {0}")]
    UnsupportedVersion(u8),

    #[error("limit order needs positive base and quote amounts")]
    InvalidLimitAmounts,

    #[error("market order budget must be on exactly one side")]
    InvalidMarketAmounts,

    #[error("market orders cannot be maker-only")]
    MakerOnlyMarketOrder,

    #[error(transparent)]
    Math(#[from] MathError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub trader: UserId,
    pub relayer: UserId,
    pub market: MarketId,
    pub side: Side,
    pub kind: OrderKind,
    /// Base amount to trade. Zero for a market buy, which budgets in quote.
    pub base_amount: Fixed,
    /// Quote amount at full fill (limit), or the spend budget (market buy).
    pub quote_amount: Fixed,
    pub expires_at: Timestamp,
    pub as_maker_fee_rate: Fixed,
    pub as_taker_fee_rate: Fixed,
    pub maker_rebate_rate: Fixed,
    /// Flat relayer compensation, charged once on the first fill
    pub gas_fee_amount: Fixed,
    pub maker_only: bool,
    pub balance_source: BalanceSource,
    pub salt: u64,
    pub version: u8,
}

impl Order {
    /// Shape checks that do not depend on market state.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.version != ORDER_VERSION {
            return Err(OrderError::UnsupportedVersion(self.version));
        }
        match self.kind {
            OrderKind::Limit => {
                if self.base_amount.is_zero() || self.quote_amount.is_zero() {
                    return Err(OrderError::InvalidLimitAmounts);
                }
            }
            OrderKind::Market => {
                if self.maker_only {
                    return Err(OrderError::MakerOnlyMarketOrder);
                }
                let budgeted = match self.side {
                    // buys spend quote, sells spend base
                    Side::Buy => !self.quote_amount.is_zero() && self.base_amount.is_zero(),
                    Side::Sell => !self.base_amount.is_zero() && self.quote_amount.is_zero(),
                };
                if !budgeted {
                    return Err(OrderError::InvalidMarketAmounts);
                }
            }
        }
        Ok(())
    }

    /// Limit price as quote per base. Meaningless for market orders.
    pub fn price(&self) -> Result<Fixed, MathError> {
        self.quote_amount.div_floor(self.base_amount)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.as_secs() < now.as_secs()
    }

    /// Where this order's legs settle.
    pub fn settlement_path(&self) -> BalancePath {
        self.balance_source.path(self.trader, self.market)
    }

    /// How much can still fill, given the recorded `filled` counter. Limit
    /// orders and market sells count base; market buys count quote spent.
    pub fn remaining_fillable(&self, filled: Fixed) -> Fixed {
        match (self.kind, self.side) {
            (OrderKind::Market, Side::Buy) => self.quote_amount.saturating_sub(filled),
            _ => self.base_amount.saturating_sub(filled),
        }
    }

    /// Quote owed for `fill_base` at this order's own price, pro-rata with
    /// the dust guard.
    pub fn quote_for(&self, fill_base: Fixed) -> Result<Fixed, MathError> {
        Fixed::partial_floor(self.quote_amount, self.base_amount, fill_base)
    }

    /// Content hash. Identical fields hash identically; any field change,
    /// including the salt, produces a fresh identity.
    pub fn hash(&self) -> OrderHash {
        let side_tag: u8 = match self.side {
            Side::Buy => 0,
            Side::Sell => 1,
        };
        let mut hasher = Sha256::new();
        hasher.update(ORDER_DOMAIN);
        hasher.update([
            self.version,
            self.kind.tag(),
            side_tag,
            u8::from(self.maker_only),
            self.balance_source.tag(),
        ]);
        hasher.update(self.trader.0.to_be_bytes());
        hasher.update(self.relayer.0.to_be_bytes());
        hasher.update(self.market.0.to_be_bytes());
        hasher.update(self.base_amount.raw().to_be_bytes());
        hasher.update(self.quote_amount.raw().to_be_bytes());
        hasher.update(self.expires_at.as_secs().to_be_bytes());
        hasher.update(self.as_maker_fee_rate.raw().to_be_bytes());
        hasher.update(self.as_taker_fee_rate.raw().to_be_bytes());
        hasher.update(self.maker_rebate_rate.raw().to_be_bytes());
        hasher.update(self.gas_fee_amount.raw().to_be_bytes());
        hasher.update(self.salt.to_be_bytes());
        OrderHash(hasher.finalize().into())
    }
}
