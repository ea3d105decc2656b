//! Order matching.
//!
//! One taker order meets a relayer-sequenced list of maker orders. There is
//! no resting book: the relayer picks the sequence and per-maker amounts,
//! and the engine validates that every fill honors each order's own limit
//! price, then computes fees and stages the settlement legs. Nothing moves
//! until the whole match has validated, so a failing leg rejects the match
//! with the ledger untouched.

use crate::balances::{BalancePath, Ledger, LedgerError, StagedBalances};
use crate::discount::DiscountTable;
use crate::market::Market;
use crate::math::{Fixed, MathError};
use crate::order::{Order, OrderError, OrderKind};
use crate::types::{OrderHash, Side, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("{makers} makers but {fills} fill amounts")]
    FillCountMismatch { makers: usize, fills: usize },

    #[error("match produced no fills")]
    NoFills,

    #[error("order {0} is not fillable")]
    NotFillable(OrderHash),

    #[error("maker-only order {0} submitted as taker")]
    MakerOnlyTaker(OrderHash),

    #[error("market order {0} cannot act as maker")]
    MarketOrderAsMaker(OrderHash),

    #[error("order {0} belongs to another market")]
    MarketMismatch(OrderHash),

    #[error("order {0} names a different relayer")]
    RelayerMismatch(OrderHash),

    #[error("orders {taker} and {maker} are on the same side")]
    SideMismatch { taker: OrderHash, maker: OrderHash },

    #[error("fill violates the limit price of order {0}")]
    PriceViolation(OrderHash),

    #[error("zero fill amount for order {0}")]
    EmptyFill(OrderHash),

    #[error("{0} is under liquidation")]
    LiquidatingAccount(BalancePath),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Math(#[from] MathError),
}

/// Fill progress and cancellations, keyed by order hash. The engine owns
/// one tracker; matching reads it and hands back the updated totals.
#[derive(Debug, Default)]
pub struct OrderTracker {
    filled: HashMap<OrderHash, Fixed>,
    cancelled: HashSet<OrderHash>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base filled for limit orders and market sells; quote spent for
    /// market buys.
    pub fn filled_amount(&self, hash: &OrderHash) -> Fixed {
        self.filled.get(hash).copied().unwrap_or(Fixed::ZERO)
    }

    pub fn is_cancelled(&self, hash: &OrderHash) -> bool {
        self.cancelled.contains(hash)
    }

    /// Cancellation is permanent; the filled counter freezes where it is.
    pub fn cancel(&mut self, hash: OrderHash) {
        self.cancelled.insert(hash);
    }

    pub fn record(&mut self, hash: OrderHash, new_total: Fixed) {
        self.filled.insert(hash, new_total);
    }
}

/// Static context shared by every pair in one match.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub market: &'a Market,
    pub discount: &'a DiscountTable,
    pub relayer: UserId,
    pub now: Timestamp,
}

/// One settled (taker, maker) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRecord {
    pub maker: UserId,
    pub maker_hash: OrderHash,
    pub base: Fixed,
    pub quote: Fixed,
    pub taker_fee: Fixed,
    pub maker_fee: Fixed,
    pub maker_rebate: Fixed,
    pub taker_gas: Fixed,
    pub maker_gas: Fixed,
}

/// Validated match, ready to commit. `staged` still borrows the ledger;
/// the caller health-checks against it, then converts it into moves.
#[derive(Debug)]
pub struct MatchPlan<'a> {
    pub staged: StagedBalances<'a>,
    pub taker_hash: OrderHash,
    pub fills: Vec<FillRecord>,
    /// New filled totals per order hash, taker first
    pub filled_updates: Vec<(OrderHash, Fixed)>,
}

fn fee_multiplier(
    cache: &mut HashMap<UserId, Fixed>,
    ledger: &Ledger,
    discount: &DiscountTable,
    user: UserId,
) -> Fixed {
    if let Some(multiplier) = cache.get(&user) {
        return *multiplier;
    }
    let held = ledger.balance_of(discount.token(), BalancePath::common(user));
    let multiplier = discount.multiplier_for(held);
    cache.insert(user, multiplier);
    multiplier
}

/// Validate a whole match and stage its settlement legs.
///
/// Per-fill price checks plus the taker's own fill cap together bound the
/// taker's cumulative quote by its declared limit, so no separate running
/// total is needed.
pub fn plan_match<'a>(
    ledger: &'a Ledger,
    tracker: &OrderTracker,
    ctx: MatchContext<'_>,
    taker: &Order,
    makers: &[Order],
    fill_amounts: &[Fixed],
    liquidating: &HashSet<BalancePath>,
) -> Result<MatchPlan<'a>, MatchError> {
    if makers.len() != fill_amounts.len() {
        return Err(MatchError::FillCountMismatch {
            makers: makers.len(),
            fills: fill_amounts.len(),
        });
    }

    taker.validate()?;
    let taker_hash = taker.hash();
    if taker.maker_only {
        return Err(MatchError::MakerOnlyTaker(taker_hash));
    }
    if taker.market != ctx.market.id {
        return Err(MatchError::MarketMismatch(taker_hash));
    }
    if taker.relayer != ctx.relayer {
        return Err(MatchError::RelayerMismatch(taker_hash));
    }
    if taker.is_expired(ctx.now) || tracker.is_cancelled(&taker_hash) {
        return Err(MatchError::NotFillable(taker_hash));
    }
    let taker_filled = tracker.filled_amount(&taker_hash);
    let mut taker_remaining = taker.remaining_fillable(taker_filled);
    if taker_remaining.is_zero() {
        return Err(MatchError::NotFillable(taker_hash));
    }
    let taker_path = taker.settlement_path();
    if liquidating.contains(&taker_path) {
        return Err(MatchError::LiquidatingAccount(taker_path));
    }

    let relayer_path = BalancePath::common(ctx.relayer);
    let mut multipliers: HashMap<UserId, Fixed> = HashMap::new();
    let taker_mult = fee_multiplier(&mut multipliers, ledger, ctx.discount, taker.trader);

    let mut staged = StagedBalances::new(ledger);
    let mut fills: Vec<FillRecord> = Vec::new();
    let mut local_fills: HashMap<OrderHash, Fixed> = HashMap::new();
    let mut taker_spent = Fixed::ZERO;
    let mut taker_gas_due = taker_filled.is_zero();
    let mut budget_exhausted = false;

    for (maker, &requested) in makers.iter().zip(fill_amounts) {
        if budget_exhausted {
            break;
        }

        maker.validate()?;
        let maker_hash = maker.hash();
        if requested.is_zero() {
            return Err(MatchError::EmptyFill(maker_hash));
        }
        if maker.kind != OrderKind::Limit {
            return Err(MatchError::MarketOrderAsMaker(maker_hash));
        }
        if maker.market != ctx.market.id {
            return Err(MatchError::MarketMismatch(maker_hash));
        }
        if maker.relayer != ctx.relayer {
            return Err(MatchError::RelayerMismatch(maker_hash));
        }
        if maker.side != taker.side.opposite() {
            return Err(MatchError::SideMismatch {
                taker: taker_hash,
                maker: maker_hash,
            });
        }
        if maker.is_expired(ctx.now) || tracker.is_cancelled(&maker_hash) {
            return Err(MatchError::NotFillable(maker_hash));
        }
        let maker_path = maker.settlement_path();
        if liquidating.contains(&maker_path) {
            return Err(MatchError::LiquidatingAccount(maker_path));
        }

        let already = tracker
            .filled_amount(&maker_hash)
            .add(local_fills.get(&maker_hash).copied().unwrap_or(Fixed::ZERO))?;
        if requested > maker.remaining_fillable(already) {
            return Err(MatchError::NotFillable(maker_hash));
        }

        // market takers accept any maker price; limit takers must cross
        if taker.kind == OrderKind::Limit {
            let ord = Fixed::ratio_cmp(
                maker.quote_amount,
                maker.base_amount,
                taker.quote_amount,
                taker.base_amount,
            )?;
            let crosses = match taker.side {
                Side::Sell => ord != Ordering::Less,
                Side::Buy => ord != Ordering::Greater,
            };
            if !crosses {
                return Err(MatchError::PriceViolation(maker_hash));
            }
        }

        // `counted` is the taker-side accounting unit: quote for a market
        // buy, base for everything else
        let (fill_base, fill_quote, counted) = match (taker.kind, taker.side) {
            (OrderKind::Market, Side::Buy) => {
                let quote_at_price = maker.quote_for(requested)?;
                if quote_at_price > taker_remaining {
                    // budget cannot cover the request; spend what is left
                    let base = Fixed::partial_floor(
                        maker.base_amount,
                        maker.quote_amount,
                        taker_remaining,
                    )?;
                    budget_exhausted = true;
                    if base.is_zero() {
                        break;
                    }
                    let quote = maker.quote_for(base)?;
                    (base, quote, quote)
                } else {
                    (requested, quote_at_price, quote_at_price)
                }
            }
            _ => {
                if requested > taker_remaining {
                    return Err(MatchError::NotFillable(taker_hash));
                }
                (requested, maker.quote_for(requested)?, requested)
            }
        };

        let maker_mult = fee_multiplier(&mut multipliers, ledger, ctx.discount, maker.trader);
        let taker_fee = fill_quote
            .mul_floor(taker.as_taker_fee_rate)?
            .mul_floor(taker_mult)?;
        let maker_fee = fill_quote
            .mul_floor(maker.as_maker_fee_rate)?
            .mul_floor(maker_mult)?;
        let maker_rebate = maker_fee.mul_floor(maker.maker_rebate_rate.min(Fixed::ONE))?;

        let maker_gas = if already.is_zero() {
            maker.gas_fee_amount
        } else {
            Fixed::ZERO
        };
        let taker_gas = if taker_gas_due {
            taker_gas_due = false;
            taker.gas_fee_amount
        } else {
            Fixed::ZERO
        };

        let (base_from, base_to, quote_from, quote_to) = match taker.side {
            Side::Sell => (taker_path, maker_path, maker_path, taker_path),
            Side::Buy => (maker_path, taker_path, taker_path, maker_path),
        };
        staged.transfer(ctx.market.base_asset, base_from, base_to, fill_base)?;
        staged.transfer(ctx.market.quote_asset, quote_from, quote_to, fill_quote)?;
        // each party's fee and gas leave its own settlement path, in quote
        staged.transfer(
            ctx.market.quote_asset,
            taker_path,
            relayer_path,
            taker_fee.add(taker_gas)?,
        )?;
        staged.transfer(
            ctx.market.quote_asset,
            maker_path,
            relayer_path,
            maker_fee.sub(maker_rebate)?.add(maker_gas)?,
        )?;

        taker_remaining = taker_remaining.sub(counted)?;
        taker_spent = taker_spent.add(counted)?;

        let maker_total = local_fills.entry(maker_hash).or_insert(Fixed::ZERO);
        *maker_total = maker_total.add(fill_base)?;

        fills.push(FillRecord {
            maker: maker.trader,
            maker_hash,
            base: fill_base,
            quote: fill_quote,
            taker_fee,
            maker_fee,
            maker_rebate,
            taker_gas,
            maker_gas,
        });
    }

    if fills.is_empty() {
        return Err(MatchError::NoFills);
    }

    let mut filled_updates = vec![(taker_hash, taker_filled.add(taker_spent)?)];
    let mut seen: HashSet<OrderHash> = HashSet::new();
    for maker in makers {
        let hash = maker.hash();
        if let Some(delta) = local_fills.get(&hash) {
            if seen.insert(hash) {
                filled_updates.push((hash, tracker.filled_amount(&hash).add(*delta)?));
            }
        }
    }

    Ok(MatchPlan {
        staged,
        taker_hash,
        fills,
        filled_updates,
    })
}
