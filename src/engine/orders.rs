//! Relayer-submitted order matching and cancellation.
//!
//! The engine trusts no order on arrival: signatures are checked against the
//! configured verifier, the match is staged against a snapshot of the ledger,
//! and every collateral account the settlement touches must come out healthy.
//! Only then does the plan commit, in one shot.

use super::core::Engine;
use super::results::{EngineError, MatchOutcome};
use crate::balances::BalancePath;
use crate::collateral::{AccountStatus, HealthEvaluator};
use crate::events::{EventPayload, OrderCancelledEvent, OrderMatchedEvent};
use crate::matching::{plan_match, MatchContext, MatchPlan};
use crate::math::Fixed;
use crate::order::Order;
use crate::signature::OrderSignature;
use crate::types::UserId;
use std::collections::HashSet;

/// Order plus the trader's authorization, as submitted by the relayer.
#[derive(Debug, Clone)]
pub struct SignedOrder {
    pub order: Order,
    pub signature: OrderSignature,
}

impl Engine {
    /// Settle one taker against a run of makers at the relayer's chosen fill
    /// amounts. All-or-nothing: a bad signature, an unfillable order or an
    /// unhealthy post-match account rejects the whole batch.
    pub fn match_orders(
        &mut self,
        relayer: UserId,
        taker: &SignedOrder,
        makers: &[SignedOrder],
        fill_amounts: &[Fixed],
    ) -> Result<MatchOutcome, EngineError> {
        let market_id = taker.order.market;
        self.market_ref(market_id)?;

        self.verifier
            .verify(taker.order.trader, &taker.order.hash(), &taker.signature)?;
        for maker in makers {
            self.verifier
                .verify(maker.order.trader, &maker.order.hash(), &maker.signature)?;
        }

        self.accrue_market_pools(market_id)?;

        let liquidating: HashSet<BalancePath> = self
            .statuses
            .iter()
            .filter(|((_, market), status)| {
                *market == market_id && **status == AccountStatus::Liquidating
            })
            .map(|((user, market), _)| BalancePath::collateral(*user, *market))
            .collect();
        let maker_orders: Vec<Order> = makers.iter().map(|m| m.order.clone()).collect();

        let market = self.market_ref(market_id)?;
        let ctx = MatchContext {
            market,
            discount: &self.discount,
            relayer,
            now: self.current_time,
        };
        let plan = plan_match(
            &self.ledger,
            &self.tracker,
            ctx,
            &taker.order,
            &maker_orders,
            fill_amounts,
            &liquidating,
        )?;

        // Margin accounts must still hold up once the staged moves land.
        let evaluator = HealthEvaluator {
            market,
            assets: &self.assets,
            pools: &self.pools,
            oracle: &self.oracle,
            now: self.current_time,
        };
        for path in plan.staged.touched_collateral_paths() {
            let user = path.user();
            let status = self.status(user, market_id);
            let details = evaluator.account_details(&plan.staged, user, status)?;
            if details.liquidatable {
                return Err(EngineError::AccountLiquidatable {
                    user,
                    market: market_id,
                });
            }
        }

        let MatchPlan {
            staged,
            taker_hash,
            fills,
            filled_updates,
        } = plan;
        let moves = staged.into_moves();
        let (taker_user, taker_side) = (taker.order.trader, taker.order.side);

        self.ledger.apply(moves)?;
        for (hash, new_total) in filled_updates {
            self.tracker.record(hash, new_total);
        }
        for fill in &fills {
            self.emit_event(EventPayload::OrderMatched(OrderMatchedEvent {
                market: market_id,
                taker_hash,
                maker_hash: fill.maker_hash,
                taker: taker_user,
                maker: fill.maker,
                taker_side,
                base: fill.base,
                quote: fill.quote,
                taker_fee: fill.taker_fee,
                maker_fee: fill.maker_fee,
                maker_rebate: fill.maker_rebate,
            }));
        }
        Ok(MatchOutcome { taker_hash, fills })
    }

    /// Flag an order as dead. Only its trader may cancel; the filled counter
    /// stays where it is and repeat cancels are no-ops.
    pub fn cancel_order(&mut self, user: UserId, order: &Order) -> Result<(), EngineError> {
        let hash = order.hash();
        if order.trader != user {
            return Err(EngineError::NotOrderOwner { hash, user });
        }
        if !self.tracker.is_cancelled(&hash) {
            self.tracker.cancel(hash);
            self.emit_event(EventPayload::OrderCancelled(OrderCancelledEvent {
                hash,
                trader: user,
            }));
        }
        Ok(())
    }
}
