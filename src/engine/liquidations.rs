//! Account liquidation and the auctions that work off residual debt.
//!
//! Liquidation freezes the collateral account, pays what same-asset balances
//! can cover, and puts the rest up for auction. The escrow never leaves the
//! account's collateral path; the Liquidating status blocks every other way
//! in or out, so `fill_auction` is the only thing that moves it. A finished
//! auction either hands the account back or rolls into the next one when
//! debt remains in the other asset.

use super::core::Engine;
use super::results::{AuctionFillOutcome, EngineError, LiquidationOutcome};
use crate::auction::{Auction, AuctionError};
use crate::balances::BalancePath;
use crate::collateral::{AccountStatus, HealthEvaluator};
use crate::events::{
    AccountLiquidatedEvent, AuctionCreatedEvent, AuctionFilledEvent, AuctionFinishedEvent,
    EventPayload, RepaidEvent,
};
use crate::math::Fixed;
use crate::oracle::PriceOracle;
use crate::types::{AssetId, AuctionId, MarketId, UserId};

impl Engine {
    /// Seize an unhealthy margin account. Debts covered by same-asset
    /// balances are repaid on the spot; residual debt opens an auction and
    /// the account stays frozen until the last auction clears.
    pub fn liquidate_account(
        &mut self,
        initiator: UserId,
        user: UserId,
        market_id: MarketId,
    ) -> Result<LiquidationOutcome, EngineError> {
        let (base, quote) = {
            let market = self.market_ref(market_id)?;
            (market.base_asset, market.quote_asset)
        };
        let path = BalancePath::collateral(user, market_id);
        if self.status(user, market_id) == AccountStatus::Liquidating {
            return Err(EngineError::LiquidatingAccount { path });
        }
        self.accrue_market_pools(market_id)?;

        {
            let market = self.market_ref(market_id)?;
            let evaluator = HealthEvaluator {
                market,
                assets: &self.assets,
                pools: &self.pools,
                oracle: &self.oracle,
                now: self.current_time,
            };
            let details = evaluator.account_details(&self.ledger, user, AccountStatus::Normal)?;
            if !details.liquidatable {
                return Err(EngineError::AccountNotLiquidatable {
                    user,
                    market: market_id,
                });
            }
        }
        self.set_status(user, market_id, AccountStatus::Liquidating);

        // settle what the frozen account can pay directly, base asset first
        let mut repaid = Vec::new();
        for asset_id in [base, quote] {
            let owed = self.pool_ref(asset_id)?.debt_real(user, market_id)?;
            let held = self.ledger.balance_of(asset_id, path);
            let pay = owed.min(held);
            if pay.is_zero() {
                continue;
            }
            self.ledger.debit(asset_id, path, pay)?;
            let pool = self.pool_mut(asset_id)?;
            let paid = pool.remove_debt(user, market_id, pay)?;
            self.emit_event(EventPayload::Repaid(RepaidEvent {
                asset: asset_id,
                user,
                market: market_id,
                amount: paid,
            }));
            repaid.push((asset_id, paid));
        }

        let auction = self.next_auction_for(user, market_id, initiator)?;
        if auction.is_none() {
            self.set_status(user, market_id, AccountStatus::Normal);
        }
        self.emit_event(EventPayload::AccountLiquidated(AccountLiquidatedEvent {
            user,
            market: market_id,
            auction,
        }));
        Ok(LiquidationOutcome {
            user,
            market: market_id,
            repaid,
            auction,
        })
    }

    /// Repay part of an auction's debt in exchange for discounted escrow
    /// collateral. Shortfalls beyond the escrow are compensated from the
    /// insurance reserve, then socialized across suppliers; whatever neither
    /// covers stays with the filler as an unbacked loss.
    pub fn fill_auction(
        &mut self,
        filler: UserId,
        auction_id: AuctionId,
        debt_offered: Fixed,
    ) -> Result<AuctionFillOutcome, EngineError> {
        let (user, market_id, initiator, debt_asset, collateral_asset) = {
            let auction = self
                .auctions
                .get(&auction_id)
                .ok_or(AuctionError::NotFound(auction_id))?;
            if auction.finished {
                return Err(AuctionError::AlreadyFinished(auction_id).into());
            }
            (
                auction.user,
                auction.market,
                auction.initiator,
                auction.debt_asset,
                auction.collateral_asset,
            )
        };
        self.accrue_pool(debt_asset)?;

        let debt_price = self.oracle.price(debt_asset, self.current_time)?;
        let collateral_price = self.oracle.price(collateral_asset, self.current_time)?;
        let real_debt = self.pool_ref(debt_asset)?.debt_real(user, market_id)?;
        let block = self.current_block;

        let plan = {
            let auction = self
                .auctions
                .get_mut(&auction_id)
                .ok_or(AuctionError::NotFound(auction_id))?;
            // interest accrued since creation lands on the auction first
            auction.left_debt = real_debt;
            auction.plan_fill(debt_offered, debt_price, collateral_price, block)?
        };

        // the filler's payment is the only move that can run out of funds;
        // everything after it settles from balances this fill just created
        self.ledger
            .debit(debt_asset, BalancePath::common(filler), plan.usable)?;
        let pool = self.pool_mut(debt_asset)?;
        pool.remove_debt(user, market_id, plan.usable)?;

        let escrow = BalancePath::collateral(user, market_id);
        self.ledger.transfer(
            collateral_asset,
            escrow,
            BalancePath::common(filler),
            plan.filler_collateral,
        )?;
        self.ledger.transfer(
            collateral_asset,
            escrow,
            BalancePath::common(initiator),
            plan.initiator_reward,
        )?;

        let (insurance_used, socialized_loss, unbacked_loss) = if plan.subsidy.is_zero() {
            (Fixed::ZERO, Fixed::ZERO, Fixed::ZERO)
        } else {
            let pool = self.pool_mut(debt_asset)?;
            let insurance_used = pool.pay_from_insurance(plan.subsidy)?;
            let remaining = plan.subsidy.sub(insurance_used)?;
            let socialized = pool.socialize_loss(remaining)?;
            let unbacked = remaining.sub(socialized)?;
            let covered = insurance_used.add(socialized)?;
            if !covered.is_zero() {
                self.ledger
                    .credit(debt_asset, BalancePath::common(filler), covered)?;
            }
            (insurance_used, socialized, unbacked)
        };

        let finished = {
            let auction = self
                .auctions
                .get_mut(&auction_id)
                .ok_or(AuctionError::NotFound(auction_id))?;
            auction.record_fill(&plan)?;
            auction.finished
        };

        self.emit_event(EventPayload::AuctionFilled(AuctionFilledEvent {
            auction: auction_id,
            filler,
            debt_filled: plan.usable,
            collateral_out: plan.collateral_out,
            insurance_used,
            socialized_loss,
            unbacked_loss,
        }));
        if finished {
            self.emit_event(EventPayload::AuctionFinished(AuctionFinishedEvent {
                auction: auction_id,
            }));
            if self.next_auction_for(user, market_id, initiator)?.is_none() {
                self.set_status(user, market_id, AccountStatus::Normal);
            }
        }

        Ok(AuctionFillOutcome {
            auction: auction_id,
            debt_filled: plan.usable,
            ratio: plan.ratio,
            collateral_to_filler: plan.filler_collateral,
            initiator_reward: plan.initiator_reward,
            insurance_used,
            socialized_loss,
            unbacked_loss,
            finished,
        })
    }

    /// Open an auction for the user's largest residual debt, collateralized
    /// by whatever sits in the counter asset. `None` means the account is
    /// debt-free.
    fn next_auction_for(
        &mut self,
        user: UserId,
        market_id: MarketId,
        initiator: UserId,
    ) -> Result<Option<AuctionId>, EngineError> {
        let (base, quote, ratio_start, ratio_per_block, max_bad_debt_ratio, reward_ratio) = {
            let market = self.market_ref(market_id)?;
            (
                market.base_asset,
                market.quote_asset,
                market.auction_ratio_start,
                market.auction_ratio_per_block,
                market.max_bad_debt_ratio,
                market.initiator_reward_ratio,
            )
        };

        let mut worst: Option<(AssetId, Fixed, Fixed)> = None;
        for asset_id in [base, quote] {
            let debt = self.pool_ref(asset_id)?.debt_real(user, market_id)?;
            if debt.is_zero() {
                continue;
            }
            let price = self.oracle.price(asset_id, self.current_time)?;
            let value = debt.mul_ceil(price)?;
            if worst.map_or(true, |(_, _, top)| value > top) {
                worst = Some((asset_id, debt, value));
            }
        }
        let (debt_asset, debt_amount) = match worst {
            Some((asset_id, debt, _)) => (asset_id, debt),
            None => return Ok(None),
        };

        let collateral_asset = if debt_asset == base { quote } else { base };
        let collateral_amount = self
            .ledger
            .balance_of(collateral_asset, BalancePath::collateral(user, market_id));

        let id = AuctionId(self.next_auction_id);
        self.next_auction_id += 1;
        let auction = Auction::new(
            id,
            user,
            market_id,
            initiator,
            debt_asset,
            collateral_asset,
            debt_amount,
            collateral_amount,
            self.current_block,
            ratio_start,
            ratio_per_block,
            max_bad_debt_ratio,
            reward_ratio,
        )?;
        self.auctions.insert(id, auction);

        self.emit_event(EventPayload::AuctionCreated(AuctionCreatedEvent {
            auction: id,
            user,
            market: market_id,
            debt_asset,
            collateral_asset,
            debt_amount,
            collateral_amount,
        }));
        Ok(Some(id))
    }
}
