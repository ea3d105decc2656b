//! Deposits, withdrawals and path-to-path transfers.
//!
//! External funds enter and leave through a user's Common balance. Moves
//! into a collateral account are unrestricted; moves out are capped by the
//! health evaluator's transferable amount, and a collateral account under
//! auction is frozen in both directions.

use super::core::Engine;
use super::results::EngineError;
use crate::asset::AssetError;
use crate::balances::BalancePath;
use crate::collateral::{AccountStatus, HealthEvaluator};
use crate::events::{DepositedEvent, EventPayload, TransferredEvent, WithdrawnEvent};
use crate::math::Fixed;
use crate::types::{AssetId, UserId};

impl Engine {
    /// External funds entering custody, landing on the Common path.
    pub fn deposit(
        &mut self,
        user: UserId,
        asset_id: AssetId,
        amount: Fixed,
    ) -> Result<(), EngineError> {
        if !self.assets.contains_key(&asset_id) {
            return Err(AssetError::NotFound(asset_id).into());
        }
        let path = BalancePath::common(user);
        // tokens may only arrive once the credit is certain to succeed
        self.ledger.check_deposit(asset_id, path, amount)?;
        self.custody.transfer_in(user, asset_id, amount)?;
        self.ledger.deposit(asset_id, path, amount)?;
        let new_balance = self.ledger.balance_of(asset_id, path);

        self.emit_event(EventPayload::Deposited(DepositedEvent {
            asset: asset_id,
            path,
            amount,
            new_balance,
        }));
        Ok(())
    }

    /// Custodied funds leaving the system, from the Common path. Collateral
    /// funds must be transferred out first, which applies the health gate.
    pub fn withdraw(
        &mut self,
        user: UserId,
        asset_id: AssetId,
        amount: Fixed,
    ) -> Result<(), EngineError> {
        if !self.assets.contains_key(&asset_id) {
            return Err(AssetError::NotFound(asset_id).into());
        }
        let path = BalancePath::common(user);
        // tokens may only leave once the debit is certain to succeed
        self.ledger.check_withdraw(asset_id, path, amount)?;
        self.custody.transfer_out(user, asset_id, amount)?;
        self.ledger.withdraw(asset_id, path, amount)?;
        let new_balance = self.ledger.balance_of(asset_id, path);

        self.emit_event(EventPayload::Withdrawn(WithdrawnEvent {
            asset: asset_id,
            path,
            amount,
            new_balance,
        }));
        Ok(())
    }

    /// Move funds between two of `user`'s own paths.
    pub fn transfer(
        &mut self,
        user: UserId,
        asset_id: AssetId,
        from: BalancePath,
        to: BalancePath,
        amount: Fixed,
    ) -> Result<(), EngineError> {
        for path in [from, to] {
            if path.user() != user {
                return Err(EngineError::PathOwnerMismatch { user, path });
            }
            if let Some(market_id) = path.market() {
                self.market_ref(market_id)?;
                if self.status(user, market_id) == AccountStatus::Liquidating {
                    return Err(EngineError::LiquidatingAccount { path });
                }
            }
        }
        if !self.assets.contains_key(&asset_id) {
            return Err(AssetError::NotFound(asset_id).into());
        }

        if let Some(market_id) = from.market() {
            self.accrue_market_pools(market_id)?;
            let market = self.market_ref(market_id)?;
            let evaluator = HealthEvaluator {
                market,
                assets: &self.assets,
                pools: &self.pools,
                oracle: &self.oracle,
                now: self.current_time,
            };
            let transferable = evaluator.transferable_amount(&self.ledger, user, asset_id)?;
            if amount > transferable {
                return Err(EngineError::TransferableAmountNotEnough {
                    path: from,
                    asset: asset_id,
                    requested: amount,
                    transferable,
                });
            }
        }

        self.ledger.transfer(asset_id, from, to, amount)?;
        self.emit_event(EventPayload::Transferred(TransferredEvent {
            asset: asset_id,
            from,
            to,
            amount,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::balances::LedgerError;
    use crate::custody::{TokenTransfer, TransferError};
    use crate::engine::EngineConfig;
    use crate::interest::FlatModel;
    use crate::oracle::FeedGuard;
    use crate::types::MarketId;
    use std::cell::RefCell;
    use std::rc::Rc;

    const WETH: AssetId = AssetId(1);
    const USDT: AssetId = AssetId(2);
    const ALICE: UserId = UserId(1);
    const LENDER: UserId = UserId(2);

    fn setup_engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        engine
            .register_asset(
                Asset::new(WETH, "WETH", 18).unwrap(),
                Box::new(FlatModel(Fixed::percent(5))),
                Fixed::from_int(200),
                FeedGuard::default(),
            )
            .unwrap();
        engine
            .register_asset(
                Asset::new(USDT, "USDT", 6).unwrap(),
                Box::new(FlatModel(Fixed::percent(5))),
                Fixed::ONE,
                FeedGuard::default(),
            )
            .unwrap();
        engine.create_market(MarketId(0), WETH, USDT).unwrap();
        engine
    }

    #[test]
    fn deposit_withdraw_round_trip() {
        let mut engine = setup_engine();
        engine.deposit(ALICE, USDT, Fixed::from_int(100)).unwrap();
        engine.withdraw(ALICE, USDT, Fixed::from_int(30)).unwrap();

        assert_eq!(
            engine.ledger.balance_of(USDT, BalancePath::common(ALICE)),
            Fixed::from_int(70)
        );
        assert!(engine.audit(USDT).unwrap().balanced());

        let result = engine.withdraw(ALICE, USDT, Fixed::from_int(100));
        assert!(matches!(
            result,
            Err(EngineError::Ledger(LedgerError::InsufficientBalance { .. }))
        ));
    }

    #[derive(Debug)]
    struct ClosedGate;

    impl TokenTransfer for ClosedGate {
        fn transfer_in(
            &mut self,
            user: UserId,
            asset: AssetId,
            amount: Fixed,
        ) -> Result<(), TransferError> {
            Err(TransferError::Refused {
                user,
                asset,
                amount,
                reason: "gate closed".to_string(),
            })
        }

        fn transfer_out(
            &mut self,
            user: UserId,
            asset: AssetId,
            amount: Fixed,
        ) -> Result<(), TransferError> {
            Err(TransferError::Refused {
                user,
                asset,
                amount,
                reason: "gate closed".to_string(),
            })
        }
    }

    #[test]
    fn refused_custody_leaves_state_untouched() {
        let mut engine = setup_engine();
        engine.deposit(ALICE, USDT, Fixed::from_int(100)).unwrap();

        engine.set_token_transfer(Box::new(ClosedGate));
        let result = engine.deposit(ALICE, USDT, Fixed::ONE);
        assert!(matches!(result, Err(EngineError::Transfer(_))));
        let result = engine.withdraw(ALICE, USDT, Fixed::ONE);
        assert!(matches!(result, Err(EngineError::Transfer(_))));

        assert_eq!(
            engine.ledger.balance_of(USDT, BalancePath::common(ALICE)),
            Fixed::from_int(100)
        );
        assert!(engine.audit(USDT).unwrap().balanced());
    }

    #[derive(Debug)]
    struct CountingGate(Rc<RefCell<u32>>);

    impl TokenTransfer for CountingGate {
        fn transfer_in(
            &mut self,
            _user: UserId,
            _asset: AssetId,
            _amount: Fixed,
        ) -> Result<(), TransferError> {
            *self.0.borrow_mut() += 1;
            Ok(())
        }

        fn transfer_out(
            &mut self,
            _user: UserId,
            _asset: AssetId,
            _amount: Fixed,
        ) -> Result<(), TransferError> {
            *self.0.borrow_mut() += 1;
            Ok(())
        }
    }

    #[test]
    fn ledger_ceiling_blocks_before_custody_moves() {
        let mut engine = setup_engine();
        let moves = Rc::new(RefCell::new(0u32));
        engine.set_token_transfer(Box::new(CountingGate(Rc::clone(&moves))));

        let max = Fixed::from_raw(u128::MAX);
        engine.deposit(ALICE, USDT, max).unwrap();
        engine.withdraw(ALICE, USDT, max).unwrap();
        assert_eq!(*moves.borrow(), 2);

        // both lifetime counters sit at the ceiling; neither attempt may
        // reach custody
        let result = engine.deposit(ALICE, USDT, Fixed::from_raw(1));
        assert!(matches!(
            result,
            Err(EngineError::Ledger(LedgerError::Math(_)))
        ));

        engine
            .ledger
            .credit(USDT, BalancePath::common(ALICE), Fixed::from_raw(1))
            .unwrap();
        let result = engine.withdraw(ALICE, USDT, Fixed::from_raw(1));
        assert!(matches!(
            result,
            Err(EngineError::Ledger(LedgerError::Math(_)))
        ));
        assert_eq!(*moves.borrow(), 2);
    }

    #[test]
    fn unknown_asset_rejected() {
        let mut engine = setup_engine();
        let result = engine.deposit(ALICE, AssetId(9), Fixed::ONE);
        assert_eq!(result, Err(EngineError::Asset(AssetError::NotFound(AssetId(9)))));
    }

    #[test]
    fn transfer_requires_path_ownership() {
        let mut engine = setup_engine();
        engine.deposit(ALICE, USDT, Fixed::from_int(10)).unwrap();

        let foreign = BalancePath::common(UserId(99));
        let result = engine.transfer(
            ALICE,
            USDT,
            BalancePath::common(ALICE),
            foreign,
            Fixed::ONE,
        );
        assert_eq!(
            result,
            Err(EngineError::PathOwnerMismatch {
                user: ALICE,
                path: foreign
            })
        );
    }

    #[test]
    fn collateral_exit_honors_withdraw_threshold() {
        let mut engine = setup_engine();
        let collateral = BalancePath::collateral(ALICE, MarketId(0));

        engine.deposit(LENDER, USDT, Fixed::from_int(1000)).unwrap();
        engine.supply(LENDER, USDT, Fixed::from_int(1000)).unwrap();

        engine.deposit(ALICE, WETH, Fixed::from_int(2)).unwrap();
        engine
            .transfer(
                ALICE,
                WETH,
                BalancePath::common(ALICE),
                collateral,
                Fixed::from_int(2),
            )
            .unwrap();
        engine
            .borrow(ALICE, MarketId(0), USDT, Fixed::from_int(100))
            .unwrap();

        // collateral value 400 + 100 borrowed; 120 must stay, so at most
        // 380 / 200 = 1.9 WETH may leave
        let result = engine.transfer(
            ALICE,
            WETH,
            collateral,
            BalancePath::common(ALICE),
            Fixed::percent(195),
        );
        assert!(matches!(
            result,
            Err(EngineError::TransferableAmountNotEnough { .. })
        ));

        engine
            .transfer(
                ALICE,
                WETH,
                collateral,
                BalancePath::common(ALICE),
                Fixed::percent(190),
            )
            .unwrap();
        assert_eq!(
            engine.ledger.balance_of(WETH, collateral),
            Fixed::percent(10)
        );
    }

    #[test]
    fn liquidating_account_is_frozen_both_ways() {
        let mut engine = setup_engine();
        let collateral = BalancePath::collateral(ALICE, MarketId(0));
        engine.deposit(ALICE, WETH, Fixed::from_int(2)).unwrap();
        engine
            .transfer(
                ALICE,
                WETH,
                BalancePath::common(ALICE),
                collateral,
                Fixed::from_int(1),
            )
            .unwrap();

        engine.set_status(ALICE, MarketId(0), AccountStatus::Liquidating);

        let result = engine.transfer(
            ALICE,
            WETH,
            collateral,
            BalancePath::common(ALICE),
            Fixed::percent(50),
        );
        assert_eq!(
            result,
            Err(EngineError::LiquidatingAccount { path: collateral })
        );

        let result = engine.transfer(
            ALICE,
            WETH,
            BalancePath::common(ALICE),
            collateral,
            Fixed::percent(50),
        );
        assert_eq!(
            result,
            Err(EngineError::LiquidatingAccount { path: collateral })
        );
    }
}
