//! Stress tests
//!
//! These tests push the engine through extreme conditions: cascading
//! liquidations across a crash, a decade of compounding interest and
//! auctions worked in many tiny fills or left far past their ramp.

use margin_core::*;

const WETH: AssetId = AssetId(1);
const USDT: AssetId = AssetId(2);
const ETH_USDT: MarketId = MarketId(0);

const LENDER: UserId = UserId(1);
const KEEPER: UserId = UserId(2);
const TREASURY: UserId = UserId(3);
const INITIATOR: UserId = UserId(4);

fn milli(n: u128) -> Fixed {
    Fixed::from_raw(n * BASE / 1000)
}

fn loose_guard() -> FeedGuard {
    FeedGuard {
        max_change_rate: Fixed::from_int(1000),
        expire_after: 1_000_000_000,
        ..FeedGuard::default()
    }
}

fn setup_engine(model: fn() -> Box<dyn InterestRateModel>) -> Engine {
    let mut engine = Engine::new(EngineConfig::default());
    engine
        .register_asset(
            Asset::new(WETH, "WETH", 18).unwrap(),
            model(),
            Fixed::from_int(200),
            loose_guard(),
        )
        .unwrap();
    engine
        .register_asset(
            Asset::new(USDT, "USDT", 6).unwrap(),
            model(),
            Fixed::ONE,
            loose_guard(),
        )
        .unwrap();
    engine.create_market(ETH_USDT, WETH, USDT).unwrap();
    engine
}

fn flat_ten() -> Box<dyn InterestRateModel> {
    Box::new(FlatModel(Fixed::percent(10)))
}

fn two_slope() -> Box<dyn InterestRateModel> {
    Box::new(TwoSlopeModel::default())
}

/// Open a position: collateralize WETH, borrow USDT and move the proceeds
/// out so the debt is genuinely unbacked by its own asset.
fn open_position(engine: &mut Engine, user: UserId, weth: u64, debt: Fixed) {
    engine.deposit(user, WETH, Fixed::from_int(weth)).unwrap();
    engine
        .transfer(
            user,
            WETH,
            BalancePath::common(user),
            BalancePath::collateral(user, ETH_USDT),
            Fixed::from_int(weth),
        )
        .unwrap();
    engine.borrow(user, ETH_USDT, USDT, debt).unwrap();
    engine
        .transfer(
            user,
            USDT,
            BalancePath::collateral(user, ETH_USDT),
            BalancePath::common(user),
            debt,
        )
        .unwrap();
}

mod cascade_tests {
    use super::*;

    /// A staged crash liquidates a ladder of 20 borrowers across several
    /// steps. Every auction clears, every account recovers and custody
    /// balances to the raw digit throughout.
    #[test]
    fn liquidation_cascade_keeps_custody_balanced() {
        let mut engine = setup_engine(flat_ten);
        engine.deposit(LENDER, USDT, Fixed::from_int(200_000)).unwrap();
        engine.supply(LENDER, USDT, Fixed::from_int(200_000)).unwrap();
        engine.deposit(TREASURY, USDT, Fixed::from_int(300)).unwrap();
        engine
            .fund_insurance(TREASURY, USDT, Fixed::from_int(300))
            .unwrap();
        engine.deposit(KEEPER, USDT, Fixed::from_int(30_000)).unwrap();

        let borrowers: Vec<UserId> = (0..20).map(|i| UserId(100 + i)).collect();
        for (i, &user) in borrowers.iter().enumerate() {
            let debt = Fixed::from_int(800 + 40 * i as u64);
            open_position(&mut engine, user, 10, debt);
        }

        let steps = [150u64, 95, 60];
        let mut total_liquidations = 0usize;
        let mut auctions_filled = 0usize;
        let mut insurance_used_total = Fixed::ZERO;
        let mut socialized_total = Fixed::ZERO;

        for price in steps {
            engine.set_price(WETH, Fixed::from_int(price)).unwrap();

            let candidates = engine.liquidation_candidates(ETH_USDT).unwrap();
            let mut opened = Vec::new();
            for user in candidates {
                let outcome = engine.liquidate_account(KEEPER, user, ETH_USDT).unwrap();
                opened.extend(outcome.auction);
                total_liquidations += 1;
            }

            engine.advance_blocks(30);
            for auction_id in opened {
                let fill = engine
                    .fill_auction(KEEPER, auction_id, Fixed::from_int(2_000))
                    .unwrap();
                assert!(fill.finished);
                assert_eq!(fill.unbacked_loss, Fixed::ZERO);
                insurance_used_total = insurance_used_total.add(fill.insurance_used).unwrap();
                socialized_total = socialized_total.add(fill.socialized_loss).unwrap();
                auctions_filled += 1;
            }

            assert!(engine.audit(WETH).unwrap().balanced());
            assert!(engine.audit(USDT).unwrap().balanced());
        }

        assert_eq!(total_liquidations, 20);
        assert_eq!(auctions_filled, 20);
        for &user in &borrowers {
            assert_eq!(engine.status(user, ETH_USDT), AccountStatus::Normal);
        }

        let pool = engine.pool(USDT).unwrap();
        assert!(pool.total_borrow_real().unwrap().is_zero());
        // the deepest fills drained the insurance and spilled into the pool
        assert_eq!(insurance_used_total, Fixed::from_int(300));
        assert!(pool.insurance_balance().is_zero());
        assert!(!socialized_total.is_zero());
        // the lender ate exactly the socialized part, nothing more
        assert_eq!(
            pool.supply_real(LENDER).unwrap(),
            Fixed::from_int(200_000).sub(socialized_total).unwrap()
        );
    }
}

mod compounding_tests {
    use super::*;

    /// Ten years of quarterly accrual under the kinked rate model: indices
    /// climb monotonically, custody stays balanced and at the end the whole
    /// pool unwinds to exactly cash-equals-insurance.
    #[test]
    fn decade_of_compounding_unwinds_exactly() {
        let mut engine = setup_engine(two_slope);
        engine.deposit(LENDER, USDT, Fixed::from_int(50_000)).unwrap();
        engine.supply(LENDER, USDT, Fixed::from_int(50_000)).unwrap();

        engine.deposit(KEEPER, WETH, Fixed::from_int(100)).unwrap();
        engine
            .transfer(
                KEEPER,
                WETH,
                BalancePath::common(KEEPER),
                BalancePath::collateral(KEEPER, ETH_USDT),
                Fixed::from_int(100),
            )
            .unwrap();
        engine
            .borrow(KEEPER, ETH_USDT, USDT, Fixed::from_int(10_000))
            .unwrap();

        let mut last_borrow_index = Fixed::ONE;
        for _ in 0..40 {
            engine.advance_time(SECONDS_PER_YEAR / 4);
            // any debt-aware query brings the pools current
            engine.account_details(KEEPER, ETH_USDT).unwrap();

            let pool = engine.pool(USDT).unwrap();
            assert!(pool.borrow_index() >= last_borrow_index);
            last_borrow_index = pool.borrow_index();
            assert!(engine.audit(USDT).unwrap().balanced());
        }

        let pool = engine.pool(USDT).unwrap();
        assert!(pool.borrow_index() > pool.supply_index());
        assert!(pool.supply_index() > Fixed::ONE);

        // settle everything: the debt plus a funding top-up, then the lender
        engine.deposit(KEEPER, USDT, Fixed::from_int(30_000)).unwrap();
        engine
            .transfer(
                KEEPER,
                USDT,
                BalancePath::common(KEEPER),
                BalancePath::collateral(KEEPER, ETH_USDT),
                Fixed::from_int(30_000),
            )
            .unwrap();
        let paid = engine
            .repay(KEEPER, ETH_USDT, USDT, Fixed::from_int(1_000_000))
            .unwrap();
        assert!(paid > Fixed::from_int(10_000));

        let taken = engine
            .unsupply(LENDER, USDT, Fixed::from_int(1_000_000))
            .unwrap();
        assert!(taken > Fixed::from_int(50_000));

        let pool = engine.pool(USDT).unwrap();
        assert!(pool.total_borrow_real().unwrap().is_zero());
        assert!(pool.total_supply_real().unwrap().is_zero());
        assert_eq!(pool.cash(), pool.insurance_balance());
        assert!(engine.audit(USDT).unwrap().balanced());
    }

    /// Accrual is anchored to the clock: querying twice at one timestamp
    /// must not double-charge interest.
    #[test]
    fn accrual_is_idempotent_within_a_timestamp() {
        let mut engine = setup_engine(flat_ten);
        engine.deposit(LENDER, USDT, Fixed::from_int(5_000)).unwrap();
        engine.supply(LENDER, USDT, Fixed::from_int(5_000)).unwrap();
        open_position(&mut engine, KEEPER, 10, Fixed::from_int(500));

        engine.advance_time(SECONDS_PER_YEAR);
        let first = engine.account_details(KEEPER, ETH_USDT).unwrap();
        let second = engine.account_details(KEEPER, ETH_USDT).unwrap();
        assert_eq!(first.debts_usd, second.debts_usd);
        assert_eq!(
            engine.pool(USDT).unwrap().borrow_index(),
            Fixed::from_raw(11 * BASE / 10)
        );
    }
}

mod auction_tests {
    use super::*;

    /// The discount ramp stops at the bad-debt cap no matter how long an
    /// auction is ignored.
    #[test]
    fn neglected_auction_ratio_stops_at_the_cap() {
        let mut engine = setup_engine(flat_ten);
        engine.deposit(LENDER, USDT, Fixed::from_int(5_000)).unwrap();
        engine.supply(LENDER, USDT, Fixed::from_int(5_000)).unwrap();
        engine.deposit(TREASURY, USDT, Fixed::from_int(3_000)).unwrap();
        engine
            .fund_insurance(TREASURY, USDT, Fixed::from_int(3_000))
            .unwrap();
        open_position(&mut engine, KEEPER, 10, Fixed::from_int(1_000));

        engine.set_price(WETH, Fixed::from_int(100)).unwrap();
        let auction_id = engine
            .liquidate_account(INITIATOR, KEEPER, ETH_USDT)
            .unwrap()
            .auction
            .unwrap();

        engine.advance_blocks(10_000);
        assert_eq!(engine.auction_ratio(auction_id).unwrap(), milli(1_200));

        let fill = engine
            .fill_auction(KEEPER, auction_id, Fixed::from_int(1_000))
            .unwrap();
        assert!(fill.finished);
        assert_eq!(fill.ratio, milli(1_200));
        // 1200 owed against 1000 of collateral: insurance absorbs the gap
        assert_eq!(fill.insurance_used, Fixed::from_int(200));
        assert_eq!(fill.unbacked_loss, Fixed::ZERO);
        assert!(engine.audit(USDT).unwrap().balanced());
        assert!(engine.audit(WETH).unwrap().balanced());
    }

    /// A patient filler can work an auction in a hundred slivers and end up
    /// in exactly the place a single fill would have reached.
    #[test]
    fn tiny_fills_march_an_auction_to_completion() {
        let mut engine = setup_engine(flat_ten);
        engine.deposit(LENDER, USDT, Fixed::from_int(5_000)).unwrap();
        engine.supply(LENDER, USDT, Fixed::from_int(5_000)).unwrap();
        engine.deposit(KEEPER, USDT, Fixed::from_int(1_000)).unwrap();
        open_position(&mut engine, UserId(50), 10, Fixed::from_int(1_000));

        engine.set_price(WETH, Fixed::from_int(100)).unwrap();
        let auction_id = engine
            .liquidate_account(INITIATOR, UserId(50), ETH_USDT)
            .unwrap()
            .auction
            .unwrap();

        for step in 1..=100u64 {
            let fill = engine
                .fill_auction(KEEPER, auction_id, Fixed::from_int(10))
                .unwrap();
            assert_eq!(fill.debt_filled, Fixed::from_int(10));
            assert_eq!(fill.finished, step == 100);
        }
        let extra = engine.fill_auction(KEEPER, auction_id, Fixed::from_int(10));
        assert!(matches!(
            extra,
            Err(EngineError::Auction(AuctionError::AlreadyFinished(_)))
        ));

        // 100 fills at ratio 0.5 bought 5 WETH for 1000; the initiator's
        // one percent came out of every sliver
        let weth = |user: UserId| engine.balance(WETH, BalancePath::common(user));
        assert_eq!(weth(KEEPER), milli(4_950));
        assert_eq!(weth(INITIATOR), milli(50));
        assert_eq!(
            engine.balance(WETH, BalancePath::collateral(UserId(50), ETH_USDT)),
            Fixed::from_int(5)
        );
        assert_eq!(engine.status(UserId(50), ETH_USDT), AccountStatus::Normal);
        assert_eq!(engine.balance(USDT, BalancePath::common(KEEPER)), Fixed::ZERO);
        assert!(engine.audit(WETH).unwrap().balanced());
        assert!(engine.audit(USDT).unwrap().balanced());
    }
}

mod load_tests {
    use super::*;

    /// The event log is a ring: old entries fall off at the configured cap
    /// and the recent slice always serves the newest entries.
    #[test]
    fn event_log_stays_bounded_under_load() {
        let mut engine = Engine::new(EngineConfig {
            max_events: 50,
            ..EngineConfig::default()
        });
        engine
            .register_asset(
                Asset::new(USDT, "USDT", 6).unwrap(),
                flat_ten(),
                Fixed::ONE,
                loose_guard(),
            )
            .unwrap();

        for i in 0..200u64 {
            engine.deposit(UserId(1), USDT, Fixed::from_int(1 + i)).unwrap();
        }

        assert_eq!(engine.events().len(), 50);
        let recent = engine.recent_events(10);
        assert_eq!(recent.len(), 10);
        // the newest deposit is the last entry
        match &recent[9].payload {
            EventPayload::Deposited(event) => {
                assert_eq!(event.amount, Fixed::from_int(200));
            }
            other => panic!("unexpected tail event {other:?}"),
        }
    }
}
