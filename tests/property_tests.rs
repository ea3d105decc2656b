//! Property-based tests for the money math and risk primitives.
//!
//! These tests verify invariants hold under random inputs.

use margin_core::*;
use proptest::prelude::*;

// Strategies for generating test data
fn amount_strategy() -> impl Strategy<Value = Fixed> {
    (1u128..1_000_000_000u128).prop_map(|x| Fixed::from_raw(x * BASE / 1000)) // 0.001 to 1M
}

fn price_strategy() -> impl Strategy<Value = Fixed> {
    (1u128..1_000_000_000u128).prop_map(|x| Fixed::from_raw(x * BASE / 1000))
}

fn rate_strategy() -> impl Strategy<Value = Fixed> {
    (0u64..=200u64).prop_map(Fixed::percent) // 0% to 200%
}

fn auction_strategy() -> impl Strategy<Value = Auction> {
    (
        1u128..1_000_000_000u128, // debt, in milli units
        0u128..2_000_000_000u128, // collateral, in milli units
        1u64..=100u64,            // starting ratio percent
        0u64..=50u64,             // max bad debt percent
        0u64..=10u64,             // initiator reward percent
    )
        .prop_map(|(debt, collateral, start, bad_debt, reward)| {
            Auction::new(
                AuctionId(1),
                UserId(1),
                MarketId(0),
                UserId(2),
                AssetId(2),
                AssetId(1),
                Fixed::from_raw(debt * BASE / 1000),
                Fixed::from_raw(collateral * BASE / 1000),
                BlockNumber(100),
                Fixed::percent(start),
                Fixed::percent(1),
                Fixed::percent(bad_debt),
                Fixed::percent(reward),
            )
            .unwrap()
        })
}

proptest! {
    /// Floor and ceiling multiplication bracket the exact product
    #[test]
    fn mul_floor_and_ceil_bracket_the_product(
        a in amount_strategy(),
        b in rate_strategy(),
    ) {
        let floor = a.mul_floor(b).unwrap();
        let ceil = a.mul_ceil(b).unwrap();

        prop_assert!(floor <= ceil);
        prop_assert!(ceil.raw() - floor.raw() <= 1, "rounding gap above one raw unit");
    }

    /// Multiplying then dividing by the same factor never manufactures value
    #[test]
    fn mul_then_div_round_trip_is_conservative(
        a in amount_strategy(),
        b in (1u64..=200u64).prop_map(Fixed::percent),
    ) {
        let down = a.mul_floor(b).unwrap().div_floor(b).unwrap();
        let up = a.mul_ceil(b).unwrap().div_ceil(b).unwrap();

        prop_assert!(down <= a, "floor round trip grew {a} into {down}");
        prop_assert!(up >= a, "ceil round trip shrank {a} into {up}");
    }

    /// Saturating subtraction clamps at zero and is exact otherwise
    #[test]
    fn saturating_sub_clamps_at_zero(
        a in amount_strategy(),
        b in amount_strategy(),
    ) {
        let diff = a.saturating_sub(b);
        if a >= b {
            prop_assert_eq!(diff, a.sub(b).unwrap());
        } else {
            prop_assert_eq!(diff, Fixed::ZERO);
        }
    }

    /// A pro-rata share never exceeds the whole, and the full ratio is exact
    #[test]
    fn partial_floor_is_conservative(
        numerator in amount_strategy(),
        denominator in amount_strategy(),
        target in amount_strategy(),
    ) {
        prop_assume!(numerator <= denominator);

        if let Ok(part) = Fixed::partial_floor(numerator, denominator, target) {
            prop_assert!(part <= target);
        }
        prop_assert_eq!(
            Fixed::partial_floor(denominator, denominator, target).unwrap(),
            target
        );
    }

    /// Ratio comparison is exact: reflexive and antisymmetric
    #[test]
    fn ratio_cmp_is_exact(
        a in price_strategy(),
        b in price_strategy(),
        c in price_strategy(),
        d in price_strategy(),
    ) {
        prop_assert_eq!(
            Fixed::ratio_cmp(a, b, a, b).unwrap(),
            std::cmp::Ordering::Equal
        );
        prop_assert_eq!(
            Fixed::ratio_cmp(a, b, c, d).unwrap(),
            Fixed::ratio_cmp(c, d, a, b).unwrap().reverse()
        );
    }

    /// Borrow rates never fall as utilization rises
    #[test]
    fn two_slope_rate_monotone_in_utilization(
        u1 in (0u64..=150u64).prop_map(Fixed::percent),
        u2 in (0u64..=150u64).prop_map(Fixed::percent),
    ) {
        let model = TwoSlopeModel::default();
        let (low, high) = (u1.min(u2), u1.max(u2));

        prop_assert!(
            model.annual_rate(low).unwrap() <= model.annual_rate(high).unwrap(),
            "rate fell between {low} and {high}"
        );
    }

    /// Fee multipliers step down as holdings rise, never below the floor
    #[test]
    fn discount_multiplier_monotone_and_bounded(
        thresholds in prop::collection::btree_set(1u64..1_000_000u64, 1..5),
        b1 in 0u64..2_000_000u64,
        b2 in 0u64..2_000_000u64,
    ) {
        let tiers: Vec<DiscountTier> = thresholds
            .iter()
            .enumerate()
            .map(|(i, &threshold)| DiscountTier {
                min_balance: Fixed::from_int(threshold),
                // 90%, 80%, ... stepping down per tier
                multiplier: Fixed::percent(90 - 10 * i as u64),
            })
            .collect();
        let table = DiscountTable::new(AssetId(9), tiers).unwrap();

        let (low, high) = (b1.min(b2), b1.max(b2));
        let m_low = table.multiplier_for(Fixed::from_int(low));
        let m_high = table.multiplier_for(Fixed::from_int(high));

        prop_assert!(m_high <= m_low, "bigger holding got a worse multiplier");
        prop_assert!(m_high >= MIN_FEE_MULTIPLIER && m_low <= Fixed::ONE);
    }

    /// An auction's payout ratio climbs with the block height and stops at
    /// its cap
    #[test]
    fn auction_ratio_monotone_and_capped(
        auction in auction_strategy(),
        h1 in 0u64..=10_000u64,
        h2 in 0u64..=10_000u64,
    ) {
        let (low, high) = (h1.min(h2), h1.max(h2));
        let r_low = auction.ratio(BlockNumber(100 + low)).unwrap();
        let r_high = auction.ratio(BlockNumber(100 + high)).unwrap();

        prop_assert!(r_low <= r_high);
        prop_assert!(r_high <= auction.ratio_cap);
        prop_assert_eq!(
            auction.ratio(BlockNumber(100 + 1_000_000)).unwrap(),
            auction.ratio_cap
        );
    }

    /// A fill plan never spends debt or escrow that is not there
    #[test]
    fn fill_plan_never_exceeds_escrow(
        auction in auction_strategy(),
        offered in amount_strategy(),
        debt_price in price_strategy(),
        collateral_price in price_strategy(),
        blocks in 0u64..=1_000u64,
    ) {
        let block = BlockNumber(100 + blocks);
        let plan = auction
            .plan_fill(offered, debt_price, collateral_price, block)
            .unwrap();

        prop_assert_eq!(plan.usable, offered.min(auction.left_debt));
        prop_assert!(plan.collateral_out <= auction.left_collateral);
        prop_assert_eq!(
            plan.filler_collateral.add(plan.initiator_reward).unwrap(),
            plan.collateral_out
        );
        prop_assert!(plan.ratio <= auction.ratio_cap);

        let mut worked = auction.clone();
        worked.record_fill(&plan).unwrap();
        prop_assert_eq!(worked.left_debt, auction.left_debt.sub(plan.usable).unwrap());
        prop_assert_eq!(worked.finished, worked.left_debt.is_zero());
    }

    /// Supplying and redeeming an untouched pool returns exactly the deposit
    #[test]
    fn supply_then_redeem_is_exact(
        amount in amount_strategy(),
    ) {
        let mut pool = LendingPool::new(AssetId(1), Fixed::percent(10), Timestamp::from_secs(0));
        pool.add_supply(UserId(1), amount).unwrap();
        let taken = pool.remove_supply(UserId(1), Fixed::from_int(u64::MAX)).unwrap();

        prop_assert_eq!(taken, amount);
        prop_assert_eq!(pool.cash(), Fixed::ZERO);
        prop_assert_eq!(pool.supply_shares_of(UserId(1)), Fixed::ZERO);
    }

    /// Socialized losses never take more than suppliers put in, and leave
    /// the indices untouched
    #[test]
    fn socialize_loss_bounded_by_supply(
        a in amount_strategy(),
        b in amount_strategy(),
        loss in amount_strategy(),
    ) {
        let mut pool = LendingPool::new(AssetId(1), Fixed::percent(10), Timestamp::from_secs(0));
        pool.add_supply(UserId(1), a).unwrap();
        pool.add_supply(UserId(2), b).unwrap();
        let total = a.add(b).unwrap();

        let covered = pool.socialize_loss(loss).unwrap();

        prop_assert!(covered <= loss);
        prop_assert!(covered <= total);
        prop_assert_eq!(pool.supply_index(), Fixed::ONE);
        prop_assert_eq!(pool.total_supply_real().unwrap(), total.sub(covered).unwrap());
    }

    /// Whatever sequence of ledger operations runs, custody balances:
    /// held funds always equal lifetime inflow minus lifetime outflow
    #[test]
    fn ledger_conserves_under_random_operations(
        ops in prop::collection::vec(
            (0u8..4u8, 1u64..4u64, 1u128..1_000_000u128),
            1..50,
        ),
    ) {
        let asset = AssetId(1);
        let market = MarketId(0);
        let mut ledger = Ledger::new();

        for (op, user, amount) in ops {
            let user = UserId(user);
            let amount = Fixed::from_raw(amount * BASE / 1000);
            let common = BalancePath::common(user);
            let collateral = BalancePath::collateral(user, market);

            // failures (insufficient balance) are part of the property
            let _ = match op {
                0 => ledger.deposit(asset, common, amount),
                1 => ledger.withdraw(asset, common, amount),
                2 => ledger.transfer(asset, common, collateral, amount),
                _ => ledger.transfer(asset, collateral, common, amount),
            };
        }

        let held = ledger.asset_total(asset).unwrap();
        let expected = ledger
            .lifetime_deposited(asset)
            .sub(ledger.lifetime_withdrawn(asset))
            .unwrap();
        prop_assert_eq!(held, expected);
    }
}

/// Non-proptest edge cases for the same primitives
#[cfg(test)]
mod edge_cases {
    use super::*;

    #[test]
    fn partial_floor_rejects_heavy_truncation() {
        // 1/3 of one raw unit loses everything: more than the tolerated slice
        let result = Fixed::partial_floor(
            Fixed::from_raw(1),
            Fixed::from_raw(3),
            Fixed::from_raw(1),
        );
        assert_eq!(result, Err(MathError::RoundingError));
    }

    #[test]
    fn division_by_zero_is_an_error_not_a_panic() {
        assert_eq!(
            Fixed::ONE.div_floor(Fixed::ZERO),
            Err(MathError::DivisionByZero)
        );
        assert_eq!(
            Fixed::ratio_cmp(Fixed::ONE, Fixed::ZERO, Fixed::ONE, Fixed::ONE),
            Err(MathError::DivisionByZero)
        );
    }

    #[test]
    fn mul_overflow_is_an_error_not_a_panic() {
        let huge = Fixed::from_raw(u128::MAX);
        assert_eq!(huge.mul_ceil(huge), Err(MathError::Overflow));
    }

    #[test]
    fn empty_and_finished_auctions_refuse_fills() {
        let mut auction = Auction::new(
            AuctionId(1),
            UserId(1),
            MarketId(0),
            UserId(2),
            AssetId(2),
            AssetId(1),
            Fixed::from_int(100),
            Fixed::from_int(1),
            BlockNumber(0),
            Fixed::percent(50),
            Fixed::percent(1),
            Fixed::percent(20),
            Fixed::percent(1),
        )
        .unwrap();

        assert_eq!(
            auction
                .plan_fill(Fixed::ZERO, Fixed::ONE, Fixed::ONE, BlockNumber(0))
                .map(|_| ()),
            Err(AuctionError::EmptyFill)
        );

        let plan = auction
            .plan_fill(Fixed::from_int(100), Fixed::ONE, Fixed::ONE, BlockNumber(0))
            .unwrap();
        auction.record_fill(&plan).unwrap();
        assert!(auction.finished);
        assert_eq!(
            auction
                .plan_fill(Fixed::ONE, Fixed::ONE, Fixed::ONE, BlockNumber(0))
                .map(|_| ()),
            Err(AuctionError::AlreadyFinished(AuctionId(1)))
        );
    }
}
