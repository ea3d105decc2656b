//! Margin Market Settlement Simulation.
//!
//! Walks the engine through its full lifecycle: funding the lending pools,
//! relayer-matched trades with fee discounts, collateral health under moving
//! prices, and liquidation auctions absorbing bad debt.

use margin_core::*;

const WETH: AssetId = AssetId(1);
const USDT: AssetId = AssetId(2);
const MGN: AssetId = AssetId(3);
const ETH_USDT: MarketId = MarketId(0);

const LENDER: UserId = UserId(1);
const BORROWER: UserId = UserId(2);
const TRADER: UserId = UserId(3);
const KEEPER: UserId = UserId(4);
const TREASURY: UserId = UserId(5);
const RELAYER: UserId = UserId(6);
const MAKER_A: UserId = UserId(7);
const MAKER_B: UserId = UserId(8);

fn main() {
    println!("Margin Market Settlement Engine Simulation");
    println!("Shared Ledger, Lending Pools, Relayer Matching, Auctions");
    println!("Run started at {}\n", Timestamp::now());

    scenario_1_lending_lifecycle();
    scenario_2_relayer_matching();
    scenario_3_collateral_health();
    scenario_4_liquidation_auction();
    scenario_5_insurance_and_socialized_loss();
    scenario_6_stress_cycle();

    println!("\nAll simulations completed successfully.");
}

/// Fresh engine with WETH at $2,000 and USDT at $1, market open.
fn demo_engine() -> Engine {
    let mut engine = Engine::new(EngineConfig::default());
    engine.set_time(Timestamp::from_secs(1_700_000_000));
    engine.set_block(BlockNumber(18_500_000));
    engine
        .register_asset(
            Asset::new(WETH, "WETH", 18).unwrap(),
            Box::new(FlatModel(Fixed::percent(10))),
            Fixed::from_int(2000),
            FeedGuard::default(),
        )
        .unwrap();
    engine
        .register_asset(
            Asset::new(USDT, "USDT", 6).unwrap(),
            Box::new(FlatModel(Fixed::percent(10))),
            Fixed::ONE,
            FeedGuard::default(),
        )
        .unwrap();
    engine.create_market(ETH_USDT, WETH, USDT).unwrap();
    engine
}

/// Walk a feed down to `target` in steps the change-rate guard accepts.
fn grind_price_down(engine: &mut Engine, asset: AssetId, target: Fixed) {
    let mut price = engine.last_price(asset).unwrap();
    while price > target {
        price = price.mul_floor(Fixed::percent(91)).unwrap().max(target);
        engine.set_price(asset, price).unwrap();
    }
}

/// Supply, borrow, a year of interest, repayment and redemption.
fn scenario_1_lending_lifecycle() {
    println!("Scenario 1: Lending Lifecycle\n");

    let mut engine = demo_engine();

    // 50,000 USDT arrives as 6-decimal token units
    let inflow = engine
        .asset(USDT)
        .unwrap()
        .to_engine_amount(50_000_000_000)
        .unwrap();
    engine.deposit(LENDER, USDT, inflow).unwrap();
    engine.supply(LENDER, USDT, Fixed::from_int(40_000)).unwrap();
    println!("  Lender deposits {inflow} USDT and supplies $40,000 to the pool");

    engine.deposit(BORROWER, WETH, Fixed::from_int(30)).unwrap();
    engine
        .transfer(
            BORROWER,
            WETH,
            BalancePath::common(BORROWER),
            BalancePath::collateral(BORROWER, ETH_USDT),
            Fixed::from_int(20),
        )
        .unwrap();
    engine
        .borrow(BORROWER, ETH_USDT, USDT, Fixed::from_int(20_000))
        .unwrap();
    println!("  Borrower posts 20 WETH and borrows $20,000");

    let rates = engine.pool_rates(USDT).unwrap();
    println!(
        "  Pool: utilization {}, borrow rate {}, supply rate {}",
        rates.utilization, rates.borrow_rate, rates.supply_rate
    );

    engine.advance_time(SECONDS_PER_YEAR);
    println!("\n  One year passes...");

    // top up the collateral account so the interest can be paid
    engine.deposit(BORROWER, USDT, Fixed::from_int(2_000)).unwrap();
    engine
        .transfer(
            BORROWER,
            USDT,
            BalancePath::common(BORROWER),
            BalancePath::collateral(BORROWER, ETH_USDT),
            Fixed::from_int(2_000),
        )
        .unwrap();
    let paid = engine
        .repay(BORROWER, ETH_USDT, USDT, Fixed::from_int(100_000))
        .unwrap();
    println!("  Borrower repays ${paid}");

    let redeemed = engine
        .unsupply(LENDER, USDT, Fixed::from_int(1_000_000))
        .unwrap();
    println!("  Lender redeems ${redeemed} for the $40,000 supplied");

    engine.withdraw(LENDER, USDT, redeemed).unwrap();
    let outflow = engine.asset(USDT).unwrap().to_native_amount(redeemed);
    println!("  Withdrawal releases {outflow} token units from custody");

    let pool = engine.pool(USDT).unwrap();
    println!("  Pool insurance balance: ${}", pool.insurance_balance());
    println!(
        "  USDT custody audit balanced: {}\n",
        engine.audit(USDT).unwrap().balanced()
    );
}

/// Relayer settles a taker against two maker bids; one maker holds enough
/// discount token to trade at reduced fees.
fn scenario_2_relayer_matching() {
    println!("Scenario 2: Relayer Matching with Fee Discounts\n");

    let mut engine = demo_engine();
    engine
        .register_asset(
            Asset::new(MGN, "MGN", 18).unwrap(),
            Box::new(FlatModel(Fixed::percent(10))),
            Fixed::from_int(2),
            FeedGuard::default(),
        )
        .unwrap();
    engine
        .set_discount_table(
            DiscountTable::new(
                MGN,
                vec![
                    DiscountTier {
                        min_balance: Fixed::from_int(500),
                        multiplier: Fixed::percent(90),
                    },
                    DiscountTier {
                        min_balance: Fixed::from_int(5_000),
                        multiplier: Fixed::percent(70),
                    },
                ],
            )
            .unwrap(),
        )
        .unwrap();

    let mut keys = KeyedVerifier::new();
    for user in [TRADER, MAKER_A, MAKER_B] {
        keys.register(user, [user.0 as u8; 32]);
    }
    engine.set_verifier(Box::new(keys.clone()));

    engine.deposit(TRADER, WETH, Fixed::from_int(10)).unwrap();
    engine.deposit(MAKER_A, USDT, Fixed::from_int(9_000)).unwrap();
    engine.deposit(MAKER_B, USDT, Fixed::from_int(13_000)).unwrap();
    engine.deposit(MAKER_B, MGN, Fixed::from_int(5_000)).unwrap();
    println!("  Maker B holds 5,000 MGN: fees scale to 70%");

    let order = |trader: UserId, side: Side, base: u64, quote: u64| Order {
        trader,
        relayer: RELAYER,
        market: ETH_USDT,
        side,
        kind: OrderKind::Limit,
        base_amount: Fixed::from_int(base),
        quote_amount: Fixed::from_int(quote),
        expires_at: Timestamp::from_secs(1_800_000_000),
        as_maker_fee_rate: Fixed::percent(1),
        as_taker_fee_rate: Fixed::percent(5),
        maker_rebate_rate: Fixed::ZERO,
        gas_fee_amount: Fixed::ONE,
        maker_only: false,
        balance_source: BalanceSource::Common,
        salt: trader.0,
        version: ORDER_VERSION,
    };
    let signed = |keys: &KeyedVerifier, order: Order| SignedOrder {
        signature: keys
            .sign(order.trader, &order.hash(), SignScheme::Prefixed)
            .unwrap(),
        order,
    };

    let taker = signed(&keys, order(TRADER, Side::Sell, 10, 19_700));
    let makers = vec![
        signed(&keys, order(MAKER_A, Side::Buy, 4, 7_960)),
        signed(&keys, order(MAKER_B, Side::Buy, 8, 15_840)),
    ];
    println!("  Taker sells 10 WETH, floor $1,970; bids at $1,990 and $1,980");

    let outcome = engine
        .match_orders(
            RELAYER,
            &taker,
            &makers,
            &[Fixed::from_int(4), Fixed::from_int(6)],
        )
        .unwrap();

    for fill in &outcome.fills {
        println!(
            "  Maker {} takes {} WETH for ${} (maker fee ${}, taker fee ${})",
            fill.maker, fill.base, fill.quote, fill.maker_fee, fill.taker_fee
        );
    }
    println!(
        "  Taker proceeds: ${}",
        engine.balance(USDT, BalancePath::common(TRADER))
    );
    println!(
        "  Relayer collects: ${}",
        engine.balance(USDT, BalancePath::common(RELAYER))
    );
    println!(
        "  Taker order filled: {} WETH\n",
        engine.order_filled_amount(&taker.order.hash())
    );
}

/// Collateral health and withdrawal headroom as the price slides.
fn scenario_3_collateral_health() {
    println!("Scenario 3: Collateral Health Under Falling Prices\n");

    let mut engine = demo_engine();
    engine.deposit(LENDER, USDT, Fixed::from_int(40_000)).unwrap();
    engine.supply(LENDER, USDT, Fixed::from_int(40_000)).unwrap();

    engine.deposit(TRADER, WETH, Fixed::from_int(10)).unwrap();
    engine
        .transfer(
            TRADER,
            WETH,
            BalancePath::common(TRADER),
            BalancePath::collateral(TRADER, ETH_USDT),
            Fixed::from_int(10),
        )
        .unwrap();
    engine
        .borrow(TRADER, ETH_USDT, USDT, Fixed::from_int(10_000))
        .unwrap();
    engine
        .transfer(
            TRADER,
            USDT,
            BalancePath::collateral(TRADER, ETH_USDT),
            BalancePath::common(TRADER),
            Fixed::from_int(10_000),
        )
        .unwrap();
    println!("  Trader: 10 WETH of collateral against $10,000 borrowed\n");

    println!(
        "  Withdrawable WETH at $2,000: {}",
        engine.transferable_amount(TRADER, ETH_USDT, WETH).unwrap()
    );

    for price in [1_800u64, 1_620, 1_460, 1_320, 1_190, 1_080] {
        engine.set_price(WETH, Fixed::from_int(price)).unwrap();
        let details = engine.account_details(TRADER, ETH_USDT).unwrap();
        let candidates = engine.liquidation_candidates(ETH_USDT).unwrap();
        println!(
            "  WETH ${price}: collateral ${}, debt ${}, liquidatable: {}, candidates: {}",
            details.balances_usd,
            details.debts_usd,
            details.liquidatable,
            candidates.len()
        );
    }
    println!();
}

/// A liquidation auction clears residual debt at a block-climbing ratio.
fn scenario_4_liquidation_auction() {
    println!("Scenario 4: Liquidation Auction\n");

    let mut engine = demo_engine();
    engine.deposit(LENDER, USDT, Fixed::from_int(40_000)).unwrap();
    engine.supply(LENDER, USDT, Fixed::from_int(40_000)).unwrap();

    engine.deposit(TRADER, WETH, Fixed::from_int(10)).unwrap();
    engine
        .transfer(
            TRADER,
            WETH,
            BalancePath::common(TRADER),
            BalancePath::collateral(TRADER, ETH_USDT),
            Fixed::from_int(10),
        )
        .unwrap();
    engine
        .borrow(TRADER, ETH_USDT, USDT, Fixed::from_int(10_000))
        .unwrap();
    engine
        .transfer(
            TRADER,
            USDT,
            BalancePath::collateral(TRADER, ETH_USDT),
            BalancePath::common(TRADER),
            Fixed::from_int(10_000),
        )
        .unwrap();
    grind_price_down(&mut engine, WETH, Fixed::from_int(1_080));

    let outcome = engine.liquidate_account(KEEPER, TRADER, ETH_USDT).unwrap();
    let auction_id = outcome.auction.unwrap();
    println!("  Account frozen; auction {auction_id:?} opened for $10,000 of debt");

    engine.deposit(KEEPER, USDT, Fixed::from_int(11_000)).unwrap();

    engine.advance_blocks(20);
    println!(
        "  20 blocks in ({}), payout ratio {}",
        engine.block(),
        engine.auction_ratio(auction_id).unwrap()
    );
    let fill = engine
        .fill_auction(KEEPER, auction_id, Fixed::from_int(4_000))
        .unwrap();
    println!(
        "  Keeper repays ${} and takes {} WETH (initiator reward {})",
        fill.debt_filled, fill.collateral_to_filler, fill.initiator_reward
    );

    engine.advance_blocks(30);
    println!(
        "  50 blocks in ({}), payout ratio {}",
        engine.block(),
        engine.auction_ratio(auction_id).unwrap()
    );
    let fill = engine
        .fill_auction(KEEPER, auction_id, Fixed::from_int(100_000))
        .unwrap();
    println!(
        "  Keeper repays the remaining ${} for {} WETH, finished: {}",
        fill.debt_filled, fill.collateral_to_filler, fill.finished
    );

    println!(
        "  Account status: {:?}, leftover collateral {} WETH",
        engine.status(TRADER, ETH_USDT),
        engine.balance(WETH, BalancePath::collateral(TRADER, ETH_USDT))
    );
    println!(
        "  Audits balanced: WETH {}, USDT {}\n",
        engine.audit(WETH).unwrap().balanced(),
        engine.audit(USDT).unwrap().balanced()
    );
}

/// A deep crash leaves the escrow short; insurance pays first, the supplier
/// haircut absorbs the rest.
fn scenario_5_insurance_and_socialized_loss() {
    println!("Scenario 5: Insurance and Socialized Loss\n");

    let mut engine = demo_engine();
    engine.deposit(LENDER, USDT, Fixed::from_int(20_000)).unwrap();
    engine.supply(LENDER, USDT, Fixed::from_int(20_000)).unwrap();
    engine.deposit(TREASURY, USDT, Fixed::from_int(500)).unwrap();
    engine.fund_insurance(TREASURY, USDT, Fixed::from_int(500)).unwrap();
    println!("  Pool: $20,000 supplied, $500 of insurance");

    engine.deposit(TRADER, WETH, Fixed::from_int(10)).unwrap();
    engine
        .transfer(
            TRADER,
            WETH,
            BalancePath::common(TRADER),
            BalancePath::collateral(TRADER, ETH_USDT),
            Fixed::from_int(10),
        )
        .unwrap();
    engine
        .borrow(TRADER, ETH_USDT, USDT, Fixed::from_int(10_000))
        .unwrap();
    engine
        .transfer(
            TRADER,
            USDT,
            BalancePath::collateral(TRADER, ETH_USDT),
            BalancePath::common(TRADER),
            Fixed::from_int(10_000),
        )
        .unwrap();

    grind_price_down(&mut engine, WETH, Fixed::from_int(400));
    println!("  WETH crashes to $400: 10 WETH of escrow against $10,000 of debt");

    let outcome = engine.liquidate_account(KEEPER, TRADER, ETH_USDT).unwrap();
    let auction_id = outcome.auction.unwrap();
    engine.advance_blocks(70);

    engine.deposit(KEEPER, USDT, Fixed::from_int(10_000)).unwrap();
    let fill = engine
        .fill_auction(KEEPER, auction_id, Fixed::from_int(10_000))
        .unwrap();

    println!("  Fill at ratio {}: keeper owed ${}", fill.ratio, fill.debt_filled);
    println!(
        "  Escrow covers {} WETH; insurance pays ${}, suppliers absorb ${}",
        fill.collateral_to_filler, fill.insurance_used, fill.socialized_loss
    );
    println!(
        "  Lender position after haircut: ${}",
        engine.pool(USDT).unwrap().supply_real(LENDER).unwrap()
    );
    println!(
        "  Insurance left: ${}, USDT audit balanced: {}\n",
        engine.pool(USDT).unwrap().insurance_balance(),
        engine.audit(USDT).unwrap().balanced()
    );
}

/// Many leveraged accounts against a falling market, keepers working the
/// liquidation queue every round.
fn scenario_6_stress_cycle() {
    println!("Scenario 6: Stress Cycle\n");

    let mut engine = demo_engine();

    for supplier in [UserId(20), UserId(21)] {
        engine.deposit(supplier, USDT, Fixed::from_int(35_000)).unwrap();
        engine.supply(supplier, USDT, Fixed::from_int(35_000)).unwrap();
    }
    engine.deposit(TREASURY, USDT, Fixed::from_int(5_000)).unwrap();
    engine.fund_insurance(TREASURY, USDT, Fixed::from_int(5_000)).unwrap();
    engine.deposit(KEEPER, USDT, Fixed::from_int(200_000)).unwrap();

    let borrowers: Vec<UserId> = (0..6).map(|i| UserId(30 + i)).collect();
    for (i, &user) in borrowers.iter().enumerate() {
        let debt = Fixed::from_int(8_000 + 1_000 * i as u64);
        engine.deposit(user, WETH, Fixed::from_int(10)).unwrap();
        engine
            .transfer(
                user,
                WETH,
                BalancePath::common(user),
                BalancePath::collateral(user, ETH_USDT),
                Fixed::from_int(10),
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
    println!("  6 borrowers levered between $8,000 and $13,000 on 10 WETH each");

    let mut liquidations = 0;
    let mut auctions_filled = 0;
    let mut socialized_total = Fixed::ZERO;

    for round in 1..=8 {
        engine.advance_time(3600);
        let price = engine.last_price(WETH).unwrap();
        let next = price.mul_floor(Fixed::percent(91)).unwrap();
        engine.set_price(WETH, next).unwrap();
        engine.set_price(USDT, Fixed::ONE).unwrap();

        let candidates = engine.liquidation_candidates(ETH_USDT).unwrap();
        if candidates.is_empty() {
            println!("  Round {round}: WETH ${next}, no liquidations");
            continue;
        }

        let mut opened = Vec::new();
        for user in &candidates {
            let outcome = engine.liquidate_account(KEEPER, *user, ETH_USDT).unwrap();
            liquidations += 1;
            opened.extend(outcome.auction);
        }
        engine.advance_blocks(40);
        for auction_id in opened {
            let fill = engine
                .fill_auction(KEEPER, auction_id, Fixed::from_int(1_000_000))
                .unwrap();
            auctions_filled += 1;
            socialized_total = socialized_total.add(fill.socialized_loss).unwrap();
        }
        println!(
            "  Round {round}: WETH ${next}, {} liquidated",
            candidates.len()
        );
    }

    println!("\n  Liquidations: {liquidations}, auctions filled: {auctions_filled}");
    println!("  Socialized losses: ${socialized_total}");
    println!(
        "  Insurance left: ${}",
        engine.pool(USDT).unwrap().insurance_balance()
    );
    println!(
        "  Audits balanced: WETH {}, USDT {}",
        engine.audit(WETH).unwrap().balanced(),
        engine.audit(USDT).unwrap().balanced()
    );
    println!("  Events generated: {}", engine.events().len());
}
