//! XEMM strategy scenarios: quoting, hedging, cancellation triggers and
//! readiness gating.

use crate::helpers::{EventLog, level, venue};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use xemm_paper::prelude::*;

struct Rig {
    maker: Arc<PaperExchange>,
    taker: Arc<PaperExchange>,
    maker_book: Arc<OrderBook>,
    taker_book: Arc<OrderBook>,
    strategy: Arc<XemmStrategy>,
    clock: Clock,
    maker_log: EventLog,
    taker_log: EventLog,
}

/// Seed config shared by the scenarios: 1% profitability, fixed 0.5 order
/// size, 0.5% hedge slippage cushion, spread stepping off.
fn seed_config() -> XemmConfig {
    XemmConfig {
        min_profitability: dec!(0.01),
        order_amount: dec!(0.5),
        slippage_buffer: dec!(0.005),
        adjust_orders_enabled: false,
        anti_hysteresis_duration_ms: 60_000,
        ..XemmConfig::default()
    }
}

/// Maker quotes BTC-USDT, hedges on a BTC-USDC taker venue at fixed 1:1
/// conversion. The maker carries only quote currency, so only bids quote.
fn rig(config: XemmConfig) -> Rig {
    let (maker, maker_book, maker_pair) = venue("maker", "BTC", "USDT");
    let (taker, taker_book, taker_pair) = venue("taker", "BTC", "USDC");

    maker_book
        .apply_snapshot(&[level(dec!(99), dec!(10))], &[level(dec!(100.5), dec!(10))], 1)
        .unwrap();
    taker_book
        .apply_snapshot(&[level(dec!(100), dec!(10))], &[level(dec!(100.1), dec!(10))], 1)
        .unwrap();
    maker.set_balance("USDT", dec!(100_000));
    taker.set_balance("BTC", dec!(10));

    let maker_log = EventLog::attach(&maker);
    let taker_log = EventLog::attach(&taker);

    let strategy = XemmStrategy::new(
        config,
        vec![StrategyPair::new(
            MarketPair::new(maker.clone(), maker_pair),
            MarketPair::new(taker.clone(), taker_pair),
        )],
        None,
    );
    strategy.start();

    let clock = Clock::new();
    clock.register(maker.clone());
    clock.register(taker.clone());
    clock.register(strategy.clone());

    Rig {
        maker,
        taker,
        maker_book,
        taker_book,
        strategy,
        clock,
        maker_log,
        taker_log,
    }
}

#[test]
fn test_quotes_single_bid_at_profitable_price() {
    let rig = rig(seed_config());
    rig.clock.advance(0);

    // taker top bid 100.00 -> bid quoted at 100.00 / 1.01, floored to the
    // 1e-4 quantum
    let open = rig.maker.open_orders();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].side, Side::Buy);
    assert_eq!(open[0].price, dec!(99.0099));
    assert_eq!(open[0].quantity, dec!(0.5));

    // nothing to sell with: the maker holds no base asset
    assert!(open.iter().all(|order| order.side == Side::Buy));
}

#[test]
fn test_quote_is_stable_across_ticks() {
    let rig = rig(seed_config());
    rig.clock.run(0, 1_000, 100);

    // no churn while the books stand still
    assert_eq!(rig.maker.open_order_count(), 1);
    assert!(rig.maker_log.cancelled_ids().is_empty());
}

#[test]
fn test_hedges_maker_fill_on_taker_venue() {
    let rig = rig(seed_config());
    // a taker venue trading rich: top bid 101.20
    rig.taker_book
        .apply_snapshot(
            &[level(dec!(101.20), dec!(10))],
            &[level(dec!(101.30), dec!(10))],
            2,
        )
        .unwrap();
    rig.clock.advance(0);

    let open = rig.maker.open_orders();
    assert_eq!(open.len(), 1);
    // 101.20 / 1.01, pre-rounded to 8 significant digits, floored to 1e-4
    assert_eq!(open[0].price, dec!(100.1980));

    // the maker ask side drops through the resting bid
    rig.maker_book
        .apply_diff(&[], &[level(dec!(100.10), dec!(5))], 2)
        .unwrap();
    rig.clock.advance(100);

    // maker bought 0.5 base at its own limit price
    let maker_fills = rig.maker_log.filled();
    assert_eq!(maker_fills.len(), 1);
    assert_eq!(maker_fills[0].price, dec!(100.1980));
    assert_eq!(maker_fills[0].amount, dec!(0.5));
    assert_eq!(rig.maker.balance("BTC"), dec!(0.5));

    // the hedge sold 0.5 base on the taker venue at 101.20 * (1 - 0.005)
    let taker_fills = rig.taker_log.filled();
    assert_eq!(taker_fills.len(), 1);
    assert_eq!(taker_fills[0].trade_type, Side::Sell);
    assert_eq!(taker_fills[0].price, dec!(100.694));
    assert_eq!(taker_fills[0].amount, dec!(0.5));
    assert_eq!(rig.taker.balance("BTC"), dec!(9.5));
    assert_eq!(rig.taker.balance("USDC"), dec!(50.347));
}

#[test]
fn test_cancels_unprofitable_bid() {
    let rig = rig(seed_config());
    rig.clock.advance(0);
    let bid_id = rig.maker.open_orders()[0].client_order_id.clone();

    // taker market moves down: hedging 0.5 now yields 99.80, below
    // 99.0099 * 1.01
    rig.taker_book
        .apply_diff(&[level(dec!(100), Decimal::ZERO), level(dec!(99.80), dec!(10))], &[], 2)
        .unwrap();

    rig.clock.advance(100);
    assert_eq!(rig.maker.open_order_count(), 0);
    rig.clock.advance(200);

    assert!(rig.maker_log.cancelled_ids().contains(&bid_id));
    assert!(rig.maker_log.filled().is_empty());
}

#[test]
fn test_cancels_when_balance_shrinks() {
    let rig = rig(seed_config());
    rig.clock.advance(0);
    let bid_id = rig.maker.open_orders()[0].client_order_id.clone();

    // the taker-side base inventory vanishes: the quote can no longer be
    // hedged at size
    rig.taker.set_balance("BTC", dec!(0.1));
    rig.clock.advance(100);
    rig.clock.advance(200);

    assert!(rig.maker_log.cancelled_ids().contains(&bid_id));
}

#[test]
fn test_anti_hysteresis_limits_reprice_churn() {
    let rig = rig(seed_config());
    rig.clock.advance(0);
    assert_eq!(rig.maker.open_order_count(), 1);

    // first drift: suggested price moves up by well over one quantum
    rig.taker_book
        .apply_diff(&[level(dec!(100), Decimal::ZERO), level(dec!(100.5), dec!(10))], &[], 2)
        .unwrap();
    rig.clock.advance(100);
    rig.clock.advance(200);

    // the replacement quote follows the new suggested price
    let open = rig.maker.open_orders();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].price, dec!(99.5049));

    // second drift inside the anti-hysteresis window: no further cancel
    rig.taker_book
        .apply_diff(&[level(dec!(100.5), Decimal::ZERO), level(dec!(101), dec!(10))], &[], 3)
        .unwrap();
    rig.clock.advance(300);
    rig.clock.advance(400);

    assert_eq!(rig.maker_log.cancelled_ids().len(), 1);
    let open = rig.maker.open_orders();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].price, dec!(99.5049));
}

#[test]
fn test_adjust_orders_steps_at_most_one_quantum_above_top_bid() {
    let mut config = seed_config();
    config.adjust_orders_enabled = true;
    let rig = rig(config);

    // top bid exactly one quantum below the profitable level: unchanged
    rig.maker_book
        .apply_diff(&[level(dec!(99), Decimal::ZERO), level(dec!(99.0098), dec!(10))], &[], 2)
        .unwrap();
    assert_eq!(
        rig.strategy.market_making_price(0, Side::Buy, dec!(0.5)),
        Some(dec!(99.0099))
    );

    // top bid two quanta below: clamped to one quantum above it
    rig.maker_book
        .apply_diff(&[level(dec!(99.0098), Decimal::ZERO), level(dec!(99.0097), dec!(10))], &[], 3)
        .unwrap();
    assert_eq!(
        rig.strategy.market_making_price(0, Side::Buy, dec!(0.5)),
        Some(dec!(99.0098))
    );
}

#[test]
fn test_adjust_orders_steps_ask_inside_spread() {
    let mut config = seed_config();
    config.adjust_orders_enabled = true;
    let rig = rig(config);

    // taker asks at 99.00 imply a profitable ask of 99.99; the maker top
    // ask at 100.50 pulls it up to one quantum inside
    rig.taker_book
        .apply_diff(&[], &[level(dec!(100.1), Decimal::ZERO), level(dec!(99), dec!(10))], 2)
        .unwrap();
    assert_eq!(
        rig.strategy.market_making_price(0, Side::Sell, dec!(0.5)),
        Some(dec!(100.4999))
    );
}

#[test]
fn test_active_quotes_stay_profitable() {
    let rig = rig(seed_config());
    rig.clock.run(0, 500, 100);

    let margin = Decimal::ONE + dec!(0.01);
    let quantum = dec!(0.0001);
    for order in rig.maker.open_orders() {
        let hedge = rig
            .strategy
            .effective_hedge_price(0, order.side, order.quantity)
            .expect("hedgeable");
        match order.side {
            Side::Buy => assert!(hedge >= order.price * margin - quantum * margin),
            Side::Sell => assert!(order.price >= hedge * margin - quantum * margin),
        }
    }
}

#[test]
fn test_skips_pair_while_venue_not_ready() {
    let rig = rig(seed_config());
    rig.taker.set_network_status(NetworkStatus::NotConnected);
    rig.clock.run(0, 500, 100);
    assert_eq!(rig.maker.open_order_count(), 0);

    // quoting resumes once the venue comes back
    rig.taker.set_network_status(NetworkStatus::Connected);
    rig.clock.advance(600);
    assert_eq!(rig.maker.open_order_count(), 1);
}

#[test]
fn test_taker_volume_caps_quote_size() {
    let rig = rig(seed_config());
    // the taker bid side cannot absorb the order size
    rig.taker_book
        .apply_snapshot(
            &[level(dec!(100), dec!(0.3))],
            &[level(dec!(100.1), dec!(10))],
            2,
        )
        .unwrap();
    rig.clock.advance(0);

    // volume cap: 0.3 * 0.25 = 0.075 quotable, not the configured 0.5
    let open = rig.maker.open_orders();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].quantity, dec!(0.075));
}

#[test]
fn test_hedge_below_taker_quantum_accumulates() {
    let (maker, maker_book, maker_pair) = venue("maker", "BTC", "USDT");
    // taker size quantum of 1 whole base unit: a 0.5 fill cannot hedge yet
    let taker = Arc::new(PaperExchange::new("taker"));
    let taker_pair = TradingPair::new("BTC", "USDC");
    let taker_book = taker.add_pair(taker_pair.clone(), QuantizationParams::new(8, 4, 8, 0));

    maker_book
        .apply_snapshot(&[level(dec!(99), dec!(10))], &[level(dec!(100.5), dec!(10))], 1)
        .unwrap();
    taker_book
        .apply_snapshot(&[level(dec!(100), dec!(10))], &[level(dec!(100.1), dec!(10))], 1)
        .unwrap();
    maker.set_balance("USDT", dec!(100_000));
    taker.set_balance("BTC", dec!(10));

    let strategy = XemmStrategy::new(
        seed_config(),
        vec![StrategyPair::new(
            MarketPair::new(maker.clone(), maker_pair),
            MarketPair::new(taker.clone(), taker_pair),
        )],
        None,
    );
    strategy.start();

    let clock = Clock::new();
    clock.register(maker.clone());
    clock.register(taker.clone());
    clock.register(strategy.clone());

    clock.advance(0);
    maker_book
        .apply_diff(&[], &[level(dec!(99.0), dec!(5))], 2)
        .unwrap();
    clock.advance(100);

    // the maker fill happened but the hedge bucket stays below the taker
    // quantum: no taker order goes out
    assert_eq!(maker.balance("BTC"), dec!(0.5));
    assert_eq!(taker.open_order_count(), 0);
    assert_eq!(taker.balance("BTC"), dec!(10));
}

#[test]
fn test_stop_withdraws_quotes_and_unsubscribes() {
    let rig = rig(seed_config());
    rig.clock.advance(0);
    assert_eq!(rig.maker.open_order_count(), 1);

    rig.strategy.stop();
    assert_eq!(rig.maker.open_order_count(), 0);
    rig.clock.advance(100);
    assert_eq!(rig.maker_log.cancelled_ids().len(), 1);

    // no re-quote after stop
    rig.clock.run(200, 600, 100);
    assert_eq!(rig.maker.open_order_count(), 0);
}

#[test]
fn test_top_of_book_sampling_window_is_bounded() {
    let rig = rig(seed_config());
    // samples land every 5 s; run well past 12 windows
    rig.clock.run(0, 120_000, 5_000);

    let (bids, asks) = rig.strategy.price_samples(0);
    assert_eq!(bids.len(), 12);
    assert_eq!(asks.len(), 12);
    assert!(bids.iter().all(|&price| price == dec!(99)));
    assert!(asks.iter().all(|&price| price == dec!(100.5)));
}

#[test]
fn test_status_report_mentions_pairs() {
    let rig = rig(seed_config());
    rig.clock.advance(0);
    let report = rig.strategy.status_report();
    assert!(report.contains("BTC-USDT"));
    assert!(report.contains("BTC-USDC"));
    assert!(report.contains("active quotes: 1"));
}
