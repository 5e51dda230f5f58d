//! Paper exchange scenarios: submissions, delayed market execution,
//! crossed-limit fills, funding enforcement and mass cancellation.

use crate::helpers::{EventLog, level, venue};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use xemm_paper::prelude::*;
use xemm_paper::TRADE_EXECUTION_DELAY_MS;

fn tick(exchange: &PaperExchange, now: u64) {
    Tickable::tick(exchange, now);
}

#[test]
fn test_unknown_pair_rejected() {
    let (exchange, _book, _pair) = venue("paper", "BTC", "USDT");
    let other = TradingPair::new("ETH", "USDT");
    let result = exchange.buy(&other, dec!(1), OrderType::Limit, Some(dec!(100)), None);
    assert!(matches!(result, Err(ExchangeError::UnknownPair(_))));
}

#[test]
fn test_size_at_quantum_accepted_below_rejected() {
    let (exchange, _book, pair) = venue("paper", "BTC", "USDT");
    exchange.set_balance("USDT", dec!(1000));

    // exactly one size quantum
    let ok = exchange.buy(&pair, dec!(0.0001), OrderType::Limit, Some(dec!(100)), None);
    assert!(ok.is_ok());

    // one ulp below quantizes to zero and is rejected
    let too_small = exchange.buy(&pair, dec!(0.00009999), OrderType::Limit, Some(dec!(100)), None);
    assert!(matches!(
        too_small,
        Err(ExchangeError::InvalidOrderSize { .. })
    ));
}

#[test]
fn test_created_event_is_delayed() {
    let (exchange, _book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    exchange.set_balance("USDT", dec!(1000));

    tick(&exchange, 0);
    let order_id = exchange
        .buy(&pair, dec!(0.5), OrderType::Limit, Some(dec!(100)), None)
        .unwrap();

    // 10 ms have not elapsed yet
    tick(&exchange, 5);
    assert!(log.snapshot().is_empty());

    tick(&exchange, 10);
    let events = log.snapshot();
    assert_eq!(events.len(), 1);
    match &events[0] {
        MarketEvent::BuyOrderCreated(created) => {
            assert_eq!(created.order_id, order_id);
            assert_eq!(created.amount, dec!(0.5));
            assert_eq!(created.price, Some(dec!(100)));
        }
        other => panic!("expected BuyOrderCreated, got {other:?}"),
    }
}

#[test]
fn test_market_order_waits_for_execution_delay() {
    let (exchange, book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(
        &[level(dec!(99), dec!(5))],
        &[level(dec!(100), dec!(0.2)), level(dec!(100.5), dec!(5))],
        1,
    )
    .unwrap();
    exchange.set_balance("USDT", dec!(1000));

    tick(&exchange, 0);
    let order_id = exchange
        .buy(&pair, dec!(0.3), OrderType::Market, None, None)
        .unwrap();

    // nothing fills before the execution delay
    tick(&exchange, 1_000);
    tick(&exchange, 3_000);
    tick(&exchange, TRADE_EXECUTION_DELAY_MS - 1);
    assert!(log.filled().is_empty());
    assert!(log.completed().is_empty());

    tick(&exchange, TRADE_EXECUTION_DELAY_MS);
    let fills = log.filled();
    let completed = log.completed();

    // 0.2 @ 100 and 0.1 @ 100.5, then the completion
    assert_eq!(fills.len(), 2);
    assert!(fills.iter().all(|fill| fill.order_id == order_id));
    let filled_base: Decimal = fills.iter().map(|fill| fill.amount).sum();
    assert_eq!(filled_base, dec!(0.3));

    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].base_filled, dec!(0.3));

    // fills sum to the completed quote within one size quantum
    let quote_from_fills: Decimal = fills.iter().map(|fill| fill.price * fill.amount).sum();
    assert!((quote_from_fills - completed[0].quote_filled).abs() <= dec!(0.0001));

    // balances moved and the book was consumed
    assert_eq!(exchange.balance("BTC"), dec!(0.3));
    assert_eq!(exchange.balance("USDT"), dec!(1000) - quote_from_fills);
    assert_eq!(book.best_ask(), Some(dec!(100.5)));
}

#[test]
fn test_market_order_insufficient_balance_fails() {
    let (exchange, book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(100), dec!(5))], 1)
        .unwrap();
    exchange.set_balance("USDT", dec!(10));

    tick(&exchange, 0);
    exchange
        .buy(&pair, dec!(1), OrderType::Market, None, None)
        .unwrap();
    tick(&exchange, TRADE_EXECUTION_DELAY_MS);

    assert_eq!(log.failures().len(), 1);
    assert!(log.filled().is_empty());
    assert_eq!(exchange.balance("USDT"), dec!(10));
}

#[test]
fn test_crossed_limit_fills_at_own_price() {
    let (exchange, book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(101), dec!(5))], 1)
        .unwrap();
    exchange.set_balance("USDT", dec!(1000));

    tick(&exchange, 0);
    let order_id = exchange
        .buy(&pair, dec!(0.5), OrderType::Limit, Some(dec!(100)), None)
        .unwrap();
    tick(&exchange, 100);
    assert!(log.filled().is_empty());

    // the public ask drops through the resting bid
    book.apply_diff(&[], &[level(dec!(99.5), dec!(3))], 2).unwrap();
    tick(&exchange, 200);

    let fills = log.filled();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].order_id, order_id);
    // the resting order fills at its own limit price
    assert_eq!(fills[0].price, dec!(100));
    assert_eq!(fills[0].amount, dec!(0.5));

    assert_eq!(exchange.balance("BTC"), dec!(0.5));
    assert_eq!(exchange.balance("USDT"), dec!(950));
    assert_eq!(exchange.open_order_count(), 0);
}

#[test]
fn test_trade_sweep_fills_resting_limits() {
    let (exchange, book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(101), dec!(5))], 1)
        .unwrap();
    exchange.set_balance("USDT", dec!(1000));

    tick(&exchange, 0);
    let order_id = exchange
        .buy(&pair, dec!(0.5), OrderType::Limit, Some(dec!(100)), None)
        .unwrap();
    tick(&exchange, 100);
    assert!(log.filled().is_empty());

    // an aggressive public sell sweeps below the resting bid price
    book.record_trade(Side::Sell, dec!(99.5), dec!(2));
    tick(&exchange, 200);

    let fills = log.filled();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].order_id, order_id);
    assert_eq!(fills[0].price, dec!(100));
}

#[test]
fn test_unfunded_limit_order_cancelled_not_failed() {
    let (exchange, book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(105), dec!(5))], 1)
        .unwrap();
    exchange.set_balance("USDT", dec!(150));

    tick(&exchange, 0);
    let order_id = exchange
        .buy(&pair, dec!(1), OrderType::Limit, Some(dec!(100)), None)
        .unwrap();
    tick(&exchange, 100);
    assert_eq!(exchange.open_order_count(), 1);
    assert_eq!(exchange.available_balance("USDT"), dec!(50));

    // the funds backing the order are withdrawn out from under it
    exchange.set_balance("USDT", dec!(50));
    tick(&exchange, 200);

    assert_eq!(log.cancelled_ids(), vec![order_id]);
    assert!(log.failures().is_empty());
    assert!(log.filled().is_empty());
    assert_eq!(exchange.open_order_count(), 0);
    // available balance is non-negative again at tick end
    assert!(exchange.available_balance("USDT") >= Decimal::ZERO);
}

#[test]
fn test_cancel_is_idempotent_and_event_on_next_tick() {
    let (exchange, book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(105), dec!(5))], 1)
        .unwrap();
    exchange.set_balance("USDT", dec!(1000));

    tick(&exchange, 0);
    let order_id = exchange
        .buy(&pair, dec!(0.5), OrderType::Limit, Some(dec!(100)), None)
        .unwrap();
    tick(&exchange, 100);

    exchange.cancel(&pair, &order_id);
    exchange.cancel(&pair, &order_id); // second cancel is a no-op
    assert_eq!(exchange.open_order_count(), 0);

    tick(&exchange, 200);
    assert_eq!(log.cancelled_ids(), vec![order_id]);
}

#[test]
fn test_cancel_with_malformed_id_is_ignored() {
    let (exchange, book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(105), dec!(5))], 1)
        .unwrap();
    exchange.set_balance("USDT", dec!(1000));

    tick(&exchange, 0);
    exchange
        .buy(&pair, dec!(0.5), OrderType::Limit, Some(dec!(100)), None)
        .unwrap();

    exchange.cancel(&pair, "not-an-order-id");
    tick(&exchange, 100);
    assert!(log.cancelled_ids().is_empty());
    assert_eq!(exchange.open_order_count(), 1);
}

#[test]
fn test_cancel_all_cancels_every_order() {
    let (exchange, book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(105), dec!(5))], 1)
        .unwrap();
    exchange.set_balance("USDT", dec!(1000));
    exchange.set_balance("BTC", dec!(10));

    tick(&exchange, 0);
    let bid = exchange
        .buy(&pair, dec!(0.5), OrderType::Limit, Some(dec!(100)), None)
        .unwrap();
    let ask = exchange
        .sell(&pair, dec!(0.5), OrderType::Limit, Some(dec!(106)), None)
        .unwrap();
    tick(&exchange, 100);

    let results = exchange.cancel_all(1_000);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.success));

    tick(&exchange, 200);
    let cancelled = log.cancelled_ids();
    assert!(cancelled.contains(&bid));
    assert!(cancelled.contains(&ask));
    // cancelled orders never complete
    assert!(log.completed().is_empty());
    assert_eq!(exchange.open_order_count(), 0);
}

#[test]
fn test_expiring_limit_order_cancelled() {
    let (exchange, book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(105), dec!(5))], 1)
        .unwrap();
    exchange.set_balance("USDT", dec!(1000));

    tick(&exchange, 0);
    let order_id = exchange
        .buy(
            &pair,
            dec!(0.5),
            OrderType::Limit,
            Some(dec!(100)),
            Some(60_000),
        )
        .unwrap();

    tick(&exchange, 59_999);
    assert_eq!(exchange.open_order_count(), 1);

    tick(&exchange, 60_000);
    assert_eq!(log.cancelled_ids(), vec![order_id]);
    assert_eq!(exchange.open_order_count(), 0);
}

#[test]
fn test_stale_diff_rejected_and_counted_once() {
    let (_exchange, book, _pair) = venue("paper", "BTC", "USDT");
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(101), dec!(5))], 10)
        .unwrap();

    let err = book.apply_diff(&[level(dec!(98), dec!(1))], &[], 9).unwrap_err();
    assert!(matches!(err, BookError::StaleUpdate { .. }));

    // the book is unchanged and exactly one drop was recorded
    assert_eq!(book.best_bid(), Some(dec!(99)));
    assert_eq!(book.best_ask(), Some(dec!(101)));
    assert_eq!(book.stale_update_count(), 1);
}

#[test]
fn test_fee_fn_charged_on_fills() {
    let pair = TradingPair::new("BTC", "USDT");
    let exchange = Arc::new(PaperExchange::with_fee_fn(
        "paper",
        FeeSchedule::new(dec!(0.001), dec!(0.002)).as_fee_fn(),
    ));
    let book = exchange.add_pair(pair.clone(), crate::helpers::seed_params());
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(100), dec!(5))], 1)
        .unwrap();
    exchange.set_balance("USDT", dec!(1000));

    tick(&exchange, 0);
    exchange
        .buy(&pair, dec!(1), OrderType::Market, None, None)
        .unwrap();
    tick(&exchange, TRADE_EXECUTION_DELAY_MS);

    let fills = log.filled();
    assert_eq!(fills.len(), 1);
    // taker ratio 0.002 on a 100-notional fill
    assert_eq!(fills[0].fee, dec!(0.2));
    assert_eq!(exchange.balance("USDT"), dec!(1000) - dec!(100) - dec!(0.2));
    assert_eq!(exchange.balance("BTC"), dec!(1));
}

#[test]
fn test_clock_drives_exchange() {
    let (exchange, book, pair) = venue("paper", "BTC", "USDT");
    let log = EventLog::attach(&exchange);
    book.apply_snapshot(&[level(dec!(99), dec!(5))], &[level(dec!(100), dec!(5))], 1)
        .unwrap();
    exchange.set_balance("USDT", dec!(1000));

    let clock = Clock::new();
    clock.register(exchange.clone());

    clock.advance(0);
    exchange
        .buy(&pair, dec!(0.3), OrderType::Market, None, None)
        .unwrap();
    clock.run(1_000, TRADE_EXECUTION_DELAY_MS, 1_000);

    assert_eq!(log.completed().len(), 1);
    assert_eq!(exchange.balance("BTC"), dec!(0.3));
}
