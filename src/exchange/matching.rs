//! Per-tick matching for the paper exchange.
//!
//! Processing order within one tick is fixed: deferred events first, then
//! trade-swept limit fills, then queued market orders, then limit orders the
//! public book has crossed, then expirations, and finally the funding sweep
//! that enforces non-negative available balances. Limit-cross checks are
//! deterministic in (pair, side, price) order.

use super::events::{MarketEvent, OrderCancelled, OrderCompleted, OrderFailure, OrderFilled};
use super::fees::FeeRequest;
use super::paper::{ORDER_CREATED_DELAY_MS, PaperExchange, TRADE_EXECUTION_DELAY_MS};
use crate::clock::Tickable;
use crate::market::Market;
use crate::model::{LimitOrder, OrderType, QueuedOrder, Side, TimestampMs};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::{debug, warn};
use uuid::Uuid;

impl Tickable for PaperExchange {
    fn tick(&self, now: TimestampMs) {
        self.set_time(now);
        self.deliver_deferred(now);
        self.process_recorded_trades(now);
        self.process_queued_orders(now);
        self.match_crossed_limits(now);
        self.expire_orders(now);
        self.enforce_funding(now);
    }
}

impl PaperExchange {
    /// A resting order is matchable once its creation event has been
    /// delivered; earlier fills would invert the Created/Filled ordering.
    fn matchable(order: &LimitOrder, now: TimestampMs) -> bool {
        order.created_at + ORDER_CREATED_DELAY_MS <= now
    }

    fn deliver_deferred(&self, now: TimestampMs) {
        let due: Vec<MarketEvent> = {
            let mut deferred = self.deferred.lock().expect("deferred lock");
            let mut due = Vec::new();
            let mut rest = std::collections::VecDeque::with_capacity(deferred.len());
            while let Some((at, event)) = deferred.pop_front() {
                if at <= now {
                    due.push(event);
                } else {
                    rest.push_back((at, event));
                }
            }
            *deferred = rest;
            due
        };
        // emit outside the lock: listeners may place or cancel orders
        for event in due {
            self.emit(event);
        }
    }

    fn process_recorded_trades(&self, now: TimestampMs) {
        while let Some(trade) = self.trade_inbox.pop() {
            let Some(pair) = self.orders.pair(&trade.symbol) else {
                continue;
            };
            // a sell sweep traverses resting bids at or above the trade
            // price; a buy sweep traverses asks at or below it
            let mut swept = Vec::new();
            match trade.side {
                Side::Sell => {
                    for entry in pair.bids.iter() {
                        let order = entry.value();
                        if order.price < trade.price {
                            break;
                        }
                        if Self::matchable(order, now) {
                            swept.push(order.clone());
                        }
                    }
                }
                Side::Buy => {
                    for entry in pair.asks.iter() {
                        let order = entry.value();
                        if order.price > trade.price {
                            break;
                        }
                        if Self::matchable(order, now) {
                            swept.push(order.clone());
                        }
                    }
                }
            }
            for order in swept {
                self.fill_limit_order(&order, now);
            }
        }
    }

    fn process_queued_orders(&self, now: TimestampMs) {
        loop {
            let next = {
                let mut queued = self.queued.lock().expect("queue lock");
                match queued.front() {
                    Some(order) if order.created_at + TRADE_EXECUTION_DELAY_MS <= now => {
                        queued.pop_front()
                    }
                    _ => None,
                }
            };
            let Some(order) = next else { break };
            self.execute_market_order(&order, now);
        }
    }

    fn execute_market_order(&self, order: &QueuedOrder, now: TimestampMs) {
        let Some(book) = self.book(&order.pair.symbol) else {
            self.emit_failure(order, now);
            return;
        };

        // walk the opposite side of the replayed book, best price first
        let snapshot = book.snapshot();
        let levels = if order.side.is_buy() {
            snapshot.asks
        } else {
            snapshot.bids
        };
        let mut rows: Vec<(Decimal, Decimal)> = Vec::new();
        let mut remaining = order.amount;
        for level in &levels {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = level.size.min(remaining);
            rows.push((level.price, take));
            remaining -= take;
        }
        if remaining > Decimal::ZERO {
            warn!(
                exchange = %self.name(), order_id = %order.client_order_id,
                "market order failed: not enough liquidity"
            );
            self.emit_failure(order, now);
            return;
        }

        let notional: Decimal = rows.iter().map(|&(p, a)| p * a).sum();
        let acquired: Decimal = rows.iter().map(|&(_, a)| a).sum();
        let fee_total: Decimal = rows
            .iter()
            .map(|&(p, a)| self.fill_fee(order.side, OrderType::Market, false, &order.pair, p, a))
            .sum();

        // balance check before any state change
        let (needed_asset, needed) = match order.side {
            Side::Buy => (order.pair.quote.clone(), notional + fee_total),
            Side::Sell => (order.pair.base.clone(), order.amount),
        };
        if self.available_balance(&needed_asset) < needed {
            warn!(
                exchange = %self.name(), order_id = %order.client_order_id,
                asset = %needed_asset, %needed, "market order failed: insufficient balance"
            );
            self.emit_failure(order, now);
            return;
        }

        match order.side {
            Side::Buy => {
                self.debit(&order.pair.quote, notional + fee_total);
                self.credit(&order.pair.base, acquired);
            }
            Side::Sell => {
                self.debit(&order.pair.base, order.amount);
                self.credit(&order.pair.quote, notional - fee_total);
            }
        }
        book.record_filled_order(order.side.is_buy(), &rows);

        for &(price, amount) in &rows {
            let fee = self.fill_fee(order.side, OrderType::Market, false, &order.pair, price, amount);
            self.emit(MarketEvent::OrderFilled(OrderFilled {
                ts: now,
                order_id: order.client_order_id.clone(),
                symbol: order.pair.symbol.clone(),
                trade_type: order.side,
                order_type: OrderType::Market,
                price,
                amount,
                fee,
                exchange_trade_id: Uuid::new_v4().simple().to_string(),
            }));
        }
        let completed = OrderCompleted {
            ts: now,
            order_id: order.client_order_id.clone(),
            base: order.pair.base.clone(),
            quote: order.pair.quote.clone(),
            base_filled: acquired,
            quote_filled: notional,
            order_type: OrderType::Market,
        };
        self.emit(match order.side {
            Side::Buy => MarketEvent::BuyOrderCompleted(completed),
            Side::Sell => MarketEvent::SellOrderCompleted(completed),
        });
        debug!(
            exchange = %self.name(), order_id = %order.client_order_id,
            %acquired, %notional, "market order executed"
        );
    }

    fn match_crossed_limits(&self, now: TimestampMs) {
        for symbol in self.orders.symbols() {
            let Some(book) = self.book(&symbol) else {
                continue;
            };
            let Some(pair_orders) = self.orders.pair(&symbol) else {
                continue;
            };

            // collect first, fill second: the fill path mutates the side
            // book that is being traversed
            let mut crossed: Vec<LimitOrder> = Vec::new();
            if let Some(best_ask) = book.best_ask() {
                for entry in pair_orders.bids.iter() {
                    let order = entry.value();
                    if best_ask > order.price {
                        break;
                    }
                    if Self::matchable(order, now) {
                        crossed.push(order.clone());
                    }
                }
            }
            if let Some(best_bid) = book.best_bid() {
                for entry in pair_orders.asks.iter() {
                    let order = entry.value();
                    if best_bid < order.price {
                        break;
                    }
                    if Self::matchable(order, now) {
                        crossed.push(order.clone());
                    }
                }
            }
            for order in crossed {
                self.fill_limit_order(&order, now);
            }
        }
    }

    /// Fill one resting limit order at its own limit price, or cancel it
    /// when the funds backing it are gone.
    fn fill_limit_order(&self, order: &LimitOrder, now: TimestampMs) {
        // the order may have been filled or cancelled earlier this tick
        if self.orders.get(&order.client_order_id).is_none() {
            return;
        }

        let notional = order.notional();
        let fee = self.fill_fee(
            order.side,
            OrderType::Limit,
            true,
            &order.pair,
            order.price,
            order.quantity,
        );

        // funding check excludes this order's own hold
        let (hold_asset, own_hold) = order.hold();
        let needed = match order.side {
            Side::Buy => notional + fee,
            Side::Sell => order.quantity,
        };
        let available = self.available_balance(hold_asset) + own_hold;
        if available < needed {
            debug!(
                exchange = %self.name(), order_id = %order.client_order_id,
                asset = hold_asset, %needed, %available,
                "cancelling unfunded limit order at fill time"
            );
            self.orders.remove(&order.client_order_id);
            self.emit(MarketEvent::OrderCancelled(OrderCancelled {
                ts: now,
                order_id: order.client_order_id.clone(),
            }));
            return;
        }

        self.orders.remove(&order.client_order_id);
        match order.side {
            Side::Buy => {
                self.debit(&order.pair.quote, notional + fee);
                self.credit(&order.pair.base, order.quantity);
            }
            Side::Sell => {
                self.debit(&order.pair.base, order.quantity);
                self.credit(&order.pair.quote, notional - fee);
            }
        }

        self.emit(MarketEvent::OrderFilled(OrderFilled {
            ts: now,
            order_id: order.client_order_id.clone(),
            symbol: order.pair.symbol.clone(),
            trade_type: order.side,
            order_type: OrderType::Limit,
            price: order.price,
            amount: order.quantity,
            fee,
            exchange_trade_id: Uuid::new_v4().simple().to_string(),
        }));
        let completed = OrderCompleted {
            ts: now,
            order_id: order.client_order_id.clone(),
            base: order.pair.base.clone(),
            quote: order.pair.quote.clone(),
            base_filled: order.quantity,
            quote_filled: notional,
            order_type: OrderType::Limit,
        };
        self.emit(match order.side {
            Side::Buy => MarketEvent::BuyOrderCompleted(completed),
            Side::Sell => MarketEvent::SellOrderCompleted(completed),
        });
    }

    fn expire_orders(&self, now: TimestampMs) {
        let expired: Vec<LimitOrder> = self
            .orders
            .orders_by_insertion()
            .into_iter()
            .filter(|order| order.expiration_ts.is_some_and(|at| at <= now))
            .collect();
        for order in expired {
            debug!(
                exchange = %self.name(), order_id = %order.client_order_id,
                "expiring limit order"
            );
            self.orders.remove(&order.client_order_id);
            self.emit(MarketEvent::OrderCancelled(OrderCancelled {
                ts: now,
                order_id: order.client_order_id,
            }));
        }
    }

    /// Available balances must be non-negative at tick end; resting orders
    /// that are no longer funded are cancelled, oldest holds first surviving.
    fn enforce_funding(&self, now: TimestampMs) {
        let orders = self.orders.orders_by_insertion();
        let assets: BTreeSet<String> = orders
            .iter()
            .map(|order| order.hold().0.to_string())
            .collect();

        for asset in assets {
            let total = self.balance(&asset);
            let mut held = Decimal::ZERO;
            for order in &orders {
                let (hold_asset, hold) = order.hold();
                if hold_asset != asset {
                    continue;
                }
                if held + hold > total {
                    debug!(
                        exchange = %self.name(), order_id = %order.client_order_id,
                        asset = %asset, "cancelling limit order: funds withdrawn"
                    );
                    if self.orders.remove(&order.client_order_id).is_some() {
                        self.emit(MarketEvent::OrderCancelled(OrderCancelled {
                            ts: now,
                            order_id: order.client_order_id.clone(),
                        }));
                    }
                } else {
                    held += hold;
                }
            }
        }
    }

    fn emit_failure(&self, order: &QueuedOrder, now: TimestampMs) {
        self.emit(MarketEvent::OrderFailure(OrderFailure {
            ts: now,
            order_id: order.client_order_id.clone(),
            order_type: OrderType::Market,
        }));
    }

    fn fill_fee(
        &self,
        side: Side,
        order_type: OrderType,
        is_maker: bool,
        pair: &crate::model::TradingPair,
        price: Decimal,
        amount: Decimal,
    ) -> Decimal {
        let ratio = (self.fee_fn)(&FeeRequest {
            exchange: self.name(),
            is_maker,
            base: &pair.base,
            quote: &pair.quote,
            order_type,
            side,
            amount,
            price,
        });
        ratio * price * amount
    }
}
