//! Price-ordered store of open limit orders.
//!
//! Each pair holds two skip lists keyed by price priority first and
//! insertion sequence second, so plain forward iteration of either side is
//! best-price-first with FIFO within a price level, which keeps cancel
//! ordering fair and matching deterministic.

use crate::model::{LimitOrder, Side};
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordering key of an open limit order: price priority first, insertion
/// sequence second.
///
/// Bid keys carry the price negated, so ascending key order is descending
/// price while the insertion tiebreaker stays ascending on both sides.
/// Reversing the whole iterator instead would also reverse the tiebreaker
/// and break FIFO within a price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct LimitOrderKey {
    /// Quantized limit price, negated for bids
    sort_price: Decimal,
    /// Global insertion sequence, unique per exchange
    seq: u64,
}

impl LimitOrderKey {
    fn new(side: Side, price: Decimal, seq: u64) -> Self {
        let sort_price = match side {
            Side::Buy => -price,
            Side::Sell => price,
        };
        Self { sort_price, seq }
    }
}

/// The two sides of one pair's open orders.
pub(crate) struct PairOrders {
    pub bids: SkipMap<LimitOrderKey, LimitOrder>,
    pub asks: SkipMap<LimitOrderKey, LimitOrder>,
}

impl PairOrders {
    fn new() -> Self {
        Self {
            bids: SkipMap::new(),
            asks: SkipMap::new(),
        }
    }

    pub fn side(&self, side: Side) -> &SkipMap<LimitOrderKey, LimitOrder> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }
}

/// All open limit orders on one venue, indexed by pair and by order id.
pub(crate) struct LimitOrderStore {
    pairs: DashMap<String, Arc<PairOrders>>,
    locations: DashMap<String, (String, Side, LimitOrderKey)>,
    seq: AtomicU64,
}

impl LimitOrderStore {
    pub fn new() -> Self {
        Self {
            pairs: DashMap::new(),
            locations: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    /// Insert an open order, assigning its insertion sequence.
    pub fn insert(&self, order: LimitOrder) -> LimitOrderKey {
        let key = LimitOrderKey::new(
            order.side,
            order.price,
            self.seq.fetch_add(1, Ordering::Relaxed),
        );
        let pair = Arc::clone(
            self.pairs
                .entry(order.pair.symbol.clone())
                .or_insert_with(|| Arc::new(PairOrders::new()))
                .value(),
        );
        self.locations.insert(
            order.client_order_id.clone(),
            (order.pair.symbol.clone(), order.side, key),
        );
        pair.side(order.side).insert(key, order);
        key
    }

    /// Remove an order by id. Idempotent; returns the order if it existed.
    pub fn remove(&self, order_id: &str) -> Option<LimitOrder> {
        let (_, (symbol, side, key)) = self.locations.remove(order_id)?;
        let pair = self.pair(&symbol)?;
        pair.side(side)
            .remove(&key)
            .map(|entry| entry.value().clone())
    }

    /// Look up an open order by id.
    pub fn get(&self, order_id: &str) -> Option<LimitOrder> {
        let location = self.locations.get(order_id)?;
        let (symbol, side, key) = location.value().clone();
        drop(location);
        let pair = self.pair(&symbol)?;
        pair.side(side).get(&key).map(|entry| entry.value().clone())
    }

    /// The side books of one pair, if any order was ever placed on it.
    pub fn pair(&self, symbol: &str) -> Option<Arc<PairOrders>> {
        self.pairs.get(symbol).map(|entry| Arc::clone(entry.value()))
    }

    /// Pair symbols with open orders, sorted for deterministic traversal.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .pairs
            .iter()
            .filter(|entry| !entry.value().bids.is_empty() || !entry.value().asks.is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        symbols.sort();
        symbols
    }

    /// Every open order, in (pair, side, price-priority, insertion) order.
    pub fn all_orders(&self) -> Vec<LimitOrder> {
        let mut orders = Vec::new();
        for symbol in self.symbols() {
            if let Some(pair) = self.pair(&symbol) {
                for entry in pair.bids.iter() {
                    orders.push(entry.value().clone());
                }
                for entry in pair.asks.iter() {
                    orders.push(entry.value().clone());
                }
            }
        }
        orders
    }

    /// Every open order in insertion order, oldest first.
    pub fn orders_by_insertion(&self) -> Vec<LimitOrder> {
        let mut keyed: Vec<(u64, LimitOrder)> = Vec::new();
        for entry in self.pairs.iter() {
            for side in [&entry.value().bids, &entry.value().asks] {
                for order in side.iter() {
                    keyed.push((order.key().seq, order.value().clone()));
                }
            }
        }
        keyed.sort_by_key(|(seq, _)| *seq);
        keyed.into_iter().map(|(_, order)| order).collect()
    }

    /// Number of open orders.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Sum of balance holds per asset across all open orders.
    pub fn hold_for_asset(&self, asset: &str) -> Decimal {
        let mut total = Decimal::ZERO;
        for entry in self.pairs.iter() {
            for side in [&entry.value().bids, &entry.value().asks] {
                for order in side.iter() {
                    let (hold_asset, amount) = order.value().hold();
                    if hold_asset == asset {
                        total += amount;
                    }
                }
            }
        }
        total
    }
}
