//! Core replayed order book: price levels fed by snapshots, diffs and trades.

use super::error::BookError;
use super::events::{BookTradeEvent, BookTradeListener};
use super::snapshot::OrderBookSnapshot;
use crate::model::Side;
use crossbeam_skiplist::SkipMap;
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{trace, warn};

/// One price level of the replayed book.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BookLevel {
    /// Level price
    pub price: Decimal,
    /// Resting size at this price, in base units
    pub size: Decimal,
    /// The feed update id that produced this level
    pub update_id: u64,
}

/// Result of a depth traversal (VWAP or marginal-price query).
#[derive(Debug, Clone, PartialEq)]
pub struct BookQueryResult {
    /// The volume the query asked for
    pub query_volume: Decimal,
    /// Size-weighted average price over the traversed levels
    pub average_price: Decimal,
    /// Price of the deepest traversed level
    pub marginal_price: Decimal,
}

/// A per-pair order book replayed from an external feed.
///
/// Bids and asks are kept in skip lists ordered by price; bids are read in
/// reverse for descending iteration. Updates are only accepted with strictly
/// increasing `update_id`s, and stale updates are dropped with a warning and
/// counted so tests and monitors can observe the drops.
///
/// All methods take `&self`; the book is shared between the feed adapter,
/// the paper exchange and the strategy through an `Arc`.
pub struct OrderBook {
    /// Exchange-native pair symbol this book replays
    symbol: String,

    /// Bid side, keyed by price ascending; iterate `.rev()` for best-first
    bids: SkipMap<Decimal, BookLevel>,

    /// Ask side, keyed by price ascending; best-first in natural order
    asks: SkipMap<Decimal, BookLevel>,

    /// Highest update id applied so far (snapshot or diff)
    last_applied_id: AtomicU64,

    /// Update id of the last accepted snapshot
    last_snapshot_id: AtomicU64,

    /// Number of snapshots/diffs dropped for non-increasing ids
    stale_drops: AtomicU64,

    /// Listeners fed on every recorded external trade
    trade_listeners: Mutex<Vec<Weak<dyn Fn(&BookTradeEvent) + Send + Sync>>>,
}

impl OrderBook {
    /// Create an empty book for the given pair symbol.
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            last_applied_id: AtomicU64::new(0),
            last_snapshot_id: AtomicU64::new(0),
            stale_drops: AtomicU64::new(0),
            trade_listeners: Mutex::new(Vec::new()),
        }
    }

    /// The pair symbol this book replays.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Register a listener for recorded external trades.
    ///
    /// The book holds the listener weakly; the subscriber keeps the strong
    /// reference and is dropped from the list once it goes away.
    pub fn add_trade_listener(&self, listener: &BookTradeListener) {
        let mut listeners = self.trade_listeners.lock().expect("listener lock");
        listeners.push(std::sync::Arc::downgrade(listener));
    }

    /// Replace both sides with the given levels.
    ///
    /// The snapshot is dropped (and the drop counted) unless `update_id` is
    /// strictly greater than the previous snapshot's.
    pub fn apply_snapshot(
        &self,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
        update_id: u64,
    ) -> Result<(), BookError> {
        let last = self.last_snapshot_id.load(Ordering::Acquire);
        if update_id <= last {
            return Err(self.drop_stale(last, update_id));
        }

        // SkipMap has no clear; drain from the front
        while self.bids.pop_front().is_some() {}
        while self.asks.pop_front().is_some() {}
        for &(price, size) in bids {
            if size > Decimal::ZERO {
                self.bids.insert(
                    price,
                    BookLevel {
                        price,
                        size,
                        update_id,
                    },
                );
            }
        }
        for &(price, size) in asks {
            if size > Decimal::ZERO {
                self.asks.insert(
                    price,
                    BookLevel {
                        price,
                        size,
                        update_id,
                    },
                );
            }
        }
        self.last_snapshot_id.store(update_id, Ordering::Release);
        self.last_applied_id.store(update_id, Ordering::Release);
        trace!(symbol = %self.symbol, update_id, "applied snapshot");
        Ok(())
    }

    /// Upsert the given levels; a zero size removes the level.
    ///
    /// Out-of-order diffs are dropped and logged.
    pub fn apply_diff(
        &self,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
        update_id: u64,
    ) -> Result<(), BookError> {
        let last = self.last_applied_id.load(Ordering::Acquire);
        if update_id <= last {
            return Err(self.drop_stale(last, update_id));
        }

        for &(price, size) in bids {
            if size.is_zero() {
                self.bids.remove(&price);
            } else {
                self.bids.insert(
                    price,
                    BookLevel {
                        price,
                        size,
                        update_id,
                    },
                );
            }
        }
        for &(price, size) in asks {
            if size.is_zero() {
                self.asks.remove(&price);
            } else {
                self.asks.insert(
                    price,
                    BookLevel {
                        price,
                        size,
                        update_id,
                    },
                );
            }
        }
        self.last_applied_id.store(update_id, Ordering::Release);
        trace!(symbol = %self.symbol, update_id, "applied diff");
        Ok(())
    }

    fn drop_stale(&self, last_applied: u64, received: u64) -> BookError {
        self.stale_drops.fetch_add(1, Ordering::Relaxed);
        warn!(
            symbol = %self.symbol,
            received, last_applied, "dropping stale book update"
        );
        BookError::StaleUpdate {
            last_applied,
            received,
        }
    }

    /// Number of snapshots/diffs dropped for non-increasing update ids.
    #[must_use]
    pub fn stale_update_count(&self) -> u64 {
        self.stale_drops.load(Ordering::Relaxed)
    }

    /// Best (highest) bid price.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.back().map(|entry| *entry.key())
    }

    /// Best (lowest) ask price.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.front().map(|entry| *entry.key())
    }

    /// The price a taker pays: best ask when buying, best bid when selling.
    #[must_use]
    pub fn top_price(&self, is_buy: bool) -> Option<Decimal> {
        if is_buy { self.best_ask() } else { self.best_bid() }
    }

    /// Mid price, when both sides are populated.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// `true` once both sides hold at least one level.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    /// Total resting volume on one side.
    #[must_use]
    pub fn side_volume(&self, is_buy: bool) -> Decimal {
        let side = if is_buy { &self.asks } else { &self.bids };
        side.iter().map(|entry| entry.value().size).sum()
    }

    /// Size-weighted average price for consuming `volume` from the book.
    ///
    /// `is_buy = true` walks the asks (cost of buying); `false` walks the
    /// bids (proceeds of selling).
    ///
    /// # Errors
    /// [`BookError::NotEnoughLiquidity`] when the side is exhausted before
    /// `volume` is covered.
    pub fn vwap_for_volume(
        &self,
        is_buy: bool,
        volume: Decimal,
    ) -> Result<BookQueryResult, BookError> {
        self.traverse(is_buy, volume)
    }

    /// Marginal price for consuming `volume`: the price of the deepest level
    /// the traversal reaches. This is the limit price a taker order needs to
    /// clear the full size.
    ///
    /// # Errors
    /// [`BookError::NotEnoughLiquidity`] when the side is exhausted first.
    pub fn price_for_volume(&self, is_buy: bool, volume: Decimal) -> Result<Decimal, BookError> {
        self.traverse(is_buy, volume).map(|r| r.marginal_price)
    }

    fn traverse(&self, is_buy: bool, volume: Decimal) -> Result<BookQueryResult, BookError> {
        let side = if is_buy { &self.asks } else { &self.bids };
        let iter: Box<dyn Iterator<Item = _>> = if is_buy {
            Box::new(side.iter())
        } else {
            Box::new(side.iter().rev())
        };

        let mut remaining = volume;
        let mut notional = Decimal::ZERO;
        let mut filled = Decimal::ZERO;
        let mut marginal = Decimal::ZERO;
        for entry in iter {
            if remaining <= Decimal::ZERO {
                break;
            }
            let level = entry.value();
            let take = level.size.min(remaining);
            notional += level.price * take;
            filled += take;
            marginal = level.price;
            remaining -= take;
        }

        if remaining > Decimal::ZERO || filled.is_zero() {
            return Err(BookError::NotEnoughLiquidity {
                side: if is_buy { Side::Buy } else { Side::Sell },
                requested: volume,
                available: filled,
            });
        }
        Ok(BookQueryResult {
            query_volume: volume,
            average_price: notional / filled,
            marginal_price: marginal,
        })
    }

    /// Volume available at or better than `price`.
    ///
    /// `is_buy = true` sums asks priced at or below `price`; `false` sums
    /// bids priced at or above it.
    #[must_use]
    pub fn volume_for_price(&self, is_buy: bool, price: Decimal) -> Decimal {
        let side = if is_buy { &self.asks } else { &self.bids };
        let iter: Box<dyn Iterator<Item = _>> = if is_buy {
            Box::new(side.iter())
        } else {
            Box::new(side.iter().rev())
        };

        let mut volume = Decimal::ZERO;
        for entry in iter {
            let level = entry.value();
            let crosses = if is_buy {
                level.price > price
            } else {
                level.price < price
            };
            if crosses {
                break;
            }
            volume += level.size;
        }
        volume
    }

    /// The effective top price after skipping `tolerance` volume from the
    /// top of the side, damping the influence of dust orders.
    #[must_use]
    pub fn top_price_with_tolerance(&self, is_buy: bool, tolerance: Decimal) -> Option<Decimal> {
        if tolerance <= Decimal::ZERO {
            return self.top_price(is_buy);
        }
        let side = if is_buy { &self.asks } else { &self.bids };
        let iter: Box<dyn Iterator<Item = _>> = if is_buy {
            Box::new(side.iter())
        } else {
            Box::new(side.iter().rev())
        };
        let mut consumed = Decimal::ZERO;
        for entry in iter {
            consumed += entry.value().size;
            if consumed >= tolerance {
                return Some(entry.value().price);
            }
        }
        None
    }

    /// Inform the book that a simulated market order consumed liquidity, so
    /// subsequent reads reflect the post-trade state until the next diff.
    ///
    /// `rows` are the (price, amount) fills of the order; `is_buy` is the
    /// taker side, so a buy consumes the asks.
    pub fn record_filled_order(&self, is_buy: bool, rows: &[(Decimal, Decimal)]) {
        let side = if is_buy { &self.asks } else { &self.bids };
        for &(price, amount) in rows {
            if let Some(entry) = side.get(&price) {
                let level = entry.value().clone();
                // SkipMap entries are immutable in place: replace the level
                entry.remove();
                let rest = level.size - amount;
                if rest > Decimal::ZERO {
                    side.insert(
                        price,
                        BookLevel {
                            price,
                            size: rest,
                            update_id: level.update_id,
                        },
                    );
                }
            }
        }
    }

    /// Record an external trade: consume the swept side up to the trade
    /// price and notify trade listeners.
    ///
    /// The aggressor `side` determines the swept side; a `Sell` trade eats
    /// into the bids down to `price`, a `Buy` trade into the asks up to it.
    pub fn record_trade(&self, side: Side, price: Decimal, amount: Decimal) {
        let swept = match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        };
        let iter: Box<dyn Iterator<Item = _>> = match side {
            Side::Buy => Box::new(swept.iter()),
            Side::Sell => Box::new(swept.iter().rev()),
        };

        // collect the traversed keys first, then mutate
        let mut remaining = amount;
        let mut consumed: Vec<(Decimal, Decimal)> = Vec::new();
        for entry in iter {
            if remaining <= Decimal::ZERO {
                break;
            }
            let level = entry.value();
            let crossed = match side {
                Side::Buy => level.price > price,
                Side::Sell => level.price < price,
            };
            if crossed {
                break;
            }
            let take = level.size.min(remaining);
            consumed.push((level.price, take));
            remaining -= take;
        }
        for &(level_price, take) in &consumed {
            if let Some(entry) = swept.get(&level_price) {
                let level = entry.value().clone();
                entry.remove();
                let rest = level.size - take;
                if rest > Decimal::ZERO {
                    swept.insert(
                        level_price,
                        BookLevel {
                            price: level_price,
                            size: rest,
                            update_id: level.update_id,
                        },
                    );
                }
            }
        }

        let event = BookTradeEvent {
            symbol: self.symbol.clone(),
            side,
            price,
            amount,
        };
        self.notify_trade(&event);
    }

    fn notify_trade(&self, event: &BookTradeEvent) {
        let mut listeners = self.trade_listeners.lock().expect("listener lock");
        listeners.retain(|weak| match weak.upgrade() {
            Some(listener) => {
                listener(event);
                true
            }
            None => false,
        });
    }

    /// Capture the current levels as a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol: self.symbol.clone(),
            update_id: self.last_applied_id.load(Ordering::Acquire),
            bids: self
                .bids
                .iter()
                .rev()
                .map(|entry| entry.value().clone())
                .collect(),
            asks: self.asks.iter().map(|entry| entry.value().clone()).collect(),
        }
    }
}
