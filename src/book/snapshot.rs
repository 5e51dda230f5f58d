//! Order book snapshot for market data

use super::book::BookLevel;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A snapshot of the replayed book at a specific update id.
///
/// Bids are ordered best-first (descending), asks best-first (ascending),
/// matching the iteration order of the live book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Exchange-native pair symbol
    pub symbol: String,
    /// The update id the snapshot was taken at
    pub update_id: u64,
    /// Bid levels, best first
    pub bids: Vec<BookLevel>,
    /// Ask levels, best first
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    /// Best bid price and size.
    #[must_use]
    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.first().map(|level| (level.price, level.size))
    }

    /// Best ask price and size.
    #[must_use]
    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.first().map(|level| (level.price, level.size))
    }

    /// Mid price, when both sides are populated.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// The (price, size) pairs of both sides, for order-insensitive
    /// comparisons in tests and replay checks.
    #[must_use]
    pub fn levels(&self) -> (Vec<(Decimal, Decimal)>, Vec<(Decimal, Decimal)>) {
        (
            self.bids.iter().map(|l| (l.price, l.size)).collect(),
            self.asks.iter().map(|l| (l.price, l.size)).collect(),
        )
    }
}
