//! Public-trade events emitted by the replayed book.

use crate::model::Side;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// An external trade observed on the venue's public feed.
///
/// `side` is the aggressor side: a `Sell` trade swept into the bids, a `Buy`
/// trade swept into the asks. The paper exchange uses these to fill resting
/// limit orders the sweep traversed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookTradeEvent {
    /// Exchange-native pair symbol
    pub symbol: String,
    /// Aggressor side of the trade
    pub side: Side,
    /// Trade price
    pub price: Decimal,
    /// Trade amount in base units
    pub amount: Decimal,
}

/// Trade listener specification using Arc for shared ownership
pub type BookTradeListener = Arc<dyn Fn(&BookTradeEvent) + Send + Sync>;
