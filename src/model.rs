//! Core value types shared by the book, the paper exchange and the strategy.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Simulation timestamp in milliseconds. Produced by the cooperative clock,
/// never by wall time.
pub type TimestampMs = u64;

/// Side of an order or trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy the base asset, pay the quote asset
    Buy,
    /// Sell the base asset, receive the quote asset
    Sell,
}

impl Side {
    /// Returns the opposite side
    #[must_use]
    #[inline]
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Returns `true` for `Side::Buy`
    #[must_use]
    #[inline]
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Supported order types. The paper exchange accepts both; the strategy
/// quotes with limit orders and may hedge with either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Rests in the venue's book at a fixed price until matched or cancelled
    Limit,
    /// Executes immediately against the replayed book, after the venue's
    /// execution delay
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Limit => write!(f, "limit"),
            OrderType::Market => write!(f, "market"),
        }
    }
}

/// A trading pair on a specific venue.
///
/// `symbol` is the exchange-native pair string (for example `"BTC-USDT"`);
/// `base` and `quote` are the uppercase asset codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    /// Base asset code, uppercase ASCII
    pub base: String,
    /// Quote asset code, uppercase ASCII
    pub quote: String,
    /// Exchange-native pair string
    pub symbol: String,
}

impl TradingPair {
    /// Create a pair with the conventional `BASE-QUOTE` symbol.
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
            symbol: format!("{}-{}", base.to_uppercase(), quote.to_uppercase()),
        }
    }

    /// Create a pair with an explicit exchange-native symbol.
    pub fn with_symbol(base: &str, quote: &str, symbol: &str) -> Self {
        Self {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
            symbol: symbol.to_string(),
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// An open limit order resting on the paper exchange.
///
/// Immutable once inserted: repricing is modeled as cancel plus re-create,
/// which is also how the strategy treats its own quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    /// Client order id, `"buy://<pair>/<32-hex>"` or `"sell://<pair>/<32-hex>"`
    pub client_order_id: String,
    /// The pair this order trades
    pub pair: TradingPair,
    /// Buy or sell
    pub side: Side,
    /// Limit price, already quantized to the pair's price quantum
    pub price: Decimal,
    /// Order quantity in base units, already quantized
    pub quantity: Decimal,
    /// Creation timestamp
    pub created_at: TimestampMs,
    /// Optional venue-side expiration; expired orders are cancelled per tick
    pub expiration_ts: Option<TimestampMs>,
}

impl LimitOrder {
    /// Quote-side notional of this order (price × quantity).
    #[must_use]
    #[inline]
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    /// The asset and amount held against this order while it rests:
    /// quote notional for a buy, base quantity for a sell.
    #[must_use]
    pub fn hold(&self) -> (&str, Decimal) {
        match self.side {
            Side::Buy => (self.pair.quote.as_str(), self.notional()),
            Side::Sell => (self.pair.base.as_str(), self.quantity),
        }
    }
}

/// A market order waiting in the execution-delay queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOrder {
    /// Submission timestamp; the queue is FIFO by this field
    pub created_at: TimestampMs,
    /// Client order id
    pub client_order_id: String,
    /// Buy or sell
    pub side: Side,
    /// The pair this order trades
    pub pair: TradingPair,
    /// Quantity in base units
    pub amount: Decimal,
}

/// Connectivity state reported by a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkStatus {
    /// Venue is reachable and serving data
    Connected,
    /// Venue dropped; the strategy skips its pairs and warns
    NotConnected,
}

/// Outcome of one order inside a `cancel_all` sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationResult {
    /// The client order id the cancellation was attempted for
    pub order_id: String,
    /// Whether the venue acknowledged the cancellation
    pub success: bool,
}

impl CancellationResult {
    /// Create a new cancellation result.
    pub fn new(order_id: impl Into<String>, success: bool) -> Self {
        Self {
            order_id: order_id.into(),
            success,
        }
    }
}

impl fmt::Display for CancellationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.order_id,
            if self.success { "cancelled" } else { "failed" }
        )
    }
}

/// Generate a fresh client order id for the given side and pair.
///
/// The format is `"<side>://<pair>/<32-hex>"`, so the side is always
/// recoverable from the id alone via [`side_from_order_id`].
pub fn new_client_order_id(side: Side, pair: &TradingPair) -> String {
    format!("{}://{}/{}", side, pair.symbol, Uuid::new_v4().simple())
}

/// Decode the side from a client order id prefix.
///
/// Returns `None` for malformed ids; callers surface this as invalid input.
#[must_use]
pub fn side_from_order_id(order_id: &str) -> Option<Side> {
    if order_id.starts_with("buy://") {
        Some(Side::Buy)
    } else if order_id.starts_with("sell://") {
        Some(Side::Sell)
    } else {
        None
    }
}
