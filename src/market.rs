//! The venue capability contract and the per-pair market handle.
//!
//! Strategies never see a concrete exchange type: paper and live venues are
//! variants of the same contract, and every operation the strategy needs is
//! on this trait.

use crate::book::OrderBook;
use crate::exchange::{ExchangeError, MarketEventListener};
use crate::model::{CancellationResult, NetworkStatus, OrderType, TradingPair};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Everything a strategy requires from a venue.
pub trait Market: Send + Sync {
    /// Venue name, unique within one simulation.
    fn name(&self) -> &str;

    /// Current connectivity.
    fn network_status(&self) -> NetworkStatus;

    /// Whether the venue is connected and serving usable books.
    fn ready(&self) -> bool;

    /// Submit a buy order. Limit orders require `price`; market orders
    /// ignore it. `expiration_ms` attaches a venue-side expiration.
    fn buy(
        &self,
        pair: &TradingPair,
        amount: Decimal,
        order_type: OrderType,
        price: Option<Decimal>,
        expiration_ms: Option<u64>,
    ) -> Result<String, ExchangeError>;

    /// Submit a sell order. Same conventions as [`Market::buy`].
    fn sell(
        &self,
        pair: &TradingPair,
        amount: Decimal,
        order_type: OrderType,
        price: Option<Decimal>,
        expiration_ms: Option<u64>,
    ) -> Result<String, ExchangeError>;

    /// Cancel an order. Fire-and-forget and idempotent: if the order still
    /// exists, the next tick emits an `OrderCancelled` event.
    fn cancel(&self, pair: &TradingPair, order_id: &str);

    /// Cancel every open order, waiting at most `timeout_ms` for
    /// acknowledgements.
    fn cancel_all(&self, timeout_ms: u64) -> Vec<CancellationResult>;

    /// The price a taker pays on this venue: best ask when buying, best bid
    /// when selling.
    fn get_price(&self, pair: &TradingPair, is_buy: bool) -> Option<Decimal>;

    /// The venue's replayed book for a pair.
    fn order_book(&self, pair: &TradingPair) -> Option<Arc<OrderBook>>;

    /// Total balance of an asset.
    fn balance(&self, asset: &str) -> Decimal;

    /// Balance net of holds backing open limit orders.
    fn available_balance(&self, asset: &str) -> Decimal;

    /// Quantize a price per the pair's trading rules.
    fn quantize_order_price(&self, pair: &TradingPair, price: Decimal) -> Decimal;

    /// Quantize an amount per the pair's trading rules.
    fn quantize_order_amount(&self, pair: &TradingPair, amount: Decimal) -> Decimal;

    /// The price quantum in effect at the given magnitude.
    fn order_price_quantum(&self, pair: &TradingPair, price: Decimal) -> Decimal;

    /// The size quantum in effect at the given magnitude.
    fn order_size_quantum(&self, pair: &TradingPair, size: Decimal) -> Decimal;

    /// Subscribe to this venue's market events. The venue holds the
    /// listener weakly.
    fn add_listener(&self, listener: &MarketEventListener);

    /// Unsubscribe a previously added listener.
    fn remove_listener(&self, listener: &MarketEventListener);
}

/// A venue handle bound to one trading pair, with the top-of-book accessors
/// the strategy samples every tick.
#[derive(Clone)]
pub struct MarketPair {
    /// The venue
    pub market: Arc<dyn Market>,
    /// The pair traded on it
    pub pair: TradingPair,
}

impl MarketPair {
    /// Bind a venue to a pair.
    pub fn new(market: Arc<dyn Market>, pair: TradingPair) -> Self {
        Self { market, pair }
    }

    /// Best bid on this pair's book.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.market.get_price(&self.pair, false)
    }

    /// Best ask on this pair's book.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.market.get_price(&self.pair, true)
    }

    /// The effective top price after skipping `tolerance` volume of dust.
    #[must_use]
    pub fn top_price_with_tolerance(&self, is_buy: bool, tolerance: Decimal) -> Option<Decimal> {
        self.market
            .order_book(&self.pair)?
            .top_price_with_tolerance(is_buy, tolerance)
    }

    /// Mid price, when both sides are populated.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// This pair's replayed book on the venue.
    #[must_use]
    pub fn order_book(&self) -> Option<Arc<OrderBook>> {
        self.market.order_book(&self.pair)
    }

    /// Total base-asset balance on the venue.
    #[must_use]
    pub fn base_balance(&self) -> Decimal {
        self.market.balance(&self.pair.base)
    }

    /// Available base-asset balance on the venue.
    #[must_use]
    pub fn available_base_balance(&self) -> Decimal {
        self.market.available_balance(&self.pair.base)
    }

    /// Total quote-asset balance on the venue.
    #[must_use]
    pub fn quote_balance(&self) -> Decimal {
        self.market.balance(&self.pair.quote)
    }

    /// Available quote-asset balance on the venue.
    #[must_use]
    pub fn available_quote_balance(&self) -> Decimal {
        self.market.available_balance(&self.pair.quote)
    }
}
