//! Paper exchange error types

use rust_decimal::Decimal;
use std::fmt;

/// Errors that can occur when submitting orders to the paper exchange.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ExchangeError {
    /// The trading pair has not been configured on this venue
    UnknownPair(String),

    /// The order size quantized to zero or below
    InvalidOrderSize {
        /// Pair the order was submitted for
        symbol: String,
        /// The raw size that was rejected
        size: Decimal,
    },

    /// The limit price quantized to zero or below
    InvalidOrderPrice {
        /// Pair the order was submitted for
        symbol: String,
        /// The raw price that was rejected
        price: Decimal,
    },

    /// A limit order was submitted without a price
    MissingPrice {
        /// The offending order id
        order_id: String,
    },
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::UnknownPair(symbol) => write!(f, "unknown trading pair: {symbol}"),
            ExchangeError::InvalidOrderSize { symbol, size } => {
                write!(f, "order size {size} for {symbol} quantizes to zero")
            }
            ExchangeError::InvalidOrderPrice { symbol, price } => {
                write!(f, "order price {price} for {symbol} quantizes to zero")
            }
            ExchangeError::MissingPrice { order_id } => {
                write!(f, "limit order {order_id} requires a price")
            }
        }
    }
}

impl std::error::Error for ExchangeError {}
