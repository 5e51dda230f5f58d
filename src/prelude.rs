//! Prelude module that re-exports commonly used types and traits.
//!
//! Instead of importing each type individually, you can use:
//!
//! ```rust
//! use xemm_paper::prelude::*;
//! ```

// Book types
pub use crate::book::{
    BookError, BookLevel, BookQueryResult, BookTradeEvent, BookTradeListener, OrderBook,
    OrderBookSnapshot,
};

// Clock types
pub use crate::clock::{Clock, Tickable};

// Venue contract and the paper implementation
pub use crate::exchange::{
    ExchangeError, FeeFn, FeeRequest, FeeSchedule, MarketEvent, MarketEventListener,
    OrderCancelled, OrderCompleted, OrderCreated, OrderFailure, OrderFilled, PaperExchange,
};
pub use crate::market::{Market, MarketPair};

// Core value types
pub use crate::model::{
    CancellationResult, LimitOrder, NetworkStatus, OrderType, QueuedOrder, Side, TimestampMs,
    TradingPair,
};
pub use crate::quant::QuantizationParams;

// Strategy types
pub use crate::strategy::{FixedRateOracle, RateOracle, StrategyPair, XemmConfig, XemmStrategy};
pub use crate::tracker::OrderIdTracker;
