//! # Cross-Exchange Market-Making Engine with Paper-Trading Simulator
//!
//! A deterministic simulation core for cross-exchange market making (XEMM):
//! the strategy quotes limit orders on a *maker* venue and, when those quotes
//! fill, immediately hedges the acquired inventory with orders on a *taker*
//! venue where the same asset trades at a different price. The paper-trading
//! exchange it drives accepts such orders, matches them against a replayed
//! public order book, tracks balances, and emits the fill/cancel events the
//! strategy consumes.
//!
//! ## Key Components
//!
//! - **[`OrderBook`]**: a per-pair book replayed from snapshot and diff feeds
//!   with strictly increasing update ids, supporting VWAP and
//!   volume-for-price traversals and public-trade events.
//!
//! - **[`PaperExchange`]**: the venue contract implemented in process. Limit
//!   orders rest in price-ordered stores with FIFO fairness inside a level;
//!   market orders execute after a fixed delay; balances carry per-order
//!   holds and are never driven negative, since an unfunded resting order is
//!   cancelled with an observable event instead.
//!
//! - **[`Clock`]**: a cooperative single-threaded clock. Every component
//!   implements [`Tickable`] and is ticked in registration order; all
//!   strategy logic runs synchronously to completion inside one tick.
//!
//! - **[`XemmStrategy`]**: the market-making control loop. Sizing is bounded
//!   by balances on both venues and the taker-side hedgeable volume; pricing
//!   shifts the taker VWAP by the minimum profitability; drift, funding and
//!   profitability checks cancel stale quotes with an anti-hysteresis
//!   window; fills are hedged immediately with a slippage cushion.
//!
//! - **[`OrderIdTracker`]**: attributes every order id back to its strategy
//!   pair, retaining cancelled ids for a TTL so late fills still resolve.
//!
//! ## Determinism
//!
//! One simulation run is fully deterministic: a single logical clock drives
//! every component, matching is ordered by (pair, side, price), and events
//! within a tick are delivered in production order: `Created` before
//! `Filled`, `Filled` before `Completed`, `Cancelled` exclusive with
//! `Completed`. External feed adapters stage their input through
//! thread-safe inboxes drained at tick start.
//!
//! ## Quick Start
//!
//! ```
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//! use xemm_paper::prelude::*;
//!
//! // two venues, one pair each
//! let maker = Arc::new(PaperExchange::new("maker"));
//! let taker = Arc::new(PaperExchange::new("taker"));
//! let maker_pair = TradingPair::new("BTC", "USDT");
//! let taker_pair = TradingPair::new("BTC", "USDT");
//! let params = QuantizationParams::new(8, 4, 8, 4);
//! let maker_book = maker.add_pair(maker_pair.clone(), params);
//! let taker_book = taker.add_pair(taker_pair.clone(), params);
//!
//! // seed books and balances
//! let bids = [(Decimal::from(99), Decimal::from(10))];
//! let asks = [(Decimal::from(100), Decimal::from(10))];
//! maker_book.apply_snapshot(&bids, &asks, 1).unwrap();
//! taker_book.apply_snapshot(&bids, &asks, 1).unwrap();
//! maker.set_balance("USDT", Decimal::from(10_000));
//! taker.set_balance("BTC", Decimal::from(10));
//!
//! // wire the strategy and the clock
//! let strategy = XemmStrategy::new(
//!     XemmConfig::default(),
//!     vec![StrategyPair::new(
//!         MarketPair::new(maker.clone(), maker_pair),
//!         MarketPair::new(taker.clone(), taker_pair),
//!     )],
//!     None,
//! );
//! strategy.start();
//!
//! let clock = Clock::new();
//! clock.register(maker.clone());
//! clock.register(taker.clone());
//! clock.register(strategy.clone());
//! clock.run(0, 1_000, 100);
//!
//! assert!(maker.open_order_count() > 0);
//! strategy.stop();
//! ```

pub mod book;
pub mod clock;
pub mod exchange;
pub mod market;
pub mod model;
pub mod prelude;
pub mod quant;
pub mod strategy;
pub mod tracker;

pub use book::{
    BookError, BookLevel, BookQueryResult, BookTradeEvent, BookTradeListener, OrderBook,
    OrderBookSnapshot,
};
pub use clock::{Clock, Tickable};
pub use exchange::{
    EventEmitter, ExchangeError, FeeFn, FeeRequest, FeeSchedule, MarketEvent, MarketEventListener,
    ORDER_CREATED_DELAY_MS, OrderCancelled, OrderCompleted, OrderCreated, OrderFailure,
    OrderFilled, PaperExchange, TRADE_EXECUTION_DELAY_MS,
};
pub use market::{Market, MarketPair};
pub use model::{
    CancellationResult, LimitOrder, NetworkStatus, OrderType, QueuedOrder, Side, TimestampMs,
    TradingPair, new_client_order_id, side_from_order_id,
};
pub use quant::QuantizationParams;
pub use strategy::{FixedRateOracle, RateOracle, StrategyPair, XemmConfig, XemmStrategy};
pub use tracker::{DEFAULT_TRACKING_TTL_MS, OrderIdTracker, TrackedOrder};
