//! Paper-trading exchange: order submission, balance accounting and
//! tick-driven matching against the replayed book.

mod error;
mod events;
mod fees;
mod limit_store;
mod matching;
mod paper;

pub use error::ExchangeError;
pub use events::{
    EventEmitter, MarketEvent, MarketEventListener, OrderCancelled, OrderCompleted, OrderCreated,
    OrderFailure, OrderFilled,
};
pub use fees::{FeeFn, FeeRequest, FeeSchedule};
pub use paper::{ORDER_CREATED_DELAY_MS, PaperExchange, TRADE_EXECUTION_DELAY_MS};
