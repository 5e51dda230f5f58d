//! Market events emitted by venues and consumed by strategies.
//!
//! Emitters hold their listeners weakly, so a stopped strategy unsubscribes
//! by dropping its strong reference. A panicking listener is logged and
//! suppressed; it never prevents other listeners from running.

use crate::model::{OrderType, Side, TimestampMs};
use rust_decimal::Decimal;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, Weak};
use tracing::error;

/// An order has been accepted by the venue and entered its book or queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCreated {
    /// Venue timestamp of the acceptance
    pub ts: TimestampMs,
    /// Client order id
    pub order_id: String,
    /// Exchange-native pair symbol
    pub symbol: String,
    /// Limit or market
    pub order_type: OrderType,
    /// Limit price; `None` for market orders
    pub price: Option<Decimal>,
    /// Order amount in base units
    pub amount: Decimal,
}

/// One fill of an order, at a single price level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderFilled {
    /// Venue timestamp of the fill
    pub ts: TimestampMs,
    /// Client order id
    pub order_id: String,
    /// Exchange-native pair symbol
    pub symbol: String,
    /// Side of the filled order
    pub trade_type: Side,
    /// Limit or market
    pub order_type: OrderType,
    /// Fill price
    pub price: Decimal,
    /// Fill amount in base units
    pub amount: Decimal,
    /// Fee charged on this fill, in quote units
    pub fee: Decimal,
    /// Venue-side trade id
    pub exchange_trade_id: String,
}

/// An order has been completely filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCompleted {
    /// Venue timestamp of the completion
    pub ts: TimestampMs,
    /// Client order id
    pub order_id: String,
    /// Base asset code
    pub base: String,
    /// Quote asset code
    pub quote: String,
    /// Total base filled across all fills
    pub base_filled: Decimal,
    /// Total quote exchanged across all fills
    pub quote_filled: Decimal,
    /// Limit or market
    pub order_type: OrderType,
}

/// An order has been removed from the book without completing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCancelled {
    /// Venue timestamp of the cancellation
    pub ts: TimestampMs,
    /// Client order id
    pub order_id: String,
}

/// An order failed at execution time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderFailure {
    /// Venue timestamp of the failure
    pub ts: TimestampMs,
    /// Client order id
    pub order_id: String,
    /// Limit or market
    pub order_type: OrderType,
}

/// Every event a venue can surface to its subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MarketEvent {
    /// A buy order was accepted
    BuyOrderCreated(OrderCreated),
    /// A sell order was accepted
    SellOrderCreated(OrderCreated),
    /// An order was (partially) filled at one price level
    OrderFilled(OrderFilled),
    /// A buy order finished filling
    BuyOrderCompleted(OrderCompleted),
    /// A sell order finished filling
    SellOrderCompleted(OrderCompleted),
    /// An order was cancelled
    OrderCancelled(OrderCancelled),
    /// An order failed
    OrderFailure(OrderFailure),
}

impl MarketEvent {
    /// The client order id this event refers to.
    #[must_use]
    pub fn order_id(&self) -> &str {
        match self {
            MarketEvent::BuyOrderCreated(e) | MarketEvent::SellOrderCreated(e) => &e.order_id,
            MarketEvent::OrderFilled(e) => &e.order_id,
            MarketEvent::BuyOrderCompleted(e) | MarketEvent::SellOrderCompleted(e) => &e.order_id,
            MarketEvent::OrderCancelled(e) => &e.order_id,
            MarketEvent::OrderFailure(e) => &e.order_id,
        }
    }
}

/// Market event listener specification using Arc for shared ownership
pub type MarketEventListener = Arc<dyn Fn(&MarketEvent) + Send + Sync>;

/// Weak-listener fan-out used by venues.
#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<Vec<Weak<dyn Fn(&MarketEvent) + Send + Sync>>>,
}

impl EventEmitter {
    /// Create an emitter with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener. The emitter only keeps a weak reference.
    pub fn add_listener(&self, listener: &MarketEventListener) {
        let mut listeners = self.listeners.lock().expect("listener lock");
        listeners.push(Arc::downgrade(listener));
    }

    /// Unsubscribe a previously added listener.
    pub fn remove_listener(&self, listener: &MarketEventListener) {
        let target = Arc::downgrade(listener);
        let mut listeners = self.listeners.lock().expect("listener lock");
        listeners.retain(|weak| !Weak::ptr_eq(weak, &target));
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .expect("listener lock")
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Deliver an event to every live listener, in subscription order.
    ///
    /// A panicking listener is logged and suppressed so the remaining
    /// listeners still run and the tick completes.
    pub fn emit(&self, event: &MarketEvent) {
        let snapshot: Vec<_> = {
            let mut listeners = self.listeners.lock().expect("listener lock");
            listeners.retain(|weak| weak.strong_count() > 0);
            listeners.clone()
        };
        for weak in snapshot {
            if let Some(listener) = weak.upgrade()
                && catch_unwind(AssertUnwindSafe(|| listener(event))).is_err()
            {
                error!(order_id = event.order_id(), "market event listener panicked");
            }
        }
    }
}
