//! Maps in-flight client order ids back to the strategy pair that owns them.
//!
//! Ids are kept past cancellation for a retention window so fills that
//! arrive after a cancel are still attributed to the right pair; expired
//! entries are garbage collected per tick.

use crate::model::TimestampMs;
use dashmap::DashMap;

/// Retention window for stopped ids, 180 seconds.
pub const DEFAULT_TRACKING_TTL_MS: u64 = 180_000;

/// One tracked order id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOrder {
    /// The client order id
    pub order_id: String,
    /// Name of the venue the order lives on
    pub exchange: String,
    /// Index of the strategy pair that owns the order
    pub pair_id: usize,
    /// Set by `stop_tracking`; entries past this are garbage collected
    pub expiry_ts: Option<TimestampMs>,
}

/// Bidirectional order-id bookkeeping for a strategy.
pub struct OrderIdTracker {
    items: DashMap<String, TrackedOrder>,
    ttl_ms: u64,
}

impl OrderIdTracker {
    /// Create a tracker with the default 180 s retention window.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TRACKING_TTL_MS)
    }

    /// Create a tracker with an explicit retention window.
    pub fn with_ttl(ttl_ms: u64) -> Self {
        Self {
            items: DashMap::new(),
            ttl_ms,
        }
    }

    /// Start tracking an order id for a (venue, pair) pair.
    pub fn start_tracking(&self, order_id: &str, exchange: &str, pair_id: usize) {
        self.items.insert(
            order_id.to_string(),
            TrackedOrder {
                order_id: order_id.to_string(),
                exchange: exchange.to_string(),
                pair_id,
                expiry_ts: None,
            },
        );
    }

    /// Mark an id stopped: it stays resolvable for the retention window,
    /// then gets garbage collected.
    pub fn stop_tracking(&self, order_id: &str, now: TimestampMs) {
        if let Some(mut item) = self.items.get_mut(order_id) {
            item.expiry_ts = Some(now + self.ttl_ms);
        }
    }

    /// Resolve an id to its (venue, pair index), if still tracked.
    #[must_use]
    pub fn lookup(&self, order_id: &str) -> Option<(String, usize)> {
        self.items
            .get(order_id)
            .map(|item| (item.exchange.clone(), item.pair_id))
    }

    /// Whether the id is tracked (live or in the retention window).
    #[must_use]
    pub fn contains(&self, order_id: &str) -> bool {
        self.items.contains_key(order_id)
    }

    /// Number of tracked ids, including stopped ones not yet collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop entries whose retention window has passed.
    pub fn collect_expired(&self, now: TimestampMs) {
        self.items
            .retain(|_, item| !item.expiry_ts.is_some_and(|at| at <= now));
    }
}

impl Default for OrderIdTracker {
    fn default() -> Self {
        Self::new()
    }
}
