//! Shared scaffolding for the cross-component tests.

use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, Once};
use xemm_paper::prelude::*;

static TRACING: Once = Once::new();

/// Route strategy/exchange logs through the test harness writer so
/// `cargo test -- --nocapture` shows them per test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Trading rules used throughout the seed scenarios: 8 significant digits,
/// 1e-4 price and size quanta at the tested magnitudes.
pub fn seed_params() -> QuantizationParams {
    QuantizationParams::new(8, 4, 8, 4)
}

/// An exchange with one configured pair and its replayed book.
pub fn venue(
    name: &str,
    base: &str,
    quote: &str,
) -> (Arc<PaperExchange>, Arc<xemm_paper::OrderBook>, TradingPair) {
    init_tracing();
    let exchange = Arc::new(PaperExchange::new(name));
    let pair = TradingPair::new(base, quote);
    let book = exchange.add_pair(pair.clone(), seed_params());
    (exchange, book, pair)
}

/// Collects every event a venue emits; keep the returned listener alive for
/// the duration of the test.
pub struct EventLog {
    pub events: Arc<Mutex<Vec<MarketEvent>>>,
    // dropping this unsubscribes, since the venue holds listeners weakly
    _listener: MarketEventListener,
}

impl EventLog {
    pub fn attach(exchange: &PaperExchange) -> Self {
        let events: Arc<Mutex<Vec<MarketEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener: MarketEventListener = Arc::new(move |event: &MarketEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        exchange.add_listener(&listener);
        Self {
            events,
            _listener: listener,
        }
    }

    pub fn snapshot(&self) -> Vec<MarketEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn filled(&self) -> Vec<OrderFilled> {
        self.snapshot()
            .into_iter()
            .filter_map(|event| match event {
                MarketEvent::OrderFilled(fill) => Some(fill),
                _ => None,
            })
            .collect()
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter_map(|event| match event {
                MarketEvent::OrderCancelled(cancelled) => Some(cancelled.order_id),
                _ => None,
            })
            .collect()
    }

    pub fn completed(&self) -> Vec<OrderCompleted> {
        self.snapshot()
            .into_iter()
            .filter_map(|event| match event {
                MarketEvent::BuyOrderCompleted(done) | MarketEvent::SellOrderCompleted(done) => {
                    Some(done)
                }
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<OrderFailure> {
        self.snapshot()
            .into_iter()
            .filter_map(|event| match event {
                MarketEvent::OrderFailure(failure) => Some(failure),
                _ => None,
            })
            .collect()
    }
}

/// Levels helper: a single (price, size) level.
pub fn level(price: Decimal, size: Decimal) -> (Decimal, Decimal) {
    (price, size)
}
