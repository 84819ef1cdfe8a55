use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::MarketDataSource;
use crate::error::FetchError;
use crate::market_data::types::{MarketPage, MarketRecord};

/// Replays queued responses in order. Once the queue is empty every call
/// returns an empty page.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<MarketPage, FetchError>>>,
    calls: Mutex<Vec<u32>>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn push_page(&self, records: Vec<MarketRecord>) {
        self.responses.lock().push_back(Ok(records.into()));
    }

    /// Queues a page where the provider sent `returned` entries but only
    /// `records` decoded.
    pub fn push_partial_page(&self, records: Vec<MarketRecord>, returned: usize) {
        self.responses.lock().push_back(Ok(MarketPage { records, returned }));
    }

    pub fn push_error(&self, err: FetchError) {
        self.responses.lock().push_back(Err(err));
    }

    /// Page numbers requested so far, in call order.
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_page(&self, page: u32, _per_page: u32) -> Result<MarketPage, FetchError> {
        self.calls.lock().push(page);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.responses.lock().pop_front().unwrap_or_else(|| Ok(MarketPage::default()))
    }
}

/// Builds a record whose 24h change is `change_tenths / 10` percent.
pub fn record(id: &str, change_tenths: i64) -> MarketRecord {
    MarketRecord {
        id: id.to_string(),
        symbol: id.to_uppercase(),
        name: format!("{id} coin"),
        image: String::new(),
        current_price: Decimal::ONE,
        price_change_percentage_24h: Decimal::new(change_tenths, 1),
        market_cap: Decimal::from(1_000_000),
        total_volume: Decimal::from(10_000),
    }
}

/// `count` records named `{prefix}-{n}`, all with the same 24h change.
pub fn page(prefix: &str, count: usize, change_tenths: i64) -> Vec<MarketRecord> {
    (0..count)
        .map(|n| record(&format!("{prefix}-{n}"), change_tenths))
        .collect()
}
