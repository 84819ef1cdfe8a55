use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::market_data::types::MarketRecord;
use crate::strategy::Trend;

/// Everything a subscriber can observe about the synchronized market data.
///
/// Cloning is cheap: the record list sits behind an `Arc` and is only
/// copied when a load-more appends while someone still holds the old list.
#[derive(Debug, Clone)]
pub struct SyncState {
    /// Provider order (market cap descending), pages concatenated.
    pub records: Arc<Vec<MarketRecord>>,
    /// Last page whose fetch began and did not fail.
    pub page: u32,
    pub has_more: bool,
    /// Completion time of the last successful fetch.
    pub last_fetch_time: Option<DateTime<Utc>>,
    /// Initial or page load in progress.
    pub loading: bool,
    /// Pull-to-refresh in progress.
    pub refreshing: bool,
    pub error: Option<String>,
    pub trend: Trend,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            records: Arc::new(Vec::new()),
            page: 1,
            has_more: true,
            last_fetch_time: None,
            loading: false,
            refreshing: false,
            error: None,
            trend: Trend::Neutral,
        }
    }
}

impl SyncState {
    pub fn is_busy(&self) -> bool {
        self.loading || self.refreshing
    }
}
