pub mod coingecko;
#[cfg(test)]
pub mod fixture;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::market_data::types::MarketPage;

/// A paginated source of market records.
///
/// One call is one upstream request. Implementations do not retry: pacing
/// and retry policy belong to the governor.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch page `page` (1-based) holding up to `per_page` records,
    /// ordered by market cap descending.
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<MarketPage, FetchError>;
}
