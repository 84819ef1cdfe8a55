use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::MarketDataSource;
use crate::error::FetchError;
use crate::market_data::types::{MarketPage, MarketRecord};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Client for the public `/coins/markets` endpoint.
pub struct CoinGeckoClient {
    base_url: String,
    http: reqwest::Client,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            anyhow::bail!("invalid market data base url: must start with http:// or https://, got '{base_url}'");
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url, http })
    }

    fn page_request(&self, page: u32, per_page: u32) -> reqwest::Result<reqwest::Request> {
        let per_page = per_page.to_string();
        let page = page.to_string();

        self.http
            .get(format!("{}/coins/markets", self.base_url))
            .query(&[
                ("vs_currency", "usd"),
                ("order", "market_cap_desc"),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ])
            .build()
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<MarketPage, FetchError> {
        let request = self.page_request(page, per_page)?;
        debug!(url = %request.url(), "requesting market page");

        let response = self.http.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(decode_page(&body))
    }
}

/// Decodes a markets response body.
///
/// Anything that is not a JSON array counts as an empty page. Entries that
/// fail to decode are skipped so one bad record does not sink the page, but
/// they still count toward `returned`.
pub fn decode_page(body: &[u8]) -> MarketPage {
    if body.iter().all(u8::is_ascii_whitespace) {
        return MarketPage::default();
    }

    let entries = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(entries)) => entries,
        Ok(other) => {
            warn!(kind = json_kind(&other), "market response is not an array, treating as empty page");
            return MarketPage::default();
        }
        Err(err) => {
            warn!(error = %err, "market response is not valid JSON, treating as empty page");
            return MarketPage::default();
        }
    };

    let returned = entries.len();
    let records = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<MarketRecord>(entry) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(index, error = %err, "skipping malformed market record");
                None
            }
        })
        .collect();

    MarketPage { records, returned }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
