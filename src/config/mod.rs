use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::market_data::adapters::coingecko::DEFAULT_BASE_URL;
use crate::market_data::governor::MIN_REQUEST_INTERVAL;

/// Records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 200;
/// How long a successful fetch keeps `revalidate` from hitting the network.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SNAPSHOT_DIR: &str = ".market-sync";

/// Engine tuning, the part of [`Config`] the store itself needs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub page_size: u32,
    pub min_request_interval: Duration,
    pub cache_ttl: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            min_request_interval: MIN_REQUEST_INTERVAL,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_base_url: String,
    pub request_timeout: Duration,
    /// `None` keeps snapshots in memory only.
    pub snapshot_dir: Option<PathBuf>,
    pub metrics_port: Option<u16>,
    pub sync: SyncConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());
        let api_base_url = lookup("MARKET_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let page_size: u32 = parse_or(&lookup, "MARKET_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        anyhow::ensure!(page_size > 0, "MARKET_PAGE_SIZE must be at least 1");

        let request_timeout = Duration::from_secs(parse_or(
            &lookup,
            "MARKET_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?);
        let min_request_interval = Duration::from_millis(parse_or(
            &lookup,
            "MARKET_MIN_REQUEST_INTERVAL_MS",
            MIN_REQUEST_INTERVAL.as_millis() as u64,
        )?);
        let cache_ttl = Duration::from_secs(parse_or(&lookup, "MARKET_CACHE_TTL_SECS", DEFAULT_CACHE_TTL.as_secs())?);
        anyhow::ensure!(!cache_ttl.is_zero(), "MARKET_CACHE_TTL_SECS must be at least 1");

        let snapshot_dir = match lookup("MARKET_SNAPSHOT_DIR") {
            Some(dir) if dir.trim().is_empty() => None,
            Some(dir) => Some(PathBuf::from(dir)),
            None => Some(PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
        };

        let metrics_port = lookup("METRICS_PORT")
            .map(|raw| raw.parse::<u16>().with_context(|| format!("METRICS_PORT: invalid port '{raw}'")))
            .transpose()?;

        Ok(Self {
            log_level,
            api_base_url,
            request_timeout,
            snapshot_dir,
            metrics_port,
            sync: SyncConfig {
                page_size,
                min_request_interval,
                cache_ttl,
            },
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow::anyhow!("{key}: invalid value '{raw}': {err}")),
        None => Ok(default),
    }
}
