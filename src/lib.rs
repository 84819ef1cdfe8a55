//! Market-data synchronization engine: a paginated, throttled, cached view
//! of the top crypto assets by market cap.
//!
//! [`MarketStore`] is the entry point. Build it once with a
//! [`MarketDataSource`] and a [`SnapshotStore`], call
//! [`MarketStore::initialize`], then drive it with `refresh`, `load_more`
//! and `revalidate` while watching [`MarketStore::subscribe`].

pub mod config;
pub mod error;
pub mod market_data;
pub mod metrics;
pub mod state;
pub mod strategy;

pub use config::{Config, SyncConfig};
pub use error::FetchError;
pub use market_data::adapters::MarketDataSource;
pub use market_data::adapters::coingecko::CoinGeckoClient;
pub use market_data::types::{FetchMode, MarketPage, MarketRecord};
pub use state::market::SyncState;
pub use state::market_store::{Dispatch, MarketStore};
pub use state::snapshot::SnapshotStore;
pub use strategy::Trend;
