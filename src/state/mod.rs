pub mod market;
pub mod market_store;
pub mod merge;
pub mod query;
pub mod snapshot;
