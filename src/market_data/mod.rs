pub mod adapters;
pub mod governor;
pub mod market_worker;
pub mod types;
