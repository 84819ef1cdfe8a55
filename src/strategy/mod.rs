//! Signals derived from the loaded market records. Everything here is a
//! pure function of a record slice; nothing does I/O.

pub mod movers;
pub mod trend;

pub use movers::{Movers, top_movers};
pub use trend::{Trend, market_trend};
