//! Pagination and merge rules: how a fetch outcome lands in [`SyncState`].
//!
//! Both functions run while the store holds its governor lock, so the
//! transitions below never interleave with another fetch.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::market_data::types::{FetchMode, MarketPage, MarketRecord};
use crate::state::market::SyncState;
use crate::strategy::market_trend;

/// Marks a fetch as started and returns the page it must request.
pub fn begin(state: &mut SyncState, mode: FetchMode) -> u32 {
    state.error = None;

    match mode {
        FetchMode::Refresh => state.refreshing = true,
        _ if !state.refreshing => state.loading = true,
        _ => {}
    }

    if mode.is_full_reload() {
        1
    } else {
        state.page += 1;
        state.page
    }
}

/// Folds a fetch outcome into the state.
///
/// A failure only sets `error`: records, page cursor and `has_more` stay
/// as they were. Returns the new record list when it changed, so the caller
/// can persist it.
pub fn apply(
    state: &mut SyncState,
    mode: FetchMode,
    page: u32,
    outcome: Result<MarketPage, FetchError>,
    page_size: u32,
    now: DateTime<Utc>,
) -> Option<Arc<Vec<MarketRecord>>> {
    state.loading = false;
    state.refreshing = false;

    let MarketPage { records: fetched, returned } = match outcome {
        Ok(received) => received,
        Err(err) => {
            state.error = Some(err.to_string());
            return None;
        }
    };

    if mode.is_full_reload() {
        state.records = Arc::new(fetched);
        state.page = 1;
    } else {
        state.page = page;
        Arc::make_mut(&mut state.records).extend(fetched);
    }

    state.has_more = returned >= page_size as usize;
    state.last_fetch_time = Some(now);
    state.error = None;
    state.trend = market_trend(&state.records);

    Some(state.records.clone())
}

/// Seeds an untouched state with records from the snapshot store.
///
/// Does nothing once a fetch has completed: live data always wins over the
/// cached copy.
pub fn hydrate(state: &mut SyncState, records: Vec<MarketRecord>) -> bool {
    if state.last_fetch_time.is_some() || !state.records.is_empty() || records.is_empty() {
        return false;
    }

    state.records = Arc::new(records);
    state.trend = market_trend(&state.records);
    true
}
