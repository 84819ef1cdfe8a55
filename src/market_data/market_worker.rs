use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::state::market::SyncState;
use crate::state::market_store::{Dispatch, MarketStore};

/// Logs every state change the store publishes. Returns when the store is
/// dropped.
pub async fn run_state_logger(mut rx: watch::Receiver<SyncState>) {
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();

        if let Some(error) = &state.error {
            warn!(error = %error, records = state.records.len(), "market sync error");
            continue;
        }

        info!(
            records = state.records.len(),
            page = state.page,
            has_more = state.has_more,
            trend = state.trend.as_str(),
            loading = state.loading,
            refreshing = state.refreshing,
            last_fetch = ?state.last_fetch_time,
            "market state updated"
        );
    }

    info!("state channel closed, state logger shutting down");
}

/// Shortest revalidation period; `tokio::time::interval` rejects zero.
const MIN_REVALIDATE_PERIOD: Duration = Duration::from_secs(1);

/// Keeps the cache warm: asks the store to revalidate once per `every`.
/// Fresh records and the request interval are the store's call.
pub async fn run_revalidator(store: MarketStore, every: Duration) {
    if every < MIN_REVALIDATE_PERIOD {
        warn!(every_ms = every.as_millis() as u64, "revalidation period too short, clamping to 1s");
    }
    let mut interval = tokio::time::interval(every.max(MIN_REVALIDATE_PERIOD));
    // the first tick fires immediately, right after initialize
    interval.tick().await;

    loop {
        interval.tick().await;

        match store.revalidate() {
            Dispatch::Cached => debug!("revalidation skipped, cache fresh"),
            outcome => debug!(?outcome, "revalidation requested"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::SyncConfig;
    use crate::market_data::adapters::fixture::{ScriptedSource, page};
    use crate::state::snapshot::SnapshotStore;

    #[tokio::test(start_paused = true)]
    async fn revalidator_refetches_after_ttl() {
        let source = Arc::new(ScriptedSource::new(Duration::from_millis(100)));
        source.push_page(page("first", 2, 0));
        source.push_page(page("second", 2, 0));
        let config = SyncConfig {
            page_size: 2,
            min_request_interval: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(60),
        };
        let store = MarketStore::new(config, source.clone(), SnapshotStore::in_memory());

        store.initialize().await;
        let worker = tokio::spawn(run_revalidator(store.clone(), Duration::from_secs(30)));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(source.calls(), vec![1]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), vec![1, 1]);
        assert_eq!(store.state().records[0].id, "second-0");

        worker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_clamped_instead_of_panicking() {
        let source = Arc::new(ScriptedSource::new(Duration::from_millis(100)));
        source.push_page(page("first", 2, 0));
        let config = SyncConfig {
            page_size: 2,
            min_request_interval: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(60),
        };
        let store = MarketStore::new(config, source.clone(), SnapshotStore::in_memory());

        store.initialize().await;
        let worker = tokio::spawn(run_revalidator(store.clone(), Duration::ZERO));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!worker.is_finished());
        assert_eq!(source.calls(), vec![1]);

        worker.abort();
    }
}
