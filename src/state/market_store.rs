//! The synchronization facade: the one object the rest of the app talks to.
//!
//! `MarketStore` is constructed once and handed to whoever needs it (it is
//! a cheap `Clone` around an `Arc`). Commands return immediately with a
//! [`Dispatch`] describing what happened to the call; results arrive later
//! as [`SyncState`] updates on the watch channel from [`MarketStore::subscribe`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::FetchError;
use crate::market_data::adapters::MarketDataSource;
use crate::market_data::governor::{Admission, Governor};
use crate::market_data::types::{FetchMode, MarketPage, MarketRecord};
use crate::metrics::prometheus;
use crate::state::market::SyncState;
use crate::state::merge;
use crate::state::query::{self, SortKey, SortOrder};
use crate::state::snapshot::{SnapshotStore, SnapshotWriter};
use crate::strategy::{Movers, top_movers};

/// What happened to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A fetch for `page` is now in flight.
    Started { mode: FetchMode, page: u32 },
    /// Too soon after the last request; the fetch will start after `wait`
    /// unless something newer replaces it first.
    Deferred { mode: FetchMode, wait: Duration },
    /// Another fetch is already running; the call was dropped.
    InFlight,
    /// Load-more while a page load is running.
    Busy,
    /// Load-more after the last page.
    Exhausted,
    /// Revalidate while the cached records are still fresh.
    Cached,
}

#[derive(Clone)]
pub struct MarketStore {
    inner: Arc<Inner>,
}

struct Inner {
    config: SyncConfig,
    source: Arc<dyn MarketDataSource>,
    snapshots: SnapshotStore,
    writer: SnapshotWriter,
    state: watch::Sender<SyncState>,
    governor: Mutex<Governor>,
}

impl MarketStore {
    /// Must be called inside a Tokio runtime: the snapshot writer is spawned here.
    pub fn new(config: SyncConfig, source: Arc<dyn MarketDataSource>, snapshots: SnapshotStore) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        let governor = Mutex::new(Governor::new(config.min_request_interval));
        let writer = SnapshotWriter::spawn(snapshots.clone());

        Self {
            inner: Arc::new(Inner {
                config,
                source,
                snapshots,
                writer,
                state,
                governor,
            }),
        }
    }

    /// Paints the last snapshot, then starts the first network fetch.
    pub async fn initialize(&self) -> Dispatch {
        let cached = self.inner.snapshots.load().await;
        let count = cached.len();

        let hydrated = self.inner.state.send_if_modified(|state| merge::hydrate(state, cached));
        if hydrated {
            info!(count, "hydrated market records from snapshot");
            prometheus::record_records_loaded(count);
        }

        info!(source = self.inner.source.name(), "starting initial market fetch");
        self.request(FetchMode::Initial)
    }

    /// Reloads page 1, ignoring the request interval.
    pub fn refresh(&self) -> Dispatch {
        self.request(FetchMode::Refresh)
    }

    /// Fetches the next page and appends it.
    pub fn load_more(&self) -> Dispatch {
        self.request(FetchMode::LoadMore)
    }

    /// Reloads page 1 unless the records are younger than the cache TTL.
    /// Subject to the request interval.
    pub fn revalidate(&self) -> Dispatch {
        let has_records = !self.inner.state.borrow().records.is_empty();
        let fresh = self
            .inner
            .governor
            .lock()
            .is_fresh(self.inner.config.cache_ttl, Instant::now());

        if has_records && fresh {
            debug!("market records still fresh, skipping revalidation");
            return Dispatch::Cached;
        }

        self.request(FetchMode::Initial)
    }

    pub fn state(&self) -> SyncState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    pub fn records(&self) -> Arc<Vec<MarketRecord>> {
        self.inner.state.borrow().records.clone()
    }

    pub fn movers(&self, limit: usize) -> Movers {
        top_movers(&self.records(), limit)
    }

    pub fn search(&self, query: &str) -> Vec<MarketRecord> {
        query::search(&self.records(), query)
    }

    pub fn suggestions(&self, query: &str) -> Vec<MarketRecord> {
        query::suggestions(&self.records(), query)
    }

    pub fn sorted(&self, key: SortKey, order: SortOrder) -> Vec<MarketRecord> {
        query::sorted(&self.records(), key, order)
    }

    /// Cancels a parked request and flushes the snapshot writer. A fetch
    /// already in flight still lands in the state but is no longer persisted.
    pub async fn shutdown(&self) {
        self.inner.governor.lock().cancel_deferred();
        self.inner.writer.shutdown().await;
        info!("market store stopped");
    }

    fn request(&self, mode: FetchMode) -> Dispatch {
        let mut governor = self.inner.governor.lock();

        if let Some(blocked) = self.load_more_gate(mode) {
            return blocked;
        }

        match governor.admit(mode, Instant::now()) {
            Admission::InFlight => {
                debug!(mode = mode.as_str(), "fetch already in flight, dropping request");
                prometheus::record_dropped(mode);
                Dispatch::InFlight
            }
            Admission::Wait(wait) => {
                self.defer(&mut governor, mode, wait);
                Dispatch::Deferred { mode, wait }
            }
            Admission::Go => self.start(&mut governor, mode),
        }
    }

    fn load_more_gate(&self, mode: FetchMode) -> Option<Dispatch> {
        if mode != FetchMode::LoadMore {
            return None;
        }

        let state = self.inner.state.borrow();
        if state.loading {
            Some(Dispatch::Busy)
        } else if !state.has_more {
            Some(Dispatch::Exhausted)
        } else {
            None
        }
    }

    fn defer(&self, governor: &mut Governor, mode: FetchMode, wait: Duration) {
        let id = governor.next_deferred_id();
        let store = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            store.fire_deferred(id);
        });
        governor.arm(id, mode, timer);

        debug!(mode = mode.as_str(), wait_ms = wait.as_millis() as u64, "request deferred by rate limit interval");
        prometheus::record_deferred(mode);
    }

    fn fire_deferred(&self, id: u64) {
        let mut governor = self.inner.governor.lock();

        let Some(mode) = governor.take_deferred(id) else {
            return;
        };

        if governor.is_in_flight() {
            debug!(mode = mode.as_str(), "deferred request found a fetch in flight, dropping");
            prometheus::record_dropped(mode);
            return;
        }

        if let Some(blocked) = self.load_more_gate(mode) {
            debug!(mode = mode.as_str(), outcome = ?blocked, "deferred load-more no longer applies");
            return;
        }

        self.start(&mut governor, mode);
    }

    fn start(&self, governor: &mut Governor, mode: FetchMode) -> Dispatch {
        let seq = governor.begin();

        let mut page = 1;
        self.inner.state.send_modify(|state| page = merge::begin(state, mode));

        debug!(mode = mode.as_str(), page, seq, "market fetch started");

        let ticket = FetchTicket {
            store: self.clone(),
            seq,
            mode,
            page,
            settled: false,
        };
        tokio::spawn(ticket.run());

        Dispatch::Started { mode, page }
    }

    fn complete(&self, seq: u64, mode: FetchMode, page: u32, outcome: Result<MarketPage, FetchError>) {
        match &outcome {
            Ok(fetched) => {
                debug!(
                    mode = mode.as_str(),
                    page,
                    count = fetched.records.len(),
                    returned = fetched.returned,
                    "market page fetched"
                );
                prometheus::record_fetch(mode, "ok");
            }
            Err(err) if err.is_rate_limited() => {
                warn!(mode = mode.as_str(), page, "market data rate limit exceeded (HTTP 429)");
                prometheus::record_fetch(mode, err.kind());
            }
            Err(err) => {
                warn!(mode = mode.as_str(), page, error = %err, "market data fetch failed");
                prometheus::record_fetch(mode, err.kind());
            }
        }

        let mut governor = self.inner.governor.lock();
        if !governor.settle(seq, outcome.is_ok(), Instant::now()) {
            warn!(mode = mode.as_str(), page, seq, "discarding stale market fetch result");
            prometheus::record_stale_discarded();
            return;
        }

        let page_size = self.inner.config.page_size;
        let mut persist = None;
        self.inner
            .state
            .send_modify(|state| persist = merge::apply(state, mode, page, outcome, page_size, Utc::now()));
        drop(governor);

        if let Some(records) = persist {
            prometheus::record_records_loaded(records.len());
            self.inner.writer.save(records);
        }
    }
}

/// One in-flight fetch. Settles the governor exactly once: normally after
/// the source answers, or from `Drop` if the task panics or is aborted.
struct FetchTicket {
    store: MarketStore,
    seq: u64,
    mode: FetchMode,
    page: u32,
    settled: bool,
}

impl FetchTicket {
    async fn run(mut self) {
        let started = Instant::now();
        let page_size = self.store.inner.config.page_size;
        let outcome = self.store.inner.source.fetch_page(self.page, page_size).await;
        prometheus::record_fetch_latency(self.mode, started.elapsed().as_secs_f64() * 1_000.0);

        self.settle(outcome);
    }

    fn settle(&mut self, outcome: Result<MarketPage, FetchError>) {
        self.settled = true;
        self.store.complete(self.seq, self.mode, self.page, outcome);
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(Err(FetchError::Aborted));
        }
    }
}
