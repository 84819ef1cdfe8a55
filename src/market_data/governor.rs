//! Request pacing for the rate-limited markets endpoint.
//!
//! The governor is plain bookkeeping: it decides whether a fetch may start,
//! must wait, or is dropped, and it owns the single deferred-request timer.
//! The store calls it while holding one mutex, which makes the in-flight
//! check and the flag flip one atomic step.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::market_data::types::FetchMode;

/// Default minimum gap between two upstream requests.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(5_000);

/// What the governor says about a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Start the fetch now.
    Go,
    /// Too soon after the previous request; retry after this long.
    Wait(Duration),
    /// Another fetch is running; the request is dropped.
    InFlight,
}

struct Deferred {
    id: u64,
    mode: FetchMode,
    timer: JoinHandle<()>,
}

pub struct Governor {
    min_interval: Duration,
    in_flight: bool,
    seq: u64,
    last_request: Option<Instant>,
    last_success: Option<Instant>,
    deferred: Option<Deferred>,
    next_deferred_id: u64,
}

impl Governor {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            in_flight: false,
            seq: 0,
            last_request: None,
            last_success: None,
            deferred: None,
            next_deferred_id: 0,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Refresh is always forced. So is the very first request, since there
    /// is no previous one to keep a distance from.
    pub fn admit(&self, mode: FetchMode, now: Instant) -> Admission {
        if self.in_flight {
            return Admission::InFlight;
        }

        match self.last_request {
            Some(last) if !mode.is_forced() => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.min_interval {
                    Admission::Wait(self.min_interval - elapsed)
                } else {
                    Admission::Go
                }
            }
            _ => Admission::Go,
        }
    }

    /// Marks a fetch as in flight and returns its sequence number.
    ///
    /// Any deferred request is cancelled: the fetch starting now supersedes it.
    pub fn begin(&mut self) -> u64 {
        self.cancel_deferred();
        self.in_flight = true;
        self.seq += 1;
        self.seq
    }

    /// Clears the in-flight flag for the fetch numbered `seq`.
    ///
    /// Returns false for a completion that is not the current fetch; such a
    /// result is stale and must not be applied.
    pub fn settle(&mut self, seq: u64, succeeded: bool, now: Instant) -> bool {
        if !self.in_flight || seq != self.seq {
            return false;
        }

        self.in_flight = false;
        self.last_request = Some(now);
        if succeeded {
            self.last_success = Some(now);
        }
        true
    }

    /// True while the last successful fetch is younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        self.last_success
            .is_some_and(|at| now.saturating_duration_since(at) < ttl)
    }

    /// Reserves an id for a deferred request about to be armed.
    pub fn next_deferred_id(&mut self) -> u64 {
        self.next_deferred_id += 1;
        self.next_deferred_id
    }

    /// Parks `mode` behind `timer`, replacing (and aborting) whatever was
    /// parked before. Only the newest deferred request survives.
    pub fn arm(&mut self, id: u64, mode: FetchMode, timer: JoinHandle<()>) {
        self.cancel_deferred();
        self.deferred = Some(Deferred { id, mode, timer });
    }

    /// Called by the timer `id` when it fires. Returns the parked mode if
    /// that timer is still the current one.
    pub fn take_deferred(&mut self, id: u64) -> Option<FetchMode> {
        if self.deferred.as_ref().is_some_and(|d| d.id == id) {
            self.deferred.take().map(|d| d.mode)
        } else {
            None
        }
    }

    pub fn cancel_deferred(&mut self) {
        if let Some(deferred) = self.deferred.take() {
            deferred.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    const INTERVAL: Duration = Duration::from_millis(5_000);

    #[tokio::test(start_paused = true)]
    async fn first_request_is_never_throttled() {
        let governor = Governor::new(INTERVAL);
        assert_eq!(governor.admit(FetchMode::Initial, Instant::now()), Admission::Go);
        assert_eq!(governor.admit(FetchMode::LoadMore, Instant::now()), Admission::Go);
    }

    #[tokio::test(start_paused = true)]
    async fn throttles_inside_window_except_refresh() {
        let mut governor = Governor::new(INTERVAL);
        let seq = governor.begin();
        assert!(governor.settle(seq, true, Instant::now()));

        tokio::time::advance(Duration::from_millis(1_500)).await;
        let now = Instant::now();
        assert_eq!(
            governor.admit(FetchMode::LoadMore, now),
            Admission::Wait(Duration::from_millis(3_500))
        );
        assert_eq!(
            governor.admit(FetchMode::Initial, now),
            Admission::Wait(Duration::from_millis(3_500))
        );
        assert_eq!(governor.admit(FetchMode::Refresh, now), Admission::Go);

        tokio::time::advance(Duration::from_millis(3_500)).await;
        assert_eq!(governor.admit(FetchMode::LoadMore, Instant::now()), Admission::Go);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_drops_everything() {
        let mut governor = Governor::new(INTERVAL);
        governor.begin();

        let now = Instant::now();
        assert_eq!(governor.admit(FetchMode::Refresh, now), Admission::InFlight);
        assert_eq!(governor.admit(FetchMode::LoadMore, now), Admission::InFlight);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completion_is_rejected() {
        let mut governor = Governor::new(INTERVAL);
        let first = governor.begin();
        assert!(governor.settle(first, false, Instant::now()));

        let second = governor.begin();
        assert!(!governor.settle(first, true, Instant::now()));
        assert!(governor.is_in_flight());
        assert!(governor.settle(second, true, Instant::now()));
        assert!(!governor.settle(second, true, Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_count_toward_interval_but_not_freshness() {
        let mut governor = Governor::new(INTERVAL);
        let seq = governor.begin();
        governor.settle(seq, false, Instant::now());

        assert!(matches!(governor.admit(FetchMode::Initial, Instant::now()), Admission::Wait(_)));
        assert!(!governor.is_fresh(Duration::from_secs(300), Instant::now()));

        let seq = governor.begin();
        governor.settle(seq, true, Instant::now());
        assert!(governor.is_fresh(Duration::from_secs(300), Instant::now()));

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(!governor.is_fresh(Duration::from_secs(300), Instant::now()));
    }

    fn flag_timer(fired: Arc<AtomicBool>, after: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            fired.store(true, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn newer_deferral_replaces_older() {
        let mut governor = Governor::new(INTERVAL);
        let old_fired = Arc::new(AtomicBool::new(false));
        let new_fired = Arc::new(AtomicBool::new(false));

        let old_id = governor.next_deferred_id();
        governor.arm(old_id, FetchMode::LoadMore, flag_timer(old_fired.clone(), INTERVAL));
        let new_id = governor.next_deferred_id();
        governor.arm(new_id, FetchMode::Initial, flag_timer(new_fired.clone(), INTERVAL));

        tokio::time::sleep(INTERVAL * 2).await;
        assert!(!old_fired.load(Ordering::SeqCst));
        assert!(new_fired.load(Ordering::SeqCst));

        assert_eq!(governor.take_deferred(old_id), None);
        assert_eq!(governor.take_deferred(new_id), Some(FetchMode::Initial));
        assert!(!governor.has_deferred());
    }

    #[tokio::test(start_paused = true)]
    async fn begin_cancels_deferral() {
        let mut governor = Governor::new(INTERVAL);
        let fired = Arc::new(AtomicBool::new(false));

        let id = governor.next_deferred_id();
        governor.arm(id, FetchMode::LoadMore, flag_timer(fired.clone(), INTERVAL));
        governor.begin();

        tokio::time::sleep(INTERVAL * 2).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(!governor.has_deferred());
    }
}
