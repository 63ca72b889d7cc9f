//! Per-client sliding-window admission control.
//!
//! Each client key owns a window of recent request instants. A check prunes
//! instants that have fallen out of the trailing window and admits the
//! request only while the remaining count is below the configured maximum.
//! Rejected requests are not recorded.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::AdmissionConfig;

/// Recent request instants for one client, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    /// Drops instants at or beyond `window` before `now`.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of instants currently held.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests still available to this client in the current window
    pub remaining: usize,
    /// Time until the oldest counted request leaves the window, when rejected
    pub retry_after: Option<Duration>,
}

/// Sliding-window rate limiter keyed by client identity.
///
/// The window map is sharded, so checks for different clients do not
/// contend. All mutation of one client's window happens under that entry's
/// shard lock, which makes prune, count and record atomic per client.
pub struct AdmissionController {
    windows: DashMap<String, RateWindow>,
    window: Duration,
    max_requests: usize,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    /// Creates a controller on the system clock.
    pub fn new(config: &AdmissionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a controller driven by the given clock.
    pub fn with_clock(config: &AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            window: config.window,
            max_requests: config.max_requests,
            clock,
        }
    }

    /// Returns true and records the request if `client_key` is under its limit.
    pub fn check(&self, client_key: &str) -> bool {
        self.evaluate(client_key).allowed
    }

    /// Runs an admission check and reports the remaining budget.
    pub fn evaluate(&self, client_key: &str) -> AdmissionDecision {
        let now = self.clock.now();
        let mut entry = self.windows.entry(client_key.to_string()).or_default();
        let window = entry.value_mut();
        window.prune(now, self.window);

        if window.len() >= self.max_requests {
            let retry_after = window
                .timestamps
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)));
            warn!(client = client_key, count = window.len(), "Rate limit exceeded");
            return AdmissionDecision {
                allowed: false,
                remaining: 0,
                retry_after,
            };
        }

        window.timestamps.push_back(now);
        AdmissionDecision {
            allowed: true,
            remaining: self.max_requests - window.len(),
            retry_after: None,
        }
    }

    /// Forgets clients with no request inside the trailing window.
    ///
    /// Such clients are indistinguishable from new ones, so dropping them
    /// never changes an admission outcome.
    pub fn prune_idle(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window.prune(now, self.window);
            !window.is_empty()
        });
        let pruned = before.saturating_sub(self.windows.len());
        if pruned > 0 {
            debug!(pruned, "Pruned idle rate windows");
        }
        pruned
    }

    /// Number of clients with a tracked window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Requests counted for `client_key` in the current window.
    pub fn current_count(&self, client_key: &str) -> usize {
        let now = self.clock.now();
        self.windows.get(client_key).map_or(0, |window| {
            window
                .timestamps
                .iter()
                .filter(|t| now.saturating_duration_since(**t) < self.window)
                .count()
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }
}

impl fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionController")
            .field("clients", &self.windows.len())
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .finish()
    }
}
