use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Label recorded for commit listing calls.
pub const COMMITS_LABEL: &str = "commits";

/// Maximum number of calls allowed within a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub quota: usize,
    pub window: Duration,
}

impl RateBudget {
    pub fn new(quota: usize, window: Duration) -> Self {
        Self { quota, window }
    }
}

impl Default for RateBudget {
    /// GitHub's unauthenticated quota: 60 requests per hour.
    fn default() -> Self {
        Self::new(60, Duration::from_secs(60 * 60))
    }
}

#[derive(Debug, Clone)]
struct ScanHistoryEntry {
    at: Instant,
    target: String,
}

/// The budget is exhausted; the caller may try again after `retry_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after: Duration,
}

/// Tracks every accepted call within the window and refuses calls beyond the
/// quota. Shared by all watchers; eviction, check and record happen under a
/// single lock so two concurrent callers never both see the same free slot.
#[derive(Debug)]
pub struct RateLimitedClient {
    budget: RateBudget,
    history: Mutex<Vec<ScanHistoryEntry>>,
}

impl RateLimitedClient {
    pub fn new(budget: RateBudget) -> Self {
        Self {
            budget,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn budget(&self) -> RateBudget {
        self.budget
    }

    /// Ask for a permit now.
    pub fn try_acquire(&self, target: &str) -> Result<(), RateLimited> {
        self.try_acquire_at(target, Instant::now())
    }

    /// Ask for a permit at `now`.
    ///
    /// When refused, the wait is measured from the most recent accepted call,
    /// which is always at least as long as waiting for the oldest one to expire.
    pub fn try_acquire_at(&self, target: &str, now: Instant) -> Result<(), RateLimited> {
        let mut history = self.history();
        evict(&mut history, now, self.budget.window);

        if history.len() < self.budget.quota {
            history.push(ScanHistoryEntry {
                at: now,
                target: target.to_string(),
            });
            tracing::debug!(
                target_label = target,
                used = history.len(),
                quota = self.budget.quota,
                "rate permit granted"
            );
            return Ok(());
        }

        let latest_age = history
            .iter()
            .map(|e| e.at)
            .max()
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        let retry_after = self.budget.window.saturating_sub(latest_age);
        Err(RateLimited { retry_after })
    }

    /// Number of calls still counted against the quota at `now`.
    pub fn used_at(&self, now: Instant) -> usize {
        let mut history = self.history();
        evict(&mut history, now, self.budget.window);
        history.len()
    }

    fn history(&self) -> MutexGuard<'_, Vec<ScanHistoryEntry>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Drop every entry whose age at `now` has reached the window.
fn evict(history: &mut Vec<ScanHistoryEntry>, now: Instant, window: Duration) {
    history.retain(|e| {
        let keep = now.saturating_duration_since(e.at) < window;
        if !keep {
            tracing::trace!(target_label = %e.target, "evicting outdated rate history entry");
        }
        keep
    });
}
