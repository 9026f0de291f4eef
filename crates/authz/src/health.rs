//! Reload health: whether the cache reflects the last reload attempt.
//!
//! State machine per instance:
//!
//! ```text
//! Loaded(healthy) --notification--> Reloading --ok--> Loaded(healthy)
//!                                             \--err--> Loaded(unhealthy)
//! ```
//!
//! Starts healthy. Only the reload path writes it; only a later successful
//! reload clears an unhealthy flag. Readers are probes and must not block.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use serde::Serialize;

static GLOBAL: OnceLock<Arc<HealthTracker>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Loaded,
    Reloading,
}

/// Probe-facing view of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub state: SyncState,
    pub consecutive_failures: u64,
    pub successful_reloads: u64,
}

#[derive(Debug)]
pub struct HealthTracker {
    healthy: AtomicBool,
    reloading: AtomicBool,
    consecutive_failures: AtomicU64,
    successful_reloads: AtomicU64,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub const fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            reloading: AtomicBool::new(false),
            consecutive_failures: AtomicU64::new(0),
            successful_reloads: AtomicU64::new(0),
        }
    }

    /// The process-wide tracker, created healthy on first use and never torn
    /// down. Tests should build their own with [`HealthTracker::new`].
    pub fn global() -> Arc<HealthTracker> {
        GLOBAL.get_or_init(|| Arc::new(HealthTracker::new())).clone()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            healthy: self.is_healthy(),
            state: if self.reloading.load(Ordering::Acquire) {
                SyncState::Reloading
            } else {
                SyncState::Loaded
            },
            consecutive_failures: self.consecutive_failures.load(Ordering::Acquire),
            successful_reloads: self.successful_reloads.load(Ordering::Acquire),
        }
    }

    pub(crate) fn begin_reload(&self) {
        self.reloading.store(true, Ordering::Release);
    }

    pub(crate) fn reload_succeeded(&self) {
        self.successful_reloads.fetch_add(1, Ordering::AcqRel);
        self.consecutive_failures.store(0, Ordering::Release);
        self.healthy.store(true, Ordering::Release);
        self.reloading.store(false, Ordering::Release);
    }

    pub(crate) fn reload_failed(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel);
        self.healthy.store(false, Ordering::Release);
        self.reloading.store(false, Ordering::Release);
    }

    /// Flag a failure outside a reload, e.g. a dropped notifier subscription.
    pub fn mark_unhealthy(&self) {
        self.reload_failed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_healthy_and_loaded() {
        let tracker = HealthTracker::new();
        let status = tracker.status();
        assert!(status.healthy);
        assert_eq!(status.state, SyncState::Loaded);
    }

    #[test]
    fn failure_sticks_until_next_success() {
        let tracker = HealthTracker::new();
        tracker.begin_reload();
        assert_eq!(tracker.status().state, SyncState::Reloading);

        tracker.reload_failed();
        tracker.reload_failed();
        let status = tracker.status();
        assert!(!status.healthy);
        assert_eq!(status.consecutive_failures, 2);
        assert_eq!(status.state, SyncState::Loaded);

        tracker.begin_reload();
        assert!(!tracker.is_healthy());
        tracker.reload_succeeded();
        assert!(tracker.is_healthy());
        assert_eq!(tracker.status().consecutive_failures, 0);
    }

    #[test]
    fn global_is_shared() {
        let a = HealthTracker::global();
        let b = HealthTracker::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
