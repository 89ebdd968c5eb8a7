//! Per-permission request rate limiting
//!
//! Two gates, both must pass:
//!
//! 1. a minimum interval since the last recorded request for the permission
//! 2. a maximum number of requests within the trailing hour
//!
//! Each permission owns its own timestamp window behind its own lock, so
//! operations on different permissions never block each other. The map
//! lock is only taken to find or insert a window.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::PermissionConfig;

/// Trailing window for the hourly gate
pub const WINDOW: Duration = Duration::from_secs(60 * 60);

type Window = Arc<Mutex<VecDeque<Instant>>>;

/// Snapshot of one permission's rate-limit state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestStats {
    pub permission: String,
    pub requests_last_hour: u32,
    pub remaining_requests: u32,
    /// Time since the most recent recorded request
    pub since_last_request: Option<Duration>,
    pub can_request: bool,
}

/// Process-wide request rate limiter
pub struct RateLimiter {
    min_interval: Duration,
    max_per_hour: u32,
    windows: RwLock<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, max_per_hour: u32) -> Self {
        Self {
            min_interval,
            max_per_hour,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &PermissionConfig) -> Self {
        Self::new(config.min_request_interval, config.max_requests_per_hour)
    }

    /// Limiter that never blocks
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, u32::MAX)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn max_per_hour(&self) -> u32 {
        self.max_per_hour
    }

    fn window(&self, permission: &str) -> Option<Window> {
        self.windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(permission)
            .cloned()
    }

    fn window_or_insert(&self, permission: &str) -> Window {
        if let Some(window) = self.window(permission) {
            return window;
        }
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(windows.entry(permission.to_string()).or_default())
    }

    /// Drop entries that have aged past the trailing window
    fn prune(entries: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = entries.front() {
            if now.saturating_duration_since(*oldest) >= WINDOW {
                entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn evaluate(&self, entries: &VecDeque<Instant>, now: Instant) -> bool {
        let interval_ok = entries
            .back()
            .map_or(true, |last| now.saturating_duration_since(*last) >= self.min_interval);
        let count_ok = (entries.len() as u64) < u64::from(self.max_per_hour);
        interval_ok && count_ok
    }

    /// Whether a request for `permission` would pass both gates now
    pub fn can_request(&self, permission: &str) -> bool {
        let Some(window) = self.window(permission) else {
            return self.max_per_hour > 0;
        };
        let now = Instant::now();
        let mut entries = window.lock().unwrap_or_else(PoisonError::into_inner);
        Self::prune(&mut entries, now);
        self.evaluate(&entries, now)
    }

    /// Record a request for `permission` at the current time
    pub fn record_request(&self, permission: &str) {
        let window = self.window_or_insert(permission);
        let now = Instant::now();
        let mut entries = window.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(now);
        Self::prune(&mut entries, now);
    }

    /// Permissions of `permissions` that are currently blocked, in order
    pub fn blocked(&self, permissions: &[String]) -> Vec<String> {
        permissions
            .iter()
            .filter(|p| !self.can_request(p))
            .cloned()
            .collect()
    }

    /// How long until `permission` passes both gates; `None` if it passes now
    ///
    /// Also `None` when the hourly limit is zero, since waiting never helps.
    pub fn retry_after(&self, permission: &str) -> Option<Duration> {
        if self.max_per_hour == 0 {
            return None;
        }
        let window = self.window(permission)?;
        let now = Instant::now();
        let mut entries = window.lock().unwrap_or_else(PoisonError::into_inner);
        Self::prune(&mut entries, now);
        if self.evaluate(&entries, now) {
            return None;
        }

        let interval_wait = entries.back().map_or(Duration::ZERO, |last| {
            self.min_interval
                .saturating_sub(now.saturating_duration_since(*last))
        });

        // Enough entries must age out to bring the count below the limit
        let limit = usize::try_from(self.max_per_hour).unwrap_or(usize::MAX);
        let count_wait = if entries.len() >= limit {
            entries
                .get(entries.len() - limit)
                .map_or(Duration::ZERO, |entry| {
                    WINDOW.saturating_sub(now.saturating_duration_since(*entry))
                })
        } else {
            Duration::ZERO
        };

        Some(interval_wait.max(count_wait))
    }

    /// Longest wait over a set of permissions
    pub fn retry_after_all(&self, permissions: &[String]) -> Option<Duration> {
        permissions.iter().filter_map(|p| self.retry_after(p)).max()
    }

    /// Requests still allowed within the trailing hour
    pub fn remaining_requests(&self, permission: &str) -> u32 {
        let used = self.requests_last_hour(permission);
        self.max_per_hour.saturating_sub(used)
    }

    fn requests_last_hour(&self, permission: &str) -> u32 {
        let Some(window) = self.window(permission) else {
            return 0;
        };
        let mut entries = window.lock().unwrap_or_else(PoisonError::into_inner);
        Self::prune(&mut entries, Instant::now());
        u32::try_from(entries.len()).unwrap_or(u32::MAX)
    }

    pub fn stats(&self, permission: &str) -> RequestStats {
        let now = Instant::now();
        let (count, since_last) = match self.window(permission) {
            Some(window) => {
                let mut entries = window.lock().unwrap_or_else(PoisonError::into_inner);
                Self::prune(&mut entries, now);
                (
                    u32::try_from(entries.len()).unwrap_or(u32::MAX),
                    entries.back().map(|last| now.saturating_duration_since(*last)),
                )
            }
            None => (0, None),
        };

        RequestStats {
            permission: permission.to_string(),
            requests_last_hour: count,
            remaining_requests: self.max_per_hour.saturating_sub(count),
            since_last_request: since_last,
            can_request: self.can_request(permission),
        }
    }

    /// Forget the history of one permission
    pub fn clear_history(&self, permission: &str) {
        self.windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(permission);
    }

    pub fn clear_all(&self) {
        self.windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&PermissionConfig::default())
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tracked = self
            .windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .field("max_per_hour", &self.max_per_hour)
            .field("tracked_permissions", &tracked)
            .finish()
    }
}
