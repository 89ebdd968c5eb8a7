//! Awaitable terminals for the request builder
//!
//! Wraps the callback surface into a single-shot suspension. The terminal
//! callback can, in edge cases, be delivered more than once for one logical
//! request; [`ResumeOnce`] keeps only the first value.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

use crate::aggregator::AggregatedResult;
use crate::builder::PermissionRequestBuilder;
use crate::callback::PermissionCallback;
use crate::error::PermissionError;

/// Final outcome of an awaited request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestOutcome {
    pub all_granted: bool,
    pub granted: Vec<String>,
    /// Every non-granted permission, permanent denials included
    pub denied: Vec<String>,
    pub permanently_denied: Vec<String>,
    /// Why the request ended without a terminal callback, when known
    #[serde(skip)]
    pub error: Option<PermissionError>,
}

impl RequestOutcome {
    fn granted(permissions: &[String]) -> Self {
        Self {
            all_granted: true,
            granted: permissions.to_vec(),
            denied: Vec::new(),
            permanently_denied: Vec::new(),
            error: None,
        }
    }

    fn denied(requested: &[String], denied: &[String], permanently_denied: &[String]) -> Self {
        let mut all_denied: Vec<String> = denied.to_vec();
        all_denied.extend(
            permanently_denied
                .iter()
                .filter(|p| !denied.contains(p))
                .cloned(),
        );
        Self {
            all_granted: false,
            granted: requested
                .iter()
                .filter(|p| !all_denied.contains(p))
                .cloned()
                .collect(),
            denied: all_denied,
            permanently_denied: permanently_denied.to_vec(),
            error: None,
        }
    }

    /// Nothing was delivered: every requested permission counts as not granted
    fn undelivered(requested: &[String], error: Option<PermissionError>) -> Self {
        Self {
            all_granted: false,
            granted: Vec::new(),
            denied: requested.to_vec(),
            permanently_denied: Vec::new(),
            error,
        }
    }

    pub fn as_aggregated(&self) -> AggregatedResult {
        AggregatedResult {
            granted: self.granted.clone(),
            denied: self.denied.clone(),
            permanently_denied: self.permanently_denied.clone(),
        }
    }
}

// ============================================================================
// Resume-once cell
// ============================================================================

/// One-shot slot that accepts only its first value
#[derive(Debug)]
pub struct ResumeOnce<T> {
    resumed: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> ResumeOnce<T> {
    pub fn channel() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let cell = Self {
            resumed: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
        };
        (cell, rx)
    }

    /// Deliver `value` unless a value was already delivered
    ///
    /// Returns `true` for the first call only.
    pub fn resume(&self, value: T) -> bool {
        if self.resumed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            // The waiter may be gone; the value is then dropped
            let _ = sender.send(value);
        }
        true
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed.load(Ordering::Acquire)
    }
}

struct AwaitCallback {
    requested: Vec<String>,
    cell: Arc<ResumeOnce<RequestOutcome>>,
}

impl PermissionCallback for AwaitCallback {
    fn on_granted(&self, permissions: &[String]) {
        if !self.cell.resume(RequestOutcome::granted(permissions)) {
            tracing::debug!("Duplicate terminal callback ignored");
        }
    }

    fn on_denied(&self, denied: &[String], permanently_denied: &[String]) {
        let outcome = RequestOutcome::denied(&self.requested, denied, permanently_denied);
        if !self.cell.resume(outcome) {
            tracing::debug!("Duplicate terminal callback ignored");
        }
    }
}

// ============================================================================
// Builder terminals
// ============================================================================

impl PermissionRequestBuilder {
    /// Run the request and wait for its outcome
    ///
    /// Never fails: a request that ends without a terminal callback (veto,
    /// rate limit, platform error, configuration error, teardown) resolves
    /// to a not-granted outcome whose `error` says why, when known.
    pub async fn outcome(mut self) -> RequestOutcome {
        let requested = self.requested();
        let (cell, receiver) = ResumeOnce::channel();
        let cell = Arc::new(cell);
        self.push_callback(Arc::new(AwaitCallback {
            requested: requested.clone(),
            cell: Arc::clone(&cell),
        }));

        let error = match self.dispatch().await {
            Ok(error) => error,
            Err(error) => Some(error),
        };
        if cell.resume(RequestOutcome::undelivered(&requested, error.clone())) {
            tracing::debug!(permissions = ?requested, "Request ended without a terminal callback");
        }

        receiver
            .await
            .unwrap_or_else(|_| RequestOutcome::undelivered(&requested, error))
    }

    /// Run the request and report whether every permission was granted
    pub async fn granted(self) -> bool {
        self.outcome().await.all_granted
    }
}
