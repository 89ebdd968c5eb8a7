//! Caller-facing outcome callbacks

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// Receives the terminal outcome of one permission request
///
/// Every method is a best-effort notification. A panicking implementation is
/// isolated by the executor and does not affect hooks or sibling callbacks.
pub trait PermissionCallback: Send + Sync {
    /// Called once the request passed the policy gate, before classification
    fn on_before_request(&self, permissions: &[String]) {
        let _ = permissions;
    }

    /// Every requested permission is granted
    fn on_granted(&self, permissions: &[String]);

    /// At least one permission is not granted
    ///
    /// `denied` holds the retryable subset and `permanently_denied` the
    /// permanent one; the two never overlap.
    fn on_denied(&self, denied: &[String], permanently_denied: &[String]) {
        let _ = (denied, permanently_denied);
    }

    /// Some permissions are permanently denied; fires before any settings flow
    fn on_permanently_denied(&self, permissions: &[String]) {
        let _ = permissions;
    }
}

type ListFn = Arc<dyn Fn(&[String]) + Send + Sync>;
type DeniedFn = Arc<dyn Fn(&[String], &[String]) + Send + Sync>;
type ResultFn = Arc<dyn Fn(bool, &[String], &[String]) + Send + Sync>;

/// Callback assembled from optional closures
///
/// This is what the request builder produces from its `on_*` setters.
#[derive(Clone, Default)]
pub struct FnCallback {
    requested: Vec<String>,
    before_request: Option<ListFn>,
    granted: Option<ListFn>,
    denied: Option<DeniedFn>,
    permanently_denied: Option<ListFn>,
    result: Option<ResultFn>,
}

impl FnCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permissions of the request; used to derive the granted list for `on_result`
    pub fn for_permissions(mut self, permissions: &[String]) -> Self {
        self.requested = permissions.to_vec();
        self
    }

    pub fn on_before_request(mut self, f: impl Fn(&[String]) + Send + Sync + 'static) -> Self {
        self.before_request = Some(Arc::new(f));
        self
    }

    pub fn on_granted(mut self, f: impl Fn(&[String]) + Send + Sync + 'static) -> Self {
        self.granted = Some(Arc::new(f));
        self
    }

    pub fn on_denied(mut self, f: impl Fn(&[String], &[String]) + Send + Sync + 'static) -> Self {
        self.denied = Some(Arc::new(f));
        self
    }

    pub fn on_permanently_denied(
        mut self,
        f: impl Fn(&[String]) + Send + Sync + 'static,
    ) -> Self {
        self.permanently_denied = Some(Arc::new(f));
        self
    }

    /// Combined callback: `(all_granted, granted, denied)`
    ///
    /// `denied` covers both retryable and permanent denials.
    pub fn on_result(
        mut self,
        f: impl Fn(bool, &[String], &[String]) + Send + Sync + 'static,
    ) -> Self {
        self.result = Some(Arc::new(f));
        self
    }

    /// Whether no closure is set
    pub fn is_empty(&self) -> bool {
        self.before_request.is_none()
            && self.granted.is_none()
            && self.denied.is_none()
            && self.permanently_denied.is_none()
            && self.result.is_none()
    }
}

/// Run one closure so that its panic cannot skip the next one
fn guarded(closure: &'static str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(closure, "Permission callback closure panicked");
    }
}

impl PermissionCallback for FnCallback {
    fn on_before_request(&self, permissions: &[String]) {
        if let Some(f) = &self.before_request {
            guarded("on_before_request", || f(permissions));
        }
    }

    fn on_granted(&self, permissions: &[String]) {
        if let Some(f) = &self.granted {
            guarded("on_granted", || f(permissions));
        }
        if let Some(f) = &self.result {
            guarded("on_result", || f(true, permissions, &[]));
        }
    }

    fn on_denied(&self, denied: &[String], permanently_denied: &[String]) {
        if let Some(f) = &self.denied {
            guarded("on_denied", || f(denied, permanently_denied));
        }
        if let Some(f) = &self.result {
            let all_denied: Vec<String> = denied
                .iter()
                .chain(permanently_denied)
                .cloned()
                .collect();
            let granted: Vec<String> = self
                .requested
                .iter()
                .filter(|p| !all_denied.contains(p))
                .cloned()
                .collect();
            guarded("on_result", || f(false, &granted, &all_denied));
        }
    }

    fn on_permanently_denied(&self, permissions: &[String]) {
        if let Some(f) = &self.permanently_denied {
            guarded("on_permanently_denied", || f(permissions));
        }
    }
}

impl fmt::Debug for FnCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCallback")
            .field("requested", &self.requested)
            .field("on_before_request", &self.before_request.is_some())
            .field("on_granted", &self.granted.is_some())
            .field("on_denied", &self.denied.is_some())
            .field("on_permanently_denied", &self.permanently_denied.is_some())
            .field("on_result", &self.result.is_some())
            .finish()
    }
}

// ============================================================================
// Recording Callback (for testing)
// ============================================================================

/// One delivered callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackEvent {
    BeforeRequest(Vec<String>),
    Granted(Vec<String>),
    Denied {
        denied: Vec<String>,
        permanently_denied: Vec<String>,
    },
    PermanentlyDenied(Vec<String>),
}

/// Records every callback in delivery order
#[derive(Debug, Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<CallbackEvent>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CallbackEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events other than `BeforeRequest`
    pub fn outcomes(&self) -> Vec<CallbackEvent> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, CallbackEvent::BeforeRequest(_)))
            .collect()
    }

    fn push(&self, event: CallbackEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl PermissionCallback for RecordingCallback {
    fn on_before_request(&self, permissions: &[String]) {
        self.push(CallbackEvent::BeforeRequest(permissions.to_vec()));
    }

    fn on_granted(&self, permissions: &[String]) {
        self.push(CallbackEvent::Granted(permissions.to_vec()));
    }

    fn on_denied(&self, denied: &[String], permanently_denied: &[String]) {
        self.push(CallbackEvent::Denied {
            denied: denied.to_vec(),
            permanently_denied: permanently_denied.to_vec(),
        });
    }

    fn on_permanently_denied(&self, permissions: &[String]) {
        self.push(CallbackEvent::PermanentlyDenied(permissions.to_vec()));
    }
}
