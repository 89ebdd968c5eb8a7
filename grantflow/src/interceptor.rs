//! Interceptor chain: veto gate and outcome observers
//!
//! `before_request` is a conjunction over every registered interceptor; the
//! first `false` closes the gate and the remaining interceptors are not
//! polled. Every other hook is a broadcast notification.
//!
//! Hooks run on a snapshot of the chain, after the chain's lock has been
//! released, and each call is isolated: a panicking interceptor is logged
//! and skipped without affecting its siblings. A panic inside
//! `before_request` counts as a veto.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::audit::{self, AuditSink};
use crate::error::PermissionError;
use crate::request::PermissionRequest;

/// Cross-cutting hook into the request pipeline
pub trait PermissionInterceptor: Send + Sync {
    /// Veto gate; returning `false` drops the request before any side effect
    fn before_request(&self, request: &PermissionRequest) -> bool {
        let _ = request;
        true
    }

    /// The gate was closed by some interceptor
    fn on_vetoed(&self, request: &PermissionRequest) {
        let _ = request;
    }

    /// The native prompt returned
    fn after_request(&self, request: &PermissionRequest, results: &HashMap<String, bool>) {
        let _ = (request, results);
    }

    fn on_granted(&self, request: &PermissionRequest, granted: &[String]) {
        let _ = (request, granted);
    }

    fn on_denied(
        &self,
        request: &PermissionRequest,
        denied: &[String],
        permanently_denied: &[String],
    ) {
        let _ = (request, denied, permanently_denied);
    }

    fn on_permanently_denied(&self, request: &PermissionRequest, permanently_denied: &[String]) {
        let _ = (request, permanently_denied);
    }

    /// Policy rejection or runtime failure
    fn on_error(&self, request: &PermissionRequest, error: &PermissionError) {
        let _ = (request, error);
    }
}

fn same_interceptor(a: &Arc<dyn PermissionInterceptor>, b: &Arc<dyn PermissionInterceptor>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Registered interceptors, in registration order
#[derive(Default)]
pub struct InterceptorChain {
    interceptors: RwLock<Vec<Arc<dyn PermissionInterceptor>>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interceptor; returns `false` if this handle is already registered
    pub fn register(&self, interceptor: Arc<dyn PermissionInterceptor>) -> bool {
        let mut interceptors = self
            .interceptors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if interceptors.iter().any(|i| same_interceptor(i, &interceptor)) {
            return false;
        }
        interceptors.push(interceptor);
        true
    }

    /// Unregister an interceptor; returns `false` if it was not registered
    pub fn unregister(&self, interceptor: &Arc<dyn PermissionInterceptor>) -> bool {
        let mut interceptors = self
            .interceptors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = interceptors.len();
        interceptors.retain(|i| !same_interceptor(i, interceptor));
        interceptors.len() != before
    }

    pub fn clear(&self) {
        self.interceptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.interceptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current registration list
    pub fn snapshot(&self) -> Vec<Arc<dyn PermissionInterceptor>> {
        self.interceptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn broadcast(&self, hook: &'static str, f: impl Fn(&dyn PermissionInterceptor)) {
        for interceptor in self.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| f(interceptor.as_ref()))).is_err() {
                tracing::warn!(hook, "Interceptor panicked; continuing with the next one");
            }
        }
    }

    /// Run the veto gate; notifies `on_vetoed` when it closes
    pub fn before_request(&self, request: &PermissionRequest) -> bool {
        let snapshot = self.snapshot();
        let allowed = snapshot.iter().all(|interceptor| {
            match catch_unwind(AssertUnwindSafe(|| interceptor.before_request(request))) {
                Ok(allowed) => allowed,
                Err(_) => {
                    tracing::warn!("Interceptor panicked in before_request; treating as veto");
                    false
                }
            }
        });

        if !allowed {
            self.broadcast("on_vetoed", |i| i.on_vetoed(request));
        }
        allowed
    }

    pub fn after_request(&self, request: &PermissionRequest, results: &HashMap<String, bool>) {
        self.broadcast("after_request", |i| i.after_request(request, results));
    }

    pub fn on_granted(&self, request: &PermissionRequest, granted: &[String]) {
        self.broadcast("on_granted", |i| i.on_granted(request, granted));
    }

    pub fn on_denied(
        &self,
        request: &PermissionRequest,
        denied: &[String],
        permanently_denied: &[String],
    ) {
        self.broadcast("on_denied", |i| i.on_denied(request, denied, permanently_denied));
    }

    pub fn on_permanently_denied(&self, request: &PermissionRequest, permanently_denied: &[String]) {
        self.broadcast("on_permanently_denied", |i| {
            i.on_permanently_denied(request, permanently_denied)
        });
    }

    pub fn on_error(&self, request: &PermissionRequest, error: &PermissionError) {
        self.broadcast("on_error", |i| i.on_error(request, error));
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.len())
            .finish()
    }
}

// ============================================================================
// Logging Interceptor
// ============================================================================

/// Emits a `tracing` event for every pipeline milestone
#[derive(Debug, Default)]
pub struct LoggingInterceptor;

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl PermissionInterceptor for LoggingInterceptor {
    fn before_request(&self, request: &PermissionRequest) -> bool {
        tracing::info!(permissions = ?request.permissions(), "Permission request starting");
        true
    }

    fn on_vetoed(&self, request: &PermissionRequest) {
        tracing::info!(permissions = ?request.permissions(), "Permission request vetoed");
    }

    fn after_request(&self, request: &PermissionRequest, results: &HashMap<String, bool>) {
        tracing::info!(
            permissions = ?request.permissions(),
            results = ?results,
            "Native permission prompt returned"
        );
    }

    fn on_granted(&self, _request: &PermissionRequest, granted: &[String]) {
        tracing::info!(granted = ?granted, "Permissions granted");
    }

    fn on_denied(&self, _request: &PermissionRequest, denied: &[String], permanently_denied: &[String]) {
        tracing::info!(
            denied = ?denied,
            permanently_denied = ?permanently_denied,
            "Permissions denied"
        );
    }

    fn on_permanently_denied(&self, _request: &PermissionRequest, permanently_denied: &[String]) {
        tracing::info!(permanently_denied = ?permanently_denied, "Permissions permanently denied");
    }

    fn on_error(&self, request: &PermissionRequest, error: &PermissionError) {
        tracing::warn!(
            permissions = ?request.permissions(),
            code = error.code(),
            error = %error,
            "Permission request failed"
        );
    }
}

// ============================================================================
// Audit Interceptor
// ============================================================================

/// Writes every pipeline milestone to an [`AuditSink`]
pub struct AuditInterceptor {
    sink: Arc<dyn AuditSink>,
}

impl AuditInterceptor {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    fn record(&self, event: audit::AuditEvent) {
        if let Err(e) = self.sink.record(event) {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    }
}

impl PermissionInterceptor for AuditInterceptor {
    fn before_request(&self, request: &PermissionRequest) -> bool {
        self.record(audit::request_started(request.permissions()));
        true
    }

    fn on_vetoed(&self, request: &PermissionRequest) {
        self.record(audit::request_vetoed(request.permissions()));
    }

    fn after_request(&self, request: &PermissionRequest, results: &HashMap<String, bool>) {
        self.record(audit::request_completed(request.permissions(), results));
    }

    fn on_granted(&self, request: &PermissionRequest, granted: &[String]) {
        self.record(audit::permission_granted(request.permissions(), granted));
    }

    fn on_denied(&self, request: &PermissionRequest, denied: &[String], permanently_denied: &[String]) {
        self.record(audit::permission_denied(
            request.permissions(),
            denied,
            permanently_denied,
        ));
    }

    fn on_permanently_denied(&self, request: &PermissionRequest, permanently_denied: &[String]) {
        self.record(audit::permission_permanently_denied(
            request.permissions(),
            permanently_denied,
        ));
    }

    fn on_error(&self, request: &PermissionRequest, error: &PermissionError) {
        self.record(audit::request_error(request.permissions(), error));
    }
}

impl fmt::Debug for AuditInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditInterceptor")
            .field("sink_healthy", &self.sink.is_healthy())
            .finish()
    }
}

// ============================================================================
// Recording Interceptor (for testing)
// ============================================================================

/// One observed hook call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorEvent {
    BeforeRequest(Vec<String>),
    Vetoed(Vec<String>),
    AfterRequest(Vec<(String, bool)>),
    Granted(Vec<String>),
    Denied {
        denied: Vec<String>,
        permanently_denied: Vec<String>,
    },
    PermanentlyDenied(Vec<String>),
    Error(PermissionError),
}

/// Records every hook call; optionally vetoes
#[derive(Debug, Default)]
pub struct RecordingInterceptor {
    events: Mutex<Vec<InterceptorEvent>>,
    veto: bool,
}

impl RecordingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interceptor whose `before_request` always returns `false`
    pub fn vetoing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            veto: true,
        }
    }

    pub fn events(&self) -> Vec<InterceptorEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn errors(&self) -> Vec<PermissionError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                InterceptorEvent::Error(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, event: InterceptorEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl PermissionInterceptor for RecordingInterceptor {
    fn before_request(&self, request: &PermissionRequest) -> bool {
        self.push(InterceptorEvent::BeforeRequest(request.permissions().to_vec()));
        !self.veto
    }

    fn on_vetoed(&self, request: &PermissionRequest) {
        self.push(InterceptorEvent::Vetoed(request.permissions().to_vec()));
    }

    fn after_request(&self, _request: &PermissionRequest, results: &HashMap<String, bool>) {
        let mut sorted: Vec<(String, bool)> =
            results.iter().map(|(k, v)| (k.clone(), *v)).collect();
        sorted.sort();
        self.push(InterceptorEvent::AfterRequest(sorted));
    }

    fn on_granted(&self, _request: &PermissionRequest, granted: &[String]) {
        self.push(InterceptorEvent::Granted(granted.to_vec()));
    }

    fn on_denied(&self, _request: &PermissionRequest, denied: &[String], permanently_denied: &[String]) {
        self.push(InterceptorEvent::Denied {
            denied: denied.to_vec(),
            permanently_denied: permanently_denied.to_vec(),
        });
    }

    fn on_permanently_denied(&self, _request: &PermissionRequest, permanently_denied: &[String]) {
        self.push(InterceptorEvent::PermanentlyDenied(permanently_denied.to_vec()));
    }

    fn on_error(&self, _request: &PermissionRequest, error: &PermissionError) {
        self.push(InterceptorEvent::Error(error.clone()));
    }
}
