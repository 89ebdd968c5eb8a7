//! Permission request state machine
//!
//! One [`PermissionExecutor`] serves one hosting scope. A call to
//! [`PermissionExecutor::execute`] walks these phases in strict order:
//!
//! ```text
//! Idle -> CheckingPolicy -> Classifying -+-> (all granted)        -> deliver granted
//!                                        +-> HandlingPermanentDenial
//!                                        +-> AwaitingRationale -> RequestingNative
//!                                        +-> RequestingNative
//! RequestingNative -> aggregate -> deliver granted | HandlingPermanentDenial | deliver denied
//! HandlingPermanentDenial -> AwaitingSettings -> reclassify -> deliver
//! ```
//!
//! Only configuration errors reach the caller. Policy rejections, platform
//! failures, timeouts and panics go to the interceptor chain's `on_error`.
//! After the scope is torn down nothing more is delivered.

use futures::FutureExt;
use grantflow_api::{
    PermissionPlatform, PlatformError, RationaleDecision, ScopeId, SettingsDecision,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use crate::aggregator::aggregate;
use crate::classifier::{classify_all, ClassifiedPermissions};
use crate::error::PermissionError;
use crate::presets::PermissionServices;
use crate::prompt::{rationale_prompt, settings_prompt};
use crate::request::PermissionRequest;

/// Where an executor currently is in its request flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorPhase {
    Idle,
    CheckingPolicy,
    Classifying,
    AwaitingRationale,
    RequestingNative,
    HandlingPermanentDenial,
    AwaitingSettings,
}

/// Runs permission requests for one scope
pub struct PermissionExecutor {
    scope_id: ScopeId,
    platform: Arc<dyn PermissionPlatform>,
    services: PermissionServices,
    in_flight: AtomicBool,
    phase: Mutex<ExecutorPhase>,
    shutdown: watch::Sender<bool>,
}

/// Clears the in-flight flag however `execute` exits
struct InFlightGuard<'a>(&'a PermissionExecutor);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.set_phase(ExecutorPhase::Idle);
        self.0.in_flight.store(false, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a user callback, logging instead of unwinding
fn isolate(callback: &'static str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(callback, "Permission callback panicked");
    }
}

impl PermissionExecutor {
    pub fn new(
        scope_id: ScopeId,
        platform: Arc<dyn PermissionPlatform>,
        services: PermissionServices,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            scope_id,
            platform,
            services,
            in_flight: AtomicBool::new(false),
            phase: Mutex::new(ExecutorPhase::Idle),
            shutdown,
        }
    }

    pub fn scope_id(&self) -> &ScopeId {
        &self.scope_id
    }

    pub fn services(&self) -> &PermissionServices {
        &self.services
    }

    pub fn phase(&self) -> ExecutorPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a request is currently being executed
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Cancel pending waits and refuse further requests
    ///
    /// Called when the owning scope is torn down. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!(scope = %self.scope_id, "Permission executor shut down");
        }
    }

    fn set_phase(&self, phase: ExecutorPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn enter(&self, phase: ExecutorPhase) {
        tracing::debug!(scope = %self.scope_id, phase = ?phase, "Executor phase");
        self.set_phase(phase);
    }

    /// Execute one request to its terminal callback
    ///
    /// Returns `Err` only for configuration errors: the scope was torn down,
    /// or another request is still in flight on this executor.
    pub async fn execute(&self, request: PermissionRequest) -> Result<(), PermissionError> {
        self.execute_reporting(request).await.map(|_| ())
    }

    /// Like [`execute`](Self::execute), also returning the error routed to `on_error`
    pub(crate) async fn execute_reporting(
        &self,
        request: PermissionRequest,
    ) -> Result<Option<PermissionError>, PermissionError> {
        if self.is_shut_down() {
            return Err(PermissionError::ScopeDestroyed(self.scope_id.clone()));
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(scope = %self.scope_id, "Rejected concurrent permission request");
            return Err(PermissionError::RequestInFlight(self.scope_id.clone()));
        }
        let _guard = InFlightGuard(self);

        let outcome = AssertUnwindSafe(self.run(&request)).catch_unwind().await;
        let error = match outcome {
            Ok(Ok(())) => return Ok(None),
            Ok(Err(PermissionError::Cancelled)) => {
                tracing::debug!(scope = %self.scope_id, "Permission request cancelled by teardown");
                return Ok(None);
            }
            Ok(Err(e)) => e,
            Err(payload) => PermissionError::Internal(panic_message(payload.as_ref())),
        };

        if self.is_shut_down() {
            tracing::debug!(scope = %self.scope_id, error = %error, "Dropping error after teardown");
            return Ok(None);
        }
        if error.is_policy_rejection() {
            tracing::warn!(scope = %self.scope_id, error = %error, "Permission request rejected by policy");
        } else {
            tracing::warn!(scope = %self.scope_id, error = %error, "Permission request failed");
        }
        self.services.interceptors.on_error(&request, &error);
        Ok(Some(error))
    }

    async fn run(&self, request: &PermissionRequest) -> Result<(), PermissionError> {
        let permissions = request.permissions();

        self.enter(ExecutorPhase::CheckingPolicy);
        if !self.services.interceptors.before_request(request) {
            tracing::debug!(permissions = ?permissions, "Permission request vetoed");
            return Ok(());
        }

        let limiter = &self.services.rate_limiter;
        let blocked = limiter.blocked(permissions);
        if !blocked.is_empty() {
            return Err(PermissionError::RateLimited {
                retry_after: limiter.retry_after_all(&blocked),
                permissions: blocked,
            });
        }
        for permission in permissions {
            limiter.record_request(permission);
        }
        if let Some(callback) = &request.callback {
            isolate("on_before_request", || callback.on_before_request(permissions));
        }

        self.enter(ExecutorPhase::Classifying);
        let classified = classify_all(self.platform.as_ref(), permissions)?;
        tracing::debug!(
            granted = ?classified.granted,
            denied = ?classified.denied,
            permanently_denied = ?classified.permanently_denied,
            "Classified permissions"
        );

        if classified.all_granted() {
            self.deliver_granted(request, &classified.granted);
            return Ok(());
        }

        if classified.has_permanently_denied() {
            return self
                .handle_permanent_denial(request, &classified.permanently_denied, &classified.denied)
                .await;
        }

        if request.rationale.is_some() {
            self.enter(ExecutorPhase::AwaitingRationale);
            let handler = request
                .rationale_handler
                .clone()
                .unwrap_or_else(|| Arc::clone(&self.services.rationale_handler));
            let prompt = rationale_prompt(request, &self.services.config, &classified.denied);

            match self.cancellable(handler.show(&prompt)).await? {
                RationaleDecision::Continue => {}
                RationaleDecision::Cancel => {
                    tracing::debug!("Rationale declined");
                    self.deliver_denied(request, &classified.denied, &[]);
                    return Ok(());
                }
            }
        }

        self.request_native(request, &classified).await
    }

    async fn request_native(
        &self,
        request: &PermissionRequest,
        classified: &ClassifiedPermissions,
    ) -> Result<(), PermissionError> {
        self.enter(ExecutorPhase::RequestingNative);
        let to_request = &classified.denied;
        let platform = &self.platform;

        let mut results = match to_request.as_slice() {
            [single] => {
                let granted = self
                    .bounded("request_single", platform.request_single(single))
                    .await?;
                HashMap::from([(single.clone(), granted)])
            }
            _ => {
                self.bounded("request_multiple", platform.request_multiple(to_request))
                    .await?
            }
        };
        self.services.interceptors.after_request(request, &results);

        // Permissions granted before the prompt were never re-asked
        for permission in &classified.granted {
            results.entry(permission.clone()).or_insert(true);
        }
        let aggregated = aggregate(platform.as_ref(), request.permissions(), &results)?;

        if aggregated.all_granted() {
            self.deliver_granted(request, &aggregated.granted);
            Ok(())
        } else if aggregated.has_permanently_denied() {
            self.handle_permanent_denial(
                request,
                &aggregated.permanently_denied,
                &aggregated.temporarily_denied(),
            )
            .await
        } else {
            self.deliver_denied(request, &aggregated.temporarily_denied(), &[]);
            Ok(())
        }
    }

    async fn handle_permanent_denial(
        &self,
        request: &PermissionRequest,
        permanently_denied: &[String],
        retryable: &[String],
    ) -> Result<(), PermissionError> {
        self.enter(ExecutorPhase::HandlingPermanentDenial);
        self.deliver_permanently_denied(request, permanently_denied);

        let offer_settings = request.force_go_to_settings
            || request.settings_text.is_some()
            || self.services.config.force_go_to_settings_on_permanent_denial;
        if !offer_settings {
            self.deliver_denied(request, retryable, permanently_denied);
            return Ok(());
        }

        self.enter(ExecutorPhase::AwaitingSettings);
        let handler = request
            .settings_handler
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.services.settings_handler));
        let prompt = settings_prompt(request, &self.services.config, permanently_denied);

        match self.cancellable(handler.show(&prompt)).await? {
            SettingsDecision::Cancel => {
                tracing::debug!("Settings redirect declined");
                self.deliver_denied(request, retryable, permanently_denied);
            }
            SettingsDecision::GoToSettings => {
                // Never timed out: ends on return or teardown
                self.cancellable(self.platform.launch_settings()).await??;

                // The user may have changed anything on the settings page
                let reclassified = classify_all(self.platform.as_ref(), request.permissions())?;
                if reclassified.all_granted() {
                    self.deliver_granted(request, &reclassified.granted);
                } else {
                    self.deliver_denied(
                        request,
                        &reclassified.denied,
                        &reclassified.permanently_denied,
                    );
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Suspension points
    // ------------------------------------------------------------------

    /// Await `fut` unless the scope is torn down first
    async fn cancellable<T>(&self, fut: impl Future<Output = T>) -> Result<T, PermissionError> {
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            value = fut => Ok(value),
            _ = shutdown.wait_for(|down| *down) => Err(PermissionError::Cancelled),
        }
    }

    /// Await a native prompt, bounded by the optional configured timeout and by teardown
    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, PlatformError>>,
    ) -> Result<T, PermissionError> {
        let timeout = self.services.config.request_timeout;
        let timed = async move {
            match timeout {
                Some(after) => match tokio::time::timeout(after, fut).await {
                    Ok(result) => result.map_err(PermissionError::from),
                    Err(_) => Err(PermissionError::Timeout { operation, after }),
                },
                None => fut.await.map_err(PermissionError::from),
            }
        };
        self.cancellable(timed).await?
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    fn deliverable(&self) -> bool {
        if self.is_shut_down() {
            tracing::debug!(scope = %self.scope_id, "Suppressing delivery after teardown");
            return false;
        }
        true
    }

    fn deliver_granted(&self, request: &PermissionRequest, granted: &[String]) {
        if !self.deliverable() {
            return;
        }
        tracing::debug!(granted = ?granted, "Delivering granted");
        if let Some(callback) = &request.callback {
            isolate("on_granted", || callback.on_granted(granted));
        }
        self.services.interceptors.on_granted(request, granted);
    }

    fn deliver_denied(
        &self,
        request: &PermissionRequest,
        denied: &[String],
        permanently_denied: &[String],
    ) {
        if !self.deliverable() {
            return;
        }
        tracing::debug!(
            denied = ?denied,
            permanently_denied = ?permanently_denied,
            "Delivering denied"
        );
        if let Some(callback) = &request.callback {
            isolate("on_denied", || callback.on_denied(denied, permanently_denied));
        }
        self.services
            .interceptors
            .on_denied(request, denied, permanently_denied);
    }

    fn deliver_permanently_denied(&self, request: &PermissionRequest, permanently_denied: &[String]) {
        if !self.deliverable() {
            return;
        }
        tracing::debug!(permanently_denied = ?permanently_denied, "Delivering permanently denied");
        if let Some(callback) = &request.callback {
            isolate("on_permanently_denied", || {
                callback.on_permanently_denied(permanently_denied)
            });
        }
        self.services
            .interceptors
            .on_permanently_denied(request, permanently_denied);
    }
}

impl fmt::Debug for PermissionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionExecutor")
            .field("scope_id", &self.scope_id)
            .field("phase", &self.phase())
            .field("busy", &self.is_busy())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{CallbackEvent, PermissionCallback, RecordingCallback};
    use crate::interceptor::{InterceptorEvent, RecordingInterceptor};
    use crate::presets::PermissionPresets;
    use crate::prompt::RecordingPromptHandler;
    use crate::testing::FakePlatform;
    use std::time::Duration;

    const CAMERA: &str = "CAMERA";
    const AUDIO: &str = "RECORD_AUDIO";

    struct Harness {
        platform: Arc<FakePlatform>,
        executor: Arc<PermissionExecutor>,
        callback: Arc<RecordingCallback>,
        interceptor: Arc<RecordingInterceptor>,
        prompts: Arc<RecordingPromptHandler>,
    }

    fn harness_with(platform: FakePlatform, services: PermissionServices) -> Harness {
        let platform = Arc::new(platform);
        let interceptor = Arc::new(RecordingInterceptor::new());
        services.interceptors.register(interceptor.clone());
        let executor = Arc::new(PermissionExecutor::new(
            ScopeId::new("test"),
            platform.clone(),
            services,
        ));
        Harness {
            platform,
            executor,
            callback: Arc::new(RecordingCallback::new()),
            interceptor,
            prompts: Arc::new(RecordingPromptHandler::new(
                RationaleDecision::Continue,
                SettingsDecision::GoToSettings,
            )),
        }
    }

    fn harness(platform: FakePlatform) -> Harness {
        harness_with(platform, PermissionPresets::testing())
    }

    impl Harness {
        fn request(&self, permissions: &[&str]) -> PermissionRequest {
            let mut request = PermissionRequest::new(permissions.iter().copied())
                .unwrap()
                .with_callback(self.callback.clone());
            request.rationale_handler = Some(self.prompts.clone());
            request.settings_handler = Some(self.prompts.clone());
            request
        }
    }

    fn perms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_all_granted_short_circuits() {
        let h = harness(FakePlatform::new().grant(CAMERA).grant(AUDIO));

        h.executor.execute(h.request(&[CAMERA, AUDIO])).await.unwrap();

        assert_eq!(h.callback.outcomes(), vec![CallbackEvent::Granted(perms(&[CAMERA, AUDIO]))]);
        assert_eq!(h.platform.native_calls(), 0);
        assert_eq!(h.prompts.prompt_count(), 0);
        assert_eq!(h.executor.phase(), ExecutorPhase::Idle);
        assert!(!h.executor.is_busy());
    }

    #[tokio::test]
    async fn test_rationale_then_native_grant() {
        let h = harness(FakePlatform::new().rationale(CAMERA).respond(CAMERA, true));

        let request = h.request(&[CAMERA]).with_rationale("Needed to scan codes");
        h.executor.execute(request).await.unwrap();

        assert_eq!(h.callback.outcomes(), vec![CallbackEvent::Granted(perms(&[CAMERA]))]);
        assert_eq!(h.prompts.rationale_count(), 1);
        assert_eq!(h.prompts.settings_count(), 0);
        assert_eq!(h.platform.single_calls(), 1);
        assert!(h
            .interceptor
            .events()
            .contains(&InterceptorEvent::AfterRequest(vec![(CAMERA.into(), true)])));
    }

    #[tokio::test]
    async fn test_rationale_cancel_denies_without_native() {
        let h = harness(FakePlatform::new().rationale(CAMERA));
        let mut request = h.request(&[CAMERA]).with_rationale("Needed");
        request.rationale_handler = Some(Arc::new(RecordingPromptHandler::new(
            RationaleDecision::Cancel,
            SettingsDecision::Cancel,
        )));

        h.executor.execute(request).await.unwrap();

        assert_eq!(
            h.callback.outcomes(),
            vec![CallbackEvent::Denied {
                denied: perms(&[CAMERA]),
                permanently_denied: vec![],
            }]
        );
        assert_eq!(h.platform.native_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_rationale_goes_straight_to_native() {
        let h = harness(FakePlatform::new().rationale(CAMERA).respond(CAMERA, false));

        h.executor.execute(h.request(&[CAMERA])).await.unwrap();

        assert_eq!(h.prompts.prompt_count(), 0);
        assert_eq!(h.platform.single_calls(), 1);
        // rationale predicate still true after the prompt: retryable denial
        assert_eq!(
            h.callback.outcomes(),
            vec![CallbackEvent::Denied {
                denied: perms(&[CAMERA]),
                permanently_denied: vec![],
            }]
        );
    }

    #[tokio::test]
    async fn test_partial_grant_becomes_permanent_denial() {
        let h = harness(
            FakePlatform::new()
                .rationale(CAMERA)
                .rationale(AUDIO)
                .respond(CAMERA, true)
                .respond(AUDIO, false)
                .rationale_after_prompt(AUDIO, false),
        );

        h.executor.execute(h.request(&[CAMERA, AUDIO])).await.unwrap();

        assert_eq!(h.platform.multiple_calls(), 1);
        assert_eq!(
            h.callback.outcomes(),
            vec![
                CallbackEvent::PermanentlyDenied(perms(&[AUDIO])),
                CallbackEvent::Denied {
                    denied: vec![],
                    permanently_denied: perms(&[AUDIO]),
                },
            ]
        );
        assert_eq!(h.prompts.settings_count(), 0);
    }

    #[tokio::test]
    async fn test_pre_granted_permissions_merge_into_result() {
        let h = harness(
            FakePlatform::new()
                .grant(CAMERA)
                .rationale(AUDIO)
                .respond(AUDIO, true),
        );

        h.executor.execute(h.request(&[CAMERA, AUDIO])).await.unwrap();

        assert_eq!(h.platform.native_requests(), vec![perms(&[AUDIO])]);
        assert_eq!(h.callback.outcomes(), vec![CallbackEvent::Granted(perms(&[CAMERA, AUDIO]))]);
    }

    #[tokio::test]
    async fn test_permanent_denial_with_settings_round_trip() {
        let h = harness(FakePlatform::new().settings_grants(CAMERA));

        let request = h.request(&[CAMERA]).with_settings_text("Enable camera in Settings");
        h.executor.execute(request).await.unwrap();

        assert_eq!(
            h.callback.outcomes(),
            vec![
                CallbackEvent::PermanentlyDenied(perms(&[CAMERA])),
                CallbackEvent::Granted(perms(&[CAMERA])),
            ]
        );
        assert_eq!(h.platform.native_calls(), 0);
        assert_eq!(h.platform.settings_calls(), 1);
        assert_eq!(h.prompts.settings_count(), 1);
    }

    #[tokio::test]
    async fn test_settings_declined() {
        let h = harness(FakePlatform::new().rationale(AUDIO));
        let mut request = h.request(&[CAMERA, AUDIO]).with_force_go_to_settings(true);
        request.settings_handler = Some(Arc::new(RecordingPromptHandler::new(
            RationaleDecision::Continue,
            SettingsDecision::Cancel,
        )));

        h.executor.execute(request).await.unwrap();

        assert_eq!(
            h.callback.outcomes(),
            vec![
                CallbackEvent::PermanentlyDenied(perms(&[CAMERA])),
                CallbackEvent::Denied {
                    denied: perms(&[AUDIO]),
                    permanently_denied: perms(&[CAMERA]),
                },
            ]
        );
        assert_eq!(h.platform.settings_calls(), 0);
    }

    #[tokio::test]
    async fn test_config_forces_settings_offer() {
        let mut services = PermissionPresets::testing();
        services.config.force_go_to_settings_on_permanent_denial = true;
        let h = harness_with(FakePlatform::new(), services);

        h.executor.execute(h.request(&[CAMERA])).await.unwrap();

        assert_eq!(h.prompts.settings_count(), 1);
        assert_eq!(h.platform.settings_calls(), 1);
        assert_eq!(
            h.callback.outcomes().last(),
            Some(&CallbackEvent::Denied {
                denied: vec![],
                permanently_denied: perms(&[CAMERA]),
            })
        );
    }

    #[tokio::test]
    async fn test_veto_has_no_side_effects() {
        let services = PermissionPresets::testing();
        services.interceptors.register(Arc::new(RecordingInterceptor::vetoing()));
        let limiter = services.rate_limiter.clone();
        let h = harness_with(FakePlatform::new().rationale(CAMERA), services);

        h.executor.execute(h.request(&[CAMERA])).await.unwrap();

        assert!(h.callback.events().is_empty());
        assert_eq!(h.platform.native_calls(), 0);
        assert_eq!(limiter.stats(CAMERA).requests_last_hour, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_reports_only_to_interceptors() {
        let mut services = PermissionPresets::testing();
        services.rate_limiter = Arc::new(crate::rate_limit::RateLimiter::new(
            Duration::from_secs(5),
            10,
        ));
        let h = harness_with(FakePlatform::new().grant(CAMERA), services);

        h.executor.execute(h.request(&[CAMERA])).await.unwrap();
        h.executor.execute(h.request(&[CAMERA])).await.unwrap();

        assert_eq!(h.callback.outcomes().len(), 1);
        let errors = h.interceptor.errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            PermissionError::RateLimited { permissions, retry_after: Some(_) } if permissions == &perms(&[CAMERA])
        ));
    }

    #[tokio::test]
    async fn test_platform_error_routed_to_on_error() {
        let h = harness(FakePlatform::new().rationale(CAMERA).fail_native("launcher gone"));

        h.executor.execute(h.request(&[CAMERA])).await.unwrap();

        assert!(h.callback.outcomes().is_empty());
        let errors = h.interceptor.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "PERMISSION_PLATFORM");
    }

    #[tokio::test]
    async fn test_panic_is_caught_at_boundary() {
        let h = harness(FakePlatform::new().rationale(CAMERA).panic_native());

        h.executor.execute(h.request(&[CAMERA])).await.unwrap();

        let errors = h.interceptor.errors();
        assert_eq!(errors, vec![PermissionError::Internal("native prompt crashed".into())]);
        assert!(!h.executor.is_busy());

        // the executor remains usable
        h.platform.set_granted(CAMERA, true);
        h.executor.execute(h.request(&[CAMERA])).await.unwrap();
        assert_eq!(h.callback.outcomes(), vec![CallbackEvent::Granted(perms(&[CAMERA]))]);
    }

    #[tokio::test]
    async fn test_panicking_callback_is_isolated() {
        struct Exploding;
        impl PermissionCallback for Exploding {
            fn on_granted(&self, _permissions: &[String]) {
                panic!("callback exploded");
            }
        }

        let h = harness(FakePlatform::new().grant(CAMERA));
        let request = PermissionRequest::new([CAMERA])
            .unwrap()
            .with_callback(Arc::new(Exploding));

        h.executor.execute(request).await.unwrap();

        assert!(h.interceptor.errors().is_empty());
        assert!(h
            .interceptor
            .events()
            .contains(&InterceptorEvent::Granted(perms(&[CAMERA]))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_timeout() {
        let mut services = PermissionPresets::testing();
        services.config.request_timeout = Some(Duration::from_secs(30));
        let h = harness_with(FakePlatform::new().rationale(CAMERA).hang_native(), services);

        h.executor.execute(h.request(&[CAMERA])).await.unwrap();

        assert_eq!(
            h.interceptor.errors(),
            vec![PermissionError::Timeout {
                operation: "request_single",
                after: Duration::from_secs(30),
            }]
        );
        assert!(h.callback.outcomes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_round_trip_outlasts_request_timeout() {
        let mut services = PermissionPresets::testing();
        services.config.request_timeout = Some(Duration::from_secs(30));
        let h = harness_with(
            FakePlatform::new()
                .settings_grants(CAMERA)
                .settings_delay(Duration::from_secs(45)),
            services,
        );

        let request = h.request(&[CAMERA]).with_settings_text("Enable camera in Settings");
        h.executor.execute(request).await.unwrap();

        assert!(h.interceptor.errors().is_empty());
        assert_eq!(
            h.callback.outcomes(),
            vec![
                CallbackEvent::PermanentlyDenied(perms(&[CAMERA])),
                CallbackEvent::Granted(perms(&[CAMERA])),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_settings_wait() {
        let h = harness(FakePlatform::new().settings_grants(CAMERA).hang_settings());

        let executor = h.executor.clone();
        let request = h.request(&[CAMERA]).with_settings_text("Enable camera in Settings");
        let running = tokio::spawn(async move { executor.execute(request).await });
        tokio::task::yield_now().await;
        assert_eq!(h.executor.phase(), ExecutorPhase::AwaitingSettings);

        h.executor.shutdown();
        running.await.unwrap().unwrap();

        assert_eq!(
            h.callback.outcomes(),
            vec![CallbackEvent::PermanentlyDenied(perms(&[CAMERA]))]
        );
        assert!(h.interceptor.errors().is_empty());
        assert_eq!(h.platform.settings_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_execute_rejected() {
        let h = harness(
            FakePlatform::new()
                .rationale(CAMERA)
                .respond(CAMERA, true)
                .native_delay(Duration::from_secs(1)),
        );

        let executor = h.executor.clone();
        let first = h.request(&[CAMERA]);
        let running = tokio::spawn(async move { executor.execute(first).await });
        tokio::task::yield_now().await;
        assert!(h.executor.is_busy());

        let second = h.executor.execute(h.request(&[CAMERA])).await;
        assert_eq!(second, Err(PermissionError::RequestInFlight(ScopeId::new("test"))));

        running.await.unwrap().unwrap();
        assert_eq!(h.callback.outcomes(), vec![CallbackEvent::Granted(perms(&[CAMERA]))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_prompt() {
        let h = harness(FakePlatform::new().rationale(CAMERA).hang_native());

        let executor = h.executor.clone();
        let request = h.request(&[CAMERA]);
        let running = tokio::spawn(async move { executor.execute(request).await });
        tokio::task::yield_now().await;

        h.executor.shutdown();
        running.await.unwrap().unwrap();

        assert!(h.callback.outcomes().is_empty());
        assert!(h.interceptor.errors().is_empty());
        assert_eq!(
            h.executor.execute(h.request(&[CAMERA])).await,
            Err(PermissionError::ScopeDestroyed(ScopeId::new("test")))
        );
    }
}
