//! End-to-end request flows through the manager, registry and executor

use grantflow::testing::FakePlatform;
use grantflow::{
    AutoSettingsHandler, CallbackEvent, InterceptorEvent, ManualScope, PermissionConfig,
    PermissionError, PermissionManager, PermissionPresets, PermissionServices, RateLimiter,
    RationaleDecision, RecordingCallback, RecordingInterceptor, RecordingPromptHandler, Scope,
    ScopeId, SettingsDecision,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const CAMERA: &str = "android.permission.CAMERA";
const AUDIO: &str = "android.permission.RECORD_AUDIO";

struct Fixture {
    manager: PermissionManager,
    platform: Arc<FakePlatform>,
    scope: Arc<ManualScope>,
    interceptor: Arc<RecordingInterceptor>,
    callback: Arc<RecordingCallback>,
}

impl Fixture {
    fn new(platform: FakePlatform) -> Self {
        Self::with_services(platform, PermissionPresets::testing())
    }

    /// Executor prepared while the scope is created, then the scope goes active
    fn with_services(platform: FakePlatform, services: PermissionServices) -> Self {
        let platform = Arc::new(platform);
        let interceptor = Arc::new(RecordingInterceptor::new());
        services.interceptors.register(interceptor.clone());

        let manager = PermissionManager::new(services);
        let scope = Arc::new(ManualScope::with_id(ScopeId::new("main"), platform.clone()));
        manager.prepare(scope.as_ref()).expect("prepare executor");
        scope.activate();

        Self {
            manager,
            platform,
            scope,
            interceptor,
            callback: Arc::new(RecordingCallback::new()),
        }
    }

    fn request(&self) -> grantflow::PermissionRequestBuilder {
        self.manager
            .with(self.scope.clone())
            .callback(self.callback.clone())
    }
}

fn perms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn throttled(max_per_hour: u32) -> PermissionServices {
    let config = PermissionConfig::unthrottled()
        .with_min_request_interval(Duration::ZERO)
        .with_max_requests_per_hour(max_per_hour);
    PermissionServices::builder()
        .config(config)
        .build()
        .expect("valid services")
}

// ============================================================================
// Request flows
// ============================================================================

#[tokio::test]
async fn test_all_granted_issues_no_native_prompt() {
    let f = Fixture::new(FakePlatform::new().grant(CAMERA).grant(AUDIO));

    f.request().permissions([CAMERA, AUDIO]).request().await.unwrap();

    assert_eq!(
        f.callback.outcomes(),
        vec![CallbackEvent::Granted(perms(&[CAMERA, AUDIO]))]
    );
    assert_eq!(f.platform.native_calls(), 0);
}

#[tokio::test]
async fn test_rationale_then_granted() {
    let f = Fixture::new(FakePlatform::new().rationale(CAMERA).respond(CAMERA, true));
    let prompts = Arc::new(RecordingPromptHandler::new(
        RationaleDecision::Continue,
        SettingsDecision::GoToSettings,
    ));

    f.request()
        .permission(CAMERA)
        .rationale("The camera scans receipts")
        .rationale_handler(prompts.clone())
        .settings_handler(prompts.clone())
        .request()
        .await
        .unwrap();

    assert_eq!(f.callback.outcomes(), vec![CallbackEvent::Granted(perms(&[CAMERA]))]);
    assert_eq!(prompts.rationale_count(), 1);
    assert_eq!(prompts.settings_count(), 0);
    assert_eq!(f.platform.single_calls(), 1);
}

#[tokio::test]
async fn test_partial_grant_reports_permanent_denial_first() {
    let f = Fixture::new(
        FakePlatform::new()
            .rationale(CAMERA)
            .rationale(AUDIO)
            .respond(CAMERA, true)
            .respond(AUDIO, false)
            .rationale_after_prompt(AUDIO, false),
    );

    f.request().permissions([CAMERA, AUDIO]).request().await.unwrap();

    assert_eq!(
        f.callback.outcomes(),
        vec![
            CallbackEvent::PermanentlyDenied(perms(&[AUDIO])),
            CallbackEvent::Denied {
                denied: vec![],
                permanently_denied: perms(&[AUDIO]),
            },
        ]
    );
    assert_eq!(f.platform.multiple_calls(), 1);
    assert_eq!(f.platform.settings_calls(), 0);
}

#[tokio::test]
async fn test_settings_round_trip_grants() {
    // Never asked reads as permanently denied and goes to the settings offer
    let f = Fixture::new(FakePlatform::new().settings_grants(CAMERA));

    let outcome = f
        .request()
        .permission(CAMERA)
        .settings_text("Enable the camera in settings")
        .settings_handler(Arc::new(AutoSettingsHandler::always_go()))
        .outcome()
        .await;

    assert!(outcome.all_granted);
    assert_eq!(outcome.granted, perms(&[CAMERA]));
    assert_eq!(f.platform.settings_calls(), 1);
    assert_eq!(f.platform.native_calls(), 0);
    assert_eq!(
        f.callback.outcomes(),
        vec![
            CallbackEvent::PermanentlyDenied(perms(&[CAMERA])),
            CallbackEvent::Granted(perms(&[CAMERA])),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_settings_round_trip_is_not_timed_out() {
    let services = PermissionServices::builder()
        .config(PermissionConfig::default().with_request_timeout(Some(Duration::from_secs(30))))
        .build()
        .expect("valid services");
    let f = Fixture::with_services(
        FakePlatform::new()
            .settings_grants(CAMERA)
            .settings_delay(Duration::from_secs(45)),
        services,
    );

    let outcome = f
        .request()
        .permission(CAMERA)
        .force_go_to_settings(true)
        .settings_handler(Arc::new(AutoSettingsHandler::always_go()))
        .outcome()
        .await;

    assert!(outcome.all_granted);
    assert_eq!(outcome.granted, perms(&[CAMERA]));
    assert_eq!(outcome.error, None);
    assert!(f.interceptor.errors().is_empty());
}

#[tokio::test]
async fn test_closure_callbacks() {
    let f = Fixture::new(FakePlatform::new().rationale(CAMERA).respond(CAMERA, false));
    let before = Arc::new(AtomicUsize::new(0));
    let denied = Arc::new(AtomicUsize::new(0));
    let (b, d) = (before.clone(), denied.clone());

    f.manager
        .with(f.scope.clone())
        .permission(CAMERA)
        .on_before_request(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        })
        .on_granted(|_| panic!("must not be granted"))
        .on_denied(move |retryable, permanent| {
            assert_eq!(retryable, [CAMERA]);
            assert!(permanent.is_empty());
            d.fetch_add(1, Ordering::SeqCst);
        })
        .request()
        .await
        .unwrap();

    assert_eq!(before.load(Ordering::SeqCst), 1);
    assert_eq!(denied.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_granted_closure_does_not_suppress_result() {
    let f = Fixture::new(FakePlatform::new().grant(CAMERA));
    let results = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = results.clone();

    f.manager
        .with(f.scope.clone())
        .permission(CAMERA)
        .on_granted(|_| panic!("caller bug"))
        .on_result(move |all, _, _| sink.lock().unwrap().push(all))
        .request()
        .await
        .unwrap();

    assert_eq!(*results.lock().unwrap(), vec![true]);
}

// ============================================================================
// Policy
// ============================================================================

#[tokio::test]
async fn test_veto_leaves_no_trace() {
    let services = PermissionPresets::testing();
    let limiter = services.rate_limiter.clone();
    services
        .interceptors
        .register(Arc::new(RecordingInterceptor::vetoing()));
    let f = Fixture::with_services(FakePlatform::new().rationale(CAMERA), services);

    let outcome = f.request().permission(CAMERA).outcome().await;

    assert!(!outcome.all_granted);
    assert_eq!(outcome.error, None);
    assert!(f.callback.events().is_empty());
    assert_eq!(f.platform.native_calls(), 0);
    assert_eq!(limiter.stats(CAMERA).requests_last_hour, 0);
}

#[tokio::test(start_paused = true)]
async fn test_eleventh_request_in_an_hour_is_dropped() {
    let f = Fixture::with_services(
        FakePlatform::new().rationale(CAMERA).respond(CAMERA, false),
        throttled(10),
    );

    for _ in 0..10 {
        f.request().permission(CAMERA).request().await.unwrap();
    }
    assert_eq!(f.platform.native_calls(), 10);
    assert_eq!(f.callback.outcomes().len(), 10);

    // Rate limiting is a policy rejection, not a caller error
    f.request().permission(CAMERA).request().await.unwrap();

    assert_eq!(f.platform.native_calls(), 10);
    assert_eq!(f.callback.outcomes().len(), 10);
    let errors = f.interceptor.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        PermissionError::RateLimited { permissions, .. } if permissions == &perms(&[CAMERA])
    ));

    // The window slides without any new recording
    tokio::time::advance(Duration::from_secs(3600)).await;
    f.request().permission(CAMERA).request().await.unwrap();
    assert_eq!(f.platform.native_calls(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_awaited_rate_limit_carries_error() {
    let limiter = Arc::new(RateLimiter::new(Duration::from_secs(5), 10));
    let services = PermissionServices::builder()
        .config(PermissionConfig::unthrottled())
        .rate_limiter(limiter)
        .build()
        .unwrap();
    let f = Fixture::with_services(FakePlatform::new().grant(CAMERA), services);

    assert!(f.request().permission(CAMERA).granted().await);
    let outcome = f.request().permission(CAMERA).outcome().await;

    assert!(!outcome.all_granted);
    assert_eq!(outcome.denied, perms(&[CAMERA]));
    assert!(matches!(
        outcome.error,
        Some(PermissionError::RateLimited {
            retry_after: Some(_),
            ..
        })
    ));
}

// ============================================================================
// Scope lifecycle
// ============================================================================

#[tokio::test]
async fn test_empty_request_is_configuration_error() {
    let f = Fixture::new(FakePlatform::new());

    let err = f.request().rationale("why").request().await.unwrap_err();
    assert_eq!(err, PermissionError::EmptyPermissions);
    assert!(err.is_configuration_error());
}

#[tokio::test]
async fn test_late_registration_fails_loudly() {
    let manager = PermissionManager::new(PermissionPresets::testing());
    let scope = Arc::new(ManualScope::new(Arc::new(FakePlatform::new().grant(CAMERA))));
    scope.activate();

    let err = manager
        .with(scope.clone())
        .permission(CAMERA)
        .request()
        .await
        .unwrap_err();
    assert_eq!(err, PermissionError::LateRegistration(scope.id()));
    assert!(manager.registry().is_empty());

    let outcome = manager.with(scope.clone()).permission(CAMERA).outcome().await;
    assert_eq!(outcome.error, Some(PermissionError::LateRegistration(scope.id())));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_pending_request() {
    let f = Fixture::new(FakePlatform::new().rationale(CAMERA).hang_native());

    let pending = tokio::spawn(f.request().permission(CAMERA).outcome());
    tokio::task::yield_now().await;
    assert_eq!(f.platform.native_calls(), 1);

    f.scope.destroy();
    let outcome = pending.await.unwrap();

    assert!(!outcome.all_granted);
    assert_eq!(outcome.error, None);
    assert!(f.callback.outcomes().is_empty());
    assert!(f.interceptor.errors().is_empty());
    assert!(f.manager.registry().is_empty());

    let err = f.request().permission(CAMERA).request().await.unwrap_err();
    assert_eq!(err, PermissionError::ScopeDestroyed(ScopeId::new("main")));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_during_settings_wait_delivers_nothing_more() {
    let f = Fixture::new(FakePlatform::new().settings_grants(CAMERA).hang_settings());

    let pending = tokio::spawn(
        f.request()
            .permission(CAMERA)
            .settings_text("Enable the camera in settings")
            .settings_handler(Arc::new(AutoSettingsHandler::always_go()))
            .outcome(),
    );
    tokio::task::yield_now().await;
    assert_eq!(f.platform.settings_calls(), 1);

    f.scope.destroy();
    let outcome = pending.await.unwrap();

    assert!(!outcome.all_granted);
    assert_eq!(outcome.error, None);
    assert_eq!(
        f.callback.outcomes(),
        vec![CallbackEvent::PermanentlyDenied(perms(&[CAMERA]))]
    );
    assert!(f.interceptor.errors().is_empty());
    assert!(f.manager.registry().is_empty());
}

#[tokio::test]
async fn test_scopes_do_not_share_executors() {
    let f = Fixture::new(FakePlatform::new().grant(CAMERA));
    let other = Arc::new(ManualScope::with_id(
        ScopeId::new("settings-screen"),
        Arc::new(FakePlatform::new().grant(CAMERA)),
    ));
    f.manager.prepare(other.as_ref()).unwrap();
    other.activate();

    assert!(f.manager.with(other.clone()).permission(CAMERA).granted().await);
    assert!(f.request().permission(CAMERA).granted().await);
    assert_eq!(f.manager.registry().len(), 2);

    other.destroy();
    assert_eq!(f.manager.registry().len(), 1);
}

// ============================================================================
// Audit
// ============================================================================

#[tokio::test]
async fn test_audited_preset_writes_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions").join("audit.jsonl");

    {
        let services = PermissionPresets::audited_at(&path).unwrap();
        let f = Fixture::with_services(
            FakePlatform::new().rationale(CAMERA).respond(CAMERA, true),
            services,
        );
        assert!(f.request().permission(CAMERA).granted().await);
        assert!(f
            .interceptor
            .events()
            .contains(&InterceptorEvent::Granted(perms(&[CAMERA]))));
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    let types: Vec<String> = contents
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["event_type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        types,
        vec!["request_started", "request_completed", "permission_granted"]
    );
}
