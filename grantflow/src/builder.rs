//! Fluent request builder
//!
//! A pure configuration accumulator: nothing touches the platform, the
//! registry or any shared state until [`PermissionRequestBuilder::request`]
//! (or one of the awaitable terminals) is called. Group selections are kept
//! symbolic and expanded against the platform's API level on build.

use grantflow_api::{PermissionGroup, PermissionGroups, RationaleHandler, Scope, SettingsHandler};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::callback::{FnCallback, PermissionCallback};
use crate::error::PermissionError;
use crate::registry::ExecutorRegistry;
use crate::request::PermissionRequest;

/// Accumulates one permission request for a scope
///
/// Obtained from [`PermissionManager::with`](crate::PermissionManager::with).
pub struct PermissionRequestBuilder {
    registry: ExecutorRegistry,
    scope: Arc<dyn Scope>,
    selections: Vec<Selection>,
    rationale: Option<String>,
    rationale_title: Option<String>,
    positive_label: Option<String>,
    negative_label: Option<String>,
    settings_text: Option<String>,
    settings_title: Option<String>,
    force_go_to_settings: bool,
    closures: FnCallback,
    callbacks: Vec<Arc<dyn PermissionCallback>>,
    rationale_handler: Option<Arc<dyn RationaleHandler>>,
    settings_handler: Option<Arc<dyn SettingsHandler>>,
}

impl PermissionRequestBuilder {
    pub(crate) fn new(registry: ExecutorRegistry, scope: Arc<dyn Scope>) -> Self {
        Self {
            registry,
            scope,
            selections: Vec::new(),
            rationale: None,
            rationale_title: None,
            positive_label: None,
            negative_label: None,
            settings_text: None,
            settings_title: None,
            force_go_to_settings: false,
            closures: FnCallback::new(),
            callbacks: Vec::new(),
            rationale_handler: None,
            settings_handler: None,
        }
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.selections.push(Selection::Permission(permission.into()));
        self
    }

    pub fn permissions<I, S>(self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        permissions
            .into_iter()
            .fold(self, |builder, permission| builder.permission(permission))
    }

    /// Add every member of a named group available on the scope's platform
    pub fn group(mut self, group: PermissionGroup) -> Self {
        self.selections.push(Selection::Group(group));
        self
    }

    pub fn location(self) -> Self {
        self.group(PermissionGroup::Location)
    }

    pub fn storage(self) -> Self {
        self.group(PermissionGroup::Storage)
    }

    pub fn media(self) -> Self {
        self.group(PermissionGroup::Media)
    }

    pub fn camera_and_audio(self) -> Self {
        self.group(PermissionGroup::CameraAndAudio)
    }

    pub fn contacts(self) -> Self {
        self.group(PermissionGroup::Contacts)
    }

    pub fn calendar(self) -> Self {
        self.group(PermissionGroup::Calendar)
    }

    pub fn sms(self) -> Self {
        self.group(PermissionGroup::Sms)
    }

    pub fn phone(self) -> Self {
        self.group(PermissionGroup::Phone)
    }

    /// Background location; skipped below API 29
    pub fn background_location(mut self) -> Self {
        self.selections.push(Selection::BackgroundLocation);
        self
    }

    /// Notification permission; skipped below API 33
    pub fn notifications(mut self) -> Self {
        self.selections.push(Selection::Notifications);
        self
    }

    // ========================================================================
    // Texts
    // ========================================================================

    pub fn rationale(mut self, message: impl Into<String>) -> Self {
        self.rationale = Some(message.into());
        self
    }

    pub fn rationale_title(mut self, title: impl Into<String>) -> Self {
        self.rationale_title = Some(title.into());
        self
    }

    pub fn positive_label(mut self, label: impl Into<String>) -> Self {
        self.positive_label = Some(label.into());
        self
    }

    pub fn negative_label(mut self, label: impl Into<String>) -> Self {
        self.negative_label = Some(label.into());
        self
    }

    pub fn settings_text(mut self, message: impl Into<String>) -> Self {
        self.settings_text = Some(message.into());
        self
    }

    pub fn settings_title(mut self, title: impl Into<String>) -> Self {
        self.settings_title = Some(title.into());
        self
    }

    /// Offer the settings redirect on permanent denial even without settings text
    pub fn force_go_to_settings(mut self, force: bool) -> Self {
        self.force_go_to_settings = force;
        self
    }

    // ========================================================================
    // Callbacks and handlers
    // ========================================================================

    pub fn on_before_request(mut self, f: impl Fn(&[String]) + Send + Sync + 'static) -> Self {
        self.closures = self.closures.on_before_request(f);
        self
    }

    pub fn on_granted(mut self, f: impl Fn(&[String]) + Send + Sync + 'static) -> Self {
        self.closures = self.closures.on_granted(f);
        self
    }

    /// `(denied, permanently_denied)`, disjoint
    pub fn on_denied(mut self, f: impl Fn(&[String], &[String]) + Send + Sync + 'static) -> Self {
        self.closures = self.closures.on_denied(f);
        self
    }

    pub fn on_permanently_denied(
        mut self,
        f: impl Fn(&[String]) + Send + Sync + 'static,
    ) -> Self {
        self.closures = self.closures.on_permanently_denied(f);
        self
    }

    /// `(all_granted, granted, denied)` where `denied` includes permanent denials
    pub fn on_result(
        mut self,
        f: impl Fn(bool, &[String], &[String]) + Send + Sync + 'static,
    ) -> Self {
        self.closures = self.closures.on_result(f);
        self
    }

    /// Attach a callback object; runs after the closure callbacks
    pub fn callback(mut self, callback: Arc<dyn PermissionCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn rationale_handler(mut self, handler: Arc<dyn RationaleHandler>) -> Self {
        self.rationale_handler = Some(handler);
        self
    }

    pub fn settings_handler(mut self, handler: Arc<dyn SettingsHandler>) -> Self {
        self.settings_handler = Some(handler);
        self
    }

    // ========================================================================
    // Terminals
    // ========================================================================

    /// Permissions selected so far, in insertion order and deduplicated
    ///
    /// Group selections are expanded for the scope's current API level.
    pub fn requested(&self) -> Vec<String> {
        let mut resolved: Option<PermissionGroups> = None;
        let mut permissions: Vec<String> = Vec::new();

        for selection in &self.selections {
            if let Selection::Permission(permission) = selection {
                push_unique(&mut permissions, permission);
                continue;
            }
            let groups = *resolved.get_or_insert_with(|| {
                PermissionGroups::for_api_level(self.scope.platform().api_level())
            });
            match selection {
                Selection::Group(group) => {
                    let members = groups.members(*group);
                    if members.is_empty() {
                        tracing::debug!(
                            group = group.name(),
                            api_level = %groups.api_level(),
                            "Permission group is empty on this platform level"
                        );
                    }
                    for &permission in members {
                        push_unique(&mut permissions, permission);
                    }
                }
                Selection::BackgroundLocation => {
                    if let Some(permission) = groups.background_location() {
                        push_unique(&mut permissions, permission);
                    }
                }
                Selection::Notifications => {
                    if let Some(permission) = groups.notification() {
                        push_unique(&mut permissions, permission);
                    }
                }
                Selection::Permission(_) => {}
            }
        }
        permissions
    }

    /// Validate and freeze the request without executing it
    pub fn build(&self) -> Result<PermissionRequest, PermissionError> {
        let mut request = PermissionRequest::new(self.requested())?;
        request.rationale = self.rationale.clone();
        request.rationale_title = self.rationale_title.clone();
        request.positive_label = self.positive_label.clone();
        request.negative_label = self.negative_label.clone();
        request.settings_text = self.settings_text.clone();
        request.settings_title = self.settings_title.clone();
        request.force_go_to_settings = self.force_go_to_settings;
        request.rationale_handler = self.rationale_handler.clone();
        request.settings_handler = self.settings_handler.clone();
        request.callback = self.combined_callback(request.permissions());
        Ok(request)
    }

    /// Run the request to its terminal callback
    ///
    /// Returns `Err` only for configuration errors: no permissions, a
    /// destroyed scope, an executor requested too late, or a request already
    /// in flight on this scope. Policy rejections and platform failures are
    /// reported through the interceptors' `on_error`.
    pub async fn request(self) -> Result<(), PermissionError> {
        self.dispatch().await.map(|_| ())
    }

    pub(crate) fn push_callback(&mut self, callback: Arc<dyn PermissionCallback>) {
        self.callbacks.push(callback);
    }

    pub(crate) async fn dispatch(self) -> Result<Option<PermissionError>, PermissionError> {
        let request = self.build()?;
        let executor = self.registry.get_or_create(self.scope.as_ref())?;
        executor.execute_reporting(request).await
    }

    fn combined_callback(&self, permissions: &[String]) -> Option<Arc<dyn PermissionCallback>> {
        let mut all: Vec<Arc<dyn PermissionCallback>> = Vec::new();
        if !self.closures.is_empty() {
            all.push(Arc::new(self.closures.clone().for_permissions(permissions)));
        }
        all.extend(self.callbacks.iter().cloned());

        match all.len() {
            0 => None,
            1 => all.pop(),
            _ => Some(Arc::new(CallbackChain(all))),
        }
    }
}

impl fmt::Debug for PermissionRequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionRequestBuilder")
            .field("scope", &self.scope.id())
            .field("selections", &self.selections)
            .field("rationale", &self.rationale)
            .field("settings_text", &self.settings_text)
            .field("force_go_to_settings", &self.force_go_to_settings)
            .field("closures", &self.closures)
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}

/// One entry of the builder's permission list
#[derive(Debug, Clone)]
enum Selection {
    Permission(String),
    Group(PermissionGroup),
    BackgroundLocation,
    Notifications,
}

fn push_unique(permissions: &mut Vec<String>, permission: &str) {
    if !permissions.iter().any(|p| p == permission) {
        permissions.push(permission.to_string());
    }
}

/// Fans one delivery out to several callbacks, isolating each
struct CallbackChain(Vec<Arc<dyn PermissionCallback>>);

impl CallbackChain {
    fn each(&self, f: impl Fn(&dyn PermissionCallback)) {
        for callback in &self.0 {
            if catch_unwind(AssertUnwindSafe(|| f(callback.as_ref()))).is_err() {
                tracing::warn!("Chained permission callback panicked");
            }
        }
    }
}

impl PermissionCallback for CallbackChain {
    fn on_before_request(&self, permissions: &[String]) {
        self.each(|c| c.on_before_request(permissions));
    }

    fn on_granted(&self, permissions: &[String]) {
        self.each(|c| c.on_granted(permissions));
    }

    fn on_denied(&self, denied: &[String], permanently_denied: &[String]) {
        self.each(|c| c.on_denied(denied, permanently_denied));
    }

    fn on_permanently_denied(&self, permissions: &[String]) {
        self.each(|c| c.on_permanently_denied(permissions));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{CallbackEvent, RecordingCallback};
    use crate::presets::PermissionPresets;
    use crate::testing::FakePlatform;
    use grantflow_api::{
        manifest, ApiLevel, ManualScope, PermissionPlatform, ScopeId, ScopeState, TeardownHook,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn builder_at(level: ApiLevel) -> PermissionRequestBuilder {
        let platform = Arc::new(FakePlatform::new().with_api_level(level));
        let scope: Arc<dyn Scope> = Arc::new(ManualScope::new(platform));
        PermissionRequestBuilder::new(ExecutorRegistry::new(PermissionPresets::testing()), scope)
    }

    fn builder() -> PermissionRequestBuilder {
        builder_at(ApiLevel::TIRAMISU)
    }

    #[test]
    fn test_permissions_dedup_in_order() {
        let builder = builder()
            .permission("CAMERA")
            .permissions(["RECORD_AUDIO", "CAMERA"])
            .permissions(vec!["READ_CONTACTS".to_string()]);
        assert_eq!(builder.requested(), ["CAMERA", "RECORD_AUDIO", "READ_CONTACTS"]);
    }

    #[test]
    fn test_build_copies_texts() {
        let request = builder()
            .permission("CAMERA")
            .rationale("Needed for scanning")
            .rationale_title("Camera")
            .positive_label("Allow")
            .negative_label("Not now")
            .settings_text("Enable it in settings")
            .settings_title("Settings")
            .force_go_to_settings(true)
            .build()
            .unwrap();

        assert_eq!(request.permissions(), ["CAMERA"]);
        assert_eq!(request.rationale.as_deref(), Some("Needed for scanning"));
        assert_eq!(request.rationale_title.as_deref(), Some("Camera"));
        assert_eq!(request.positive_label.as_deref(), Some("Allow"));
        assert_eq!(request.negative_label.as_deref(), Some("Not now"));
        assert_eq!(request.settings_text.as_deref(), Some("Enable it in settings"));
        assert_eq!(request.settings_title.as_deref(), Some("Settings"));
        assert!(request.force_go_to_settings);
        assert!(request.callback.is_none());
    }

    #[test]
    fn test_build_without_permissions_fails() {
        let err = builder().rationale("why").build().unwrap_err();
        assert_eq!(err, PermissionError::EmptyPermissions);
    }

    #[test]
    fn test_group_membership_follows_api_level() {
        let modern = builder_at(ApiLevel::TIRAMISU).media().notifications().background_location();
        assert!(modern.requested().contains(&manifest::READ_MEDIA_IMAGES.to_string()));
        assert!(modern.requested().contains(&manifest::POST_NOTIFICATIONS.to_string()));
        assert!(modern
            .requested()
            .contains(&manifest::ACCESS_BACKGROUND_LOCATION.to_string()));

        let legacy = builder_at(ApiLevel(28)).media().notifications().background_location();
        assert!(legacy.requested().is_empty());
    }

    /// Scope that counts how often its platform is looked up
    struct CountingScope {
        inner: ManualScope,
        lookups: AtomicUsize,
    }

    impl Scope for CountingScope {
        fn id(&self) -> ScopeId {
            self.inner.id()
        }

        fn state(&self) -> ScopeState {
            self.inner.state()
        }

        fn platform(&self) -> Arc<dyn PermissionPlatform> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.platform()
        }

        fn on_teardown(&self, hook: TeardownHook) {
            self.inner.on_teardown(hook);
        }
    }

    #[test]
    fn test_groups_resolve_on_build_only() {
        let scope = Arc::new(CountingScope {
            inner: ManualScope::new(Arc::new(FakePlatform::new())),
            lookups: AtomicUsize::new(0),
        });
        let builder = PermissionRequestBuilder::new(
            ExecutorRegistry::new(PermissionPresets::testing()),
            scope.clone(),
        )
        .camera_and_audio()
        .notifications()
        .rationale("Needed for calls");
        assert_eq!(scope.lookups.load(Ordering::SeqCst), 0);

        let request = builder.build().unwrap();
        assert_eq!(scope.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(
            request.permissions(),
            [manifest::CAMERA, manifest::RECORD_AUDIO, manifest::POST_NOTIFICATIONS]
        );
    }

    #[test]
    fn test_explicit_permissions_never_query_platform() {
        let scope = Arc::new(CountingScope {
            inner: ManualScope::new(Arc::new(FakePlatform::new())),
            lookups: AtomicUsize::new(0),
        });
        let builder = PermissionRequestBuilder::new(
            ExecutorRegistry::new(PermissionPresets::testing()),
            scope.clone(),
        )
        .permission("CAMERA");

        builder.build().unwrap();
        assert_eq!(scope.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_camera_and_audio_group() {
        let builder = builder().camera_and_audio();
        assert_eq!(builder.requested(), [manifest::CAMERA, manifest::RECORD_AUDIO]);
    }

    #[test]
    fn test_closures_and_callback_object_both_fire() {
        let recording = Arc::new(RecordingCallback::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let request = builder()
            .permissions(["CAMERA", "RECORD_AUDIO"])
            .on_result(move |all, granted, denied| {
                sink.lock()
                    .unwrap()
                    .push((all, granted.to_vec(), denied.to_vec()));
            })
            .callback(recording.clone())
            .build()
            .unwrap();

        let callback = request.callback.unwrap();
        callback.on_denied(&[], &["RECORD_AUDIO".to_string()]);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(false, vec!["CAMERA".to_string()], vec!["RECORD_AUDIO".to_string()])]
        );
        assert_eq!(
            recording.events(),
            vec![CallbackEvent::Denied {
                denied: vec![],
                permanently_denied: vec!["RECORD_AUDIO".to_string()],
            }]
        );
    }

    #[test]
    fn test_chain_isolates_panicking_member() {
        let recording = Arc::new(RecordingCallback::new());
        let request = builder()
            .permission("CAMERA")
            .on_granted(|_| panic!("caller bug"))
            .callback(recording.clone())
            .build()
            .unwrap();

        request.callback.unwrap().on_granted(&["CAMERA".to_string()]);
        assert_eq!(
            recording.events(),
            vec![CallbackEvent::Granted(vec!["CAMERA".to_string()])]
        );
    }
}
