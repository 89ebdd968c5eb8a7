//! Test doubles for the platform contract
//!
//! [`FakePlatform`] simulates the native permission primitives with scripted
//! state, so the whole request pipeline can run without a device.
//!
//! ```rust
//! use grantflow::testing::FakePlatform;
//! use grantflow_api::PermissionPlatform;
//!
//! let platform = FakePlatform::new()
//!     .rationale("android.permission.CAMERA")
//!     .respond("android.permission.CAMERA", true);
//!
//! assert!(!platform.check_granted("android.permission.CAMERA").unwrap());
//! assert!(platform.should_show_rationale("android.permission.CAMERA").unwrap());
//! ```

use async_trait::async_trait;
use grantflow_api::{ApiLevel, PermissionPlatform, PlatformError};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Scripted in-memory platform
///
/// - permissions start not granted, with the rationale predicate `false`
/// - a native prompt answers from the scripted responses (missing = denied),
///   marks granted answers as granted, then applies any scripted
///   post-prompt rationale changes
/// - the settings round trip grants whatever was scripted with
///   [`FakePlatform::settings_grants`]
pub struct FakePlatform {
    state: Mutex<FakeState>,
    single_calls: AtomicUsize,
    multiple_calls: AtomicUsize,
    settings_calls: AtomicUsize,
    api_level: ApiLevel,
}

#[derive(Default)]
struct FakeState {
    granted: HashSet<String>,
    rationale: HashSet<String>,
    responses: HashMap<String, bool>,
    rationale_after_prompt: HashMap<String, bool>,
    settings_grants: HashSet<String>,
    native_requests: Vec<Vec<String>>,
    native_delay: Option<Duration>,
    hang_native: bool,
    settings_delay: Option<Duration>,
    hang_settings: bool,
    check_failure: Option<String>,
    native_failure: Option<String>,
    panic_native: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            single_calls: AtomicUsize::new(0),
            multiple_calls: AtomicUsize::new(0),
            settings_calls: AtomicUsize::new(0),
            api_level: ApiLevel::LATEST,
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Script setup
    // ------------------------------------------------------------------

    /// Mark a permission as already granted
    pub fn grant(self, permission: impl Into<String>) -> Self {
        self.state().granted.insert(permission.into());
        self
    }

    /// Make the rationale predicate return `true` for a permission
    pub fn rationale(self, permission: impl Into<String>) -> Self {
        self.state().rationale.insert(permission.into());
        self
    }

    /// Script the native prompt's answer for a permission
    pub fn respond(self, permission: impl Into<String>, granted: bool) -> Self {
        self.state().responses.insert(permission.into(), granted);
        self
    }

    /// Set the rationale predicate for a permission once a native prompt returned
    pub fn rationale_after_prompt(self, permission: impl Into<String>, value: bool) -> Self {
        self.state()
            .rationale_after_prompt
            .insert(permission.into(), value);
        self
    }

    /// Grant a permission when the user comes back from the settings page
    pub fn settings_grants(self, permission: impl Into<String>) -> Self {
        self.state().settings_grants.insert(permission.into());
        self
    }

    /// Delay every native prompt
    pub fn native_delay(self, delay: Duration) -> Self {
        self.state().native_delay = Some(delay);
        self
    }

    /// Native prompts never complete
    pub fn hang_native(self) -> Self {
        self.state().hang_native = true;
        self
    }

    /// Keep the user on the settings page for `delay`
    pub fn settings_delay(self, delay: Duration) -> Self {
        self.state().settings_delay = Some(delay);
        self
    }

    /// The settings round trip never completes
    pub fn hang_settings(self) -> Self {
        self.state().hang_settings = true;
        self
    }

    /// Both synchronous queries fail
    pub fn fail_checks(self, message: impl Into<String>) -> Self {
        self.state().check_failure = Some(message.into());
        self
    }

    /// Native prompts fail
    pub fn fail_native(self, message: impl Into<String>) -> Self {
        self.state().native_failure = Some(message.into());
        self
    }

    /// Native prompts panic
    pub fn panic_native(self) -> Self {
        self.state().panic_native = true;
        self
    }

    pub fn with_api_level(mut self, level: ApiLevel) -> Self {
        self.api_level = level;
        self
    }

    // ------------------------------------------------------------------
    // Runtime mutation
    // ------------------------------------------------------------------

    pub fn set_granted(&self, permission: &str, granted: bool) {
        let mut state = self.state();
        if granted {
            state.granted.insert(permission.to_string());
        } else {
            state.granted.remove(permission);
        }
    }

    pub fn set_rationale(&self, permission: &str, value: bool) {
        let mut state = self.state();
        if value {
            state.rationale.insert(permission.to_string());
        } else {
            state.rationale.remove(permission);
        }
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn multiple_calls(&self) -> usize {
        self.multiple_calls.load(Ordering::SeqCst)
    }

    /// Native prompts of either kind
    pub fn native_calls(&self) -> usize {
        self.single_calls() + self.multiple_calls()
    }

    pub fn settings_calls(&self) -> usize {
        self.settings_calls.load(Ordering::SeqCst)
    }

    /// Permission lists passed to native prompts, in call order
    pub fn native_requests(&self) -> Vec<Vec<String>> {
        self.state().native_requests.clone()
    }

    pub fn is_granted(&self, permission: &str) -> bool {
        self.state().granted.contains(permission)
    }

    // ------------------------------------------------------------------
    // Prompt simulation
    // ------------------------------------------------------------------

    async fn prompt(&self, permissions: &[String]) -> Result<HashMap<String, bool>, PlatformError> {
        let (delay, hang, failure, panic) = {
            let mut state = self.state();
            state.native_requests.push(permissions.to_vec());
            (
                state.native_delay,
                state.hang_native,
                state.native_failure.clone(),
                state.panic_native,
            )
        };

        if panic {
            panic!("native prompt crashed");
        }
        if let Some(message) = failure {
            return Err(PlatformError::failed("request_permissions", message));
        }
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        let mut results = HashMap::new();
        for permission in permissions {
            let granted = state.granted.contains(permission)
                || state.responses.get(permission).copied().unwrap_or(false);
            if granted {
                state.granted.insert(permission.clone());
            }
            if let Some(value) = state.rationale_after_prompt.get(permission).copied() {
                if value {
                    state.rationale.insert(permission.clone());
                } else {
                    state.rationale.remove(permission);
                }
            }
            results.insert(permission.clone(), granted);
        }
        Ok(results)
    }
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermissionPlatform for FakePlatform {
    fn check_granted(&self, permission: &str) -> Result<bool, PlatformError> {
        let state = self.state();
        if let Some(message) = &state.check_failure {
            return Err(PlatformError::failed("check_granted", message.clone()));
        }
        Ok(state.granted.contains(permission))
    }

    fn should_show_rationale(&self, permission: &str) -> Result<bool, PlatformError> {
        let state = self.state();
        if let Some(message) = &state.check_failure {
            return Err(PlatformError::failed("should_show_rationale", message.clone()));
        }
        Ok(state.rationale.contains(permission))
    }

    async fn request_single(&self, permission: &str) -> Result<bool, PlatformError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        let results = self.prompt(&[permission.to_string()]).await?;
        Ok(results.get(permission).copied().unwrap_or(false))
    }

    async fn request_multiple(
        &self,
        permissions: &[String],
    ) -> Result<HashMap<String, bool>, PlatformError> {
        self.multiple_calls.fetch_add(1, Ordering::SeqCst);
        self.prompt(permissions).await
    }

    async fn launch_settings(&self) -> Result<(), PlatformError> {
        self.settings_calls.fetch_add(1, Ordering::SeqCst);
        let (hang, delay) = {
            let state = self.state();
            (state.hang_settings, state.settings_delay)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        let grants: Vec<String> = state.settings_grants.iter().cloned().collect();
        state.granted.extend(grants);
        Ok(())
    }

    fn api_level(&self) -> ApiLevel {
        self.api_level
    }
}

impl fmt::Debug for FakePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakePlatform")
            .field("single_calls", &self.single_calls())
            .field("multiple_calls", &self.multiple_calls())
            .field("settings_calls", &self.settings_calls())
            .field("api_level", &self.api_level)
            .finish_non_exhaustive()
    }
}
