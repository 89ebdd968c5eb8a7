//! Native permission primitives
//!
//! The engine treats the operating system as a black box with a fixed
//! three-valued contract (granted / ask-again / never-ask-again). Bindings
//! implement [`PermissionPlatform`] once per hosting scope: the request
//! launchers it wraps are registered when the scope is created.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::error::PlatformError;

/// Platform API level, used for version-conditional permission groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiLevel(pub u32);

impl ApiLevel {
    /// Android 8.0
    pub const O: ApiLevel = ApiLevel(26);
    /// Android 10
    pub const Q: ApiLevel = ApiLevel(29);
    /// Android 13
    pub const TIRAMISU: ApiLevel = ApiLevel(33);
    /// Android 14
    pub const UPSIDE_DOWN_CAKE: ApiLevel = ApiLevel(34);
    /// Newest level this crate knows about
    pub const LATEST: ApiLevel = Self::UPSIDE_DOWN_CAKE;

    /// Whether this level is at least `other`
    pub fn at_least(self, other: ApiLevel) -> bool {
        self >= other
    }
}

impl Default for ApiLevel {
    fn default() -> Self {
        Self::LATEST
    }
}

impl fmt::Display for ApiLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API {}", self.0)
    }
}

/// Native permission primitives for one hosting scope
///
/// The two queries are synchronous and must reflect the live platform state
/// (no caching). The prompts and the settings round trip complete exactly
/// once; the engine awaits them.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use grantflow_api::{PermissionPlatform, PlatformError};
/// use std::collections::HashMap;
///
/// /// Platform where everything is already granted
/// struct AllGranted;
///
/// #[async_trait]
/// impl PermissionPlatform for AllGranted {
///     fn check_granted(&self, _permission: &str) -> Result<bool, PlatformError> {
///         Ok(true)
///     }
///
///     fn should_show_rationale(&self, _permission: &str) -> Result<bool, PlatformError> {
///         Ok(false)
///     }
///
///     async fn request_single(&self, _permission: &str) -> Result<bool, PlatformError> {
///         Ok(true)
///     }
///
///     async fn request_multiple(
///         &self,
///         permissions: &[String],
///     ) -> Result<HashMap<String, bool>, PlatformError> {
///         Ok(permissions.iter().map(|p| (p.clone(), true)).collect())
///     }
///
///     async fn launch_settings(&self) -> Result<(), PlatformError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait PermissionPlatform: Send + Sync {
    /// Whether the permission is currently granted
    fn check_granted(&self, permission: &str) -> Result<bool, PlatformError>;

    /// The platform "should explain" predicate
    ///
    /// `true` after a retryable refusal; `false` both before the first ever
    /// request and after a permanent refusal.
    fn should_show_rationale(&self, permission: &str) -> Result<bool, PlatformError>;

    /// Show the native prompt for one permission
    async fn request_single(&self, permission: &str) -> Result<bool, PlatformError>;

    /// Show the native prompt for several permissions at once
    ///
    /// Entries missing from the returned map are treated as denied.
    async fn request_multiple(
        &self,
        permissions: &[String],
    ) -> Result<HashMap<String, bool>, PlatformError>;

    /// Open the application's settings page; resolves when the user returns
    async fn launch_settings(&self) -> Result<(), PlatformError>;

    /// API level of the running platform
    fn api_level(&self) -> ApiLevel {
        ApiLevel::LATEST
    }
}
