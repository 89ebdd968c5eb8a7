//! Composition root

use grantflow_api::{PermissionGroups, PermissionState, PlatformError, Scope};
use std::sync::Arc;

use crate::builder::PermissionRequestBuilder;
use crate::classifier::classify;
use crate::error::PermissionError;
use crate::executor::PermissionExecutor;
use crate::presets::PermissionServices;
use crate::registry::ExecutorRegistry;

/// Entry point for hosts
///
/// Owns the executor registry and, through it, the shared services. Create
/// one per process and keep it alive for as long as permission requests can
/// be issued.
///
/// ```rust
/// use grantflow::{PermissionManager, PermissionPresets};
/// use grantflow::testing::FakePlatform;
/// use grantflow_api::ManualScope;
/// use std::sync::Arc;
///
/// # let runtime = tokio::runtime::Runtime::new().unwrap();
/// # runtime.block_on(async {
/// let manager = PermissionManager::new(PermissionPresets::testing());
/// let platform = Arc::new(FakePlatform::new().grant("android.permission.CAMERA"));
/// let scope = Arc::new(ManualScope::new(platform));
///
/// // Obtain the executor while the scope is still being created
/// manager.prepare(scope.as_ref()).unwrap();
/// scope.activate();
///
/// let granted = manager
///     .with(scope.clone())
///     .permission("android.permission.CAMERA")
///     .granted()
///     .await;
/// assert!(granted);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct PermissionManager {
    registry: ExecutorRegistry,
}

impl PermissionManager {
    pub fn new(services: PermissionServices) -> Self {
        Self {
            registry: ExecutorRegistry::new(services),
        }
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    pub fn services(&self) -> &PermissionServices {
        self.registry.services()
    }

    /// Create the scope's executor ahead of its first request
    ///
    /// Call this while the scope is still in its created state.
    pub fn prepare(&self, scope: &dyn Scope) -> Result<Arc<PermissionExecutor>, PermissionError> {
        self.registry.get_or_create(scope)
    }

    /// Start a request bound to `scope`
    pub fn with(&self, scope: Arc<dyn Scope>) -> PermissionRequestBuilder {
        PermissionRequestBuilder::new(self.registry.clone(), scope)
    }

    /// Current state of one permission, without prompting
    pub fn check(&self, scope: &dyn Scope, permission: &str) -> Result<PermissionState, PlatformError> {
        classify(scope.platform().as_ref(), permission)
    }

    /// Whether every permission is currently granted
    pub fn all_granted(&self, scope: &dyn Scope, permissions: &[String]) -> Result<bool, PlatformError> {
        let platform = scope.platform();
        for permission in permissions {
            if !platform.check_granted(permission)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Permission groups available on the scope's platform
    pub fn groups(&self, scope: &dyn Scope) -> PermissionGroups {
        PermissionGroups::for_api_level(scope.platform().api_level())
    }
}
