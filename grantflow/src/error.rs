//! Error types for permission orchestration
//!
//! | Category | Variants | Surfaces as |
//! |----------|----------|-------------|
//! | Configuration | `EmptyPermissions`, `ScopeDestroyed`, `LateRegistration`, `RequestInFlight` | `Err` from `request()` / `get_or_create()` / `execute()` |
//! | Policy | `RateLimited` | interceptor `on_error` only |
//! | Runtime | `Timeout`, `Platform`, `Internal` | interceptor `on_error` only |
//! | Teardown | `Cancelled` | nothing (logged at debug) |

use grantflow_api::{PlatformError, ScopeId};
use std::time::Duration;
use thiserror::Error;

/// Error raised while configuring or executing a permission request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("No permissions specified")]
    EmptyPermissions,

    #[error("Scope {0} has been torn down; its executor can no longer issue requests")]
    ScopeDestroyed(ScopeId),

    /// Native launchers must be registered before the scope becomes active
    #[error(
        "Executor for scope {0} must be created before the scope becomes active; \
         obtain it while the scope is still being created"
    )]
    LateRegistration(ScopeId),

    #[error("A permission request is already in flight for scope {0}")]
    RequestInFlight(ScopeId),

    #[error("Permission request rate limited: {}", .permissions.join(", "))]
    RateLimited {
        permissions: Vec<String>,
        /// Earliest wait after which every blocked permission passes the interval gate
        retry_after: Option<Duration>,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Request cancelled by scope teardown")]
    Cancelled,

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// A panic escaped the request pipeline
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PermissionError {
    /// Caller mistakes raised synchronously to the caller
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyPermissions
                | Self::ScopeDestroyed(_)
                | Self::LateRegistration(_)
                | Self::RequestInFlight(_)
        )
    }

    /// Requests silently dropped by policy
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyPermissions => "PERMISSION_EMPTY",
            Self::ScopeDestroyed(_) => "PERMISSION_SCOPE_DESTROYED",
            Self::LateRegistration(_) => "PERMISSION_LATE_REGISTRATION",
            Self::RequestInFlight(_) => "PERMISSION_IN_FLIGHT",
            Self::RateLimited { .. } => "PERMISSION_RATE_LIMITED",
            Self::Timeout { .. } => "PERMISSION_TIMEOUT",
            Self::Cancelled => "PERMISSION_CANCELLED",
            Self::Platform(_) => "PERMISSION_PLATFORM",
            Self::Internal(_) => "PERMISSION_INTERNAL",
        }
    }
}
