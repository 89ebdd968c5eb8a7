//! grantflow: Runtime permission request orchestration
//!
//! Sits between UI code and a platform's runtime permission primitives.
//! For each request it classifies the permissions, sequences the rationale
//! prompt, the native prompt and the settings redirect, and delivers one
//! coherent outcome to the caller.
//!
//! # Architecture
//!
//! ```text
//! PermissionManager::with(scope)
//!     -> PermissionRequestBuilder
//!     -> ExecutorRegistry (one executor per scope)
//!     -> PermissionExecutor
//!          -> InterceptorChain (veto + observation)
//!          -> RateLimiter
//!          -> classifier / aggregator
//!          -> PermissionPlatform (native primitives)
//!     -> PermissionCallback / awaited RequestOutcome
//! ```
//!
//! Hosts provide a [`PermissionPlatform`] and a [`Scope`] from
//! `grantflow-api`, build a [`PermissionServices`] bundle (usually from
//! [`PermissionPresets`]) and keep one [`PermissionManager`] for the
//! process. The library logs through `tracing` and never installs a
//! subscriber.

pub mod aggregator;
pub mod audit;
pub mod awaitable;
pub mod builder;
pub mod callback;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod interceptor;
pub mod manager;
pub mod presets;
pub mod prompt;
pub mod rate_limit;
pub mod registry;
pub mod request;
pub mod testing;

pub use aggregator::{aggregate, AggregatedResult};
pub use audit::{
    AuditDetails, AuditError, AuditEvent, AuditEventType, AuditSink, CompositeAuditSink,
    FileAuditSink, MemoryAuditSink, NullAuditSink,
};
pub use awaitable::{RequestOutcome, ResumeOnce};
pub use builder::PermissionRequestBuilder;
pub use callback::{CallbackEvent, FnCallback, PermissionCallback, RecordingCallback};
pub use classifier::{classify, classify_all, ClassifiedPermissions};
pub use config::PermissionConfig;
pub use error::PermissionError;
pub use executor::{ExecutorPhase, PermissionExecutor};
pub use interceptor::{
    AuditInterceptor, InterceptorChain, InterceptorEvent, LoggingInterceptor,
    PermissionInterceptor, RecordingInterceptor,
};
pub use manager::PermissionManager;
pub use presets::{PermissionPresets, PermissionServices, PermissionServicesBuilder, PresetError};
pub use prompt::{AutoRationaleHandler, AutoSettingsHandler, RecordedPrompt, RecordingPromptHandler};
pub use rate_limit::{RateLimiter, RequestStats};
pub use registry::ExecutorRegistry;
pub use request::PermissionRequest;

pub use grantflow_api::{
    ApiLevel, ManualScope, PermissionGroup, PermissionGroups, PermissionPlatform,
    PermissionState, PlatformError, RationaleDecision, RationaleHandler, Scope, ScopeId,
    ScopeState, SettingsDecision, SettingsHandler,
};
