//! Service bundle and ready-made setups
//!
//! [`PermissionServices`] holds the process-wide collaborators every
//! executor shares: configuration, the rate limiter, the interceptor chain
//! and the default prompt handlers. Hosts build one at their composition
//! root and hand it to [`PermissionManager`](crate::PermissionManager).

use grantflow_api::{RationaleHandler, SettingsHandler};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditSink, FileAuditSink, MemoryAuditSink};
use crate::config::PermissionConfig;
use crate::interceptor::{AuditInterceptor, InterceptorChain, LoggingInterceptor, PermissionInterceptor};
use crate::prompt::{AutoRationaleHandler, AutoSettingsHandler};
use crate::rate_limit::RateLimiter;

/// Shared collaborators of every executor
#[derive(Clone)]
pub struct PermissionServices {
    pub config: PermissionConfig,
    pub rate_limiter: Arc<RateLimiter>,
    pub interceptors: Arc<InterceptorChain>,
    pub rationale_handler: Arc<dyn RationaleHandler>,
    pub settings_handler: Arc<dyn SettingsHandler>,
}

impl std::fmt::Debug for PermissionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionServices")
            .field("config", &self.config)
            .field("rate_limiter", &self.rate_limiter)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}

impl PermissionServices {
    pub fn builder() -> PermissionServicesBuilder {
        PermissionServicesBuilder::new()
    }
}

impl Default for PermissionServices {
    fn default() -> Self {
        PermissionPresets::standard()
    }
}

/// Builder for [`PermissionServices`]
#[derive(Default)]
pub struct PermissionServicesBuilder {
    config: Option<PermissionConfig>,
    rate_limiter: Option<Arc<RateLimiter>>,
    interceptors: Vec<Arc<dyn PermissionInterceptor>>,
    rationale_handler: Option<Arc<dyn RationaleHandler>>,
    settings_handler: Option<Arc<dyn SettingsHandler>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl PermissionServicesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PermissionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share an existing rate limiter instead of deriving one from the config
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn PermissionInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn rationale_handler(mut self, handler: impl RationaleHandler + 'static) -> Self {
        self.rationale_handler = Some(Arc::new(handler));
        self
    }

    pub fn settings_handler(mut self, handler: impl SettingsHandler + 'static) -> Self {
        self.settings_handler = Some(Arc::new(handler));
        self
    }

    /// Register an [`AuditInterceptor`] writing to `sink`
    pub fn audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn build(self) -> Result<PermissionServices, PresetError> {
        let config = self.config.unwrap_or_default();
        if config.request_timeout == Some(Duration::ZERO) {
            return Err(PresetError::InvalidConfig(
                "request_timeout must be positive; use None to disable it".into(),
            ));
        }

        let interceptors = Arc::new(InterceptorChain::new());
        if let Some(sink) = self.audit {
            interceptors.register(Arc::new(AuditInterceptor::new(sink)));
        }
        for interceptor in self.interceptors {
            interceptors.register(interceptor);
        }

        Ok(PermissionServices {
            rate_limiter: self
                .rate_limiter
                .unwrap_or_else(|| Arc::new(RateLimiter::from_config(&config))),
            interceptors,
            rationale_handler: self
                .rationale_handler
                .unwrap_or_else(|| Arc::new(AutoRationaleHandler::always_continue())),
            settings_handler: self
                .settings_handler
                .unwrap_or_else(|| Arc::new(AutoSettingsHandler::always_cancel())),
            config,
        })
    }
}

/// Error type for preset initialization
#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("Failed to initialize audit: {0}")]
    AuditInit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// Preset Configurations
// ============================================================================

/// Ready-made service bundles
pub struct PermissionPresets;

impl PermissionPresets {
    /// Production defaults
    ///
    /// - default config (5 s interval, 10 requests/hour, no native prompt timeout)
    /// - logging interceptor
    /// - rationale continues, settings redirect declined
    pub fn standard() -> PermissionServices {
        let config = PermissionConfig::default();
        let interceptors = Arc::new(InterceptorChain::new());
        interceptors.register(Arc::new(LoggingInterceptor::new()));

        PermissionServices {
            rate_limiter: Arc::new(RateLimiter::from_config(&config)),
            interceptors,
            rationale_handler: Arc::new(AutoRationaleHandler::always_continue()),
            settings_handler: Arc::new(AutoSettingsHandler::always_cancel()),
            config,
        }
    }

    /// Standard setup plus a JSONL audit log in the app's data directory
    pub fn audited(app_name: &str) -> Result<PermissionServices, PresetError> {
        let sink = FileAuditSink::default_for_app(app_name)
            .map_err(|e| PresetError::AuditInit(e.to_string()))?;
        Self::audited_with(Arc::new(sink))
    }

    /// Standard setup plus a JSONL audit log at `path`
    pub fn audited_at(path: impl AsRef<Path>) -> Result<PermissionServices, PresetError> {
        let sink =
            FileAuditSink::new(path).map_err(|e| PresetError::AuditInit(e.to_string()))?;
        Self::audited_with(Arc::new(sink))
    }

    fn audited_with(sink: Arc<dyn AuditSink>) -> Result<PermissionServices, PresetError> {
        PermissionServicesBuilder::new()
            .audit(sink)
            .interceptor(Arc::new(LoggingInterceptor::new()))
            .build()
    }

    /// Testing mode
    ///
    /// - no rate limiting, no timeout
    /// - in-memory audit
    /// - rationale continues, settings redirect declined
    pub fn testing() -> PermissionServices {
        let config = PermissionConfig::unthrottled();
        let interceptors = Arc::new(InterceptorChain::new());
        interceptors.register(Arc::new(AuditInterceptor::new(Arc::new(
            MemoryAuditSink::new(),
        ))));

        PermissionServices {
            rate_limiter: Arc::new(RateLimiter::unlimited()),
            interceptors,
            rationale_handler: Arc::new(AutoRationaleHandler::always_continue()),
            settings_handler: Arc::new(AutoSettingsHandler::always_cancel()),
            config,
        }
    }
}
