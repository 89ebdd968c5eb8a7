//! grantflow-api: Platform binding contract for grantflow
//!
//! This crate defines everything a host binding has to provide so that the
//! `grantflow` engine can orchestrate runtime permission requests against it:
//!
//! - [`PermissionPlatform`]: the native permission primitives (granted check,
//!   rationale predicate, single/batch prompts, settings redirect)
//! - [`Scope`]: the lifetime window of a hosting UI unit
//! - [`RationaleHandler`] / [`SettingsHandler`]: the two UI collaborators
//! - [`PermissionGroup`] and [`manifest`]: static permission data
//!
//! The engine never talks to the operating system directly; a binding crate
//! (JNI bridge, simulator, test double) implements these traits.

pub mod error;
pub mod groups;
pub mod manifest;
pub mod platform;
pub mod prompt;
pub mod scope;
pub mod state;

pub use error::PlatformError;
pub use groups::{PermissionDependencies, PermissionGroup, PermissionGroups, ValidationResult};
pub use platform::{ApiLevel, PermissionPlatform};
pub use prompt::{
    RationaleDecision, RationaleHandler, RationalePrompt, SettingsDecision, SettingsHandler,
    SettingsPrompt,
};
pub use scope::{ManualScope, Scope, ScopeId, ScopeState, TeardownHook};
pub use state::PermissionState;
