//! UI collaborators for rationale and settings prompts
//!
//! The engine decides *when* to explain or redirect; rendering is entirely
//! up to the host. Any dialog technology satisfies these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Content of a rationale prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RationalePrompt {
    pub title: String,
    pub message: String,
    pub positive_label: String,
    pub negative_label: String,
    /// Permissions the rationale is about
    pub permissions: Vec<String>,
}

/// User's answer to a rationale prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RationaleDecision {
    /// Go ahead with the native prompt
    Continue,
    /// Abandon the request
    Cancel,
}

/// Content of a settings-redirect prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPrompt {
    pub title: String,
    pub message: String,
    pub positive_label: String,
    pub negative_label: String,
    /// Permanently denied permissions that motivated the redirect
    pub permissions: Vec<String>,
}

/// User's answer to a settings-redirect prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsDecision {
    /// Open the settings page
    GoToSettings,
    /// Stay in the app
    Cancel,
}

/// Shows a rationale before re-asking for a retryable permission
#[async_trait]
pub trait RationaleHandler: Send + Sync {
    /// Display the rationale and resolve with the user's choice
    async fn show(&self, prompt: &RationalePrompt) -> RationaleDecision;
}

/// Offers a redirect to the system settings page after a permanent denial
#[async_trait]
pub trait SettingsHandler: Send + Sync {
    /// Display the redirect offer and resolve with the user's choice
    async fn show(&self, prompt: &SettingsPrompt) -> SettingsDecision;
}
