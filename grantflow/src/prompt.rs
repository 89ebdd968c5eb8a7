//! Bundled rationale/settings handlers and prompt assembly
//!
//! Real hosts render dialogs; these handlers answer without UI and are used
//! by the presets and in tests.

use async_trait::async_trait;
use grantflow_api::{
    RationaleDecision, RationaleHandler, RationalePrompt, SettingsDecision, SettingsHandler,
    SettingsPrompt,
};
use std::sync::{Mutex, PoisonError};

use crate::config::PermissionConfig;
use crate::request::PermissionRequest;

/// Build the rationale prompt for `permissions`, falling back to config defaults
pub fn rationale_prompt(
    request: &PermissionRequest,
    config: &PermissionConfig,
    permissions: &[String],
) -> RationalePrompt {
    RationalePrompt {
        title: request
            .rationale_title
            .clone()
            .unwrap_or_else(|| config.default_rationale_title.clone()),
        message: request.rationale.clone().unwrap_or_default(),
        positive_label: request
            .positive_label
            .clone()
            .unwrap_or_else(|| config.default_positive_label.clone()),
        negative_label: request
            .negative_label
            .clone()
            .unwrap_or_else(|| config.default_negative_label.clone()),
        permissions: permissions.to_vec(),
    }
}

/// Build the settings prompt for permanently denied `permissions`
pub fn settings_prompt(
    request: &PermissionRequest,
    config: &PermissionConfig,
    permissions: &[String],
) -> SettingsPrompt {
    SettingsPrompt {
        title: request
            .settings_title
            .clone()
            .unwrap_or_else(|| config.default_settings_title.clone()),
        message: request
            .settings_text
            .clone()
            .unwrap_or_else(|| config.default_settings_message.clone()),
        positive_label: config.default_settings_label.clone(),
        negative_label: request
            .negative_label
            .clone()
            .unwrap_or_else(|| config.default_negative_label.clone()),
        permissions: permissions.to_vec(),
    }
}

// ============================================================================
// Auto Handlers
// ============================================================================

/// Rationale handler that always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct AutoRationaleHandler {
    decision: RationaleDecision,
}

impl AutoRationaleHandler {
    pub fn always_continue() -> Self {
        Self {
            decision: RationaleDecision::Continue,
        }
    }

    pub fn always_cancel() -> Self {
        Self {
            decision: RationaleDecision::Cancel,
        }
    }
}

#[async_trait]
impl RationaleHandler for AutoRationaleHandler {
    async fn show(&self, _prompt: &RationalePrompt) -> RationaleDecision {
        self.decision
    }
}

/// Settings handler that always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct AutoSettingsHandler {
    decision: SettingsDecision,
}

impl AutoSettingsHandler {
    pub fn always_go() -> Self {
        Self {
            decision: SettingsDecision::GoToSettings,
        }
    }

    pub fn always_cancel() -> Self {
        Self {
            decision: SettingsDecision::Cancel,
        }
    }
}

#[async_trait]
impl SettingsHandler for AutoSettingsHandler {
    async fn show(&self, _prompt: &SettingsPrompt) -> SettingsDecision {
        self.decision
    }
}

// ============================================================================
// Recording Handler (for testing)
// ============================================================================

/// A prompt that was shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedPrompt {
    Rationale(RationalePrompt),
    Settings(SettingsPrompt),
}

/// Serves as both handlers; records every prompt and answers with fixed decisions
#[derive(Debug)]
pub struct RecordingPromptHandler {
    prompts: Mutex<Vec<RecordedPrompt>>,
    rationale: RationaleDecision,
    settings: SettingsDecision,
}

impl RecordingPromptHandler {
    pub fn new(rationale: RationaleDecision, settings: SettingsDecision) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            rationale,
            settings,
        }
    }

    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn rationale_count(&self) -> usize {
        self.prompts()
            .iter()
            .filter(|p| matches!(p, RecordedPrompt::Rationale(_)))
            .count()
    }

    pub fn settings_count(&self) -> usize {
        self.prompts()
            .iter()
            .filter(|p| matches!(p, RecordedPrompt::Settings(_)))
            .count()
    }

    pub fn clear(&self) {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, prompt: RecordedPrompt) {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt);
    }
}

impl Default for RecordingPromptHandler {
    fn default() -> Self {
        Self::new(RationaleDecision::Continue, SettingsDecision::Cancel)
    }
}

#[async_trait]
impl RationaleHandler for RecordingPromptHandler {
    async fn show(&self, prompt: &RationalePrompt) -> RationaleDecision {
        self.push(RecordedPrompt::Rationale(prompt.clone()));
        self.rationale
    }
}

#[async_trait]
impl SettingsHandler for RecordingPromptHandler {
    async fn show(&self, prompt: &SettingsPrompt) -> SettingsDecision {
        self.push(RecordedPrompt::Settings(prompt.clone()));
        self.settings
    }
}
