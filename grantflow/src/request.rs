//! Immutable permission request value

use grantflow_api::{RationaleHandler, SettingsHandler};
use std::fmt;
use std::sync::Arc;

use crate::callback::PermissionCallback;
use crate::error::PermissionError;

/// One frozen permission request
///
/// Created once per `request()` call and read throughout that request's
/// lifetime. The permission list is non-empty and free of duplicates.
#[derive(Clone)]
pub struct PermissionRequest {
    permissions: Vec<String>,
    pub rationale: Option<String>,
    pub rationale_title: Option<String>,
    pub positive_label: Option<String>,
    pub negative_label: Option<String>,
    pub settings_text: Option<String>,
    pub settings_title: Option<String>,
    pub force_go_to_settings: bool,
    pub callback: Option<Arc<dyn PermissionCallback>>,
    /// Overrides the services' default rationale handler
    pub rationale_handler: Option<Arc<dyn RationaleHandler>>,
    /// Overrides the services' default settings handler
    pub settings_handler: Option<Arc<dyn SettingsHandler>>,
}

impl PermissionRequest {
    /// Create a request for `permissions`
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn new<I, S>(permissions: I) -> Result<Self, PermissionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for permission in permissions {
            let permission = permission.into();
            if !unique.contains(&permission) {
                unique.push(permission);
            }
        }

        if unique.is_empty() {
            return Err(PermissionError::EmptyPermissions);
        }

        Ok(Self {
            permissions: unique,
            rationale: None,
            rationale_title: None,
            positive_label: None,
            negative_label: None,
            settings_text: None,
            settings_title: None,
            force_go_to_settings: false,
            callback: None,
            rationale_handler: None,
            settings_handler: None,
        })
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn is_single(&self) -> bool {
        self.permissions.len() == 1
    }

    /// The only permission of a single-permission request
    pub fn single_permission(&self) -> Option<&str> {
        match self.permissions.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn PermissionCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_settings_text(mut self, text: impl Into<String>) -> Self {
        self.settings_text = Some(text.into());
        self
    }

    pub fn with_force_go_to_settings(mut self, force: bool) -> Self {
        self.force_go_to_settings = force;
        self
    }
}

impl fmt::Debug for PermissionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionRequest")
            .field("permissions", &self.permissions)
            .field("rationale", &self.rationale)
            .field("settings_text", &self.settings_text)
            .field("force_go_to_settings", &self.force_go_to_settings)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}
