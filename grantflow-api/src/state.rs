//! Per-permission state as reported by the platform

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single permission at one moment
///
/// Never persisted; recomputed from the platform on every check because the
/// user can change it at any time (e.g. from the system settings page).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Permission is granted
    Granted,
    /// Not granted, but the platform still allows a rationale and a re-ask
    Denied,
    /// Not granted and the platform will not show its prompt again.
    ///
    /// Also reported for permissions that were never requested: the platform
    /// rationale predicate is `false` in both cases.
    PermanentlyDenied,
}

impl PermissionState {
    /// Derive the state from the two platform queries
    pub fn from_checks(granted: bool, should_show_rationale: bool) -> Self {
        match (granted, should_show_rationale) {
            (true, _) => Self::Granted,
            (false, true) => Self::Denied,
            (false, false) => Self::PermanentlyDenied,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Whether the state is either flavor of denial
    pub fn is_denied(&self) -> bool {
        !self.is_granted()
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::PermanentlyDenied => "permanently_denied",
        }
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
