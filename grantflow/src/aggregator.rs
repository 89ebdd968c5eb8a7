//! Merging native prompt results into one outcome

use grantflow_api::{PermissionPlatform, PlatformError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-batch outcome of a native prompt
///
/// `denied` holds every non-granted permission and `permanently_denied` is a
/// subset of it. `granted` and `denied` never overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub granted: Vec<String>,
    pub denied: Vec<String>,
    pub permanently_denied: Vec<String>,
}

impl AggregatedResult {
    pub fn all_granted(&self) -> bool {
        self.denied.is_empty()
    }

    pub fn has_denied(&self) -> bool {
        !self.denied.is_empty()
    }

    pub fn has_permanently_denied(&self) -> bool {
        !self.permanently_denied.is_empty()
    }

    /// Some, but not all, permissions were granted
    pub fn is_partially_granted(&self) -> bool {
        !self.granted.is_empty() && !self.denied.is_empty()
    }

    /// Denied permissions that can still be re-asked
    pub fn temporarily_denied(&self) -> Vec<String> {
        self.denied
            .iter()
            .filter(|p| !self.permanently_denied.contains(p))
            .cloned()
            .collect()
    }
}

/// Aggregate native results for `requested`
///
/// A permission missing from `native_results` counts as denied. The native
/// prompt does not say whether a refusal was permanent, so every denied
/// permission is checked again with the rationale predicate, now that the
/// prompt has returned.
pub fn aggregate(
    platform: &dyn PermissionPlatform,
    requested: &[String],
    native_results: &HashMap<String, bool>,
) -> Result<AggregatedResult, PlatformError> {
    let mut result = AggregatedResult::default();

    for permission in requested {
        if native_results.get(permission).copied().unwrap_or(false) {
            result.granted.push(permission.clone());
            continue;
        }

        if !platform.should_show_rationale(permission)? {
            result.permanently_denied.push(permission.clone());
        }
        result.denied.push(permission.clone());
    }

    tracing::debug!(
        granted = result.granted.len(),
        denied = result.denied.len(),
        permanently_denied = result.permanently_denied.len(),
        "Aggregated native results"
    );
    Ok(result)
}
