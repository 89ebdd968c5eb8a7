//! Permission state classification
//!
//! Pure with respect to the two platform queries: nothing is cached, since
//! the user may change a permission between two checks.

use grantflow_api::{PermissionPlatform, PermissionState, PlatformError};
use serde::Serialize;

/// Classify one permission
///
/// Granted if the platform says so; otherwise the rationale predicate splits
/// `Denied` (true) from `PermanentlyDenied` (false). A permission that was
/// never requested also reads as `PermanentlyDenied`.
pub fn classify(
    platform: &dyn PermissionPlatform,
    permission: &str,
) -> Result<PermissionState, PlatformError> {
    if platform.check_granted(permission)? {
        return Ok(PermissionState::Granted);
    }
    let rationale = platform.should_show_rationale(permission)?;
    Ok(PermissionState::from_checks(false, rationale))
}

/// Permissions of one request partitioned by state, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifiedPermissions {
    pub granted: Vec<String>,
    pub denied: Vec<String>,
    pub permanently_denied: Vec<String>,
}

impl ClassifiedPermissions {
    pub fn all_granted(&self) -> bool {
        self.denied.is_empty() && self.permanently_denied.is_empty()
    }

    pub fn has_permanently_denied(&self) -> bool {
        !self.permanently_denied.is_empty()
    }

    /// Every permission that is not granted, retryable first
    pub fn not_granted(&self) -> Vec<String> {
        self.denied
            .iter()
            .chain(&self.permanently_denied)
            .cloned()
            .collect()
    }
}

/// Classify every permission of a request
pub fn classify_all(
    platform: &dyn PermissionPlatform,
    permissions: &[String],
) -> Result<ClassifiedPermissions, PlatformError> {
    let mut classified = ClassifiedPermissions::default();
    for permission in permissions {
        let bucket = match classify(platform, permission)? {
            PermissionState::Granted => &mut classified.granted,
            PermissionState::Denied => &mut classified.denied,
            PermissionState::PermanentlyDenied => &mut classified.permanently_denied,
        };
        bucket.push(permission.clone());
    }
    Ok(classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePlatform;

    #[test]
    fn test_classify_three_states() {
        let platform = FakePlatform::new().grant("CAMERA").rationale("RECORD_AUDIO");

        assert_eq!(classify(&platform, "CAMERA").unwrap(), PermissionState::Granted);
        assert_eq!(classify(&platform, "RECORD_AUDIO").unwrap(), PermissionState::Denied);
        assert_eq!(
            classify(&platform, "READ_CONTACTS").unwrap(),
            PermissionState::PermanentlyDenied
        );
    }

    #[test]
    fn test_classify_is_not_cached() {
        let platform = FakePlatform::new().rationale("CAMERA");
        assert_eq!(classify(&platform, "CAMERA").unwrap(), PermissionState::Denied);

        platform.set_granted("CAMERA", true);
        assert_eq!(classify(&platform, "CAMERA").unwrap(), PermissionState::Granted);
    }

    #[test]
    fn test_classify_all_preserves_order() {
        let platform = FakePlatform::new()
            .grant("B")
            .grant("D")
            .rationale("C");
        let permissions: Vec<String> = ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect();

        let classified = classify_all(&platform, &permissions).unwrap();
        assert_eq!(classified.granted, ["B", "D"]);
        assert_eq!(classified.denied, ["C"]);
        assert_eq!(classified.permanently_denied, ["A", "E"]);
        assert!(!classified.all_granted());
        assert_eq!(classified.not_granted(), ["C", "A", "E"]);
    }

    #[test]
    fn test_platform_failure_propagates() {
        let platform = FakePlatform::new().fail_checks("binding detached");
        assert!(classify(&platform, "CAMERA").is_err());
    }
}
