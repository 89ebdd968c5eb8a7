//! Named permission groups and inter-permission dependencies
//!
//! Groups are static data: immutable ordered lists of permission names.
//! Membership of some groups depends on the platform API level because the
//! permissions only exist above a given version.

use std::collections::{HashMap, HashSet};

use crate::manifest::*;
use crate::platform::ApiLevel;

const LOCATION: &[&str] = &[ACCESS_FINE_LOCATION, ACCESS_COARSE_LOCATION];
const STORAGE: &[&str] = &[READ_EXTERNAL_STORAGE, WRITE_EXTERNAL_STORAGE];
const MEDIA: &[&str] = &[READ_MEDIA_IMAGES, READ_MEDIA_VIDEO, READ_MEDIA_AUDIO];
const CAMERA_AND_AUDIO: &[&str] = &[CAMERA, RECORD_AUDIO];
const CONTACTS: &[&str] = &[READ_CONTACTS, WRITE_CONTACTS, GET_ACCOUNTS];
const CALENDAR: &[&str] = &[READ_CALENDAR, WRITE_CALENDAR];
const SMS: &[&str] = &[SEND_SMS, RECEIVE_SMS, READ_SMS, RECEIVE_WAP_PUSH, RECEIVE_MMS];
const PHONE: &[&str] = &[
    READ_PHONE_STATE,
    READ_PHONE_NUMBERS,
    CALL_PHONE,
    READ_CALL_LOG,
    WRITE_CALL_LOG,
    ADD_VOICEMAIL,
    USE_SIP,
    PROCESS_OUTGOING_CALLS,
];
const PHONE_PRE_O: &[&str] = &[
    READ_PHONE_STATE,
    CALL_PHONE,
    READ_CALL_LOG,
    WRITE_CALL_LOG,
    ADD_VOICEMAIL,
    USE_SIP,
    PROCESS_OUTGOING_CALLS,
];

/// A named group of related permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionGroup {
    Location,
    Storage,
    /// Empty below API 33
    Media,
    CameraAndAudio,
    Contacts,
    Calendar,
    Sms,
    Phone,
}

impl PermissionGroup {
    /// All groups, in lookup order
    pub const ALL: [PermissionGroup; 8] = [
        Self::Location,
        Self::Storage,
        Self::Media,
        Self::CameraAndAudio,
        Self::Contacts,
        Self::Calendar,
        Self::Sms,
        Self::Phone,
    ];

    /// Members of this group on the given platform level
    pub fn members(self, level: ApiLevel) -> &'static [&'static str] {
        match self {
            Self::Location => LOCATION,
            Self::Storage => STORAGE,
            Self::Media if level.at_least(ApiLevel::TIRAMISU) => MEDIA,
            Self::Media => &[],
            Self::CameraAndAudio => CAMERA_AND_AUDIO,
            Self::Contacts => CONTACTS,
            Self::Calendar => CALENDAR,
            Self::Sms => SMS,
            Self::Phone if level.at_least(ApiLevel::O) => PHONE,
            Self::Phone => PHONE_PRE_O,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Storage => "storage",
            Self::Media => "media",
            Self::CameraAndAudio => "camera_and_audio",
            Self::Contacts => "contacts",
            Self::Calendar => "calendar",
            Self::Sms => "sms",
            Self::Phone => "phone",
        }
    }
}

/// Group lookups for one platform level
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionGroups {
    level: ApiLevel,
}

impl PermissionGroups {
    pub fn for_api_level(level: ApiLevel) -> Self {
        Self { level }
    }

    pub fn api_level(&self) -> ApiLevel {
        self.level
    }

    /// Members of a named group on this level
    pub fn members(&self, group: PermissionGroup) -> &'static [&'static str] {
        group.members(self.level)
    }

    /// Background location, if the platform has it (API 29+)
    pub fn background_location(&self) -> Option<&'static str> {
        self.level
            .at_least(ApiLevel::Q)
            .then_some(ACCESS_BACKGROUND_LOCATION)
    }

    /// Notification permission, if the platform has it (API 33+)
    pub fn notification(&self) -> Option<&'static str> {
        self.level
            .at_least(ApiLevel::TIRAMISU)
            .then_some(POST_NOTIFICATIONS)
    }

    /// First group containing the permission
    pub fn group_of(&self, permission: &str) -> Option<PermissionGroup> {
        PermissionGroup::ALL
            .into_iter()
            .find(|group| self.members(*group).contains(&permission))
    }

    /// Whether both permissions belong to the same known group
    pub fn in_same_group(&self, a: &str, b: &str) -> bool {
        match (self.group_of(a), self.group_of(b)) {
            (Some(ga), Some(gb)) => ga == gb,
            _ => false,
        }
    }
}

// ============================================================================
// Dependencies
// ============================================================================

/// Outcome of [`PermissionDependencies::validate_combination`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Permissions that only make sense once others are granted
///
/// Default: background location depends on foreground location (API 29+).
#[derive(Debug, Clone)]
pub struct PermissionDependencies {
    requires: HashMap<String, Vec<String>>,
}

impl PermissionDependencies {
    /// Defaults for the given platform level
    pub fn for_api_level(level: ApiLevel) -> Self {
        let mut deps = Self::empty();
        if let Some(background) = PermissionGroups::for_api_level(level).background_location() {
            deps.add_dependency(background, LOCATION.iter().copied());
        }
        deps
    }

    /// No dependencies at all
    pub fn empty() -> Self {
        Self {
            requires: HashMap::new(),
        }
    }

    /// Declare that `dependent` requires every permission in `required`
    ///
    /// Replaces any previous declaration for `dependent`.
    pub fn add_dependency<I, S>(&mut self, dependent: impl Into<String>, required: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.insert(
            dependent.into(),
            required.into_iter().map(Into::into).collect(),
        );
    }

    pub fn dependencies_of(&self, permission: &str) -> Option<&[String]> {
        self.requires.get(permission).map(Vec::as_slice)
    }

    /// Whether every dependency of `permission` is in `granted`
    pub fn are_satisfied(&self, permission: &str, granted: &[String]) -> bool {
        self.unsatisfied(permission, granted).is_empty()
    }

    /// Dependencies of `permission` missing from `granted`
    pub fn unsatisfied(&self, permission: &str, granted: &[String]) -> Vec<String> {
        self.dependencies_of(permission)
            .unwrap_or_default()
            .iter()
            .filter(|dep| !granted.contains(dep))
            .cloned()
            .collect()
    }

    /// Order permissions so that dependencies come before their dependents
    ///
    /// Only dependencies that are themselves in `permissions` are pulled
    /// forward; nothing is added. Relative order is otherwise preserved.
    pub fn resolve_request_order(&self, permissions: &[String]) -> Vec<String> {
        let mut ordered = Vec::with_capacity(permissions.len());
        let mut visited = HashSet::new();
        for permission in permissions {
            self.visit(permission, permissions, &mut visited, &mut ordered);
        }
        ordered
    }

    fn visit(
        &self,
        permission: &str,
        requested: &[String],
        visited: &mut HashSet<String>,
        ordered: &mut Vec<String>,
    ) {
        if !visited.insert(permission.to_string()) {
            return;
        }
        if let Some(deps) = self.requires.get(permission) {
            for dep in deps {
                if requested.contains(dep) {
                    self.visit(dep, requested, visited, ordered);
                }
            }
        }
        ordered.push(permission.to_string());
    }

    /// Report dependents whose dependencies are missing from the request
    pub fn validate_combination(&self, permissions: &[String]) -> ValidationResult {
        let mut result = ValidationResult::default();
        for permission in permissions {
            for dep in self.dependencies_of(permission).unwrap_or_default() {
                if !permissions.contains(dep) {
                    result
                        .issues
                        .push(format!("{} depends on {}, which is not requested", permission, dep));
                    result
                        .suggestions
                        .push(format!("Request {} together with {}", dep, permission));
                }
            }
        }
        result
    }
}

impl Default for PermissionDependencies {
    fn default() -> Self {
        Self::for_api_level(ApiLevel::LATEST)
    }
}
