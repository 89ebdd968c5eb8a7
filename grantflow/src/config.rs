//! Engine configuration
//!
//! Plain data, deserializable from JSON. Every field has a default so a
//! partial document (or `{}`) is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for rate limiting, timeouts and default prompt texts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// Minimum time between two requests for the same permission
    #[serde(rename = "min_request_interval_ms", with = "duration_ms")]
    pub min_request_interval: Duration,

    /// Maximum requests per permission within the trailing hour
    pub max_requests_per_hour: u32,

    /// Optional bound on the native prompt; the settings round trip is never bounded
    #[serde(rename = "request_timeout_ms", with = "optional_duration_ms")]
    pub request_timeout: Option<Duration>,

    pub default_rationale_title: String,
    pub default_settings_title: String,
    pub default_settings_message: String,
    pub default_positive_label: String,
    pub default_negative_label: String,
    pub default_settings_label: String,

    /// Offer the settings redirect after every permanent denial
    pub force_go_to_settings_on_permanent_denial: bool,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            min_request_interval: Duration::from_secs(5),
            max_requests_per_hour: 10,
            request_timeout: None,
            default_rationale_title: "Permission required".into(),
            default_settings_title: "Permission settings".into(),
            default_settings_message:
                "This permission was permanently denied. Please enable it in Settings.".into(),
            default_positive_label: "OK".into(),
            default_negative_label: "Cancel".into(),
            default_settings_label: "Go to Settings".into(),
            force_go_to_settings_on_permanent_denial: false,
        }
    }
}

impl PermissionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Configuration with rate limiting and timeouts disabled
    pub fn unthrottled() -> Self {
        Self {
            min_request_interval: Duration::ZERO,
            max_requests_per_hour: u32::MAX,
            request_timeout: None,
            ..Self::default()
        }
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn with_max_requests_per_hour(mut self, max: u32) -> Self {
        self.max_requests_per_hour = max;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_force_go_to_settings(mut self, force: bool) -> Self {
        self.force_go_to_settings_on_permanent_denial = force;
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(saturating_millis(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }

    pub(super) fn saturating_millis(value: &Duration) -> u64 {
        u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
    }
}

mod optional_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&super::duration_ms::saturating_millis(d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}
