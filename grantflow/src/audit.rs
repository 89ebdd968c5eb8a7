//! Audit trail for permission request events
//!
//! Sinks receive one [`AuditEvent`] per pipeline milestone. The
//! [`AuditInterceptor`](crate::interceptor::AuditInterceptor) feeds them from
//! the interceptor chain; hosts can also record events directly.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;

/// RFC 3339 timestamp
pub type Timestamp = String;

fn now_rfc3339() -> Timestamp {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// One audited pipeline milestone
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: Timestamp,
    pub event_type: AuditEventType,
    /// Permissions of the request the event belongs to
    pub permissions: Vec<String>,
    pub details: AuditDetails,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, permissions: &[String], details: AuditDetails) -> Self {
        Self {
            timestamp: now_rfc3339(),
            event_type,
            permissions: permissions.to_vec(),
            details,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Request passed the veto gate
    RequestStarted,
    /// An interceptor vetoed the request
    RequestVetoed,
    /// Native prompt returned
    RequestCompleted,
    PermissionGranted,
    PermissionDenied,
    PermissionPermanentlyDenied,
    RequestError,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AuditDetails {
    Request,
    /// Per-permission native results
    Results { results: BTreeMap<String, bool> },
    Outcome {
        #[serde(skip_serializing_if = "Vec::is_empty")]
        granted: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        denied: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        permanently_denied: Vec<String>,
    },
    Error { code: String, message: String },
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to write audit log: {0}")]
    WriteError(#[from] std::io::Error),

    #[error("Failed to serialize audit event: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Audit sink not available: {0}")]
    Unavailable(String),
}

/// Destination for audit events
///
/// # Example
///
/// ```rust
/// use grantflow::audit::{AuditError, AuditEvent, AuditSink};
///
/// struct StderrSink;
///
/// impl AuditSink for StderrSink {
///     fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
///         eprintln!("{:?} {:?}", event.event_type, event.permissions);
///         Ok(())
///     }
///
///     fn flush(&self) -> Result<(), AuditError> {
///         Ok(())
///     }
/// }
/// ```
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;

    fn flush(&self) -> Result<(), AuditError>;

    fn is_healthy(&self) -> bool {
        true
    }
}

// ============================================================================
// Default Implementations
// ============================================================================

/// Appends events to a file in JSON Lines format
pub struct FileAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileAuditSink {
    /// Open (or create) the log file, creating parent directories
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// `<data dir>/<app_name>/permission-audit.jsonl`
    pub fn default_for_app(app_name: &str) -> Result<Self, AuditError> {
        let dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(app_name);
        Self::new(dir.join("permission-audit.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let json = serde_json::to_string(&event)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", json)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.path.parent().map(|p| p.exists()).unwrap_or(true)
    }
}

impl fmt::Debug for FileAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAuditSink")
            .field("path", &self.path)
            .finish()
    }
}

/// Bounded in-memory sink; the oldest event is evicted when full
pub struct MemoryAuditSink {
    events: RwLock<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl MemoryAuditSink {
    /// Capacity of 1000 events
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::with_capacity(max_events.min(1000))),
            max_events,
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn find_by_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Event types in recording order
    pub fn event_types(&self) -> Vec<AuditEventType> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.event_type)
            .collect()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        if self.max_events == 0 {
            return Ok(());
        }
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

impl fmt::Debug for MemoryAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAuditSink")
            .field("count", &self.count())
            .field("max_events", &self.max_events)
            .finish()
    }
}

/// Discards all events
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl NullAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Fans every event out to several sinks
///
/// Every sink sees every event; the first error is returned after all
/// sinks were tried.
#[derive(Default)]
pub struct CompositeAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl CompositeAuditSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Add a sink that is also held elsewhere
    pub fn with_shared(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AuditSink for CompositeAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(event.clone()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn flush(&self) -> Result<(), AuditError> {
        for sink in &self.sinks {
            sink.flush()?;
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.sinks.iter().all(|s| s.is_healthy())
    }
}

impl fmt::Debug for CompositeAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeAuditSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

// ============================================================================
// Helper functions
// ============================================================================

pub fn request_started(permissions: &[String]) -> AuditEvent {
    AuditEvent::new(AuditEventType::RequestStarted, permissions, AuditDetails::Request)
}

pub fn request_vetoed(permissions: &[String]) -> AuditEvent {
    AuditEvent::new(AuditEventType::RequestVetoed, permissions, AuditDetails::Request)
}

pub fn request_completed(
    permissions: &[String],
    results: &HashMap<String, bool>,
) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::RequestCompleted,
        permissions,
        AuditDetails::Results {
            results: results.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        },
    )
}

pub fn permission_granted(permissions: &[String], granted: &[String]) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::PermissionGranted,
        permissions,
        AuditDetails::Outcome {
            granted: granted.to_vec(),
            denied: Vec::new(),
            permanently_denied: Vec::new(),
        },
    )
}

pub fn permission_denied(
    permissions: &[String],
    denied: &[String],
    permanently_denied: &[String],
) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::PermissionDenied,
        permissions,
        AuditDetails::Outcome {
            granted: Vec::new(),
            denied: denied.to_vec(),
            permanently_denied: permanently_denied.to_vec(),
        },
    )
}

pub fn permission_permanently_denied(
    permissions: &[String],
    permanently_denied: &[String],
) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::PermissionPermanentlyDenied,
        permissions,
        AuditDetails::Outcome {
            granted: Vec::new(),
            denied: Vec::new(),
            permanently_denied: permanently_denied.to_vec(),
        },
    )
}

pub fn request_error(permissions: &[String], error: &crate::error::PermissionError) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::RequestError,
        permissions,
        AuditDetails::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        },
    )
}
