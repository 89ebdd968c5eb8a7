//! Hosting scope capability
//!
//! A scope is the lifetime window (create → destroy) of a hosting UI unit.
//! The engine only needs three things from it: an identity, its lifecycle
//! state, and a way to be told when it ends. Keeping this behind a trait
//! decouples the engine from any particular UI framework.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::platform::PermissionPlatform;

/// Callback run once when a scope is torn down
pub type TeardownHook = Box<dyn FnOnce() + Send + 'static>;

/// Identity of a hosting scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Created but not yet visible; request launchers may still be registered
    Created,
    /// Active/visible; the launcher registration window has closed
    Active,
    /// Torn down
    Destroyed,
}

/// Lifetime capability of a hosting UI unit
///
/// Implementations must run every hook passed to [`Scope::on_teardown`]
/// exactly once when the scope is destroyed. A hook registered after
/// teardown runs immediately.
pub trait Scope: Send + Sync {
    /// Stable identity of this scope
    fn id(&self) -> ScopeId;

    /// Current lifecycle state
    fn state(&self) -> ScopeState;

    /// Native primitives bound to this scope
    fn platform(&self) -> Arc<dyn PermissionPlatform>;

    /// Register a hook to run when the scope is torn down
    fn on_teardown(&self, hook: TeardownHook);
}

// ============================================================================
// Manually driven scope
// ============================================================================

static NEXT_MANUAL_ID: AtomicU64 = AtomicU64::new(1);

/// Scope whose lifecycle is driven explicitly by the host
///
/// Useful for hosts without a lifecycle framework, and for tests.
pub struct ManualScope {
    id: ScopeId,
    platform: Arc<dyn PermissionPlatform>,
    inner: Mutex<ManualScopeInner>,
}

struct ManualScopeInner {
    state: ScopeState,
    hooks: Vec<TeardownHook>,
}

impl ManualScope {
    /// Create a scope in the `Created` state with a generated id
    pub fn new(platform: Arc<dyn PermissionPlatform>) -> Self {
        let n = NEXT_MANUAL_ID.fetch_add(1, Ordering::Relaxed);
        Self::with_id(ScopeId::new(format!("manual-{}", n)), platform)
    }

    /// Create a scope in the `Created` state with an explicit id
    pub fn with_id(id: ScopeId, platform: Arc<dyn PermissionPlatform>) -> Self {
        Self {
            id,
            platform,
            inner: Mutex::new(ManualScopeInner {
                state: ScopeState::Created,
                hooks: Vec::new(),
            }),
        }
    }

    /// Move from `Created` to `Active`; no-op in any other state
    pub fn activate(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.state == ScopeState::Created {
            inner.state = ScopeState::Active;
        }
    }

    /// Tear the scope down and run registered hooks
    ///
    /// Hooks run outside the scope's lock. Calling this twice is a no-op.
    pub fn destroy(&self) {
        let hooks = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.state == ScopeState::Destroyed {
                return;
            }
            inner.state = ScopeState::Destroyed;
            std::mem::take(&mut inner.hooks)
        };

        for hook in hooks {
            hook();
        }
    }

    /// Number of hooks waiting for teardown
    pub fn pending_hooks(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .hooks
            .len()
    }
}

impl Scope for ManualScope {
    fn id(&self) -> ScopeId {
        self.id.clone()
    }

    fn state(&self) -> ScopeState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    fn platform(&self) -> Arc<dyn PermissionPlatform> {
        Arc::clone(&self.platform)
    }

    fn on_teardown(&self, hook: TeardownHook) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.state != ScopeState::Destroyed {
                inner.hooks.push(hook);
                return;
            }
        }
        hook();
    }
}

impl fmt::Debug for ManualScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScope")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
