//! Scope-bound executor registry
//!
//! Exactly one executor per live scope. An executor must be obtained while
//! its scope is still being created, because the native request launchers
//! it relies on can only be registered in that window. Teardown evicts the
//! entry and shuts the executor down, which cancels any pending wait.

use grantflow_api::{Scope, ScopeId, ScopeState};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::error::PermissionError;
use crate::executor::PermissionExecutor;
use crate::presets::PermissionServices;

type ExecutorMap = HashMap<ScopeId, Arc<PermissionExecutor>>;

/// Process-wide map from scope to executor
#[derive(Clone)]
pub struct ExecutorRegistry {
    inner: Arc<RwLock<ExecutorMap>>,
    services: PermissionServices,
}

impl ExecutorRegistry {
    pub fn new(services: PermissionServices) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            services,
        }
    }

    pub fn services(&self) -> &PermissionServices {
        &self.services
    }

    /// Return the scope's executor, creating it on first use
    ///
    /// Fails with [`PermissionError::ScopeDestroyed`] for a torn-down scope
    /// and with [`PermissionError::LateRegistration`] when the scope is
    /// already active and has no executor yet.
    pub fn get_or_create(&self, scope: &dyn Scope) -> Result<Arc<PermissionExecutor>, PermissionError> {
        let id = scope.id();

        match scope.state() {
            ScopeState::Destroyed => {
                self.evict(&id);
                return Err(PermissionError::ScopeDestroyed(id));
            }
            ScopeState::Active => {
                if let Some(existing) = self.get(&id) {
                    return Ok(existing);
                }
                tracing::warn!(scope = %id, "Executor requested after the scope became active");
                return Err(PermissionError::LateRegistration(id));
            }
            ScopeState::Created => {}
        }

        let executor = {
            let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = map.get(&id) {
                return Ok(Arc::clone(existing));
            }
            let executor = Arc::new(PermissionExecutor::new(
                id.clone(),
                scope.platform(),
                self.services.clone(),
            ));
            map.insert(id.clone(), Arc::clone(&executor));
            executor
        };
        tracing::info!(scope = %id, "Permission executor created");

        // Registered outside the lock: a scope torn down concurrently runs the hook inline
        let map = Arc::downgrade(&self.inner);
        let weak = Arc::downgrade(&executor);
        let hook_id = id.clone();
        scope.on_teardown(Box::new(move || teardown(&map, &weak, &hook_id)));

        Ok(executor)
    }

    pub fn get(&self, id: &ScopeId) -> Option<Arc<PermissionExecutor>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &ScopeId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shut down and drop every executor
    pub fn clear(&self) {
        let drained: Vec<Arc<PermissionExecutor>> = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, executor)| executor)
            .collect();
        for executor in &drained {
            executor.shutdown();
        }
        tracing::info!(count = drained.len(), "Executor registry cleared");
    }

    fn evict(&self, id: &ScopeId) {
        let removed = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if let Some(executor) = removed {
            executor.shutdown();
        }
    }
}

fn teardown(map: &Weak<RwLock<ExecutorMap>>, executor: &Weak<PermissionExecutor>, id: &ScopeId) {
    let Some(executor) = executor.upgrade() else {
        return;
    };
    executor.shutdown();

    if let Some(map) = map.upgrade() {
        let mut map = map.write().unwrap_or_else(PoisonError::into_inner);
        // Only evict the entry this hook was registered for
        if map.get(id).is_some_and(|current| Arc::ptr_eq(current, &executor)) {
            map.remove(id);
        }
    }
    tracing::info!(scope = %id, "Permission executor evicted on teardown");
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("executors", &self.len())
            .finish_non_exhaustive()
    }
}
