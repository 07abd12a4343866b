//! Type-keyed dependency registry.
//!
//! Producers [`register`](DependencyRegistry::register) implementations at
//! startup; consumers [`resolve`](DependencyRegistry::resolve) them by type.
//! A missing dependency is a wiring bug and aborts with a panic naming the
//! type.
//!
//! ```rust
//! use std::sync::Arc;
//! use apiwire_core::{DependencyRegistry, HttpTransport, StubTransport};
//!
//! let registry = DependencyRegistry::new();
//! registry.register::<Arc<dyn HttpTransport>>(Arc::new(StubTransport::new()));
//!
//! let transport: Arc<dyn HttpTransport> = registry.resolve();
//! # let _ = transport;
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Mutex;

struct Entry {
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

/// Process-lifetime store with at most one instance per type.
///
/// Every operation takes the same lock, so concurrent registrations and
/// resolutions never observe a partial write.
#[derive(Default)]
pub struct DependencyRegistry {
    entries: Mutex<HashMap<TypeId, Entry>>,
}

impl std::fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyRegistry")
            .field("registered", &self.registered_types())
            .finish()
    }
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `instance` under `T`, replacing any previous instance.
    ///
    /// Replacement is logged at `warn` level.
    pub fn register<T>(&self, instance: T)
    where
        T: Send + Sync + 'static,
    {
        let name = type_name::<T>();
        let previous = self.lock().insert(
            TypeId::of::<T>(),
            Entry {
                type_name: name,
                value: Box::new(instance),
            },
        );

        if previous.is_some() {
            tracing::warn!(dependency = name, "dependency re-registered; previous instance replaced");
        } else {
            tracing::debug!(dependency = name, "dependency provided");
        }
    }

    /// Registers `instance` and hands a clone back to the caller.
    pub fn provide<T>(&self, instance: T) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        self.register(instance.clone());
        instance
    }

    /// Returns the instance registered for `T`.
    ///
    /// # Panics
    ///
    /// Panics when nothing is registered for `T`. Dependencies are expected
    /// to be wired before first use, so a miss is a programming error.
    pub fn resolve<T>(&self) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        match self.try_resolve::<T>() {
            Some(instance) => instance,
            None => panic!("No provider registered for type {}", type_name::<T>()),
        }
    }

    /// Like [`resolve`](Self::resolve) but returns `None` on a miss.
    pub fn try_resolve<T>(&self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.lock();
        let instance = entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_ref::<T>())
            .cloned();

        if instance.is_some() {
            tracing::debug!(dependency = type_name::<T>(), "dependency injected");
        }
        instance
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.lock().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Names of all registered types, sorted.
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.lock().values().map(|entry| entry.type_name).collect();
        names.sort_unstable();
        names
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TypeId, Entry>> {
        self.entries
            .lock()
            .expect("dependency registry lock is not poisoned")
    }
}
