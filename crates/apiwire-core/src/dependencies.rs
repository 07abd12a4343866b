//! Startup hook that wires the dependency registry.
//!
//! The host registers one configurator closure and calls
//! [`Dependencies::provide_dependencies`] once at startup, passing whether it
//! runs in test mode. The configurator is where every
//! [`DependencyRegistry::register`] call belongs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::registry::DependencyRegistry;
use crate::session::SessionConfig;

type Configurator = Box<dyn FnOnce(&DependencyRegistry, bool) + Send>;

/// Composition root for shared dependencies.
pub struct Dependencies {
    registry: Arc<DependencyRegistry>,
    configurator: Mutex<Option<Configurator>>,
    provided: AtomicBool,
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("registry", &self.registry)
            .field("provided", &self.provided.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Default for Dependencies {
    fn default() -> Self {
        Self::new(Arc::new(DependencyRegistry::new()))
    }
}

impl Dependencies {
    pub fn new(registry: Arc<DependencyRegistry>) -> Self {
        Self {
            registry,
            configurator: Mutex::new(None),
            provided: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<DependencyRegistry> {
        &self.registry
    }

    /// Transport configuration for the current mode.
    pub fn session(&self, test_mode: bool) -> SessionConfig {
        if test_mode {
            SessionConfig::mocked_responses_only()
        } else {
            SessionConfig::default()
        }
    }

    /// Stores the host's configuration logic. A later call replaces an
    /// earlier configurator that has not run yet.
    pub fn register_configurator<F>(&self, configurator: F)
    where
        F: FnOnce(&DependencyRegistry, bool) + Send + 'static,
    {
        let mut slot = self
            .configurator
            .lock()
            .expect("configurator slot is not poisoned");
        if slot.replace(Box::new(configurator)).is_some() {
            tracing::warn!("dependency configurator replaced before it ran");
        }
    }

    /// Runs the configurator with `test_mode`, at most once.
    ///
    /// Returns `true` when a configurator ran on this call. A call made
    /// before any configurator is registered returns `false` and leaves the
    /// hook armed, so a configurator registered afterwards still runs on the
    /// next call. Calls after a successful run return `false`.
    pub fn provide_dependencies(&self, test_mode: bool) -> bool {
        let configurator = {
            let mut slot = self
                .configurator
                .lock()
                .expect("configurator slot is not poisoned");
            if self.provided.load(Ordering::SeqCst) {
                tracing::warn!("dependencies already provided; ignoring repeated startup call");
                return false;
            }
            let configurator = slot.take();
            if configurator.is_some() {
                self.provided.store(true, Ordering::SeqCst);
            }
            configurator
        };

        match configurator {
            Some(configure) => {
                tracing::debug!(test_mode, "providing dependencies");
                configure(&self.registry, test_mode);
                true
            }
            None => {
                tracing::warn!(test_mode, "no dependency configurator registered");
                false
            }
        }
    }
}
