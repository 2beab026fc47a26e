use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::ChangerConfig;
use crate::error::{ChangerError, ChangerResult};
use crate::simulated::SimulatedChanger;
use crate::traits::Changer;

/// Builds a changer from its configuration.
pub type ChangerConstructor =
    Arc<dyn Fn(&ChangerConfig) -> ChangerResult<Arc<dyn Changer>> + Send + Sync>;

/// Name-keyed factory for changer implementations.
#[derive(Default)]
pub struct ChangerRegistry {
    constructors: HashMap<String, ChangerConstructor>,
}

impl ChangerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `simulated` changer registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.constructors.insert(
            SimulatedChanger::BACKEND.into(),
            Arc::new(|cfg: &ChangerConfig| {
                Ok(Arc::new(SimulatedChanger::from_config(cfg)?) as Arc<dyn Changer>)
            }),
        );
        registry
    }

    /// Register a constructor under `kind`. Fails if `kind` is taken.
    pub fn register<F>(&mut self, kind: impl Into<String>, ctor: F) -> ChangerResult<()>
    where
        F: Fn(&ChangerConfig) -> ChangerResult<Arc<dyn Changer>> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.constructors.contains_key(&kind) {
            return Err(ChangerError::AlreadyRegistered(kind));
        }
        self.constructors.insert(kind, Arc::new(ctor));
        Ok(())
    }

    /// Create a changer using the implementation registered as `kind`.
    pub fn create(&self, kind: &str, cfg: &ChangerConfig) -> ChangerResult<Arc<dyn Changer>> {
        let ctor = self
            .constructors
            .get(kind)
            .ok_or_else(|| ChangerError::UnknownBackend(kind.to_string()))?;
        let changer = ctor(cfg)?;
        info!(backend = kind, "changer created");
        Ok(changer)
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}
