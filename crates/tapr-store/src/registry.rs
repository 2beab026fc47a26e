use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::fs::FsStore;
use crate::memory::MemoryStore;
use crate::traits::Store;

/// Builds a store instance from its name and configuration.
pub type StoreConstructor =
    Arc<dyn Fn(&str, &StoreConfig) -> StoreResult<Arc<dyn Store>> + Send + Sync>;

/// Name-keyed factory for storage backends.
///
/// Constructed once at startup and handed to whatever needs to build stores.
#[derive(Default)]
pub struct StoreRegistry {
    constructors: HashMap<String, StoreConstructor>,
}

impl StoreRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `memory` and `fs` backends registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.constructors.insert(
            MemoryStore::BACKEND.into(),
            Arc::new(|name: &str, _cfg: &StoreConfig| {
                Ok(Arc::new(MemoryStore::new(name)) as Arc<dyn Store>)
            }),
        );
        registry.constructors.insert(
            FsStore::BACKEND.into(),
            Arc::new(|name: &str, cfg: &StoreConfig| {
                let root = cfg.root.clone().ok_or_else(|| {
                    StoreError::InvalidConfig("fs backend requires `root`".into())
                })?;
                Ok(Arc::new(FsStore::new(name, root)?) as Arc<dyn Store>)
            }),
        );
        registry
    }

    /// Register a constructor under `kind`. Fails if `kind` is taken.
    pub fn register<F>(&mut self, kind: impl Into<String>, ctor: F) -> StoreResult<()>
    where
        F: Fn(&str, &StoreConfig) -> StoreResult<Arc<dyn Store>> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.constructors.contains_key(&kind) {
            return Err(StoreError::AlreadyRegistered(kind));
        }
        self.constructors.insert(kind, Arc::new(ctor));
        Ok(())
    }

    /// Create a store named `name` using the backend registered as `kind`.
    pub fn create(&self, name: &str, kind: &str, cfg: &StoreConfig) -> StoreResult<Arc<dyn Store>> {
        let ctor = self
            .constructors
            .get(kind)
            .ok_or_else(|| StoreError::UnknownBackend(kind.to_string()))?;
        let store = ctor(name, cfg)?;
        info!(name, backend = kind, "store created");
        Ok(store)
    }

    /// Create the store described by `cfg`.
    pub fn create_from_config(&self, cfg: &StoreConfig) -> StoreResult<Arc<dyn Store>> {
        self.create(&cfg.name, &cfg.backend, cfg)
    }

    /// Registered backend kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_kinds() {
        let registry = StoreRegistry::with_builtin();
        assert_eq!(registry.kinds(), vec!["fs", "memory"]);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = StoreRegistry::with_builtin();
        let err = registry
            .register("memory", |name, _| Ok(Arc::new(MemoryStore::new(name)) as Arc<dyn Store>))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyRegistered(k) if k == "memory"));
    }

    #[test]
    fn unknown_backend_names_kind() {
        let registry = StoreRegistry::with_builtin();
        let err = registry
            .create("x", "tape-lto", &StoreConfig::default())
            .unwrap_err();
        assert!(matches!(&err, StoreError::UnknownBackend(k) if k == "tape-lto"));
        assert!(err.to_string().contains("tape-lto"));
    }

    #[test]
    fn create_memory() {
        let registry = StoreRegistry::with_builtin();
        let store = registry.create("scratch", "memory", &StoreConfig::default()).unwrap();
        assert_eq!(store.name(), "scratch");
        assert_eq!(store.backend(), "memory");
    }

    #[test]
    fn create_fs_requires_root() {
        let registry = StoreRegistry::with_builtin();
        let err = registry.create("p", "fs", &StoreConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn create_fs_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StoreConfig {
            name: "archive".into(),
            backend: "fs".into(),
            root: Some(dir.path().to_path_buf()),
        };
        let store = StoreRegistry::with_builtin().create_from_config(&cfg).unwrap();
        assert_eq!(store.name(), "archive");
        assert_eq!(store.backend(), "fs");
    }

    #[test]
    fn custom_backend() {
        let mut registry = StoreRegistry::new();
        registry
            .register("custom", |name, _| Ok(Arc::new(MemoryStore::new(name)) as Arc<dyn Store>))
            .unwrap();
        assert!(registry.create("c", "custom", &StoreConfig::default()).is_ok());
    }
}
