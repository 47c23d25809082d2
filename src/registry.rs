//! Process-wide registry of service adapters and their engine managers.
//!
//! One [`SearchRegistry`] is built at start-up and passed to whatever
//! handles requests. Services register their adapter explicitly:
//!
//! ```rust
//! use std::sync::Arc;
//! use unified_search::config::Config;
//! use unified_search::registry::SearchRegistry;
//! use unified_search_core::adapter::InMemoryAdapter;
//! use unified_search_core::models::{Filter, SearchableDocument};
//!
//! let registry = SearchRegistry::from_config(Config::default()).unwrap();
//! registry.register_adapter(
//!     "notes",
//!     Arc::new(InMemoryAdapter::new("notes", vec![SearchableDocument::new("Weekly sync notes")])),
//! );
//!
//! let engine = registry.manager("notes").unwrap().default_engine().unwrap();
//! assert_eq!(engine.search("weekly", &Filter::new(), None).unwrap().len(), 1);
//! ```
//!
//! The embedding cache is shared by every engine of every service.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use unified_search_core::adapter::Adapter;
use unified_search_core::embedding::Embedder;

use crate::cache::EmbeddingCache;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::{Result, SearchError};
use crate::manager::SearchEngineManager;
use crate::strategy::StrategyContext;

pub struct SearchRegistry {
    config: Arc<Config>,
    ctx: StrategyContext,
    adapters: RwLock<HashMap<String, Arc<dyn Adapter>>>,
    managers: Mutex<HashMap<String, Arc<SearchEngineManager>>>,
}

impl SearchRegistry {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, cache: Arc<EmbeddingCache>) -> Self {
        Self {
            config: Arc::new(config),
            ctx: StrategyContext { embedder, cache },
            adapters: RwLock::new(HashMap::new()),
            managers: Mutex::new(HashMap::new()),
        }
    }

    /// Build the embedder and the (loaded) embedding cache from `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let cache = Arc::new(EmbeddingCache::from_config(&config.embedding.cache));
        Ok(Self::new(config, embedder, cache))
    }

    /// Register the adapter for `service`. Re-registering replaces the
    /// adapter and discards the service's existing engines.
    pub fn register_adapter(&self, service: impl Into<String>, adapter: Arc<dyn Adapter>) {
        let service = service.into();
        if adapter.service_name() != service {
            warn!(
                service = %service,
                adapter_service = adapter.service_name(),
                "adapter reports a different service name"
            );
        }

        let mut managers = self.managers.lock();
        let replaced = self
            .adapters
            .write()
            .insert(service.clone(), adapter)
            .is_some();
        if replaced {
            managers.remove(&service);
        }
        info!(service = %service, replaced, "adapter registered");
    }

    /// The engine manager for `service`, created once per registry.
    pub fn manager(&self, service: &str) -> Result<Arc<SearchEngineManager>> {
        let mut managers = self.managers.lock();
        if let Some(manager) = managers.get(service) {
            return Ok(manager.clone());
        }

        let adapter = self
            .adapters
            .read()
            .get(service)
            .cloned()
            .ok_or_else(|| SearchError::AdapterNotRegistered(service.to_string()))?;

        let manager = Arc::new(SearchEngineManager::new(
            service,
            self.config.clone(),
            adapter,
            self.ctx.clone(),
        ));
        managers.insert(service.to_string(), manager.clone());
        Ok(manager)
    }

    /// Registered service names, sorted.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.ctx.cache
    }

    /// Persist the shared embedding cache (no-op when memory-only).
    pub fn flush_cache(&self) {
        self.ctx.cache.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unified_search_core::adapter::InMemoryAdapter;
    use unified_search_core::models::SearchableDocument;

    fn adapter(service: &str, text: &str) -> Arc<InMemoryAdapter> {
        Arc::new(InMemoryAdapter::new(service, vec![SearchableDocument::new(text)]))
    }

    #[test]
    fn test_manager_requires_adapter() {
        let registry = SearchRegistry::from_config(Config::default()).unwrap();
        assert!(matches!(
            registry.manager("gmail"),
            Err(SearchError::AdapterNotRegistered(ref s)) if s == "gmail"
        ));
    }

    #[test]
    fn test_manager_is_constructed_once() {
        let registry = SearchRegistry::from_config(Config::default()).unwrap();
        registry.register_adapter("gmail", adapter("gmail", "hello"));
        registry.register_adapter("slack", adapter("slack", "hi"));

        let a = registry.manager("gmail").unwrap();
        let b = registry.manager("gmail").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.services(), vec!["gmail", "slack"]);
    }

    #[test]
    fn test_reregistering_replaces_manager() {
        let registry = SearchRegistry::from_config(Config::default()).unwrap();
        registry.register_adapter("gmail", adapter("gmail", "hello"));
        let before = registry.manager("gmail").unwrap();

        registry.register_adapter("gmail", adapter("gmail", "goodbye"));
        let after = registry.manager("gmail").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));

        let engine = after.default_engine().unwrap();
        assert_eq!(
            engine
                .search("goodbye", &unified_search_core::models::Filter::new(), None)
                .unwrap()
                .len(),
            1
        );
    }
}
