//! Per-service registry of named engines.
//!
//! Every service has one default engine (id [`DEFAULT_ENGINE_ID`]) plus any
//! custom engines declared in its configuration. Engines are built lazily on
//! first request and then cached; default and custom engines go through the
//! same construction path and differ only in their resolved configuration.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use unified_search_core::adapter::Adapter;

pub use crate::config::DEFAULT_ENGINE_ID;

use crate::config::{Config, ResolvedEngineConfig};
use crate::engine::SearchEngine;
use crate::error::Result;
use crate::strategy::StrategyContext;

pub struct SearchEngineManager {
    service: String,
    config: Arc<Config>,
    adapter: Arc<dyn Adapter>,
    ctx: StrategyContext,
    engines: Mutex<HashMap<String, Arc<SearchEngine>>>,
}

impl SearchEngineManager {
    pub fn new(
        service: impl Into<String>,
        config: Arc<Config>,
        adapter: Arc<dyn Adapter>,
        ctx: StrategyContext,
    ) -> Self {
        Self {
            service: service.into(),
            config,
            adapter,
            ctx,
            engines: Mutex::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Return the engine for `engine_id`, constructing it on first use.
    ///
    /// Construction happens under the registry lock, so concurrent callers
    /// for the same id always receive the same instance.
    pub fn get_engine(&self, engine_id: &str) -> Result<Arc<SearchEngine>> {
        let mut engines = self.engines.lock();
        if let Some(engine) = engines.get(engine_id) {
            return Ok(engine.clone());
        }

        let resolved = self.resolve_engine_config(engine_id)?;
        let engine = Arc::new(SearchEngine::new(
            &self.service,
            resolved,
            self.adapter.clone(),
            self.ctx.clone(),
        )?);
        engines.insert(engine_id.to_string(), engine.clone());
        Ok(engine)
    }

    pub fn default_engine(&self) -> Result<Arc<SearchEngine>> {
        self.get_engine(DEFAULT_ENGINE_ID)
    }

    /// Switch `engine_id` to `strategy_name` (with optional config overrides)
    /// and return it.
    pub fn override_strategy_for_engine(
        &self,
        strategy_name: &str,
        engine_id: &str,
        overrides: Option<&Value>,
    ) -> Result<Arc<SearchEngine>> {
        let engine = self.get_engine(engine_id)?;
        engine.override_strategy(strategy_name, overrides)?;
        Ok(engine)
    }

    /// Discard every constructed engine, and with them any runtime
    /// overrides. The next access rebuilds from the file configuration.
    pub fn reset_all_engines(&self) {
        let mut engines = self.engines.lock();
        let dropped = engines.len();
        engines.clear();
        info!(service = %self.service, dropped, "engines reset");
    }

    /// Every engine id this service can serve, default first.
    pub fn engine_ids(&self) -> Vec<String> {
        self.config.engine_ids(&self.service)
    }

    /// Ids of engines constructed so far.
    pub fn active_engine_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.engines.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The merged configuration `engine_id` is (or would be) built from.
    pub fn resolve_engine_config(&self, engine_id: &str) -> Result<ResolvedEngineConfig> {
        self.config.resolve_engine(&self.service, engine_id)
    }
}
