//! A search engine binds one adapter to one strategy.
//!
//! # Reconciliation
//!
//! Every `search` / `raw_search` call first reconciles the chunk index
//! against the adapter's current documents:
//!
//! 1. Ask the adapter for its documents; on failure return
//!    [`SearchError::Adapter`] and leave the index untouched.
//! 2. Derive chunks (see [`unified_search_core::chunk`]).
//! 3. Diff by chunk key. Unchanged chunks keep their existing `Arc`
//!    (and embedding); changed ones are replaced; new ones inserted;
//!    missing ones dropped. A replaced or inserted chunk whose text was
//!    already indexed inherits that embedding.
//! 4. If anything changed, or the strategy was just (re)built, hand the
//!    full set to the strategy's `index`.
//!
//! With no data change a query costs one adapter call plus a hash pass.
//!
//! All engine state sits behind one mutex, so concurrent queries against
//! the same engine are serialized.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use unified_search_core::adapter::Adapter;
use unified_search_core::chunk::build_chunks;
use unified_search_core::models::{Chunk, Filter, Metadata};
use unified_search_core::search::{unique_objects, SearchHit};

use crate::config::{merge_json, ResolvedEngineConfig, StrategyConfigTable, StrategySettings};
use crate::error::{Result, SearchError};
use crate::strategy::{SearchStrategy, Strategy, StrategyContext, StrategyKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePhase {
    /// No reconciliation has completed yet.
    Uninitialized,
    Indexed,
}

/// Outcome of the most recent reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub unchanged: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ReconcileStats {
    pub fn has_changes(&self) -> bool {
        self.inserted + self.updated + self.deleted > 0
    }
}

struct EngineState {
    strategy: Strategy,
    strategy_configs: StrategyConfigTable,
    settings: StrategySettings,
    chunks: Vec<Arc<Chunk>>,
    phase: EnginePhase,
    needs_full_index: bool,
    last_reconcile: Option<ReconcileStats>,
}

pub struct SearchEngine {
    id: String,
    service: String,
    metadata: Metadata,
    adapter: Arc<dyn Adapter>,
    ctx: StrategyContext,
    state: Mutex<EngineState>,
}

impl SearchEngine {
    /// Build an engine from a resolved configuration.
    ///
    /// Fails with [`SearchError::InvalidConfig`] when the merged strategy
    /// configs do not deserialize or are out of range.
    pub fn new(
        service: &str,
        resolved: ResolvedEngineConfig,
        adapter: Arc<dyn Adapter>,
        ctx: StrategyContext,
    ) -> Result<Self> {
        let settings = resolved.settings()?;
        let strategy = Strategy::build(resolved.strategy, &settings, &ctx)?;

        info!(
            service,
            engine = %resolved.engine_id,
            strategy = %resolved.strategy,
            "search engine constructed"
        );

        Ok(Self {
            id: resolved.engine_id,
            service: service.to_string(),
            metadata: resolved.metadata,
            adapter,
            ctx,
            state: Mutex::new(EngineState {
                strategy,
                strategy_configs: resolved.strategy_configs,
                settings,
                chunks: Vec::new(),
                phase: EnginePhase::Uninitialized,
                needs_full_index: true,
                last_reconcile: None,
            }),
        })
    }

    /// Distinct `original_json_obj`s of the ranked matches, best first.
    ///
    /// `limit` caps the number of matched chunks; `None` uses the
    /// strategy's `default_limit`.
    pub fn search(&self, query: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<Value>> {
        let hits = self.search_hits(query, filter, limit)?;
        Ok(unique_objects(&hits, None))
    }

    /// Ranked matches after the strategy's score cut and limit.
    pub fn search_hits(&self, query: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let mut state = self.state.lock();
        self.reconcile(&mut state)?;
        state.strategy.search(query, filter, limit)
    }

    /// Every match with its raw score, for diagnostics and calibration.
    pub fn raw_search(&self, query: &str, filter: &Filter) -> Result<Vec<SearchHit>> {
        let mut state = self.state.lock();
        self.reconcile(&mut state)?;
        state.strategy.raw_search(query, filter)
    }

    /// Swap the active strategy and/or its configuration.
    ///
    /// `overrides`, if given, must be a JSON object; it is deep-merged over
    /// the engine's current config for `strategy_name`. The result is
    /// validated before anything changes. The chunk index is kept; the new
    /// strategy indexes it on the next query.
    pub fn override_strategy(&self, strategy_name: &str, overrides: Option<&Value>) -> Result<()> {
        let kind = StrategyKind::from_str(strategy_name)?;
        let mut state = self.state.lock();

        let mut configs = state.strategy_configs.clone();
        if let Some(overrides) = overrides {
            if !overrides.is_object() {
                return Err(SearchError::InvalidConfig(format!(
                    "overrides for '{}' must be an object",
                    strategy_name
                )));
            }
            let entry = configs
                .entry(kind.as_str().to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            merge_json(entry, overrides);
        }

        let settings = StrategySettings::from_table(&configs)?;
        let strategy = Strategy::build(kind, &settings, &self.ctx)?;

        state.strategy = strategy;
        state.strategy_configs = configs;
        state.settings = settings;
        state.needs_full_index = true;

        info!(service = %self.service, engine = %self.id, strategy = %kind, "strategy overridden");
        Ok(())
    }

    fn reconcile(&self, state: &mut EngineState) -> Result<()> {
        let documents = self
            .adapter
            .to_searchable_documents()
            .map_err(|source| SearchError::Adapter {
                service: self.service.clone(),
                source,
            })?;

        let previous: HashMap<&str, &Arc<Chunk>> =
            state.chunks.iter().map(|c| (c.key.as_str(), c)).collect();
        let known_vectors: HashMap<&str, &Vec<f32>> = state
            .chunks
            .iter()
            .filter_map(|c| c.embedding.as_ref().map(|e| (c.chunk_id.as_str(), e)))
            .collect();

        let mut stats = ReconcileStats::default();
        let mut next = Vec::with_capacity(documents.len());

        for mut chunk in build_chunks(documents) {
            match previous.get(chunk.key.as_str()) {
                Some(prev) if prev.same_content(&chunk) && prev.metadata == chunk.metadata => {
                    stats.unchanged += 1;
                    next.push(Arc::clone(prev));
                    continue;
                }
                Some(_) => stats.updated += 1,
                None => stats.inserted += 1,
            }
            chunk.embedding = known_vectors.get(chunk.chunk_id.as_str()).map(|v| (*v).clone());
            next.push(Arc::new(chunk));
        }
        stats.deleted = state.chunks.len() - (stats.unchanged + stats.updated);

        drop(previous);
        drop(known_vectors);
        state.chunks = next;

        if stats.has_changes() || state.needs_full_index {
            state.needs_full_index = true;
            state.strategy.index(&mut state.chunks)?;
            state.needs_full_index = false;
        }

        state.phase = EnginePhase::Indexed;
        state.last_reconcile = Some(stats);
        debug!(
            service = %self.service,
            engine = %self.id,
            unchanged = stats.unchanged,
            inserted = stats.inserted,
            updated = stats.updated,
            deleted = stats.deleted,
            "reconciled"
        );
        Ok(())
    }

    // ============ Debug accessors ============

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Metadata declared on a custom engine definition (empty for the default).
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn strategy_name(&self) -> StrategyKind {
        self.state.lock().strategy.kind()
    }

    pub fn phase(&self) -> EnginePhase {
        self.state.lock().phase
    }

    pub fn chunk_count(&self) -> usize {
        self.state.lock().chunks.len()
    }

    pub fn last_reconcile(&self) -> Option<ReconcileStats> {
        self.state.lock().last_reconcile
    }

    /// Effective typed configuration of every strategy.
    pub fn settings(&self) -> StrategySettings {
        self.state.lock().settings.clone()
    }

    /// Effective merged raw strategy configs, including overrides.
    pub fn strategy_configs(&self) -> StrategyConfigTable {
        self.state.lock().strategy_configs.clone()
    }
}
