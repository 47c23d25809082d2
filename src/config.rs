//! Configuration parsing, validation, and the global → service → engine merge.
//!
//! The configuration document is loaded once per process (TOML, or JSON when
//! the file extension is `.json`). Its shape:
//!
//! ```toml
//! [global]
//! default_strategy_name = "keyword"
//! [global.strategy_configs.fuzzy]
//! score_cutoff = 70
//!
//! [embedding]
//! provider = "hash"
//! dims = 256
//! [embedding.cache]
//! path = "./cache/embeddings.json"
//! max_cache_size = 10000
//!
//! [services.gmail]
//! default_strategy_name = "hybrid"
//! [[services.gmail.custom_engine_definitions]]
//! id = "drafts_exact"
//! strategy_name = "substring"
//! ```
//!
//! Strategy configs are kept as raw JSON objects until an engine is built:
//! the layers are deep-merged (custom definition over service over global)
//! and only then deserialized into the typed configs below. A malformed
//! value therefore fails at engine construction, never at query time.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use unified_search_core::models::Metadata;

use crate::error::SearchError;
use crate::strategy::StrategyKind;

/// Engine id reserved for a service's default engine.
pub const DEFAULT_ENGINE_ID: &str = "default";

/// Raw per-strategy config objects keyed by strategy name.
pub type StrategyConfigTable = BTreeMap<String, Value>;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    #[serde(default = "default_strategy_name")]
    pub default_strategy_name: String,
    #[serde(default)]
    pub strategy_configs: StrategyConfigTable,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_strategy_name: default_strategy_name(),
            strategy_configs: StrategyConfigTable::new(),
        }
    }
}

fn default_strategy_name() -> String {
    "keyword".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default)]
    pub default_strategy_name: Option<String>,
    #[serde(default)]
    pub strategy_configs: StrategyConfigTable,
    #[serde(default)]
    pub custom_engine_definitions: Vec<CustomEngineDefinition>,
}

/// A named engine declared for one service.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CustomEngineDefinition {
    pub id: String,
    pub strategy_name: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub strategy_configs: StrategyConfigTable,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for HTTP providers (defaults to the OpenAI API).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            endpoint: None,
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            cache: CacheConfig::default(),
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Embedding cache settings. Without `path` the cache is memory-only.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_cache_size: default_max_cache_size(),
        }
    }
}

fn default_max_cache_size() -> usize {
    10_000
}

// ============ Typed strategy configs ============

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SubstringConfig {
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct KeywordConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

/// Similarity function used by the fuzzy strategy.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum FuzzyScorer {
    #[serde(rename = "ratio")]
    Ratio,
    #[serde(rename = "partial_ratio")]
    PartialRatio,
    #[serde(rename = "token_sort_ratio")]
    TokenSortRatio,
    #[serde(rename = "token_set_ratio")]
    TokenSetRatio,
    #[default]
    #[serde(rename = "wratio", alias = "WRatio")]
    WRatio,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FuzzyConfig {
    /// Matches scoring below this (0–100) are dropped by `search`.
    #[serde(default = "default_score_cutoff")]
    pub score_cutoff: f64,
    #[serde(default)]
    pub scorer: FuzzyScorer,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_score_cutoff() -> f64 {
    70.0
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SemanticConfig {
    /// Matches with cosine similarity below this are dropped by `search`.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_query_cache_size")]
    pub query_cache_size: usize,
}

fn default_score_threshold() -> f32 {
    0.5
}
fn default_query_cache_size() -> usize {
    256
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HybridConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

/// Fully merged and typed configs for every strategy of one engine.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StrategySettings {
    pub substring: SubstringConfig,
    pub keyword: KeywordConfig,
    pub fuzzy: FuzzyConfig,
    pub semantic: SemanticConfig,
    pub hybrid: HybridConfig,
}

impl StrategySettings {
    /// Deserialize and range-check every strategy's config from a merged table.
    pub fn from_table(table: &StrategyConfigTable) -> std::result::Result<Self, SearchError> {
        let settings = Self {
            substring: typed(table, StrategyKind::Substring)?,
            keyword: typed(table, StrategyKind::Keyword)?,
            fuzzy: typed(table, StrategyKind::Fuzzy)?,
            semantic: typed(table, StrategyKind::Semantic)?,
            hybrid: typed(table, StrategyKind::Hybrid)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> std::result::Result<(), SearchError> {
        let invalid = |msg: &str| Err(SearchError::InvalidConfig(msg.to_string()));

        if self.substring.default_limit == 0
            || self.keyword.default_limit == 0
            || self.fuzzy.default_limit == 0
            || self.semantic.default_limit == 0
            || self.hybrid.default_limit == 0
        {
            return invalid("default_limit must be >= 1");
        }
        if !(0.0..=100.0).contains(&self.fuzzy.score_cutoff) {
            return invalid("fuzzy.score_cutoff must be in [0, 100]");
        }
        if !(-1.0..=1.0).contains(&self.semantic.score_threshold) {
            return invalid("semantic.score_threshold must be in [-1.0, 1.0]");
        }
        if self.semantic.query_cache_size == 0 {
            return invalid("semantic.query_cache_size must be >= 1");
        }
        Ok(())
    }
}

fn typed<T: serde::de::DeserializeOwned>(
    table: &StrategyConfigTable,
    kind: StrategyKind,
) -> std::result::Result<T, SearchError> {
    let raw = table
        .get(kind.as_str())
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(raw).map_err(|e| {
        SearchError::InvalidConfig(format!("strategy_configs.{}: {}", kind.as_str(), e))
    })
}

/// Deep-merge `overlay` into `base`. Objects merge key by key; anything
/// else in `overlay` replaces the value in `base`.
pub fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Merge strategy tables, later layers winning.
pub fn merge_tables(layers: &[&StrategyConfigTable]) -> StrategyConfigTable {
    let mut merged = StrategyConfigTable::new();
    for layer in layers {
        for (name, value) in layer.iter() {
            match merged.get_mut(name) {
                Some(existing) => merge_json(existing, value),
                None => {
                    merged.insert(name.clone(), value.clone());
                }
            }
        }
    }
    merged
}

/// The configuration an engine is built from.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEngineConfig {
    pub engine_id: String,
    pub strategy: StrategyKind,
    /// Merged raw strategy configs (global → service → custom).
    pub strategy_configs: StrategyConfigTable,
    pub metadata: Metadata,
}

impl ResolvedEngineConfig {
    pub fn settings(&self) -> std::result::Result<StrategySettings, SearchError> {
        StrategySettings::from_table(&self.strategy_configs)
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Merge the configuration for one engine of one service.
    ///
    /// A service absent from the file resolves entirely from global defaults.
    pub fn resolve_engine(
        &self,
        service: &str,
        engine_id: &str,
    ) -> std::result::Result<ResolvedEngineConfig, SearchError> {
        let empty = ServiceConfig::default();
        let service_cfg = self.services.get(service).unwrap_or(&empty);

        let (strategy_name, strategy_configs, metadata) = if engine_id == DEFAULT_ENGINE_ID {
            let name = service_cfg
                .default_strategy_name
                .clone()
                .unwrap_or_else(|| self.global.default_strategy_name.clone());
            let table = merge_tables(&[&self.global.strategy_configs, &service_cfg.strategy_configs]);
            (name, table, Metadata::new())
        } else {
            let def = service_cfg
                .custom_engine_definitions
                .iter()
                .find(|d| d.id == engine_id)
                .ok_or_else(|| SearchError::UnknownEngine {
                    service: service.to_string(),
                    engine_id: engine_id.to_string(),
                })?;
            let table = merge_tables(&[
                &self.global.strategy_configs,
                &service_cfg.strategy_configs,
                &def.strategy_configs,
            ]);
            (def.strategy_name.clone(), table, def.metadata.clone())
        };

        Ok(ResolvedEngineConfig {
            engine_id: engine_id.to_string(),
            strategy: StrategyKind::from_str(&strategy_name)?,
            strategy_configs,
            metadata,
        })
    }

    /// Ids of every engine a service can serve, default first.
    pub fn engine_ids(&self, service: &str) -> Vec<String> {
        let mut ids = vec![DEFAULT_ENGINE_ID.to_string()];
        if let Some(svc) = self.services.get(service) {
            ids.extend(svc.custom_engine_definitions.iter().map(|d| d.id.clone()));
        }
        ids
    }

    fn validate(&self) -> Result<()> {
        check_strategy_name("global.default_strategy_name", &self.global.default_strategy_name)?;
        check_table("global.strategy_configs", &self.global.strategy_configs)?;

        for (name, svc) in &self.services {
            if let Some(strategy) = &svc.default_strategy_name {
                check_strategy_name(&format!("services.{}.default_strategy_name", name), strategy)?;
            }
            check_table(&format!("services.{}.strategy_configs", name), &svc.strategy_configs)?;

            let mut seen = std::collections::HashSet::new();
            for def in &svc.custom_engine_definitions {
                if def.id.trim().is_empty() || def.id == DEFAULT_ENGINE_ID {
                    bail!(
                        "services.{}: custom engine id '{}' is empty or reserved",
                        name,
                        def.id
                    );
                }
                if !seen.insert(def.id.as_str()) {
                    bail!("services.{}: duplicate custom engine id '{}'", name, def.id);
                }
                check_strategy_name(
                    &format!("services.{}.custom_engine_definitions.{}", name, def.id),
                    &def.strategy_name,
                )?;
                check_table(
                    &format!("services.{}.custom_engine_definitions.{}.strategy_configs", name, def.id),
                    &def.strategy_configs,
                )?;
            }
        }

        if self.embedding.cache.max_cache_size == 0 {
            bail!("embedding.cache.max_cache_size must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "hash" => {}
            "openai" => {
                if self.embedding.model.is_none() {
                    bail!("embedding.model must be specified when provider is 'openai'");
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, hash, or openai.",
                other
            ),
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }

        Ok(())
    }
}

fn check_strategy_name(field: &str, name: &str) -> Result<()> {
    StrategyKind::from_str(name).with_context(|| format!("{} is invalid", field))?;
    Ok(())
}

fn check_table(field: &str, table: &StrategyConfigTable) -> Result<()> {
    for (name, value) in table {
        check_strategy_name(field, name)?;
        if !value.is_object() {
            bail!("{}.{} must be a table", field, name);
        }
    }
    Ok(())
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Config::from_json_str(&content),
        _ => Config::from_toml_str(&content),
    }
}
