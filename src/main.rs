//! # Unified Search CLI (`usearch`)
//!
//! Diagnostics front end for the search engine framework: run a query
//! against a JSON documents file with any configured engine or strategy,
//! inspect merged engine configuration, and inspect the embedding cache.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `usearch search "<query>" --service <s> --documents <file>` | Query a service's engine |
//! | `usearch resolve --service <s> [--engine <id>]` | Print the merged engine configuration |
//! | `usearch cache stats` | Print embedding cache counters |
//! | `usearch completions <shell>` | Generate shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Fuzzy search with a metadata filter
//! usearch --config search.toml search "weekly sinc" --service notes \
//!     --documents notes.json --strategy fuzzy --filter user_id=u1
//!
//! # Every match with its raw score
//! usearch search "weekly" --service notes --documents notes.json --raw
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use unified_search::adapter_json::JsonFileAdapter;
use unified_search::cache::EmbeddingCache;
use unified_search::config::{load_config, Config, DEFAULT_ENGINE_ID};
use unified_search::registry::SearchRegistry;
use unified_search_core::models::Filter;
use unified_search_core::search::SearchHit;

/// Unified Search CLI: multi-strategy search over service documents.
///
/// Without `--config`, built-in defaults are used (keyword strategy,
/// hash embeddings, memory-only embedding cache).
#[derive(Parser)]
#[command(name = "usearch", version, about = "Unified search engine diagnostics")]
struct Cli {
    /// Path to the configuration file (TOML, or JSON with a `.json` extension).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query against a service's engine.
    ///
    /// Documents are read from a JSON array of searchable documents; the
    /// file is re-read on every query.
    Search {
        /// The search query string.
        query: String,

        /// Service name used for configuration lookup.
        #[arg(long)]
        service: String,

        /// JSON file holding the service's documents.
        #[arg(long)]
        documents: PathBuf,

        /// Engine id (`default` or a custom engine id).
        #[arg(long, default_value = DEFAULT_ENGINE_ID)]
        engine: String,

        /// Override the engine's strategy for this run.
        #[arg(long)]
        strategy: Option<String>,

        /// JSON object merged over the strategy's configuration (requires `--strategy`).
        #[arg(long, requires = "strategy")]
        overrides: Option<String>,

        /// Metadata filter as `key=value`; repeat for a conjunction.
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Maximum number of matches (defaults to the strategy's `default_limit`).
        #[arg(long, conflicts_with = "raw")]
        limit: Option<usize>,

        /// Skip the score cutoff and result limit.
        #[arg(long)]
        raw: bool,

        /// Print the distinct original objects as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Print the merged configuration for an engine.
    Resolve {
        #[arg(long)]
        service: String,

        #[arg(long, default_value = DEFAULT_ENGINE_ID)]
        engine: String,
    },

    /// Inspect the persisted embedding cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Generate shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Load the cache file and print its counters.
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            query,
            service,
            documents,
            engine,
            strategy,
            overrides,
            filters,
            limit,
            raw,
            json,
        } => {
            let filter = parse_filters(&filters)?;
            let overrides: Option<Value> = overrides
                .map(|s| serde_json::from_str(&s).with_context(|| "--overrides must be valid JSON"))
                .transpose()?;

            let registry = SearchRegistry::from_config(load(&cli.config)?)?;
            registry.register_adapter(service.clone(), Arc::new(JsonFileAdapter::new(service.clone(), documents)));

            let manager = registry.manager(&service)?;
            let engine = match &strategy {
                Some(name) => manager.override_strategy_for_engine(name, &engine, overrides.as_ref())?,
                None => manager.get_engine(&engine)?,
            };

            if json {
                let objects = if raw {
                    unified_search_core::search::unique_objects(&engine.raw_search(&query, &filter)?, None)
                } else {
                    engine.search(&query, &filter, limit)?
                };
                println!("{}", serde_json::to_string_pretty(&objects)?);
            } else {
                let hits = if raw {
                    engine.raw_search(&query, &filter)?
                } else {
                    engine.search_hits(&query, &filter, limit)?
                };
                print_hits(&hits);
            }

            registry.flush_cache();
        }
        Commands::Resolve { service, engine } => {
            let resolved = load(&cli.config)?.resolve_engine(&service, &engine)?;
            let settings = resolved.settings()?;
            let out = serde_json::json!({
                "service": service,
                "engine_id": resolved.engine_id,
                "strategy": resolved.strategy,
                "metadata": resolved.metadata,
                "strategy_configs": settings,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Cache { action: CacheAction::Stats } => {
            let cfg = load(&cli.config)?;
            let cache = EmbeddingCache::from_config(&cfg.embedding.cache);
            let stats = cache.stats();
            match cache.path() {
                Some(path) => println!("path: {}", path.display()),
                None => println!("path: (memory only)"),
            }
            println!("capacity: {}", cache.capacity());
            println!("entries: {}", stats.entries);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "usearch", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn load(path: &Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

/// Parse `key=value` pairs. Values that parse as JSON (numbers, booleans)
/// keep that type; anything else is a string.
fn parse_filters(pairs: &[String]) -> Result<Filter> {
    let mut filter = Filter::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid filter '{}': expected key=value", pair);
        };
        if key.is_empty() {
            bail!("Invalid filter '{}': empty key", pair);
        }
        let value = match serde_json::from_str::<Value>(value) {
            Ok(v) if !v.is_object() && !v.is_array() => v,
            _ => Value::String(value.to_string()),
        };
        filter.insert(key.to_string(), value);
    }
    Ok(filter)
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, hit.score, hit.chunk.chunk_id);
        println!(
            "    excerpt: \"{}\"",
            excerpt(&hit.chunk.text_content, 120).replace('\n', " ").trim()
        );
        if let Some(parent) = &hit.chunk.parent_doc_id {
            println!("    parent: {}", parent);
        }
        println!("    object: {}", hit.chunk.original_json_obj);
        println!();
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filters_types() {
        let filter = parse_filters(&[
            "user_id=u1".to_string(),
            "priority=3".to_string(),
            "archived=false".to_string(),
        ])
        .unwrap();
        assert_eq!(filter.get("user_id"), Some(&Value::from("u1")));
        assert_eq!(filter.get("priority"), Some(&Value::from(3)));
        assert_eq!(filter.get("archived"), Some(&Value::from(false)));
    }

    #[test]
    fn test_parse_filters_rejects_malformed() {
        assert!(parse_filters(&["novalue".to_string()]).is_err());
        assert!(parse_filters(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("abcdef", 3), "abc…");
    }
}
