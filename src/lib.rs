//! # Unified Search
//!
//! A pluggable, multi-strategy search layer shared by simulated service
//! backends. Each service exposes its live data through an
//! [`Adapter`](unified_search_core::adapter::Adapter); engines keep a
//! content-addressed chunk index in sync with it and answer substring,
//! keyword, fuzzy, semantic, and hybrid queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐  register_adapter  ┌──────────────────────┐
//! │ Service (CRUD) │───────────────────▶│    SearchRegistry    │
//! └────────────────┘                    │  one manager/service │
//!                                       └──────────┬───────────┘
//!                                                  ▼
//!                                       ┌──────────────────────┐
//!                                       │ SearchEngineManager  │
//!                                       │ default + custom ids │
//!                                       └──────────┬───────────┘
//!                                                  ▼
//!      ┌──────────┐  reconcile   ┌──────────────────────┐   ┌────────────────┐
//!      │ Adapter  │◀────────────│     SearchEngine     │──▶│    Strategy     │
//!      └──────────┘              └──────────────────────┘   └───────┬────────┘
//!                                                                    ▼
//!                                                          ┌──────────────────┐
//!                                                          │  EmbeddingCache  │
//!                                                          │  (shared, LRU)   │
//!                                                          └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Configuration parsing and the global → service → engine merge |
//! | [`registry`] | Process-wide adapter and manager registry |
//! | [`manager`] | Per-service engine registry |
//! | [`engine`] | Reconciliation and query entry points |
//! | [`strategy`] | Retrieval algorithms |
//! | [`cache`] | Disk-persisted LRU embedding cache |
//! | [`embedding`] | Embedding service backends |
//! | [`adapter_json`] | Adapter over a JSON documents file |
//! | [`error`] | Error taxonomy |

pub mod adapter_json;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod manager;
pub mod registry;
pub mod strategy;

pub use error::{Result, SearchError};
