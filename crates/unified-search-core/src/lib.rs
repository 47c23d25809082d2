//! # Unified Search Core
//!
//! Shared, I/O-free building blocks for the unified search engine
//! framework: the document and chunk model, content-addressed identity,
//! metadata filtering, and the collaborator traits (adapter, embedder,
//! vector store) that the engine crate wires together.
//!
//! This crate performs no filesystem or network access. Persistence of
//! the embedding cache and the concrete embedding clients live in the
//! `unified-search` crate.

pub mod adapter;
pub mod chunk;
pub mod embedding;
pub mod filter;
pub mod models;
pub mod search;
pub mod store;
