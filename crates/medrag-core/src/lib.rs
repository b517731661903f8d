//! # medrag core
//!
//! Shared, I/O-free logic for medrag: data models, text cleaning,
//! boundary-aware chunking, the chunk store, keyword source routing,
//! retrieval, relevance scoring, and grounding-context assembly.
//!
//! Embedding, vector storage, and text generation are modelled as traits
//! ([`embedding::Embedder`], [`index::VectorIndex`], [`llm::LanguageModel`]).
//! Network-backed implementations live in the `medrag` application crate;
//! this crate only ships the in-memory [`index::memory::InMemoryIndex`].
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies.

pub mod chunk;
pub mod clean;
pub mod context;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod models;
pub mod relevance;
pub mod retrieve;
pub mod router;
pub mod store;
