//! # medrag
//!
//! Retrieval-augmented question answering over medical-device manuals.
//!
//! PDF manuals are extracted, cleaned, and split into overlapping chunks;
//! chunks are embedded into a vector index. Questions are routed to a
//! likely source manual, matched against the index, filtered by relevance,
//! and answered by a language model that sees only the matched passages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────────┐   ┌──────────────┐
//! │ documents/  │──▶│ clean + split   │──▶│ vector index │
//! │   *.pdf     │   │ embed (batched) │   │ mem/Pinecone │
//! └─────────────┘   └────────┬────────┘   └──────┬───────┘
//!                            ▼                   │
//!                     ┌─────────────┐            │
//!                     │ chunk store │◀───────────┤
//!                     └─────────────┘            ▼
//!                 ┌──────────┐            ┌──────────┐
//!                 │   CLI    │            │   HTTP   │
//!                 │ (medrag) │            │  (axum)  │
//!                 └──────────┘            └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`commands`] | CLI command implementations |
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | [`RagError`](error::RagError) taxonomy |
//! | [`embedding`] | OpenAI and Ollama embedding clients |
//! | [`llm`] | OpenAI chat client |
//! | [`pinecone`] | Pinecone REST vector index |
//! | [`extract`] | PDF text extraction |
//! | [`rag`] | The [`RagService`](rag::RagService) orchestrator |
//! | [`server`] | HTTP API |
//! | [`logging`] | Tracing subscriber setup |
//!
//! Chunking, routing, scoring, and context assembly live in `medrag_core`.

pub mod commands;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod llm;
pub mod logging;
pub mod pinecone;
pub mod rag;
mod retry;
pub mod server;
