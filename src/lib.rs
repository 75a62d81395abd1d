//! # Quarry
//!
//! A local-first retrieval-augmented question-answering pipeline over a
//! document corpus.
//!
//! Quarry ingests documents from multiple sources (JSONL corpus files, PDF
//! directories, Wikipedia), chunks and embeds them into a flat vector
//! index, and answers questions grounded strictly in the retrieved chunks
//! via a local Ollama model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────┐
//! │   Sources    │──▶│    Builder    │──▶│   Artifact   │
//! │ jsonl/pdf/   │   │ chunk + embed │   │ vectors.bin │
//! │ wikipedia    │   │               │   │ chunks.json │
//! └──────────────┘   └───────────────┘   └──────┬──────┘
//!                                               │
//!                            ┌──────────────────┤
//!                            ▼                  ▼
//!                      ┌───────────┐     ┌────────────┐
//!                      │ Retriever │────▶│ Assembler  │
//!                      │  (search) │     │   (ask)    │
//!                      └───────────┘     └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qry ingest                    # pull sources into the corpus file
//! qry build                     # chunk, embed, and persist the index
//! qry search "battle of midway" # ranked chunk retrieval
//! qry ask "when did it start?"  # grounded answer via Ollama
//! qry stats                     # corpus and artifact counts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`sources`] | Document source collaborators |
//! | [`store`] | In-memory corpus with duplicate rejection |
//! | [`chunk`] | Deterministic overlapping-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Flat exact vector index |
//! | [`build`] | Corpus → artifact build pipeline |
//! | [`artifact`] | Persisted index + metadata pair |
//! | [`retrieve`] | Query-time nearest-neighbor retrieval |
//! | [`answer`] | Grounded answer assembly and generation |

pub mod answer;
pub mod artifact;
pub mod build;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod models;
pub mod retrieve;
pub mod sources;
pub mod store;
