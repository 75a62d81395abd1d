//! # Quarry CLI (`qry`)
//!
//! The `qry` binary drives the full pipeline: corpus ingestion, index
//! building, chunk retrieval, and grounded question answering.
//!
//! ## Usage
//!
//! ```bash
//! qry --config ./config/qry.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qry ingest` | Pull all configured sources into the combined corpus file |
//! | `qry build` | Chunk and embed the corpus, persist the vector index |
//! | `qry search "<query>"` | Ranked nearest-neighbor chunk retrieval |
//! | `qry ask "<question>"` | Generate an answer grounded in retrieved chunks |
//! | `qry stats` | Corpus and index counts |
//!
//! ## Examples
//!
//! ```bash
//! # Assemble the corpus from JSONL files, PDFs, and Wikipedia
//! qry ingest --config ./config/qry.toml
//!
//! # Build the vector index (requires a running embedding provider)
//! qry build --config ./config/qry.toml
//!
//! # Retrieve the 5 closest chunks
//! qry search "battle of midway" --k 5
//!
//! # Ask a question answered only from the indexed documents
//! qry ask "when did the battle start?"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use quarry::answer::{AnswerAssembler, OllamaGenerator};
use quarry::artifact::Artifact;
use quarry::build::build_index;
use quarry::config::{load_config, Config};
use quarry::embedding::create_embedder;
use quarry::index::VectorIndex;
use quarry::ingest::run_ingest;
use quarry::retrieve::Retriever;
use quarry::sources::JsonlSource;
use quarry::store::DocumentStore;

/// Quarry — retrieval-augmented question answering over a local corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/qry.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "qry",
    about = "Quarry — retrieval-augmented question answering over a local document corpus",
    version,
    long_about = "Quarry ingests documents from JSONL files, PDF directories, and Wikipedia, \
    chunks and embeds them into a flat vector index, and answers questions grounded strictly \
    in the retrieved chunks via a local Ollama model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/qry.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Assemble the corpus file from all configured sources.
    ///
    /// Reads every configured JSONL file, PDF directory, and Wikipedia
    /// title, merges them with duplicate-id rejection, and writes the
    /// combined corpus as newline-delimited JSON.
    Ingest,

    /// Chunk, embed, and index the corpus.
    ///
    /// Reads the combined corpus file, expands documents into overlapping
    /// chunks, embeds them through the configured provider, and persists
    /// the index and its metadata atomically. Replaces any existing index.
    Build,

    /// Retrieve the chunks closest to a query.
    Search {
        /// The query text.
        query: String,

        /// Number of results to return. Defaults to `retrieval.top_k`.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a question grounded in retrieved chunks.
    ///
    /// Retrieves context, builds a grounding prompt, and asks the
    /// configured generator. When nothing relevant is indexed, prints a
    /// fixed not-found answer instead of inventing one.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of context chunks to retrieve. Defaults to `retrieval.top_k`.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Print corpus and index statistics.
    Stats,
}

/// Read the combined corpus file into a store.
async fn load_corpus(config: &Config) -> anyhow::Result<DocumentStore> {
    let source = JsonlSource::new(&config.corpus.file);
    let mut store = DocumentStore::new();
    let report = store
        .load_from(&source)
        .await
        .with_context(|| format!("failed to read corpus {}", config.corpus.file.display()))?;
    if report.skipped > 0 {
        eprintln!("[warn] {} corpus records skipped", report.skipped);
    }
    Ok(store)
}

/// Open the artifact and bind the configured embedder to it.
fn open_retriever(config: &Config, artifact: Artifact) -> anyhow::Result<Retriever> {
    let embedder = create_embedder(&config.embedding)?;
    Ok(Retriever::new(artifact, embedder)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest => {
            run_ingest(&cfg).await?;
        }
        Commands::Build => {
            let store = load_corpus(&cfg).await?;
            let embedder = create_embedder(&cfg.embedding)?;
            println!(
                "Building index from {} documents with {}...",
                store.len(),
                embedder.model_name()
            );

            let (artifact, report) = build_index(
                store.all(),
                &cfg.chunking,
                embedder.as_ref(),
                cfg.embedding.batch_size,
            )
            .await?;
            artifact.save(&cfg.index.dir)?;

            println!(
                "Indexed {} chunks from {} documents ({} skipped) into {}",
                report.chunks,
                report.documents,
                report.skipped_documents,
                cfg.index.dir.display()
            );
        }
        Commands::Search { query, k } => {
            let artifact = Artifact::open(&cfg.index.dir)
                .with_context(|| format!("no usable index in {}", cfg.index.dir.display()))?;
            let retriever = open_retriever(&cfg, artifact)?;

            let k = k.unwrap_or(cfg.retrieval.top_k);
            let results = retriever.search(&query, k).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for result in &results {
                let title = result.record.title().unwrap_or("untitled");
                println!(
                    "{}. [{:.4}] {} ({} / {})",
                    result.rank, result.score, title, result.record.source_tag, result.record.id
                );
                println!("   {}", result.preview(cfg.retrieval.preview_chars));
            }
        }
        Commands::Ask { question, k } => {
            let artifact = Artifact::open(&cfg.index.dir)
                .with_context(|| format!("no usable index in {}", cfg.index.dir.display()))?;
            let retriever = open_retriever(&cfg, artifact)?;
            let generator = OllamaGenerator::new(&cfg.generator)?;
            let assembler = AnswerAssembler::new(retriever, Box::new(generator));

            let k = k.unwrap_or(cfg.retrieval.top_k);
            let grounded = assembler.answer(&question, k).await?;

            println!("{}", grounded.answer);
            if !grounded.cited_chunks.is_empty() {
                println!();
                println!("Sources:");
                for cited in &grounded.cited_chunks {
                    let title = cited.record.title().unwrap_or("untitled");
                    println!(
                        "  {}. {} ({} / {})",
                        cited.rank, title, cited.record.source_tag, cited.record.id
                    );
                }
            }
        }
        Commands::Stats => {
            let store = load_corpus(&cfg).await?;
            println!("Corpus:  {} documents ({})", store.len(), cfg.corpus.file.display());

            match Artifact::open(&cfg.index.dir) {
                Ok(artifact) => {
                    let m = &artifact.manifest;
                    println!(
                        "Index:   {} chunks, {} dims, model {} (built {})",
                        m.count, m.dims, m.model, m.built_at
                    );
                    println!("         {} vectors in {}", artifact.index.len(), cfg.index.dir.display());
                }
                Err(e) => {
                    println!("Index:   not available ({})", e);
                }
            }
        }
    }

    Ok(())
}
