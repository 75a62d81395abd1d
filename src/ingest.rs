//! Corpus assembly from configured sources.
//!
//! Ingestion walks every configured [`DocumentSource`], merges the batches
//! into a [`DocumentStore`] that rejects id collisions, and writes the
//! combined corpus as one JSONL file. Per-record problems are skipped and
//! counted by the sources; only duplicate ids and I/O failures abort a run.

use crate::config::Config;
use crate::error::Result;
use crate::models::LoadReport;
use crate::sources::{DocumentSource, JsonlSource, PdfDirSource, WikipediaSource};
use crate::store::DocumentStore;

/// Totals across all sources for one ingestion run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestSummary {
    pub documents: usize,
    pub skipped: usize,
    pub sources: usize,
}

/// Instantiate the sources named in the config, in a fixed order: JSONL
/// files first, then the PDF directory, then Wikipedia. The order decides
/// which side of an id collision gets reported as the duplicate.
pub fn configured_sources(config: &Config) -> Vec<Box<dyn DocumentSource>> {
    let mut sources: Vec<Box<dyn DocumentSource>> = Vec::new();
    for path in &config.sources.jsonl {
        sources.push(Box::new(JsonlSource::new(path)));
    }
    if let Some(dir) = &config.sources.pdf_dir {
        sources.push(Box::new(PdfDirSource::new(dir)));
    }
    if let Some(wiki) = &config.sources.wikipedia {
        sources.push(Box::new(WikipediaSource::new(
            wiki.titles.clone(),
            wiki.lang.clone(),
            wiki.timeout_secs,
        )));
    }
    sources
}

/// Run every configured source and write the combined corpus file.
pub async fn run_ingest(config: &Config) -> Result<IngestSummary> {
    let sources = configured_sources(config);
    let mut store = DocumentStore::new();
    let mut summary = IngestSummary { sources: sources.len(), ..Default::default() };

    for source in &sources {
        println!("Ingesting from {}...", source.name());
        let LoadReport { loaded, skipped } = store.load_from(source.as_ref()).await?;
        println!("  {} loaded, {} skipped", loaded, skipped);
        summary.skipped += skipped;
    }
    summary.documents = store.len();

    if let Some(parent) = config.corpus.file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    store.save_jsonl(&config.corpus.file)?;
    println!(
        "Wrote {} documents to {} ({} sources, {} records skipped)",
        summary.documents,
        config.corpus.file.display(),
        summary.sources,
        summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ChunkingConfig, Config, CorpusConfig, EmbeddingConfig, GeneratorConfig, IndexConfig,
        RetrievalConfig, SourcesConfig,
    };
    use std::io::Write;

    fn config_with(jsonl: Vec<std::path::PathBuf>, corpus: std::path::PathBuf) -> Config {
        Config {
            corpus: CorpusConfig { file: corpus },
            index: IndexConfig { dir: std::path::PathBuf::from("unused") },
            chunking: ChunkingConfig { size: 800, overlap: 200 },
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generator: GeneratorConfig::default(),
            sources: SourcesConfig { jsonl, pdf_dir: None, wikipedia: None },
        }
    }

    #[tokio::test]
    async fn test_ingest_merges_jsonl_sources() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        let mut f = std::fs::File::create(&a).unwrap();
        writeln!(f, r#"{{"id":"d1","texto":"one","fuente":"test"}}"#).unwrap();
        writeln!(f, "not json at all").unwrap();
        let mut f = std::fs::File::create(&b).unwrap();
        writeln!(f, r#"{{"id":"d2","texto":"two","fuente":"test"}}"#).unwrap();

        let corpus = dir.path().join("out/corpus.jsonl");
        let config = config_with(vec![a, b], corpus.clone());
        let summary = run_ingest(&config).await.unwrap();

        assert_eq!(summary.documents, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.sources, 2);

        let written = std::fs::read_to_string(&corpus).unwrap();
        assert_eq!(written.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_ingest_rejects_cross_source_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        std::fs::write(&a, "{\"id\":\"same\",\"texto\":\"one\"}\n").unwrap();
        std::fs::write(&b, "{\"id\":\"same\",\"texto\":\"two\"}\n").unwrap();

        let config = config_with(vec![a, b], dir.path().join("corpus.jsonl"));
        let err = run_ingest(&config).await.unwrap_err();
        assert!(matches!(err, crate::error::QuarryError::DuplicateId(id) if id == "same"));
    }

    #[test]
    fn test_configured_sources_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with(
            vec![dir.path().join("a.jsonl")],
            dir.path().join("corpus.jsonl"),
        );
        config.sources.pdf_dir = Some(dir.path().join("pdfs"));

        let sources = configured_sources(&config);
        assert_eq!(sources.len(), 2);
        assert!(sources[0].name().starts_with("jsonl:"));
        assert!(sources[1].name().starts_with("pdf:"));
    }
}
