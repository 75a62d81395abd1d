//! Document sources for ingestion.
//!
//! A [`DocumentSource`] scans an external location and yields normalized
//! [`Document`]s ready for the store. Sources are resilient by contract:
//! a malformed record, an unreadable PDF, or a missing Wikipedia page is
//! skipped with a warning and counted, never fatal for the whole run.
//!
//! Built-in sources:
//! - [`JsonlSource`] — newline-delimited JSON corpus files.
//! - [`PdfDirSource`] — a directory of PDF files, text-extracted.
//! - [`WikipediaSource`] — plaintext extracts from the MediaWiki API for a
//!   configured title list.

use async_trait::async_trait;
use globset::Glob;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use crate::error::{QuarryError, Result};
use crate::models::Document;

/// Documents fetched from one source, with the number of records that had
/// to be skipped.
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub documents: Vec<Document>,
    pub skipped: usize,
}

/// A data source that produces documents for ingestion.
///
/// `fetch` returns every readable document; per-record problems are warned
/// to stderr and tallied in [`SourceBatch::skipped`]. Only source-level
/// failures (the corpus file itself missing, the PDF directory absent) are
/// errors.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Source name used in ingest reports (e.g. `jsonl:data/wiki.jsonl`).
    fn name(&self) -> String;

    /// Scan the source and return all readable documents.
    async fn fetch(&self) -> Result<SourceBatch>;
}

// ============ JSONL source ============

/// Reads documents from a newline-delimited JSON file, one document per
/// line. Blank lines are ignored; unparseable lines and records without an
/// `id` are skipped with a warning.
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocumentSource for JsonlSource {
    fn name(&self) -> String {
        format!("jsonl:{}", self.path.display())
    }

    async fn fetch(&self) -> Result<SourceBatch> {
        let content = std::fs::read_to_string(&self.path)?;
        let mut batch = SourceBatch::default();

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Document>(line) {
                Ok(doc) if !doc.id.is_empty() => batch.documents.push(doc),
                Ok(_) => {
                    eprintln!(
                        "[warn] {}:{}: record has no id, skipping",
                        self.path.display(),
                        lineno + 1
                    );
                    batch.skipped += 1;
                }
                Err(e) => {
                    eprintln!(
                        "[warn] {}:{}: invalid JSON ({}), skipping",
                        self.path.display(),
                        lineno + 1,
                        e
                    );
                    batch.skipped += 1;
                }
            }
        }

        Ok(batch)
    }
}

// ============ PDF directory source ============

/// Walks a directory for PDF files and extracts their text.
///
/// Document ids are derived from the file stem (`pdf_{stem}`), so re-running
/// ingest over the same directory yields the same ids. Files whose text
/// cannot be extracted are skipped with a warning.
pub struct PdfDirSource {
    dir: PathBuf,
}

impl PdfDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DocumentSource for PdfDirSource {
    fn name(&self) -> String {
        format!("pdf:{}", self.dir.display())
    }

    async fn fetch(&self) -> Result<SourceBatch> {
        if !self.dir.exists() {
            return Err(QuarryError::InvalidParameter(format!(
                "PDF directory does not exist: {}",
                self.dir.display()
            )));
        }

        let matcher = Glob::new("**/*.pdf")
            .map_err(|e| QuarryError::InvalidParameter(e.to_string()))?
            .compile_matcher();

        let mut batch = SourceBatch::default();

        for entry in WalkDir::new(&self.dir).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    eprintln!("[warn] pdf walk: {}, skipping", e);
                    batch.skipped += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&self.dir).unwrap_or(entry.path());
            if !matcher.is_match(rel) {
                continue;
            }

            match pdf_document(entry.path()) {
                Ok(doc) => batch.documents.push(doc),
                Err(e) => {
                    eprintln!(
                        "[warn] pdf {}: {}, skipping",
                        entry.path().display(),
                        e
                    );
                    batch.skipped += 1;
                }
            }
        }

        Ok(batch)
    }
}

fn pdf_document(path: &Path) -> anyhow::Result<Document> {
    let bytes = std::fs::read(path)?;
    let text = pdf_extract::extract_text_from_mem(&bytes)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace([' ', '-'], "_"))
        .unwrap_or_else(|| "unnamed".to_string());
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut metadata = serde_json::Map::new();
    metadata.insert("filename".to_string(), filename.into());
    metadata.insert(
        "ingested_at".to_string(),
        chrono::Utc::now().to_rfc3339().into(),
    );

    Ok(Document {
        id: format!("pdf_{}", stem),
        text,
        source_tag: "pdf".to_string(),
        metadata,
    })
}

// ============ Wikipedia source ============

/// Fetches plaintext article extracts from the MediaWiki API for a
/// configured list of titles.
///
/// Each article becomes one document with id `wiki_{pageid}`. Missing pages,
/// empty extracts, and per-title HTTP errors are skipped with a warning.
pub struct WikipediaSource {
    titles: Vec<String>,
    lang: String,
    timeout_secs: u64,
}

impl WikipediaSource {
    pub fn new(titles: Vec<String>, lang: impl Into<String>, timeout_secs: u64) -> Self {
        Self { titles, lang: lang.into(), timeout_secs }
    }

    async fn fetch_page(
        &self,
        client: &reqwest::Client,
        title: &str,
    ) -> anyhow::Result<Option<Document>> {
        let url = format!("https://{}.wikipedia.org/w/api.php", self.lang);
        let resp = client
            .get(&url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .send()
            .await?
            .error_for_status()?;

        let json: serde_json::Value = resp.json().await?;
        let pages = json
            .get("query")
            .and_then(|q| q.get("pages"))
            .and_then(|p| p.as_object());
        let Some(pages) = pages else {
            return Ok(None);
        };
        let Some(page) = pages.values().next() else {
            return Ok(None);
        };
        if page.get("missing").is_some() {
            return Ok(None);
        }

        let extract = page
            .get("extract")
            .and_then(|e| e.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        if extract.is_empty() {
            return Ok(None);
        }

        let normalized_title = page
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or(title)
            .to_string();
        let pageid = page.get("pageid").and_then(|p| p.as_u64());

        let id = match pageid {
            Some(pid) => format!("wiki_{}", pid),
            None => format!("wiki_{}", normalized_title.replace(' ', "_")),
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("title".to_string(), normalized_title.into());
        metadata.insert("lang".to_string(), self.lang.clone().into());
        if let Some(pid) = pageid {
            metadata.insert("pageid".to_string(), pid.into());
            metadata.insert(
                "url".to_string(),
                format!("https://{}.wikipedia.org/?curid={}", self.lang, pid).into(),
            );
        }
        metadata.insert("original_query".to_string(), title.into());
        metadata.insert(
            "ingested_at".to_string(),
            chrono::Utc::now().to_rfc3339().into(),
        );

        Ok(Some(Document {
            id,
            text: extract,
            source_tag: "wikipedia".to_string(),
            metadata,
        }))
    }
}

#[async_trait]
impl DocumentSource for WikipediaSource {
    fn name(&self) -> String {
        format!("wikipedia:{}", self.lang)
    }

    async fn fetch(&self) -> Result<SourceBatch> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("quarry/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| QuarryError::InvalidParameter(e.to_string()))?;

        let mut batch = SourceBatch::default();

        for title in &self.titles {
            match self.fetch_page(&client, title).await {
                Ok(Some(doc)) => batch.documents.push(doc),
                Ok(None) => {
                    eprintln!("[warn] wikipedia: no extract for '{}', skipping", title);
                    batch.skipped += 1;
                }
                Err(e) => {
                    eprintln!("[warn] wikipedia: '{}' failed ({}), skipping", title, e);
                    batch.skipped += 1;
                }
            }
        }

        Ok(batch)
    }
}
