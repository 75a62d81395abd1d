//! Grounded answer generation.
//!
//! The assembler formats retrieved chunks into a context prompt, sends it
//! to a [`Generator`], and returns the answer together with the chunks it
//! was grounded on. The grounding contract: the generator is instructed to
//! answer only from the supplied context and to say so when the context
//! does not contain the answer. When retrieval comes back empty there is
//! nothing to ground on, so the assembler short-circuits with a fixed
//! not-found answer instead of inviting the model to improvise.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::config::GeneratorConfig;
use crate::error::{QuarryError, Result};
use crate::models::{ChatMessage, QueryResult};
use crate::retrieve::Retriever;

/// Answer returned when retrieval finds no grounding context. The generator
/// is never consulted in that case.
pub const NOT_FOUND_ANSWER: &str = "The answer does not appear in the indexed documents.";

const SYSTEM_PROMPT: &str = "You are a precise assistant answering questions about a document \
collection. Answer the user's question directly and concisely, using only the context you are \
given. If the context does not contain the answer, say so clearly instead of inventing one.";

/// A chat-completion backend. Implementations own their transport, model
/// selection, and timeout handling.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Backend name used in error messages.
    fn name(&self) -> &str;

    /// Run one completion over `messages` and return the reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Generator backed by Ollama's `/api/chat` endpoint.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
    timeout_secs: u64,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QuarryError::GenerationFailure {
                provider: "ollama".to_string(),
                message: format!("failed to build http client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuarryError::GenerationTimeout {
                        provider: "ollama".to_string(),
                        secs: self.timeout_secs,
                    }
                } else {
                    QuarryError::GenerationFailure {
                        provider: "ollama".to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuarryError::GenerationFailure {
                provider: "ollama".to_string(),
                message: format!("{} returned {}: {}", url, status, body),
            });
        }

        // The client timeout covers the body read too; a reply that stalls
        // mid-body is still a timeout, not a malformed response.
        let body: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                QuarryError::GenerationTimeout {
                    provider: "ollama".to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                QuarryError::GenerationFailure {
                    provider: "ollama".to_string(),
                    message: format!("unreadable response: {}", e),
                }
            }
        })?;
        body.pointer("/message/content")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| QuarryError::GenerationFailure {
                provider: "ollama".to_string(),
                message: "response has no message.content field".to_string(),
            })
    }
}

/// An answer plus the retrieval results it was grounded on.
#[derive(Debug, Serialize)]
pub struct GroundedAnswer {
    pub question: String,
    pub answer: String,
    pub cited_chunks: Vec<QueryResult>,
}

/// Formats retrieval output into prompts and delegates to a [`Generator`].
pub struct AnswerAssembler {
    retriever: Retriever,
    generator: Box<dyn Generator>,
}

impl AnswerAssembler {
    pub fn new(retriever: Retriever, generator: Box<dyn Generator>) -> Self {
        Self { retriever, generator }
    }

    /// Build the user prompt from a question and its retrieved context.
    ///
    /// Each chunk is prefixed with a `[source: ... | title: ...]` tag and
    /// chunks are separated by `---` rules; full chunk texts go in, never
    /// previews.
    pub fn assemble(query: &str, retrieved: &[QueryResult]) -> String {
        let mut blocks = Vec::with_capacity(retrieved.len());
        for result in retrieved {
            let mut tag = format!("[source: {}", result.record.source_tag);
            if let Some(title) = result.record.title() {
                tag.push_str(&format!(" | title: {}", title));
            }
            tag.push(']');
            blocks.push(format!("{}\n{}", tag, result.record.text));
        }
        let context = blocks.join("\n\n---\n\n");

        format!(
            "Use ONLY the following context to answer the question. If the answer is not \
clearly present in the context, say that it does not appear in the documents.\n\n\
Context:\n{}\n\nQuestion:\n{}\n\nAnswer clearly and briefly.",
            context, query
        )
    }

    /// Retrieve, assemble, and generate a grounded answer.
    ///
    /// Retrieval errors propagate unchanged. Generator errors propagate as
    /// [`QuarryError::GenerationFailure`] or
    /// [`QuarryError::GenerationTimeout`]; they are never replaced with a
    /// fabricated answer.
    pub async fn answer(&self, query: &str, k: usize) -> Result<GroundedAnswer> {
        let retrieved = self.retriever.search(query, k).await?;
        if retrieved.is_empty() {
            return Ok(GroundedAnswer {
                question: query.to_string(),
                answer: NOT_FOUND_ANSWER.to_string(),
                cited_chunks: retrieved,
            });
        }

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(Self::assemble(query, &retrieved)),
        ];
        let answer = self.generator.complete(&messages).await?;

        Ok(GroundedAnswer {
            question: query.to_string(),
            answer,
            cited_chunks: retrieved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{text_hash, Artifact};
    use crate::embedding::StubEmbedder;
    use crate::index::{FlatIndex, VectorIndex};
    use crate::models::ChunkRecord;
    use std::sync::{Arc, Mutex};

    struct ScriptedGenerator {
        reply: String,
        seen: Arc<Mutex<Vec<ChatMessage>>>,
    }

    impl ScriptedGenerator {
        fn new(reply: &str) -> Self {
            Self { reply: reply.to_string(), seen: Arc::new(Mutex::new(Vec::new())) }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.lock().unwrap().extend(messages.iter().cloned());
            Ok(self.reply.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Err(QuarryError::GenerationFailure {
                provider: "failing".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    fn result(i: usize, source: &str, title: Option<&str>, text: &str) -> QueryResult {
        let mut metadata = serde_json::Map::new();
        if let Some(t) = title {
            metadata.insert("title".to_string(), t.into());
        }
        QueryResult {
            rank: i + 1,
            score: i as f32,
            record: ChunkRecord {
                id: format!("d_chunk{}", i),
                parent_id: "d".to_string(),
                chunk_index: i,
                text: text.to_string(),
                source_tag: source.to_string(),
                metadata,
                hash: text_hash(text),
            },
        }
    }

    fn retriever_for(texts: &[&str]) -> Retriever {
        let embedder = StubEmbedder::new(8);
        let mut index = FlatIndex::new(8);
        let vectors: Vec<Vec<f32>> = texts.iter().map(|t| embedder.vector_for(t)).collect();
        index.add(&vectors).unwrap();
        let records: Vec<ChunkRecord> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| result(i, "test", None, t).record)
            .collect();
        let artifact = Artifact::new(index, records, "stub-embedder").unwrap();
        Retriever::new(artifact, Box::new(StubEmbedder::new(8))).unwrap()
    }

    #[test]
    fn test_assemble_tags_and_separates_chunks() {
        let retrieved = vec![
            result(0, "wikipedia", Some("Battle of X"), "first chunk text"),
            result(1, "pdf", None, "second chunk text"),
        ];
        let prompt = AnswerAssembler::assemble("what happened?", &retrieved);

        assert!(prompt.contains("[source: wikipedia | title: Battle of X]\nfirst chunk text"));
        assert!(prompt.contains("[source: pdf]\nsecond chunk text"));
        assert!(prompt.contains("\n\n---\n\n"));
        assert!(prompt.contains("what happened?"));
        assert!(prompt.contains("ONLY"));
    }

    #[test]
    fn test_assemble_uses_full_text_not_previews() {
        let long_text = "x".repeat(5000);
        let retrieved = vec![result(0, "pdf", None, &long_text)];
        let prompt = AnswerAssembler::assemble("q", &retrieved);
        assert!(prompt.contains(&long_text));
    }

    #[tokio::test]
    async fn test_answer_carries_cited_chunks() {
        let assembler = AnswerAssembler::new(
            retriever_for(&["alpha", "beta", "gamma"]),
            Box::new(ScriptedGenerator::new("the answer is alpha")),
        );
        let grounded = assembler.answer("alpha", 2).await.unwrap();

        assert_eq!(grounded.answer, "the answer is alpha");
        assert_eq!(grounded.question, "alpha");
        assert_eq!(grounded.cited_chunks.len(), 2);
        assert_eq!(grounded.cited_chunks[0].record.text, "alpha");
    }

    #[tokio::test]
    async fn test_answer_sends_system_and_user_messages() {
        let generator = ScriptedGenerator::new("ok");
        let seen_handle = Arc::clone(&generator.seen);
        let assembler = AnswerAssembler::new(retriever_for(&["alpha"]), Box::new(generator));
        assembler.answer("alpha", 1).await.unwrap();

        let seen = seen_handle.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, "system");
        assert_eq!(seen[1].role, "user");
        assert!(seen[1].content.contains("alpha"));
    }

    #[tokio::test]
    async fn test_stalled_response_body_is_a_timeout() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            // Headers promise a body that never fully arrives.
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 1000\r\n\r\n{",
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = GeneratorConfig {
            base_url: format!("http://{}", addr),
            timeout_secs: 1,
            ..GeneratorConfig::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        let err = generator
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        server.abort();

        match err {
            QuarryError::GenerationTimeout { provider, secs } => {
                assert_eq!(provider, "ollama");
                assert_eq!(secs, 1);
            }
            other => panic!("expected GenerationTimeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generator_errors_propagate() {
        let assembler =
            AnswerAssembler::new(retriever_for(&["alpha"]), Box::new(FailingGenerator));
        let err = assembler.answer("alpha", 1).await.unwrap_err();
        assert!(matches!(err, QuarryError::GenerationFailure { .. }));
    }

    #[tokio::test]
    async fn test_retrieval_errors_propagate() {
        let assembler =
            AnswerAssembler::new(retriever_for(&["alpha"]), Box::new(FailingGenerator));
        let err = assembler.answer("alpha", 0).await.unwrap_err();
        assert!(matches!(err, QuarryError::InvalidParameter(_)));
    }
}
