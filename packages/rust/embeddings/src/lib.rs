//! Question embedding client for sitrep.
//!
//! The embeddings collaborator is an external service: it accepts an ordered
//! list of strings and returns one vector per input, same order. This crate
//! holds the trait seam, the HTTP client, and the batch keying logic that
//! turns the taxonomy index into a text → vector map.

use std::collections::HashMap;

use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};
use url::Url;

use sitrep_shared::{Result, SitrepError, TaxonomyIndex};

/// Default timeout in seconds. The whole question set goes out in one batch.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// User-Agent string for embedding requests.
const USER_AGENT: &str = concat!("sitrep/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Embedder seam
// ---------------------------------------------------------------------------

/// Batch embedding interface. Implementations must return exactly one vector
/// per input text, in input order.
pub trait Embedder {
    fn embed(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

/// HTTP-backed [`Embedder`] posting one JSON batch to the configured endpoint.
pub struct HttpEmbedder {
    client: Client,
    endpoint: Url,
}

impl HttpEmbedder {
    pub fn new(endpoint: Url) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(endpoint: Url, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SitrepError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }
}

impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbedRequest { inputs: texts })
            .send()
            .await
            .map_err(|e| SitrepError::Network(format!("embeddings request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitrepError::Network(format!(
                "embeddings request failed: HTTP {status}"
            )));
        }

        let vectors: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| SitrepError::Embeddings(format!("invalid response payload: {e}")))?;

        if vectors.len() != texts.len() {
            return Err(SitrepError::Embeddings(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        Ok(vectors)
    }
}

// ---------------------------------------------------------------------------
// Batch keying
// ---------------------------------------------------------------------------

/// Embed every problem text in the index with one batch call and key the
/// resulting vectors by text content.
///
/// Duplicate texts are submitted as-is and collapse to a single map entry
/// (last write wins); there is no deduplication safeguard. Failure of the
/// batch call is fatal.
#[instrument(skip_all, fields(questions = index.total_problems()))]
pub async fn embed_questions<E: Embedder>(
    index: &TaxonomyIndex,
    embedder: &E,
) -> Result<HashMap<String, Vec<f32>>> {
    let texts: Vec<String> = index
        .iter()
        .map(|(_, _, entry)| entry.problem_text.clone())
        .collect();

    if texts.is_empty() {
        return Ok(HashMap::new());
    }

    let vectors = embedder.embed(&texts).await?;

    let embeddings: HashMap<String, Vec<f32>> =
        texts.into_iter().zip(vectors).collect();

    info!(distinct = embeddings.len(), "question embeddings computed");
    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitrep_shared::ProblemEntry;

    /// Returns `[position, text length]` for each input so tests can check
    /// positional re-association.
    struct PositionalEmbedder;

    impl Embedder for PositionalEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, t)| vec![i as f32, t.len() as f32])
                .collect())
        }
    }

    fn index_with(entries: &[(&str, &str)]) -> TaxonomyIndex {
        let mut index = TaxonomyIndex::new();
        for (key, text) in entries {
            index.insert(
                "Matrix 1D",
                key.to_string(),
                ProblemEntry {
                    problem_text: text.to_string(),
                    tags: vec![key.to_string()],
                },
            );
        }
        index
    }

    #[tokio::test]
    async fn embeddings_keyed_by_text() {
        let index = index_with(&[("A->B->P1", "first question"), ("A->B->P2", "second")]);
        let embeddings = embed_questions(&index, &PositionalEmbedder).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings["first question"][1], 14.0);
        assert_eq!(embeddings["second"][1], 6.0);
    }

    #[tokio::test]
    async fn duplicate_texts_collapse_to_one_entry() {
        let index = index_with(&[("A->B->P1", "same question"), ("C->D->P2", "same question")]);
        let embeddings = embed_questions(&index, &PositionalEmbedder).await.unwrap();

        // Two submissions, one key — the later position survives
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings["same question"][0], 1.0);
    }

    #[tokio::test]
    async fn empty_index_yields_empty_map() {
        let index = TaxonomyIndex::new();
        let embeddings = embed_questions(&index, &PositionalEmbedder).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[tokio::test]
    async fn http_embedder_round_trip() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/embed"))
            .and(wiremock::matchers::body_json(serde_json::json!({
                "inputs": ["a", "bb"],
            })))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([[0.1, 0.2], [0.3, 0.4]])),
            )
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/embed", server.uri())).unwrap();
        let embedder = HttpEmbedder::new(endpoint).unwrap();
        let vectors = embedder.embed(&["a".into(), "bb".into()]).await.unwrap();

        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn http_embedder_length_mismatch_is_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([[0.1]])),
            )
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/embed", server.uri())).unwrap();
        let embedder = HttpEmbedder::new(endpoint).unwrap();
        let err = embedder
            .embed(&["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected 2 vectors"));
    }

    #[tokio::test]
    async fn http_embedder_server_error_is_fatal() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/embed", server.uri())).unwrap();
        let embedder = HttpEmbedder::new(endpoint).unwrap();
        let err = embedder.embed(&["a".into()]).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
    }
}
