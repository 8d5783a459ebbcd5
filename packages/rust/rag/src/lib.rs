//! RAG collaborator client for sitrep.
//!
//! The retrieval-augmented-generation service is an external collaborator:
//! it receives a filtered set of document passages, one embedded question,
//! and retrieval parameters, and returns synthesized answer records. This
//! crate holds the request/response protocol types, the trait seam, and the
//! HTTP client. Retrieval, prompting, and inference all happen remotely.

use std::collections::BTreeMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use sitrep_shared::{PLACEHOLDER, PassageRow, Result, SitrepError};

/// Default timeout in seconds for one synthesis call.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// User-Agent string for RAG requests.
const USER_AGENT: &str = concat!("sitrep/", env!("CARGO_PKG_VERSION"));

/// Context hint sent with every question, parameterized by document country.
const COUNTRY_CONTEXT_TEMPLATE: &str = "The question aims at analyzing the humanitarian \
situation in {country}. The answer has to be self-contained, not needing other context \
to be understood.";

/// Render the fixed country context hint for a document's country.
pub fn country_context(country: &str) -> String {
    COUNTRY_CONTEXT_TEMPLATE.replace("{country}", country)
}

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// One synthesis request: filtered passages plus a single embedded question.
#[derive(Debug, Clone, Serialize)]
pub struct RagRequest {
    /// Passage rows that matched the problem's tags.
    pub passages: Vec<PassageRow>,
    /// The problem's question text.
    pub question: String,
    /// Embedding vector of `question`.
    pub question_embedding: Vec<f32>,
    /// Number of retrieved passages the collaborator keeps.
    pub n_kept_entries: usize,
    /// Free-text context hint (see [`country_context`]).
    pub additional_context: String,
    /// Column of `passages` holding the extraction text.
    pub text_column: String,
    /// Columns forwarded into the answer records.
    pub relevant_columns: Vec<String>,
}

/// One answer record from the collaborator. `final_answer` is guaranteed;
/// everything else is collaborator-chosen and carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub final_answer: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RagAnswer {
    /// True when the collaborator found no answer in the passages.
    pub fn is_no_answer(&self) -> bool {
        self.final_answer == PLACEHOLDER
    }
}

// ---------------------------------------------------------------------------
// AnswerSynthesizer seam
// ---------------------------------------------------------------------------

/// Answer synthesis interface. One call covers one `(document, problem)`
/// pair; the driver consumes the first returned record.
pub trait AnswerSynthesizer {
    fn synthesize(&self, request: &RagRequest) -> impl Future<Output = Result<Vec<RagAnswer>>>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// HTTP-backed [`AnswerSynthesizer`] posting one JSON request per call.
pub struct HttpRagClient {
    client: Client,
    endpoint: Url,
}

impl HttpRagClient {
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

impl AnswerSynthesizer for HttpRagClient {
    async fn synthesize(&self, request: &RagRequest) -> Result<Vec<RagAnswer>> {
        debug!(
            passages = request.passages.len(),
            depth = request.n_kept_entries,
            "posting synthesis request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| SitrepError::Network(format!("rag request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitrepError::Rag(format!(
                "synthesis request failed: HTTP {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SitrepError::Rag(format!("invalid response payload: {e}")))
    }
}
