//! Remote taxonomy dataset client.
//!
//! Fetches the flat taxonomy table from a dataset server's `/rows` API,
//! one page at a time, with optional bearer-token authentication.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use sitrep_shared::{Result, SitrepError};

/// Rows fetched per request. The taxonomy table is small (hundreds of rows),
/// so a handful of pages covers it.
const PAGE_SIZE: usize = 100;

/// Default timeout in seconds for dataset requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for dataset requests.
const USER_AGENT: &str = concat!("sitrep/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// TaxonomyRow
// ---------------------------------------------------------------------------

/// One row of the source taxonomy table. Read-only input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyRow {
    /// Top-level category governing how the row is reshaped
    /// (e.g. `Pillars 1D`, `Pillars 2D`, `Sectors`).
    pub task: String,
    pub level1: String,
    pub level2: String,
    /// Problem name within the `level1->level2` group.
    pub problem: String,
    /// The question text registered for this problem.
    #[serde(rename = "question(s)")]
    pub questions: String,
}

// ---------------------------------------------------------------------------
// Wire types for the /rows API
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RowsPage {
    rows: Vec<RowEnvelope>,
    num_rows_total: u64,
}

#[derive(Debug, Deserialize)]
struct RowEnvelope {
    row: TaxonomyRow,
}

// ---------------------------------------------------------------------------
// DatasetClient
// ---------------------------------------------------------------------------

/// HTTP client for the dataset server's paginated `/rows` endpoint.
pub struct DatasetClient {
    client: Client,
    base: Url,
}

impl DatasetClient {
    /// Create a client against the given server base URL.
    pub fn new(base: Url) -> Result<Self> {
        Self::with_timeout(base, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(base: Url, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SitrepError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    /// Fetch every row of the `train` split of `dataset`.
    ///
    /// Failures propagate as fatal errors; there is no retry and no caching
    /// beyond the returned vector.
    #[instrument(skip_all, fields(dataset = dataset))]
    pub async fn fetch_rows(&self, dataset: &str, token: Option<&str>) -> Result<Vec<TaxonomyRow>> {
        let mut rows: Vec<TaxonomyRow> = Vec::new();

        loop {
            let page = self.fetch_page(dataset, token, rows.len()).await?;
            let fetched = page.rows.len();
            rows.extend(page.rows.into_iter().map(|envelope| envelope.row));

            debug!(
                fetched,
                collected = rows.len(),
                total = page.num_rows_total,
                "fetched taxonomy page"
            );

            if fetched == 0 || rows.len() as u64 >= page.num_rows_total {
                break;
            }
        }

        Ok(rows)
    }

    async fn fetch_page(
        &self,
        dataset: &str,
        token: Option<&str>,
        offset: usize,
    ) -> Result<RowsPage> {
        let url = self
            .base
            .join("rows")
            .map_err(|e| SitrepError::dataset(format!("invalid dataset endpoint: {e}")))?;

        let offset = offset.to_string();
        let length = PAGE_SIZE.to_string();
        let mut request = self.client.get(url).query(&[
            ("dataset", dataset),
            ("config", "default"),
            ("split", "train"),
            ("offset", offset.as_str()),
            ("length", length.as_str()),
        ]);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SitrepError::Network(format!("dataset rows request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitrepError::Network(format!(
                "dataset rows request for {dataset} failed: HTTP {status}"
            )));
        }

        response
            .json::<RowsPage>()
            .await
            .map_err(|e| SitrepError::dataset(format!("invalid rows payload: {e}")))
    }
}
