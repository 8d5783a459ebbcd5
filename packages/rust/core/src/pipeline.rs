//! End-to-end assessment generation: taxonomy → embeddings → per-document
//! answer synthesis → persisted results table.
//!
//! The loop is strictly sequential. Taxonomy and embedding failures abort
//! the run; a synthesis failure only costs its `(document, problem)` pair.
//! The results table is rewritten after every document, so a crash
//! mid-document reprocesses that document from scratch on the next run.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

use sitrep_embeddings::{Embedder, embed_questions};
use sitrep_rag::{AnswerSynthesizer, RagRequest, country_context};
use sitrep_results::ResultsStore;
use sitrep_shared::{PassageRow, Result, SitrepError};
use sitrep_taxonomy::{DatasetClient, load_level2_problems, write_tasks_file};

use crate::annotate::{AnnotationContext, annotate};
use crate::documents::DocumentsTable;
use crate::filter::matches_all_tags;

/// Configuration for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Taxonomy dataset name on the dataset server.
    pub dataset_name: String,
    /// Dataset server base URL.
    pub dataset_endpoint: Url,
    /// Dataset access token, if the taxonomy dataset is gated.
    pub dataset_token: Option<String>,
    /// Path of the persisted results CSV.
    pub results_path: PathBuf,
    /// Path of the task → tag-list JSON side file.
    pub tasks_file: PathBuf,
    /// Documents to process. Ids already present in the results table are
    /// skipped.
    pub doc_ids: Vec<String>,
    /// Number of retrieved passages the RAG collaborator keeps.
    pub retrieval_depth: usize,
    /// Columns forwarded verbatim to the RAG collaborator.
    pub passthrough_columns: Vec<String>,
}

/// Summary of a completed generation run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Documents processed this run.
    pub docs_processed: usize,
    /// Result rows appended this run.
    pub rows_written: usize,
    /// `(document, problem)` pairs lost to synthesis failures.
    pub triples_failed: usize,
    /// Requested documents skipped because they were already treated.
    pub docs_skipped: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per `(document, problem)` pair, whether or not it
    /// produced a row.
    fn triple_done(&self, doc_id: &str, problem_title: &str, current: u64, total: u64);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn triple_done(&self, _doc_id: &str, _problem_title: &str, _current: u64, _total: u64) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Run the full generation pipeline.
///
/// 1. Load and reshape the taxonomy
/// 2. Embed every question in one batch
/// 3. Persist the task → tag mapping side file
/// 4. Open the results table, skip already-treated documents
/// 5. Per document: filter passages per problem, synthesize, annotate,
///    append and rewrite the table
#[instrument(skip_all, fields(dataset = %config.dataset_name, docs = config.doc_ids.len()))]
pub async fn generate_assessment_results<E: Embedder, R: AnswerSynthesizer>(
    config: &GenerateConfig,
    documents: &DocumentsTable,
    embedder: &E,
    rag: &R,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    let run_id = Uuid::now_v7();
    info!(%run_id, "starting assessment generation");

    progress.phase("Loading taxonomy");
    let client = DatasetClient::new(config.dataset_endpoint.clone())?;
    let (index, tasks_to_tags) = load_level2_problems(
        &client,
        &config.dataset_name,
        config.dataset_token.as_deref(),
    )
    .await?;

    progress.phase("Embedding questions");
    let embeddings = embed_questions(&index, embedder).await?;

    write_tasks_file(&config.tasks_file, &tasks_to_tags)?;

    progress.phase("Loading results table");
    let mut store = ResultsStore::open(&config.results_path)?;
    let treated = store.treated_doc_ids();

    let requested: BTreeSet<String> = config.doc_ids.iter().cloned().collect();
    let to_treat: Vec<String> = requested.difference(&treated).cloned().collect();

    let mut summary = RunSummary {
        docs_skipped: requested.len() - to_treat.len(),
        ..Default::default()
    };

    info!(
        requested = requested.len(),
        to_treat = to_treat.len(),
        skipped = summary.docs_skipped,
        problems = index.total_problems(),
        "documents resolved"
    );

    let columns = documents.columns();
    let total = (index.total_problems() * to_treat.len()) as u64;
    let mut current = 0u64;

    progress.phase("Generating answers");
    for doc_id in &to_treat {
        let slice = documents.slice(doc_id);
        if slice.is_empty() {
            return Err(SitrepError::validation(format!(
                "document {doc_id} has no passage rows"
            )));
        }
        let country = required_field(&slice, &columns.primary_country, doc_id)?;
        let doc_title = required_field(&slice, &columns.document_title, doc_id)?;

        let mut doc_rows = Vec::new();
        for (task, problem_title, entry) in index.iter() {
            let matched: Vec<PassageRow> = slice
                .iter()
                .filter(|row| {
                    matches_all_tags(
                        row.get(&columns.level2_problems).unwrap_or(""),
                        &entry.tags,
                    )
                })
                .map(|row| (*row).clone())
                .collect();

            if !matched.is_empty() {
                let vector = embeddings
                    .get(&entry.problem_text)
                    .cloned()
                    .ok_or_else(|| {
                        SitrepError::Embeddings(format!(
                            "no embedding for problem {problem_title:?}"
                        ))
                    })?;

                let request = RagRequest {
                    passages: matched,
                    question: entry.problem_text.clone(),
                    question_embedding: vector,
                    n_kept_entries: config.retrieval_depth,
                    additional_context: country_context(&country),
                    text_column: columns.text.clone(),
                    relevant_columns: config.passthrough_columns.clone(),
                };

                match rag.synthesize(&request).await {
                    Ok(answers) => match answers.into_iter().next() {
                        Some(answer) if !answer.is_no_answer() => {
                            let ctx = AnnotationContext {
                                task,
                                problem_title,
                                problem_questions: &entry.problem_text,
                                doc_id,
                                doc_title: &doc_title,
                                country: &country,
                            };
                            doc_rows.push(annotate(answer, &ctx)?);
                        }
                        // No-answer sentinel: dropped, never persisted
                        Some(_) => {}
                        None => {
                            warn!(
                                doc_id = %doc_id,
                                problem = problem_title,
                                "collaborator returned no answer records"
                            );
                            summary.triples_failed += 1;
                        }
                    },
                    Err(e) => {
                        warn!(
                            doc_id = %doc_id,
                            problem = problem_title,
                            passages = request.passages.len(),
                            error = %e,
                            "answer synthesis failed"
                        );
                        summary.triples_failed += 1;
                    }
                }
            }

            current += 1;
            progress.triple_done(doc_id, problem_title, current, total);
        }

        summary.rows_written += doc_rows.len();
        store.append(doc_rows)?;
        summary.docs_processed += 1;
    }

    summary.elapsed = start.elapsed();
    progress.done(&summary);

    info!(
        docs = summary.docs_processed,
        rows = summary.rows_written,
        failed = summary.triples_failed,
        skipped = summary.docs_skipped,
        elapsed_ms = summary.elapsed.as_millis(),
        "assessment generation complete"
    );

    Ok(summary)
}

/// Read a metadata column from the first passage of a document slice.
fn required_field(slice: &[&PassageRow], column: &str, doc_id: &str) -> Result<String> {
    slice[0]
        .get(column)
        .map(String::from)
        .ok_or_else(|| {
            SitrepError::validation(format!(
                "document {doc_id} is missing the {column:?} column"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use sitrep_rag::RagAnswer;
    use sitrep_shared::DocumentColumns;

    struct UnitEmbedder;

    impl Embedder for UnitEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Scripted synthesizer: answers per document id, records every call.
    struct ScriptedRag {
        sentinel_docs: BTreeSet<String>,
        fail_docs: BTreeSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRag {
        fn new() -> Self {
            Self {
                sentinel_docs: BTreeSet::new(),
                fail_docs: BTreeSet::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn called_doc_ids(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AnswerSynthesizer for ScriptedRag {
        async fn synthesize(&self, request: &RagRequest) -> Result<Vec<RagAnswer>> {
            let doc_id = request.passages[0].get("doc_id").unwrap_or("").to_string();
            self.calls.lock().unwrap().push(doc_id.clone());

            if self.fail_docs.contains(&doc_id) {
                return Err(SitrepError::Rag("synthesis backend unavailable".into()));
            }

            let final_answer = if self.sentinel_docs.contains(&doc_id) {
                "-".to_string()
            } else {
                format!("Synthesized answer for {doc_id}")
            };

            Ok(vec![RagAnswer {
                final_answer,
                extra: [("Document Source".to_string(), json!("OCHA"))]
                    .into_iter()
                    .collect(),
            }])
        }
    }

    async fn mock_taxonomy(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/rows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rows": [{
                    "row_idx": 0,
                    "row": {
                        "task": "Pillars 1D",
                        "level1": "Health",
                        "level2": "Access",
                        "problem": "P1",
                        "question(s)": "What limits access to care?",
                    },
                    "truncated_cells": [],
                }],
                "num_rows_total": 1,
            })))
            .mount(server)
            .await;
    }

    fn passage(doc_id: &str, tags: &str) -> PassageRow {
        [
            ("doc_id", doc_id),
            ("Primary Country", "Chad"),
            ("Document Title", "Flood report"),
            ("Level 2 Problems", tags),
            ("Extraction Text", "clinics unreachable"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn documents() -> DocumentsTable {
        DocumentsTable::new(
            vec![
                passage("d1", "Health->Access->P1"),
                passage("d2", "Health->Access->P1; Wash->Water"),
                passage("d3", "Unrelated->Tags"),
            ],
            DocumentColumns::default(),
        )
    }

    fn config(server: &MockServer, dir: &PathBuf, doc_ids: &[&str]) -> GenerateConfig {
        GenerateConfig {
            dataset_name: "acme/problems".into(),
            dataset_endpoint: Url::parse(&server.uri()).unwrap(),
            dataset_token: None,
            results_path: dir.join("results.csv"),
            tasks_file: dir.join("tasks.json"),
            doc_ids: doc_ids.iter().map(|d| d.to_string()).collect(),
            retrieval_depth: 15,
            passthrough_columns: vec!["Extraction Text".into(), "Document Source".into()],
        }
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("sitrep_pipeline_{}", Uuid::now_v7()))
    }

    #[tokio::test]
    async fn full_run_writes_annotated_rows() {
        let server = MockServer::start().await;
        mock_taxonomy(&server).await;
        let dir = temp_dir();

        let config = config(&server, &dir, &["d1"]);
        let rag = ScriptedRag::new();
        let summary = generate_assessment_results(
            &config,
            &documents(),
            &UnitEmbedder,
            &rag,
            &SilentProgress,
        )
        .await
        .expect("run succeeds");

        assert_eq!(summary.docs_processed, 1);
        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.triples_failed, 0);

        let store = ResultsStore::open(&config.results_path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.treated_doc_ids(), BTreeSet::from(["d1".to_string()]));

        // Annotation properties via the file itself
        let content = std::fs::read_to_string(&config.results_path).unwrap();
        assert!(content.contains("Synthesized answer for d1"));
        assert!(content.contains("Health->Access->P1"));
        assert!(content.contains("OCHA"));

        // Side file written alongside
        let tasks: sitrep_shared::TasksToTags =
            serde_json::from_str(&std::fs::read_to_string(&config.tasks_file).unwrap()).unwrap();
        assert_eq!(tasks["Pillars 1D"], vec!["Health->Access".to_string()]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn treated_documents_are_skipped() {
        let server = MockServer::start().await;
        mock_taxonomy(&server).await;
        let dir = temp_dir();
        let config = config(&server, &dir, &["d1", "d2"]);

        // First run treats d1 only
        let rag = ScriptedRag::new();
        let first = config.clone();
        let first = GenerateConfig {
            doc_ids: vec!["d1".into()],
            ..first
        };
        generate_assessment_results(&first, &documents(), &UnitEmbedder, &rag, &SilentProgress)
            .await
            .unwrap();

        // Second run requests both; d1 must not be reprocessed
        let rag = ScriptedRag::new();
        let summary = generate_assessment_results(
            &config,
            &documents(),
            &UnitEmbedder,
            &rag,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.docs_skipped, 1);
        assert_eq!(summary.docs_processed, 1);
        assert_eq!(rag.called_doc_ids(), vec!["d2".to_string()]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn synthesis_failure_only_costs_its_triple() {
        let server = MockServer::start().await;
        mock_taxonomy(&server).await;
        let dir = temp_dir();
        let config = config(&server, &dir, &["d1", "d2"]);

        let mut rag = ScriptedRag::new();
        rag.fail_docs.insert("d1".into());

        let summary = generate_assessment_results(
            &config,
            &documents(),
            &UnitEmbedder,
            &rag,
            &SilentProgress,
        )
        .await
        .expect("run still succeeds");

        assert_eq!(summary.triples_failed, 1);
        assert_eq!(summary.docs_processed, 2);
        assert_eq!(summary.rows_written, 1);

        let store = ResultsStore::open(&config.results_path).unwrap();
        assert_eq!(store.treated_doc_ids(), BTreeSet::from(["d2".to_string()]));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn sentinel_answers_are_never_persisted() {
        let server = MockServer::start().await;
        mock_taxonomy(&server).await;
        let dir = temp_dir();
        let config = config(&server, &dir, &["d1"]);

        let mut rag = ScriptedRag::new();
        rag.sentinel_docs.insert("d1".into());

        let summary = generate_assessment_results(
            &config,
            &documents(),
            &UnitEmbedder,
            &rag,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.rows_written, 0);
        assert_eq!(summary.triples_failed, 0);

        // The document produced no rows, so it stays eligible next run
        let store = ResultsStore::open(&config.results_path).unwrap();
        assert!(store.treated_doc_ids().is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn unmatched_document_makes_no_synthesis_calls() {
        let server = MockServer::start().await;
        mock_taxonomy(&server).await;
        let dir = temp_dir();
        let config = config(&server, &dir, &["d3"]);

        let rag = ScriptedRag::new();
        let summary = generate_assessment_results(
            &config,
            &documents(),
            &UnitEmbedder,
            &rag,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert!(rag.called_doc_ids().is_empty());
        assert_eq!(summary.docs_processed, 1);
        assert_eq!(summary.rows_written, 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn unknown_document_id_is_fatal() {
        let server = MockServer::start().await;
        mock_taxonomy(&server).await;
        let dir = temp_dir();
        let config = config(&server, &dir, &["missing-doc"]);

        let rag = ScriptedRag::new();
        let err = generate_assessment_results(
            &config,
            &documents(),
            &UnitEmbedder,
            &rag,
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("no passage rows"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn progress_advances_once_per_triple() {
        struct CountingProgress(Mutex<Vec<(u64, u64)>>);

        impl ProgressReporter for CountingProgress {
            fn phase(&self, _name: &str) {}
            fn triple_done(&self, _doc_id: &str, _title: &str, current: u64, total: u64) {
                self.0.lock().unwrap().push((current, total));
            }
            fn done(&self, _summary: &RunSummary) {}
        }

        let server = MockServer::start().await;
        mock_taxonomy(&server).await;
        let dir = temp_dir();
        // d3 matches nothing, but the counter still advances for it
        let config = config(&server, &dir, &["d1", "d3"]);

        let progress = CountingProgress(Mutex::new(Vec::new()));
        let rag = ScriptedRag::new();
        generate_assessment_results(&config, &documents(), &UnitEmbedder, &rag, &progress)
            .await
            .unwrap();

        let ticks = progress.0.lock().unwrap().clone();
        // 1 problem × 2 documents
        assert_eq!(ticks, vec![(1, 2), (2, 2)]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
