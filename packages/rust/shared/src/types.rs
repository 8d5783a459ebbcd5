//! Core domain types for sitrep assessment runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Separator between hierarchy levels in taxonomy tags and entry keys
/// (e.g. `Impact->Drivers->Conflict`).
pub const TAG_SEPARATOR: &str = "->";

/// Placeholder written into result columns that do not apply to a row.
pub const PLACEHOLDER: &str = "-";

/// Fixed columns of the persisted results table, in output order.
/// Collaborator-supplied passthrough fields follow these in the CSV header.
pub const RESULT_COLUMNS: [&str; 12] = [
    "final_answer",
    "problem_title",
    "problem_questions",
    "doc_id",
    "doc_title",
    "task",
    "country",
    "pillar_level1_name",
    "pillar_level2_name",
    "pillar_level3_name",
    "sector_level1_name",
    "sector_level2_name",
];

// ---------------------------------------------------------------------------
// ProblemEntry / TaxonomyIndex
// ---------------------------------------------------------------------------

/// One analytical question group with the tags a document passage must carry
/// to be matched against it. Built once by the taxonomy loader, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemEntry {
    /// The question text submitted to the embeddings and RAG collaborators.
    pub problem_text: String,
    /// Tags that must all appear (as substrings) in a passage's tag field.
    pub tags: Vec<String>,
}

/// Mapping from task name (`Matrix 1D`, `Matrix 2D`) to entry key to
/// [`ProblemEntry`]. Keys are unique per task; iteration order is the map
/// order and carries no semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonomyIndex {
    tasks: BTreeMap<String, BTreeMap<String, ProblemEntry>>,
}

impl TaxonomyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry under `task`/`key`, replacing any previous entry
    /// with the same key.
    pub fn insert(&mut self, task: impl Into<String>, key: impl Into<String>, entry: ProblemEntry) {
        self.tasks
            .entry(task.into())
            .or_default()
            .insert(key.into(), entry);
    }

    /// Entries registered under one task.
    pub fn task(&self, task: &str) -> Option<&BTreeMap<String, ProblemEntry>> {
        self.tasks.get(task)
    }

    /// Task names present in the index.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Iterate `(task, entry_key, entry)` triples across every task.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &ProblemEntry)> {
        self.tasks.iter().flat_map(|(task, entries)| {
            entries
                .iter()
                .map(move |(key, entry)| (task.as_str(), key.as_str(), entry))
        })
    }

    /// Total number of entries across all tasks.
    pub fn total_problems(&self) -> usize {
        self.tasks.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.values().all(BTreeMap::is_empty)
    }
}

/// Raw `task → ordered unique tag list` mapping, persisted as a JSON side
/// file for downstream consumers. Tag order is first-seen dataset order.
pub type TasksToTags = BTreeMap<String, Vec<String>>;

// ---------------------------------------------------------------------------
// PassageRow
// ---------------------------------------------------------------------------

/// One extracted passage of a source document, keyed by the (configurable)
/// column names of the documents table. Read-only input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassageRow(pub BTreeMap<String, String>);

impl PassageRow {
    /// Value of one column, if present.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for PassageRow {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// DocumentColumns
// ---------------------------------------------------------------------------

/// Column names of the documents table. Overridable because the upstream
/// extraction pipeline controls the header row, not this tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentColumns {
    /// Unique identifier grouping all passages of one source document.
    pub doc_id: String,
    /// Country the document primarily covers.
    pub primary_country: String,
    /// Human-readable document title.
    pub document_title: String,
    /// Free-text field carrying the level-2 problem tags of a passage.
    pub level2_problems: String,
    /// The extracted passage text submitted to the RAG collaborator.
    pub text: String,
}

impl Default for DocumentColumns {
    fn default() -> Self {
        Self {
            doc_id: "doc_id".into(),
            primary_country: "Primary Country".into(),
            document_title: "Document Title".into(),
            level2_problems: "Level 2 Problems".into(),
            text: "Extraction Text".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AssessmentRow
// ---------------------------------------------------------------------------

/// One produced answer, annotated with taxonomy and document metadata.
/// Appended to the persisted results table; never updated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRow {
    pub final_answer: String,
    pub problem_title: String,
    pub problem_questions: String,
    pub doc_id: String,
    pub doc_title: String,
    pub task: String,
    pub country: String,
    pub pillar_level1_name: String,
    pub pillar_level2_name: String,
    pub pillar_level3_name: String,
    pub sector_level1_name: String,
    pub sector_level2_name: String,
    /// Collaborator-supplied passthrough fields (sources, dates, scores...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl AssessmentRow {
    /// Values of the fixed columns, in [`RESULT_COLUMNS`] order.
    pub fn fixed_values(&self) -> [&str; 12] {
        [
            &self.final_answer,
            &self.problem_title,
            &self.problem_questions,
            &self.doc_id,
            &self.doc_title,
            &self.task,
            &self.country,
            &self.pillar_level1_name,
            &self.pillar_level2_name,
            &self.pillar_level3_name,
            &self.sector_level1_name,
            &self.sector_level2_name,
        ]
    }

    /// Rebuild a row from a header-keyed field map (CSV read path).
    /// Fixed columns absent from the map default to empty strings.
    pub fn from_field_map(mut fields: BTreeMap<String, String>) -> Self {
        let mut take = |name: &str| fields.remove(name).unwrap_or_default();
        let row = Self {
            final_answer: take("final_answer"),
            problem_title: take("problem_title"),
            problem_questions: take("problem_questions"),
            doc_id: take("doc_id"),
            doc_title: take("doc_title"),
            task: take("task"),
            country: take("country"),
            pillar_level1_name: take("pillar_level1_name"),
            pillar_level2_name: take("pillar_level2_name"),
            pillar_level3_name: take("pillar_level3_name"),
            sector_level1_name: take("sector_level1_name"),
            sector_level2_name: take("sector_level2_name"),
            extra: BTreeMap::new(),
        };
        Self { extra: fields, ..row }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, tags: &[&str]) -> ProblemEntry {
        ProblemEntry {
            problem_text: text.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn index_insert_and_iter() {
        let mut index = TaxonomyIndex::new();
        index.insert("Matrix 1D", "A->B->P1", entry("Q1", &["A->B->P1"]));
        index.insert("Matrix 1D", "A->B->P2", entry("Q2", &["A->B->P2"]));
        index.insert("Matrix 2D", "A->B->P1->S->T", entry("Q1 topic", &["A->B", "S->T"]));

        assert_eq!(index.total_problems(), 3);
        assert_eq!(index.task("Matrix 1D").unwrap().len(), 2);

        let triples: Vec<_> = index.iter().collect();
        assert_eq!(triples.len(), 3);
        assert!(triples.iter().any(|(t, k, _)| *t == "Matrix 2D" && *k == "A->B->P1->S->T"));
    }

    #[test]
    fn index_keys_unique_per_task() {
        let mut index = TaxonomyIndex::new();
        index.insert("Matrix 1D", "A->B->P1", entry("Q1", &["A->B->P1"]));
        index.insert("Matrix 1D", "A->B->P1", entry("Q1 revised", &["A->B->P1"]));

        assert_eq!(index.total_problems(), 1);
        let entries = index.task("Matrix 1D").unwrap();
        assert_eq!(entries["A->B->P1"].problem_text, "Q1 revised");
    }

    #[test]
    fn passage_row_lookup() {
        let row: PassageRow = [
            ("doc_id".to_string(), "d1".to_string()),
            ("Extraction Text".to_string(), "people lack water".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(row.get("doc_id"), Some("d1"));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn assessment_row_field_map_roundtrip() {
        let fields: BTreeMap<String, String> = [
            ("final_answer", "Water access is limited."),
            ("problem_title", "A->B->P1"),
            ("doc_id", "d1"),
            ("Document Source", "OCHA"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let row = AssessmentRow::from_field_map(fields);
        assert_eq!(row.final_answer, "Water access is limited.");
        assert_eq!(row.doc_id, "d1");
        assert_eq!(row.task, "");
        assert_eq!(row.extra["Document Source"], "OCHA");
        assert!(!row.extra.contains_key("final_answer"));
    }

    #[test]
    fn default_document_columns() {
        let cols = DocumentColumns::default();
        assert_eq!(cols.doc_id, "doc_id");
        assert_eq!(cols.primary_country, "Primary Country");
        assert_eq!(cols.level2_problems, "Level 2 Problems");
    }
}
