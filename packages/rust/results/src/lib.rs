//! Persisted results table for sitrep.
//!
//! [`ResultsStore`] is an append-only writer over a CSV file. Rows are only
//! ever appended, one document at a time; each append rewrites the whole
//! file atomically (temp sibling + rename), which gives crash recovery with
//! the granularity of one document: the file on disk only ever contains
//! whole documents.
//!
//! The CSV header is the fixed result columns followed by the sorted union
//! of collaborator-supplied passthrough fields seen across all rows.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use sitrep_shared::{AssessmentRow, RESULT_COLUMNS, Result, SitrepError};

/// Append-only store backed by a CSV file.
pub struct ResultsStore {
    path: PathBuf,
    rows: Vec<AssessmentRow>,
}

impl ResultsStore {
    /// Open a store, loading any existing results file at `path`.
    /// A missing file is an empty store, not an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let rows = if path.exists() {
            let rows = read_rows(&path)?;
            info!(path = %path.display(), rows = rows.len(), "loaded existing results table");
            rows
        } else {
            debug!(path = %path.display(), "no existing results table");
            Vec::new()
        };

        Ok(Self { path, rows })
    }

    /// Document ids already present in the table. A document listed here is
    /// never reprocessed.
    pub fn treated_doc_ids(&self) -> BTreeSet<String> {
        self.rows.iter().map(|row| row.doc_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append one document's rows and rewrite the backing file.
    ///
    /// Called once per processed document, including with an empty batch —
    /// a document whose every answer was the no-answer sentinel contributes
    /// no rows and stays eligible for the next run.
    pub fn append(&mut self, rows: Vec<AssessmentRow>) -> Result<()> {
        self.rows.extend(rows);
        self.write_all()
    }

    /// Rewrite the whole table: write a temp sibling, then rename over the
    /// target so readers never observe a half-written file.
    fn write_all(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SitrepError::io(parent, e))?;
            }
        }

        let headers = self.headers();
        let temp = self.path.with_extension("csv.tmp");

        let mut writer = csv::Writer::from_path(&temp)
            .map_err(|e| SitrepError::Storage(format!("open {}: {e}", temp.display())))?;

        writer
            .write_record(&headers)
            .map_err(|e| SitrepError::Storage(e.to_string()))?;

        for row in &self.rows {
            let record = record_for(row, &headers);
            writer
                .write_record(&record)
                .map_err(|e| SitrepError::Storage(e.to_string()))?;
        }

        writer
            .flush()
            .map_err(|e| SitrepError::io(&temp, e))?;
        drop(writer);

        std::fs::rename(&temp, &self.path).map_err(|e| SitrepError::io(&self.path, e))?;

        debug!(path = %self.path.display(), rows = self.rows.len(), "results table rewritten");
        Ok(())
    }

    /// Fixed columns first, then the sorted union of extra field names.
    fn headers(&self) -> Vec<String> {
        let mut extras: BTreeSet<&str> = BTreeSet::new();
        for row in &self.rows {
            for key in row.extra.keys() {
                if !RESULT_COLUMNS.contains(&key.as_str()) {
                    extras.insert(key);
                }
            }
        }

        RESULT_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(extras.into_iter().map(String::from))
            .collect()
    }
}

/// Cell values for one row under the given header, empty where a row has no
/// value for an extra column.
fn record_for<'a>(row: &'a AssessmentRow, headers: &[String]) -> Vec<&'a str> {
    let fixed = row.fixed_values();
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            if i < fixed.len() {
                fixed[i]
            } else {
                row.extra.get(header).map(String::as_str).unwrap_or("")
            }
        })
        .collect()
}

fn read_rows(path: &Path) -> Result<Vec<AssessmentRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| SitrepError::Storage(format!("open {}: {e}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SitrepError::Storage(e.to_string()))?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SitrepError::Storage(e.to_string()))?;
        let fields: BTreeMap<String, String> = headers
            .iter()
            .cloned()
            .zip(record.iter().map(String::from))
            .collect();
        rows.push(AssessmentRow::from_field_map(fields));
    }

    Ok(rows)
}
