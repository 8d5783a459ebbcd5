//! In-memory documents table.
//!
//! Passage rows arrive from an upstream extraction pipeline as a CSV with
//! free-text column names; the table keeps them header-keyed and slices by
//! document id.

use std::path::Path;

use sitrep_shared::{DocumentColumns, PassageRow, Result, SitrepError};

/// The full set of passage rows for a run, plus the column names that give
/// them meaning.
#[derive(Debug, Clone)]
pub struct DocumentsTable {
    rows: Vec<PassageRow>,
    columns: DocumentColumns,
}

impl DocumentsTable {
    pub fn new(rows: Vec<PassageRow>, columns: DocumentColumns) -> Self {
        Self { rows, columns }
    }

    /// Load a documents table from a CSV file.
    pub fn from_csv_path(path: &Path, columns: DocumentColumns) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| SitrepError::Storage(format!("open {}: {e}", path.display())))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| SitrepError::Storage(e.to_string()))?
            .iter()
            .map(String::from)
            .collect();

        if !headers.iter().any(|h| h == &columns.doc_id) {
            return Err(SitrepError::validation(format!(
                "documents table {} has no {:?} column",
                path.display(),
                columns.doc_id
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| SitrepError::Storage(e.to_string()))?;
            rows.push(
                headers
                    .iter()
                    .cloned()
                    .zip(record.iter().map(String::from))
                    .collect(),
            );
        }

        Ok(Self::new(rows, columns))
    }

    pub fn columns(&self) -> &DocumentColumns {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Unique document ids in first-seen row order.
    pub fn doc_ids(&self) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        let mut ids = Vec::new();
        for row in &self.rows {
            if let Some(id) = row.get(&self.columns.doc_id) {
                if seen.insert(id.to_string()) {
                    ids.push(id.to_string());
                }
            }
        }
        ids
    }

    /// Rows belonging to one document.
    pub fn slice(&self, doc_id: &str) -> Vec<&PassageRow> {
        self.rows
            .iter()
            .filter(|row| row.get(&self.columns.doc_id) == Some(doc_id))
            .collect()
    }
}
