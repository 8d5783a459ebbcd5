//! Taxonomy loading for sitrep.
//!
//! Fetches the flat `task / level1 / level2 / problem / question(s)` table
//! from a remote dataset server and reshapes it into the nested problem
//! index the assessment driver loops over, plus the raw task → tag mapping
//! persisted as a JSON side file.

mod dataset;
mod reshape;

use std::path::Path;

use tracing::{info, instrument};

use sitrep_shared::{Result, SitrepError, TasksToTags, TaxonomyIndex};

pub use dataset::{DatasetClient, TaxonomyRow};
pub use reshape::{SECTORS_TASK, TaskReshape, build_index};

/// Fetch and reshape the taxonomy dataset.
///
/// Network and payload failures are fatal; there is no retry. The returned
/// index is immutable for the lifetime of a run.
#[instrument(skip_all, fields(dataset = dataset))]
pub async fn load_level2_problems(
    client: &DatasetClient,
    dataset: &str,
    token: Option<&str>,
) -> Result<(TaxonomyIndex, TasksToTags)> {
    let rows = client.fetch_rows(dataset, token).await?;
    if rows.is_empty() {
        return Err(SitrepError::dataset(format!(
            "dataset {dataset} returned no rows"
        )));
    }

    let (index, tasks_to_tags) = build_index(&rows);

    info!(
        rows = rows.len(),
        entries = index.total_problems(),
        tasks = tasks_to_tags.len(),
        "taxonomy loaded"
    );

    Ok((index, tasks_to_tags))
}

/// Write the `task → tag list` mapping as a JSON side file (overwrite
/// semantics), creating parent directories as needed.
pub fn write_tasks_file(path: &Path, tasks_to_tags: &TasksToTags) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SitrepError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(tasks_to_tags)
        .map_err(|e| SitrepError::dataset(format!("serialize tasks mapping: {e}")))?;
    std::fs::write(path, json).map_err(|e| SitrepError::io(path, e))?;

    info!(path = %path.display(), "tasks mapping written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("sitrep_tax_{}", uuid::Uuid::now_v7()));
        let path = dir.join("nested").join("tasks.json");

        let mut tags = TasksToTags::new();
        tags.insert("Pillars 1D".into(), vec!["A->B".into(), "C->D".into()]);
        tags.insert("Sectors".into(), vec!["S->T".into()]);

        write_tasks_file(&path, &tags).expect("write tasks file");

        let content = std::fs::read_to_string(&path).expect("read back");
        let parsed: TasksToTags = serde_json::from_str(&content).expect("parse");
        assert_eq!(parsed, tags);

        // Overwrite semantics: a second write replaces the file
        let mut smaller = TasksToTags::new();
        smaller.insert("Sectors".into(), vec!["S->T".into()]);
        write_tasks_file(&path, &smaller).expect("overwrite");
        let parsed: TasksToTags =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
