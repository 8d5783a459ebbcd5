//! Taxonomy reshaping: flat dataset rows → the per-task problem index.
//!
//! Two task families are reshaped, each with its own entry-key shape:
//! - `Pillars 1D` → `Matrix 1D`: one entry per `(level1, level2, problem)`
//!   combination, matched by its full `level1->level2->problem` key.
//! - `Pillars 2D` → `Matrix 2D`: the 1D combinations crossed with every
//!   subsector tag registered under the `Sectors` task, matched by the
//!   pillar tag AND the subsector tag.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use sitrep_shared::{ProblemEntry, TAG_SEPARATOR, TasksToTags, TaxonomyIndex};

use crate::dataset::TaxonomyRow;

/// Source task whose tags form the subsector axis of `Matrix 2D`.
pub const SECTORS_TASK: &str = "Sectors";

/// Appended to 2D question text, naming the subsector the answer must focus on.
const SUBSECTOR_TOPIC_PREFIX: &str =
    " Answer the questions based for the following specific topic: ";

// ---------------------------------------------------------------------------
// TaskReshape
// ---------------------------------------------------------------------------

/// The supported reshape strategies, selected from the source task name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskReshape {
    /// `Pillars 1D` rows, matched by a single composite tag.
    Matrix1D,
    /// `Pillars 2D` rows, cross-multiplied against subsector tags.
    Matrix2D,
}

impl TaskReshape {
    /// Strategy for a source task name, if the task is reshaped at all.
    pub fn for_task(task: &str) -> Option<Self> {
        match task {
            "Pillars 1D" => Some(Self::Matrix1D),
            "Pillars 2D" => Some(Self::Matrix2D),
            _ => None,
        }
    }

    /// Task name the reshaped entries are emitted under.
    pub fn target_name(self) -> &'static str {
        match self {
            Self::Matrix1D => "Matrix 1D",
            Self::Matrix2D => "Matrix 2D",
        }
    }
}

// ---------------------------------------------------------------------------
// build_index
// ---------------------------------------------------------------------------

/// Group the flat taxonomy rows and reshape them into the problem index,
/// plus the raw `task → tag list` mapping persisted for downstream consumers.
///
/// Tag lists preserve first-seen dataset order with duplicates dropped.
/// Tasks that are neither a reshape source nor `Sectors` are skipped with a
/// warning.
pub fn build_index(rows: &[TaxonomyRow]) -> (TaxonomyIndex, TasksToTags) {
    // task → "level1->level2" tag → problem → questions
    let mut grouped: BTreeMap<&str, BTreeMap<String, BTreeMap<&str, &str>>> = BTreeMap::new();
    let mut tasks_to_tags = TasksToTags::new();

    for row in rows {
        let tag = format!("{}{TAG_SEPARATOR}{}", row.level1, row.level2);
        grouped
            .entry(row.task.as_str())
            .or_default()
            .entry(tag.clone())
            .or_default()
            .insert(row.problem.as_str(), row.questions.as_str());

        let tags = tasks_to_tags.entry(row.task.clone()).or_default();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let subsectors = tasks_to_tags.get(SECTORS_TASK).cloned().unwrap_or_default();

    let mut index = TaxonomyIndex::new();
    for (task, tag_map) in &grouped {
        let Some(reshape) = TaskReshape::for_task(task) else {
            if *task != SECTORS_TASK {
                warn!(task, "unrecognized taxonomy task, dropping its rows");
            }
            continue;
        };

        match reshape {
            TaskReshape::Matrix1D => {
                for (tag, problems) in tag_map {
                    for (problem, questions) in problems {
                        let key = format!("{tag}{TAG_SEPARATOR}{problem}");
                        index.insert(
                            reshape.target_name(),
                            key.clone(),
                            ProblemEntry {
                                problem_text: (*questions).to_string(),
                                tags: vec![key],
                            },
                        );
                    }
                }
            }
            TaskReshape::Matrix2D => {
                if subsectors.is_empty() {
                    warn!("no tags registered under task {SECTORS_TASK:?}; Matrix 2D will be empty");
                }
                for (tag, problems) in tag_map {
                    for (problem, questions) in problems {
                        for subsector in &subsectors {
                            let key =
                                format!("{tag}{TAG_SEPARATOR}{problem}{TAG_SEPARATOR}{subsector}");
                            index.insert(
                                reshape.target_name(),
                                key,
                                ProblemEntry {
                                    problem_text: format!(
                                        "{questions}{SUBSECTOR_TOPIC_PREFIX}{subsector}"
                                    ),
                                    tags: vec![tag.clone(), subsector.clone()],
                                },
                            );
                        }
                    }
                }
            }
        }
    }

    debug!(
        entries = index.total_problems(),
        tasks = tasks_to_tags.len(),
        "taxonomy index built"
    );

    (index, tasks_to_tags)
}
