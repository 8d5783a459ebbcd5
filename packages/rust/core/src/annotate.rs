//! Answer annotation: collaborator answer record → persisted result row.
//!
//! The entry key (`problem_title`) encodes the taxonomy position: the first
//! three `->` segments name the pillar levels; 2D entries carry exactly four
//! separators, with segments three and four naming the subsector levels.

use sitrep_shared::{
    AssessmentRow, PLACEHOLDER, RESULT_COLUMNS, Result, SitrepError, TAG_SEPARATOR,
};
use sitrep_rag::RagAnswer;

/// Taxonomy and document metadata attached to one answer.
#[derive(Debug, Clone)]
pub struct AnnotationContext<'a> {
    pub task: &'a str,
    pub problem_title: &'a str,
    pub problem_questions: &'a str,
    pub doc_id: &'a str,
    pub doc_title: &'a str,
    pub country: &'a str,
}

/// Annotate a collaborator answer with taxonomy and document metadata.
///
/// An entry key with fewer than three segments is malformed and fatal.
/// Collaborator fields colliding with fixed column names are dropped; the
/// annotation wins.
pub fn annotate(answer: RagAnswer, ctx: &AnnotationContext<'_>) -> Result<AssessmentRow> {
    let segments: Vec<&str> = ctx.problem_title.split(TAG_SEPARATOR).collect();
    if segments.len() < 3 {
        return Err(SitrepError::validation(format!(
            "problem title {:?} has fewer than 3 segments",
            ctx.problem_title
        )));
    }

    let separators = ctx.problem_title.matches(TAG_SEPARATOR).count();
    let (sector_level1, sector_level2) = if separators == 4 {
        (segments[3].to_string(), segments[4].to_string())
    } else {
        (PLACEHOLDER.to_string(), PLACEHOLDER.to_string())
    };

    let mut extra: std::collections::BTreeMap<String, String> = answer
        .extra
        .into_iter()
        .map(|(key, value)| (key, display_value(value)))
        .collect();
    for column in RESULT_COLUMNS {
        extra.remove(column);
    }

    Ok(AssessmentRow {
        final_answer: answer.final_answer,
        problem_title: ctx.problem_title.to_string(),
        problem_questions: ctx.problem_questions.to_string(),
        doc_id: ctx.doc_id.to_string(),
        doc_title: ctx.doc_title.to_string(),
        task: ctx.task.to_string(),
        country: ctx.country.to_string(),
        pillar_level1_name: segments[0].to_string(),
        pillar_level2_name: segments[1].to_string(),
        pillar_level3_name: segments[2].to_string(),
        sector_level1_name: sector_level1,
        sector_level2_name: sector_level2,
        extra,
    })
}

/// Flatten a JSON value into a CSV cell. Strings pass through unquoted;
/// everything else keeps its JSON rendering.
fn display_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}
