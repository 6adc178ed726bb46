use serde_json::Value;
use thiserror::Error;

use crate::model::GradeRecord;
use crate::window::{window_for_semester, SemesterError};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GradeInputError {
    #[error("missing required fields [{}]", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("invalid grade: {0}")]
    InvalidScore(String),
    #[error("invalid semester {semester}: {source}")]
    InvalidSemester {
        semester: String,
        #[source]
        source: SemesterError,
    },
}

pub fn score_in_range(score: f64) -> bool {
    score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score)
}

/// Builds a storable record, deriving the visibility window from the semester.
///
/// Every write path goes through here so the window never depends on which
/// endpoint accepted the grade.
pub fn build_record(
    student_id: &str,
    course: &str,
    score: f64,
    semester: &str,
) -> Result<GradeRecord, GradeInputError> {
    let student_id = student_id.trim();
    let course = course.trim();
    let semester = semester.trim();

    let mut missing = Vec::new();
    if student_id.is_empty() {
        missing.push("studentId");
    }
    if course.is_empty() {
        missing.push("course");
    }
    if semester.is_empty() {
        missing.push("semester");
    }
    if !missing.is_empty() {
        return Err(GradeInputError::MissingFields(missing));
    }

    if !score_in_range(score) {
        return Err(GradeInputError::InvalidScore(score.to_string()));
    }

    let window = window_for_semester(semester).map_err(|source| {
        GradeInputError::InvalidSemester {
            semester: semester.to_string(),
            source,
        }
    })?;

    Ok(GradeRecord {
        student_id: student_id.to_string(),
        course: course.to_string(),
        score,
        semester: semester.to_string(),
        query_start: window.start,
        query_end: window.end,
    })
}

/// Non-empty text from a JSON string or number; numbers keep no trailing `.0`.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) if n.is_f64() => n.as_f64().map(|x| x.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric score from a JSON number or numeric string. Range is not checked.
pub fn value_score(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        _ => None,
    }
}

/// True when a JSON field counts as supplied (present, non-null, non-blank).
pub fn value_present(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}
