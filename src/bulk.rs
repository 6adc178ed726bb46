use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::grades::{build_record, value_present, value_score, value_text, GradeInputError};
use crate::store::GradeStore;

pub const BULK_MAX_ENTRIES: usize = 5000;

const REQUIRED_FIELDS: [&str; 4] = ["studentId", "course", "grade", "semester"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkUploadResult {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl BulkUploadResult {
    pub fn summary(&self) -> String {
        format!(
            "bulk upload finished: {} succeeded, {} failed",
            self.success, self.failed
        )
    }

    fn fail(&mut self, msg: String) {
        self.failed += 1;
        self.errors.push(msg);
    }
}

fn raw_text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Writes each submission independently. Bad entries and failed writes are
/// counted in the result; nothing here aborts the batch.
pub fn upload_grades<S: GradeStore + ?Sized>(store: &S, entries: &[Value]) -> BulkUploadResult {
    let mut result = BulkUploadResult {
        total: entries.len(),
        ..Default::default()
    };

    for (i, entry) in entries.iter().enumerate() {
        let n = i + 1;

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| !value_present(entry.get(*f)))
            .collect();
        if !missing.is_empty() {
            result.fail(format!(
                "entry {n}: missing required fields [{}]: {entry}",
                missing.join(", ")
            ));
            continue;
        }

        let (Some(student_id), Some(course), Some(semester)) = (
            entry.get("studentId").and_then(value_text),
            entry.get("course").and_then(value_text),
            entry.get("semester").and_then(value_text),
        ) else {
            result.fail(format!("entry {n}: fields must be text or numbers: {entry}"));
            continue;
        };

        let Some(score) = entry.get("grade").and_then(value_score) else {
            result.fail(format!(
                "entry {n}: invalid grade: {}",
                raw_text(entry.get("grade"))
            ));
            continue;
        };

        let record = match build_record(&student_id, &course, score, &semester) {
            Ok(r) => r,
            Err(GradeInputError::InvalidScore(_)) => {
                result.fail(format!(
                    "entry {n}: invalid grade: {}",
                    raw_text(entry.get("grade"))
                ));
                continue;
            }
            Err(e) => {
                result.fail(format!("entry {n}: {e}"));
                continue;
            }
        };

        match store.put_grade(&record) {
            Ok(()) => result.success += 1,
            Err(e) => {
                warn!(student_id = %student_id, course = %course, error = %e, "grade write failed");
                result.fail(format!("student {student_id} course {course}: {e}"));
            }
        }
    }

    info!(
        total = result.total,
        success = result.success,
        failed = result.failed,
        "bulk grade upload processed"
    );
    result
}
