use crate::bulk::{upload_grades, BULK_MAX_ENTRIES};
use crate::grades::{build_record, value_present, value_score};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::GradeRecord;
use crate::normalize::UNKNOWN_NAME;
use crate::store::{GradeStore, SqliteStore};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{error, info, warn};

use super::{param_text, require_store};

#[derive(Serialize)]
struct NamedGrade<'a> {
    #[serde(flatten)]
    record: &'a GradeRecord,
    student_name: &'a str,
}

fn handle_admin_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let grades = match store.list_all_grades() {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "grade listing failed");
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    };
    let names: HashMap<String, String> = match store.list_profiles(false) {
        Ok(v) => v.into_iter().map(|p| (p.student_id, p.name)).collect(),
        Err(e) => {
            error!(error = %e, "profile listing failed");
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    };

    let rows: Vec<NamedGrade<'_>> = grades
        .iter()
        .map(|g| NamedGrade {
            record: g,
            student_name: names
                .get(&g.student_id)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_NAME),
        })
        .collect();
    ok(&req.id, json!({ "grades": rows }))
}

/// Validates, derives the window and writes one grade.
fn put_one(
    store: &SqliteStore,
    req: &Request,
    student_id: &str,
    course: &str,
    score: f64,
    semester: &str,
) -> Result<GradeRecord, serde_json::Value> {
    let record = build_record(student_id, course, score, semester)
        .map_err(|e| err(&req.id, "bad_params", e.to_string(), None))?;
    if let Err(e) = store.put_grade(&record) {
        error!(student_id = %record.student_id, course = %record.course, error = %e, "grade write failed");
        return Err(err(
            &req.id,
            "db_write_failed",
            e.to_string(),
            Some(json!({ "table": "grades" })),
        ));
    }
    info!(
        student_id = %record.student_id,
        course = %record.course,
        semester = %record.semester,
        "grade saved"
    );
    Ok(record)
}

fn missing_params(req: &Request, keys: &[&str]) -> Option<serde_json::Value> {
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|k| !value_present(req.params.get(*k)))
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(err(
        &req.id,
        "bad_params",
        format!("missing required fields: {}", missing.join(", ")),
        Some(json!({ "missing": missing })),
    ))
}

fn handle_admin_grades_put(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = missing_params(req, &["studentId", "course", "grade", "semester"]) {
        return resp;
    }
    let (Some(student_id), Some(course), Some(semester)) = (
        param_text(req, "studentId"),
        param_text(req, "course"),
        param_text(req, "semester"),
    ) else {
        return err(
            &req.id,
            "bad_params",
            "studentId, course and semester must be text",
            None,
        );
    };
    let Some(score) = req.params.get("grade").and_then(value_score) else {
        return err(&req.id, "bad_params", "grade must be a number", None);
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match put_one(store, req, &student_id, &course, score, &semester) {
        Ok(record) => ok(
            &req.id,
            json!({ "message": "grade saved", "record": record }),
        ),
        Err(resp) => resp,
    }
}

fn handle_admin_grades_bulk_put(state: &mut AppState, req: &Request) -> serde_json::Value {
    let entries = match req.params.get("grades").and_then(|v| v.as_array()) {
        Some(v) if !v.is_empty() => v,
        _ => return err(&req.id, "bad_params", "no grade entries supplied", None),
    };
    if entries.len() > BULK_MAX_ENTRIES {
        return err(
            &req.id,
            "bad_params",
            format!("too many grade entries (max {})", BULK_MAX_ENTRIES),
            Some(json!({ "count": entries.len(), "max": BULK_MAX_ENTRIES })),
        );
    }
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let results = upload_grades(store, entries);
    ok(
        &req.id,
        json!({ "message": results.summary(), "results": results }),
    )
}

fn handle_grades_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(student_id) = param_text(req, "student_id") else {
        return err(&req.id, "bad_params", "missing student_id", None);
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let today = chrono::Local::now().date_naive();
    match store.query_grades_for_student(&student_id, today) {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => {
            error!(student_id = %student_id, error = %e, "grade query failed");
            err(&req.id, "db_query_failed", e.to_string(), None)
        }
    }
}

fn handle_grades_put(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = missing_params(req, &["student_id", "course", "score", "semester"]) {
        return resp;
    }
    let (Some(student_id), Some(course), Some(semester)) = (
        param_text(req, "student_id"),
        param_text(req, "course"),
        param_text(req, "semester"),
    ) else {
        return err(
            &req.id,
            "bad_params",
            "student_id, course and semester must be text",
            None,
        );
    };
    let Some(score) = req.params.get("score").and_then(value_score) else {
        return err(&req.id, "bad_params", "score must be a number", None);
    };
    if value_present(req.params.get("query_start")) || value_present(req.params.get("query_end")) {
        warn!(
            student_id = %student_id,
            "ignoring caller-supplied visibility window; deriving it from the semester"
        );
    }
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match put_one(store, req, &student_id, &course, score, &semester) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.grades.list" => Some(handle_admin_grades_list(state, req)),
        "admin.grades.put" => Some(handle_admin_grades_put(state, req)),
        "admin.grades.bulkPut" => Some(handle_admin_grades_bulk_put(state, req)),
        "grades.forStudent" => Some(handle_grades_for_student(state, req)),
        "grades.put" => Some(handle_grades_put(state, req)),
        _ => None,
    }
}
