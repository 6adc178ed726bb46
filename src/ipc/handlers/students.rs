use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, StudentProfile};
use crate::store::GradeStore;
use serde_json::json;
use tracing::{error, info};

use super::{param_text, require_store};

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match store.list_profiles(true) {
        Ok(students) => ok(&req.id, json!({ "data": students })),
        Err(e) => {
            error!(error = %e, "student listing failed");
            err(&req.id, "db_query_failed", e.to_string(), None)
        }
    }
}

fn handle_profiles_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(student_id) = param_text(req, "student_id") else {
        return err(&req.id, "bad_params", "missing student_id", None);
    };
    let Some(name) = param_text(req, "name") else {
        return err(&req.id, "bad_params", "missing name", None);
    };
    let class = param_text(req, "class").unwrap_or_default();

    // Roles are a closed set; free-text roles are rejected at the door.
    let role = match req.params.get("role") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_str().and_then(Role::parse) {
            Some(r) => Some(r),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "role must be one of: student, admin",
                    Some(json!({ "role": v })),
                )
            }
        },
    };

    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let profile = StudentProfile {
        student_id,
        name,
        class,
        role,
    };
    if let Err(e) = store.upsert_profile(&profile) {
        error!(student_id = %profile.student_id, error = %e, "profile write failed");
        return err(
            &req.id,
            "db_write_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }
    info!(student_id = %profile.student_id, "profile saved");
    ok(&req.id, json!({ "studentId": profile.student_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "profiles.upsert" => Some(handle_profiles_upsert(state, req)),
        _ => None,
    }
}
