use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roles::resolve_role;
use crate::store::GradeStore;
use serde_json::json;
use tracing::{error, info};

use super::{param_text, require_store};

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(student_id) = param_text(req, "student_id") else {
        return err(&req.id, "bad_params", "missing student_id", None);
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let profile = match store.get_profile(&student_id) {
        Ok(Some(p)) => p,
        Ok(None) => {
            info!(student_id = %student_id, "login for unknown student");
            return err(
                &req.id,
                "not_found",
                "student not found",
                Some(json!({ "student_id": student_id })),
            );
        }
        Err(e) => {
            error!(student_id = %student_id, error = %e, "profile lookup failed");
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    };

    let user_type = resolve_role(&profile);
    info!(student_id = %student_id, user_type = user_type.as_str(), "login");
    ok(
        &req.id,
        json!({
            "user": {
                "student_id": profile.student_id,
                "name": profile.name,
                "class": profile.class,
                "role": profile.role,
                "userType": user_type,
            }
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "login" => Some(handle_login(state, req)),
        _ => None,
    }
}
