use crate::db::{GRADES_TABLE, STUDENTS_TABLE};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::GradeStore;
use serde_json::json;
use std::path::PathBuf;
use tracing::error;

use super::require_store;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "status": "OK",
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match state.open_workspace(&path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            error!(workspace = %path.display(), error = %e, "failed to open workspace");
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_connection_test(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match store.ping() {
        Ok(()) => ok(
            &req.id,
            json!({
                "message": "store connection ok",
                "tables": { "students": STUDENTS_TABLE, "grades": GRADES_TABLE }
            }),
        ),
        Err(e) => {
            error!(error = %e, "store connection test failed");
            err(&req.id, "db_query_failed", e.to_string(), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "connection.test" => Some(handle_connection_test(state, req)),
        _ => None,
    }
}
