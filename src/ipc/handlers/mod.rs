pub mod auth;
pub mod core;
pub mod grades;
pub mod students;
pub mod uploads;

use crate::grades::value_text;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteStore;

fn require_store<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a SqliteStore, serde_json::Value> {
    state
        .store
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Trimmed, non-empty text parameter (numbers are accepted as text).
fn param_text(req: &Request, key: &str) -> Option<String> {
    req.params.get(key).and_then(value_text)
}
