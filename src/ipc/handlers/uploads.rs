use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::normalize::normalize_rows;
use crate::workbook::{decode_data_uri, read_first_sheet};
use serde_json::json;
use tracing::{info, warn};

/// Parses an uploaded workbook into grade rows for review. Nothing is
/// written; the client submits the accepted rows through `admin.grades.bulkPut`.
fn handle_excel_parse(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(file_data) = req
        .params
        .get("fileData")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
    else {
        return err(&req.id, "bad_params", "missing fileData", None);
    };
    let file_name = req
        .params
        .get("fileName")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let bytes = match decode_data_uri(file_data) {
        Ok(b) => b,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let raw_rows = match read_first_sheet(bytes) {
        Ok(r) => r,
        Err(e) => {
            warn!(file_name, error = %format!("{e:#}"), "workbook parse failed");
            return err(
                &req.id,
                "excel_parse_failed",
                format!("{e:#}"),
                Some(json!({ "fileName": file_name })),
            );
        }
    };

    let sheet = normalize_rows(&raw_rows, &state.config.default_semester);
    info!(
        file_name,
        rows = sheet.rows.len(),
        errors = sheet.errors.len(),
        "workbook parsed"
    );
    let message = format!(
        "parsed {} rows with {} errors",
        sheet.rows.len(),
        sheet.errors.len()
    );
    ok(
        &req.id,
        json!({
            "data": sheet.rows,
            "errors": sheet.errors,
            "message": message,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.excel.parse" => Some(handle_excel_parse(state, req)),
        _ => None,
    }
}
