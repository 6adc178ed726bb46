use anyhow::{anyhow, Context};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;

use crate::normalize::{CellValue, RawRow};

/// Matches the request body limit of the upload endpoint.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("fileData is not valid base64: {0}")]
    NotBase64(String),
    #[error("file is {0} bytes; the limit is {} bytes", MAX_UPLOAD_BYTES)]
    TooLarge(usize),
    #[error("fileData carries no file content")]
    Empty,
}

/// Decodes a `data:<mime>;base64,<payload>` URI. A bare base64 string is
/// accepted as well.
pub fn decode_data_uri(file_data: &str) -> Result<Vec<u8>, PayloadError> {
    let payload = match file_data.split_once(',') {
        Some((_, rest)) => rest,
        None => file_data,
    };
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    // Base64 expands by 4/3; reject before allocating the decoded buffer.
    if payload.len() / 4 * 3 > MAX_UPLOAD_BYTES + 3 {
        return Err(PayloadError::TooLarge(payload.len() / 4 * 3));
    }
    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| PayloadError::NotBase64(e.to_string()))?;
    if bytes.is_empty() {
        return Err(PayloadError::Empty);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(PayloadError::TooLarge(bytes.len()));
    }
    Ok(bytes)
}

fn cell_value(d: &Data) -> CellValue {
    match d {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(_) => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

/// Reads the first worksheet: the first used row is the header, every later
/// non-blank row becomes a [`RawRow`] keyed by header label.
pub fn read_first_sheet(bytes: Vec<u8>) -> anyhow::Result<Vec<RawRow>> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).context("unrecognized workbook format")?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no worksheets"))?
        .context("failed to read first worksheet")?;

    // `Range` rows start at the first used cell, not at A1.
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let labels: Vec<Option<String>> = header
        .iter()
        .map(|c| {
            let t = c.to_string();
            let t = t.trim();
            (!t.is_empty()).then(|| t.to_string())
        })
        .collect();

    let mut out = Vec::new();
    for (i, cells) in rows.enumerate() {
        let mut map = HashMap::new();
        for (label, cell) in labels.iter().zip(cells.iter()) {
            let Some(label) = label else {
                continue;
            };
            let v = cell_value(cell);
            // Duplicate header labels keep the leftmost non-empty cell.
            if v != CellValue::Empty {
                map.entry(label.clone()).or_insert(v);
            }
        }
        if map.is_empty() {
            continue;
        }
        out.push(RawRow {
            // +1 for 1-based numbering, +1 for the header row.
            row_number: first_row + i + 2,
            cells: map,
        });
    }
    Ok(out)
}
