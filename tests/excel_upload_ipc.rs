use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradesd");
    let mut child = Command::new(exe)
        .env_remove("GRADESD_WORKSPACE")
        .env_remove("GRADESD_DEFAULT_SEMESTER")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradesd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "{}", value);
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
}

enum Cell<'a> {
    Text(&'a str),
    Num(f64),
}

fn col_letter(i: usize) -> char {
    (b'A' + i as u8) as char
}

/// Builds a minimal single-sheet .xlsx. `None` rows are left out of the sheet.
fn build_xlsx(rows: &[Option<Vec<Cell<'_>>>]) -> Vec<u8> {
    use zip::write::FileOptions;
    use zip::ZipWriter;

    let mut sheet_rows = String::new();
    for (r, row) in rows.iter().enumerate() {
        let Some(cells) = row else {
            continue;
        };
        let n = r + 1;
        sheet_rows.push_str(&format!("<row r=\"{n}\">"));
        for (c, cell) in cells.iter().enumerate() {
            let addr = format!("{}{}", col_letter(c), n);
            match cell {
                Cell::Text(t) => sheet_rows.push_str(&format!(
                    "<c r=\"{addr}\" t=\"inlineStr\"><is><t>{t}</t></is></c>"
                )),
                Cell::Num(v) => sheet_rows.push_str(&format!("<c r=\"{addr}\"><v>{v}</v></c>")),
            }
        }
        sheet_rows.push_str("</row>");
    }

    let files = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#
                .to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                .to_string(),
        ),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#
                .to_string(),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#
                .to_string(),
        ),
        (
            "xl/worksheets/sheet1.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_rows}</sheetData></worksheet>"#
            ),
        ),
    ];

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, body) in files {
        zip.start_file(name, FileOptions::default())
            .expect("start zip entry");
        zip.write_all(body.as_bytes()).expect("write zip entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

fn data_uri(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    format!(
        "data:application/vnd.openxmlformats-officedocument.spreadsheetml.sheet;base64,{}",
        STANDARD.encode(bytes)
    )
}

#[test]
fn excel_parse_normalizes_rows_and_collects_errors() {
    let xlsx = build_xlsx(&[
        Some(vec![
            Cell::Text("学号"),
            Cell::Text("姓名"),
            Cell::Text("课程"),
            Cell::Text("成绩"),
            Cell::Text("学期"),
        ]),
        Some(vec![
            Cell::Num(20240001.0),
            Cell::Text("张三"),
            Cell::Text("数学"),
            Cell::Num(95.0),
            Cell::Text("2024-1"),
        ]),
        Some(vec![
            Cell::Text("s02"),
            Cell::Text("李四"),
            Cell::Text("语文"),
            Cell::Num(105.0),
            Cell::Text("2024-1"),
        ]),
        None,
        Some(vec![
            Cell::Text("s05"),
            Cell::Text("王五"),
            Cell::Text(" "),
            Cell::Num(80.0),
        ]),
        Some(vec![
            Cell::Text("s06"),
            Cell::Text("赵六"),
            Cell::Text("英语"),
            Cell::Num(0.0),
        ]),
    ]);

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    // Parsing needs no workspace.
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "admin.excel.parse",
        json!({ "fileData": data_uri(&xlsx), "fileName": "grades.xlsx" }),
    );

    let data = res.get("data").and_then(|v| v.as_array()).expect("data");
    assert_eq!(data.len(), 2);
    assert_eq!(
        data[0],
        json!({
            "studentId": "20240001",
            "name": "张三",
            "course": "数学",
            "grade": 95.0,
            "semester": "2024-1"
        })
    );
    assert_eq!(data[1].get("studentId").and_then(|v| v.as_str()), Some("s06"));
    assert_eq!(data[1].get("grade").and_then(|v| v.as_f64()), Some(0.0));
    assert_eq!(data[1].get("semester").and_then(|v| v.as_str()), Some("2023-2"));

    let errors = res.get("errors").and_then(|v| v.as_array()).expect("errors");
    assert_eq!(
        errors,
        &vec![
            json!("row 3 invalid grade: 105"),
            json!("row 5 incomplete: studentId=s05, course=(missing), grade=80"),
        ]
    );
    assert_eq!(
        res.get("message").and_then(|v| v.as_str()),
        Some("parsed 2 rows with 2 errors")
    );

    let _ = child.kill();
}

#[test]
fn parsed_rows_feed_bulk_upload() {
    let xlsx = build_xlsx(&[
        Some(vec![
            Cell::Text("student_id"),
            Cell::Text("course"),
            Cell::Text("score"),
            Cell::Text("semester"),
        ]),
        Some(vec![
            Cell::Text("s01"),
            Cell::Text("Math"),
            Cell::Num(88.0),
            Cell::Text("2024-2"),
        ]),
        Some(vec![
            Cell::Text("s02"),
            Cell::Text("Math"),
            Cell::Text("91"),
            Cell::Text("2024-2"),
        ]),
    ]);

    let workspace = temp_dir("gradesd-excel-bulk");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let parsed = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "admin.excel.parse",
        json!({ "fileData": data_uri(&xlsx) }),
    );
    let rows = parsed.get("data").cloned().expect("data");
    let bulk = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "admin.grades.bulkPut",
        json!({ "grades": rows }),
    );
    assert_eq!(bulk.pointer("/results/success").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(bulk.pointer("/results/failed").and_then(|v| v.as_u64()), Some(0));

    let _ = child.kill();
}

#[test]
fn excel_parse_rejects_bad_payloads() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let missing = request(&mut stdin, &mut reader, "1", "admin.excel.parse", json!({}));
    assert_eq!(error_code(&missing), "bad_params");

    let not_base64 = request(
        &mut stdin,
        &mut reader,
        "2",
        "admin.excel.parse",
        json!({ "fileData": "data:application/octet-stream;base64,%%%" }),
    );
    assert_eq!(error_code(&not_base64), "bad_params");

    let not_a_workbook = request(
        &mut stdin,
        &mut reader,
        "3",
        "admin.excel.parse",
        json!({ "fileData": data_uri(b"just some text"), "fileName": "notes.txt" }),
    );
    assert_eq!(error_code(&not_a_workbook), "excel_parse_failed");

    for (i, empty) in ["", "   ", "data:application/vnd.ms-excel;base64,"]
        .into_iter()
        .enumerate()
    {
        let res = request(
            &mut stdin,
            &mut reader,
            &format!("empty-{i}"),
            "admin.excel.parse",
            json!({ "fileData": empty }),
        );
        assert_eq!(error_code(&res), "bad_params", "{:?}", empty);
    }

    let _ = child.kill();
}

#[test]
fn duplicate_header_keeps_leftmost_column() {
    let xlsx = build_xlsx(&[
        Some(vec![
            Cell::Text("学号"),
            Cell::Text("课程"),
            Cell::Text("课程"),
            Cell::Text("成绩"),
            Cell::Text("学期"),
        ]),
        Some(vec![
            Cell::Text("s01"),
            Cell::Text("数学"),
            Cell::Text("物理"),
            Cell::Num(90.0),
            Cell::Text("2024-1"),
        ]),
    ]);

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "admin.excel.parse",
        json!({ "fileData": data_uri(&xlsx) }),
    );
    let data = res.get("data").and_then(|v| v.as_array()).expect("data");
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].get("course").and_then(|v| v.as_str()), Some("数学"));

    let _ = child.kill();
}
