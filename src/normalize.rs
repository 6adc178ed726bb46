use serde::Serialize;
use std::collections::HashMap;

use crate::grades::score_in_range;

pub const UNKNOWN_NAME: &str = "未知";

const STUDENT_ID_ALIASES: &[&str] = &["学号", "student_id", "学号ID", "studentId"];
const NAME_ALIASES: &[&str] = &["姓名", "name", "学生姓名", "studentName"];
const COURSE_ALIASES: &[&str] = &["课程", "course", "课程名称", "courseName"];
const GRADE_ALIASES: &[&str] = &["成绩", "score", "grade", "分数"];
const SEMESTER_ALIASES: &[&str] = &["学期", "semester"];

const MISSING: &str = "(missing)";

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Text form of a non-empty cell.
    fn text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            CellValue::Number(x) => Some(x.to_string()),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }
}

/// One spreadsheet data row keyed by header label.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    /// 1-based row number as shown in the spreadsheet.
    pub row_number: usize,
    pub cells: HashMap<String, CellValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedGradeRow {
    pub student_id: String,
    pub name: String,
    pub course: String,
    pub grade: f64,
    pub semester: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedSheet {
    pub rows: Vec<NormalizedGradeRow>,
    pub errors: Vec<String>,
}

fn resolve<'a>(cells: &'a HashMap<String, CellValue>, aliases: &[&str]) -> Option<&'a CellValue> {
    aliases
        .iter()
        .filter_map(|alias| cells.get(*alias))
        .find(|v| v.text().is_some())
}

fn parse_grade(cell: &CellValue) -> Option<f64> {
    let v = match cell {
        CellValue::Number(x) => *x,
        CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    score_in_range(v).then_some(v)
}

fn normalize_row(
    row: &RawRow,
    default_semester: &str,
) -> Result<NormalizedGradeRow, String> {
    let student_id = resolve(&row.cells, STUDENT_ID_ALIASES).and_then(CellValue::text);
    let course = resolve(&row.cells, COURSE_ALIASES).and_then(CellValue::text);
    let grade_cell = resolve(&row.cells, GRADE_ALIASES);

    let (Some(student_id), Some(course), Some(grade_cell)) = (&student_id, &course, grade_cell)
    else {
        return Err(format!(
            "row {} incomplete: studentId={}, course={}, grade={}",
            row.row_number,
            student_id.as_deref().unwrap_or(MISSING),
            course.as_deref().unwrap_or(MISSING),
            grade_cell.and_then(CellValue::text).as_deref().unwrap_or(MISSING),
        ));
    };

    let Some(grade) = parse_grade(grade_cell) else {
        return Err(format!(
            "row {} invalid grade: {}",
            row.row_number,
            grade_cell.text().unwrap_or_default()
        ));
    };

    let name = resolve(&row.cells, NAME_ALIASES)
        .and_then(CellValue::text)
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());
    let semester = resolve(&row.cells, SEMESTER_ALIASES)
        .and_then(CellValue::text)
        .unwrap_or_else(|| default_semester.to_string());

    Ok(NormalizedGradeRow {
        student_id: student_id.clone(),
        name,
        course: course.clone(),
        grade,
        semester,
    })
}

/// Maps raw rows onto grade rows. A bad row adds one error and never stops
/// the rows after it.
pub fn normalize_rows(rows: &[RawRow], default_semester: &str) -> NormalizedSheet {
    let mut out = NormalizedSheet::default();
    for row in rows {
        match normalize_row(row, default_semester) {
            Ok(r) => out.rows.push(r),
            Err(e) => out.errors.push(e),
        }
    }
    out
}
