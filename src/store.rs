use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::model::{GradeRecord, ProfileSummary, Role, StudentProfile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Persistence operations the request handlers rely on.
///
/// Each call stands alone: no caching, no retries, no cross-call transaction.
pub trait GradeStore {
    fn get_profile(&self, student_id: &str) -> Result<Option<StudentProfile>, StoreError>;

    /// Profiles as `{studentId, name, class}`, optionally without the ones
    /// tagged `admin`.
    fn list_profiles(&self, exclude_admins: bool) -> Result<Vec<ProfileSummary>, StoreError>;

    fn upsert_profile(&self, profile: &StudentProfile) -> Result<(), StoreError>;

    fn list_all_grades(&self) -> Result<Vec<GradeRecord>, StoreError>;

    /// Grades of one student whose window contains `as_of` (inclusive).
    fn query_grades_for_student(
        &self,
        student_id: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<GradeRecord>, StoreError>;

    /// Upsert keyed by (student, course, semester).
    fn put_grade(&self, record: &GradeRecord) -> Result<(), StoreError>;

    fn ping(&self) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<StudentProfile> {
    let role: Option<String> = row.get(3)?;
    Ok(StudentProfile {
        student_id: row.get(0)?,
        name: row.get(1)?,
        class: row.get(2)?,
        role: role.as_deref().and_then(Role::parse),
    })
}

fn grade_from_row(row: &Row<'_>) -> rusqlite::Result<GradeRecord> {
    Ok(GradeRecord {
        student_id: row.get(0)?,
        course: row.get(1)?,
        score: row.get(2)?,
        semester: row.get(3)?,
        query_start: row.get(4)?,
        query_end: row.get(5)?,
    })
}

impl GradeStore for SqliteStore {
    fn get_profile(&self, student_id: &str) -> Result<Option<StudentProfile>, StoreError> {
        let profile = self
            .conn
            .query_row(
                "SELECT student_id, name, class, role FROM students WHERE student_id = ?",
                [student_id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    fn list_profiles(&self, exclude_admins: bool) -> Result<Vec<ProfileSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, name, class
             FROM students
             WHERE ?1 = 0 OR role IS NULL OR lower(role) <> 'admin'
             ORDER BY class, student_id",
        )?;
        let rows = stmt
            .query_map([exclude_admins], |row| {
                Ok(ProfileSummary {
                    student_id: row.get(0)?,
                    name: row.get(1)?,
                    class: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn upsert_profile(&self, profile: &StudentProfile) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO students(student_id, name, class, role) VALUES(?, ?, ?, ?)
             ON CONFLICT(student_id) DO UPDATE SET
               name = excluded.name,
               class = excluded.class,
               role = excluded.role",
            (
                &profile.student_id,
                &profile.name,
                &profile.class,
                profile.role.map(Role::as_str),
            ),
        )?;
        Ok(())
    }

    fn list_all_grades(&self) -> Result<Vec<GradeRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, course, score, semester, query_start, query_end
             FROM grades
             ORDER BY student_id, semester, course",
        )?;
        let rows = stmt
            .query_map([], grade_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_grades_for_student(
        &self,
        student_id: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<GradeRecord>, StoreError> {
        // Key lookup first, window filter second, like a key-conditioned
        // query with a filter expression.
        let mut stmt = self.conn.prepare(
            "SELECT student_id, course, score, semester, query_start, query_end
             FROM grades
             WHERE student_id = ?
             ORDER BY semester, course",
        )?;
        let rows = stmt
            .query_map([student_id], grade_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter(|g| g.window().contains(as_of))
            .collect())
    }

    fn put_grade(&self, record: &GradeRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO grades(student_id, course, semester, score, query_start, query_end)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, course, semester) DO UPDATE SET
               score = excluded.score,
               query_start = excluded.query_start,
               query_end = excluded.query_end",
            (
                &record.student_id,
                &record.course,
                &record.semester,
                record.score,
                record.query_start,
                record.query_end,
            ),
        )?;
        Ok(())
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.conn
            .query_row("SELECT 1 FROM students LIMIT 1", [], |_| Ok(()))
            .optional()?;
        Ok(())
    }
}
