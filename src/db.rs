use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "grades.sqlite3";
pub const STUDENTS_TABLE: &str = "students";
pub const GRADES_TABLE: &str = "grades";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            student_id TEXT PRIMARY KEY CHECK(length(student_id) > 0),
            name TEXT NOT NULL,
            class TEXT NOT NULL DEFAULT '',
            role TEXT CHECK(role IS NULL OR role IN ('student', 'admin'))
        )",
        [],
    )?;

    // Workspaces created before profiles carried an explicit role.
    ensure_students_role(conn)?;

    // No foreign key to students: grades may be uploaded before the
    // profile is provisioned.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            student_id TEXT NOT NULL,
            course TEXT NOT NULL,
            semester TEXT NOT NULL,
            score REAL NOT NULL CHECK(score >= 0 AND score <= 100),
            query_start TEXT NOT NULL,
            query_end TEXT NOT NULL,
            PRIMARY KEY(student_id, course, semester)
        )",
        [],
    )?;

    Ok(())
}

fn ensure_students_role(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, STUDENTS_TABLE, "role")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN role TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
