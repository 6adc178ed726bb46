use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "GRADESD_WORKSPACE";
pub const DEFAULT_SEMESTER_ENV: &str = "GRADESD_DEFAULT_SEMESTER";

/// Semester used for spreadsheet rows without a semester column.
pub const FALLBACK_SEMESTER: &str = "2023-2";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Workspace opened at startup; `workspace.select` can switch later.
    pub workspace: Option<PathBuf>,
    pub default_semester: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            default_semester: FALLBACK_SEMESTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            workspace: non_empty(WORKSPACE_ENV).map(PathBuf::from),
            default_semester: non_empty(DEFAULT_SEMESTER_ENV).unwrap_or(defaults.default_semester),
        }
    }
}
