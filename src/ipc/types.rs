use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::store::SqliteStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            store: None,
        }
    }

    /// Opens (creating if needed) the workspace database and makes it the
    /// active store. The previous store stays active if opening fails.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        self.store = Some(SqliteStore::new(conn));
        self.workspace = Some(path.to_path_buf());
        info!(workspace = %path.display(), "workspace opened");
        Ok(())
    }
}
