use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One stdin line: `{"id", "method", "params"}`. `params` defaults to null so
/// parameterless methods need no payload.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Process-lifetime connection state. Db-backed methods refuse to run until a
/// workspace has been selected.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    pub fn disconnected() -> Self {
        AppState {
            workspace: None,
            db: None,
        }
    }
}
