use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::access::Role;
use crate::session::Session;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
}

impl AppState {
    pub fn role(&self) -> Option<&Role> {
        self.session.as_ref().map(|s| &s.role)
    }
}
