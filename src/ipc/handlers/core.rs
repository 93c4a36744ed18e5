use serde_json::{json, Value};
use std::path::PathBuf;

use crate::db;
use crate::ipc::helpers::{get_required_str, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};

fn handle_health(state: &mut AppState, _params: &Value) -> HandlerResult {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "usuario": state.session.as_ref().map(|s| s.usuario.clone()),
    }))
}

/// Open (creating if needed) the workspace at `path`. Any session belongs to
/// the previous workspace and is dropped.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> HandlerResult {
    let conn = db::open_db(&path).map_err(|e| HandlerErr {
        code: "db_open_failed",
        message: format!("{:#}", e),
        details: Some(json!({ "path": path.to_string_lossy() })),
    })?;
    state.session = None;
    state.db = Some(conn);
    state.workspace = Some(path.clone());
    tracing::info!(workspace = %path.display(), "workspace opened");
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

fn handle_workspace_select(state: &mut AppState, params: &Value) -> HandlerResult {
    let path = get_required_str(params, "path")?;
    open_workspace(state, PathBuf::from(path))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, &req.params),
        "workspace.select" => handle_workspace_select(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
