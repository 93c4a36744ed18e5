use serde_json::{json, Value};
use std::path::PathBuf;

use crate::access::Role;
use crate::backup;
use crate::error::CoreError;
use crate::ipc::handlers::core::open_workspace;
use crate::ipc::helpers::{get_required_str, respond, workspace, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};

fn require_admin(state: &AppState) -> Result<(), HandlerErr> {
    match state.role() {
        None => Err(CoreError::NoSession.into()),
        Some(Role::Admin) => Ok(()),
        Some(_) => Err(CoreError::AdminOnly("back up or restore the workspace").into()),
    }
}

fn io_failed(e: anyhow::Error, path: &str) -> HandlerErr {
    HandlerErr {
        code: "io_failed",
        message: format!("{:#}", e),
        details: Some(json!({ "path": path })),
    }
}

fn handle_export(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    require_admin(state)?;
    let out_path = get_required_str(params, "outPath")?;
    let Some(workspace_path) = state.workspace.as_ref() else {
        return Err(CoreError::invalid("select a workspace first").into());
    };
    let summary =
        backup::export_workspace_bundle(workspace_path, ctx.conn, &PathBuf::from(&out_path))
            .map_err(|e| io_failed(e, &out_path))?;
    Ok(json!({
        "path": out_path,
        "bundleFormat": summary.bundle_format,
        "rowCounts": summary.row_counts,
    }))
}

fn handle_import(state: &mut AppState, params: &Value) -> HandlerResult {
    workspace(state)?;
    require_admin(state)?;
    let in_path = get_required_str(params, "inPath")?;
    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(HandlerErr {
            code: "not_found",
            message: "bundle file not found".to_string(),
            details: Some(json!({ "path": in_path })),
        });
    }
    let Some(workspace_path) = state.workspace.clone() else {
        return Err(CoreError::invalid("select a workspace first").into());
    };

    // The open handle must go before its file is replaced.
    let session = state.session.take();
    state.db = None;
    let imported = backup::import_workspace_bundle(&src, &workspace_path);
    let reopened = open_workspace(state, workspace_path)?;
    let summary = match imported {
        Ok(v) => v,
        Err(e) => {
            // nothing was replaced, so the caller stays logged in
            state.session = session;
            return Err(io_failed(e, &in_path));
        }
    };
    Ok(json!({
        "workspacePath": reopened["workspacePath"],
        "bundleFormatDetected": summary.bundle_format_detected,
        "loggedOut": true,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspace" => handle_export(state, &req.params),
        "backup.importWorkspace" => handle_import(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
