use serde_json::{json, Value};

use crate::error::CoreError;
use crate::ipc::helpers::{get_required_str, respond, workspace, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::session;

fn handle_login(state: &mut AppState, params: &Value) -> HandlerResult {
    let usuario = get_required_str(params, "usuario")?;
    let password = params.get("password").and_then(|v| v.as_str()).unwrap_or("");
    let s = {
        let ctx = workspace(state)?;
        session::login(&ctx.store, &usuario, password)?
    };
    let out = s.to_json();
    state.session = Some(s);
    Ok(out)
}

fn handle_logout(state: &mut AppState, _params: &Value) -> HandlerResult {
    if let Some(s) = state.session.take() {
        tracing::info!(usuario = %s.usuario, "logged out");
    }
    Ok(json!({ "ok": true }))
}

fn handle_whoami(state: &mut AppState, _params: &Value) -> HandlerResult {
    match state.session.as_ref() {
        Some(s) => Ok(s.to_json()),
        None => Err(CoreError::NoSession.into()),
    }
}

fn handle_accounts_upsert(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let usuario = get_required_str(params, "usuario")?;
    let password = get_required_str(params, "password")?;
    let rol = get_required_str(params, "rol")?;
    let role = session::upsert_account(&ctx.store, ctx.role, &usuario, &password, &rol)?;
    Ok(json!({ "usuario": usuario, "rol": role.as_str() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "session.login" => handle_login(state, &req.params),
        "session.logout" => handle_logout(state, &req.params),
        "session.whoami" => handle_whoami(state, &req.params),
        "accounts.upsert" => handle_accounts_upsert(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
