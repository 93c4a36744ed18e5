use serde_json::{Map, Value};

use crate::access::Role;
use crate::config::{self, SetupSection, SETUP_SECTIONS};
use crate::error::CoreError;
use crate::ipc::helpers::{get_required_str, respond, workspace, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};

fn handle_setup_get(state: &mut AppState, _params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    if ctx.role.is_none() {
        return Err(CoreError::NoSession.into());
    }
    let mut out = Map::new();
    for section in SETUP_SECTIONS {
        out.insert(
            section.name().to_string(),
            config::load_section(ctx.conn, section)?,
        );
    }
    Ok(Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    match ctx.role {
        None => return Err(CoreError::NoSession.into()),
        Some(Role::Admin) => {}
        Some(_) => return Err(CoreError::AdminOnly("change the setup").into()),
    }
    let section_raw = get_required_str(params, "section")?;
    let Some(section) = SetupSection::parse(&section_raw) else {
        return Err(HandlerErr::bad_params("unknown section"));
    };
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    match config::update_section(ctx.conn, section, patch)? {
        Ok(current) => Ok(current),
        Err(msg) => Err(HandlerErr::bad_params(msg)),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "setup.get" => handle_setup_get(state, &req.params),
        "setup.update" => handle_setup_update(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
