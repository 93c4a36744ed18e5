use serde_json::{json, Value};

use crate::access::Module;
use crate::attendance::{self, AttendanceSheet, Roll};
use crate::config;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, respond, workspace, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use crate::stats::group_stats;

fn handle_catechists_list(state: &mut AppState, _params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    ctx.require(Module::Catequistas)?;
    let catechists = roster::list_catechists(&ctx.store)?;
    let by_group = group_stats(catechists.iter().map(|c| Some(c.grupo.as_str())));
    Ok(json!({ "catechists": catechists, "byGroup": by_group }))
}

fn handle_catechists_add(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    ctx.require(Module::Catequistas)?;
    let nombre = get_required_str(params, "nombre")?;
    let grupo = get_optional_str(params, "grupo");
    let catechist = roster::add_catechist(&ctx.store, &nombre, grupo.as_deref())?;
    tracing::info!(nombre = %catechist.nombre, "catechist added");
    Ok(json!({ "catechist": catechist }))
}

fn handle_attendance_open(state: &mut AppState, _params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    ctx.require(Module::Catequistas)?;
    let scheme = config::load_scheme(ctx.conn)?;
    let catechists = roster::list_catechists(&ctx.store)?;
    let sheet = AttendanceSheet::load(&ctx.store, Roll::Catechists, scheme)?;
    let rows: Vec<Value> = catechists
        .iter()
        .map(|c| {
            json!({
                "nombre": c.nombre,
                "grupo": c.grupo,
                "presentCount": sheet.present_count(&c.nombre),
            })
        })
        .collect();
    Ok(json!({
        "sessions": sheet.scheme().sessions(),
        "catechists": rows,
        "states": sheet.to_json(),
    }))
}

fn handle_attendance_toggle(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    ctx.require(Module::Catequistas)?;
    let nombre = get_required_str(params, "nombre")?;
    let scheme = config::load_scheme(ctx.conn)?;
    let key = scheme.parse_key(params.get("session").unwrap_or(&Value::Null))?;
    if !roster::list_catechists(&ctx.store)?
        .iter()
        .any(|c| c.nombre == nombre)
    {
        return Err(HandlerErr::bad_params(format!("unknown catechist: {}", nombre)));
    }
    let estado = attendance::toggle(&ctx.store, &Roll::Catechists, &nombre, &key)?;
    Ok(json!({
        "nombre": nombre,
        "session": key.to_value(),
        "estado": estado.as_str(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "catechists.list" => handle_catechists_list(state, &req.params),
        "catechists.add" => handle_catechists_add(state, &req.params),
        "catechists.attendanceOpen" => handle_attendance_open(state, &req.params),
        "catechists.attendanceToggle" => handle_attendance_toggle(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
