use serde_json::{json, Value};

use crate::access::Module;
use crate::attendance::{self, AttendanceSheet, Roll};
use crate::config;
use crate::error::CoreError;
use crate::ipc::helpers::{get_required_str, respond, workspace, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use crate::stats::attendance_rate;

fn handle_sessions_list(state: &mut AppState, _params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    if ctx.role.is_none() {
        return Err(CoreError::NoSession.into());
    }
    let scheme = config::load_scheme(ctx.conn)?;
    Ok(json!({
        "keyColumn": scheme.key_column(),
        "count": scheme.len(),
        "sessions": scheme.sessions(),
    }))
}

fn handle_attendance_open(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(Module::Attendance, &grupo)?;
    let scheme = config::load_scheme(ctx.conn)?;
    let students = roster::list_students(&ctx.store, Some(&grupo))?;
    let sheet = AttendanceSheet::load(&ctx.store, Roll::Group(grupo.clone()), scheme)?;

    let rows: Vec<Value> = students
        .iter()
        .map(|s| {
            json!({
                "estudianteId": s.id,
                "nombre": s.nombre,
                "presentCount": sheet.present_count(&s.id),
                "rate": attendance_rate(sheet.row(&s.id)),
            })
        })
        .collect();
    let all = students.iter().flat_map(|s| sheet.row(&s.id));
    Ok(json!({
        "grupo": grupo,
        "sessions": sheet.scheme().sessions(),
        "students": rows,
        "states": sheet.to_json(),
        "groupRate": attendance_rate(all),
    }))
}

fn handle_attendance_toggle(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(Module::Attendance, &grupo)?;
    let id = get_required_str(params, "estudianteId")?;
    let scheme = config::load_scheme(ctx.conn)?;
    let key = scheme.parse_key(params.get("session").unwrap_or(&Value::Null))?;
    if roster::find_student(&ctx.store, &grupo, &id)?.is_none() {
        return Err(HandlerErr::bad_params(format!("no student {} in {}", id, grupo)));
    }
    let estado = attendance::toggle(&ctx.store, &Roll::Group(grupo), &id, &key)?;
    Ok(json!({
        "estudianteId": id,
        "session": key.to_value(),
        "estado": estado.as_str(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "sessions.list" => handle_sessions_list(state, &req.params),
        "attendance.open" => handle_attendance_open(state, &req.params),
        "attendance.toggle" => handle_attendance_toggle(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
