use serde_json::{json, Value};

use crate::access::{browsable_groups, can_access, Module};
use crate::attendance::{AttendanceSheet, Roll};
use crate::config;
use crate::deliveries::{self, DeliveryKind};
use crate::error::CoreError;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, respond, workspace, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::payments::{self, PaymentRecord};
use crate::roster::{self, Contact, GROUPS};
use crate::stats::attendance_rate;

fn handle_groups_list(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let module = match get_optional_str(params, "module") {
        Some(m) => Module::parse(&m)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown module: {}", m)))?,
        None => Module::Students,
    };
    ctx.require(module)?;
    Ok(json!({
        "groups": browsable_groups(module, ctx.role),
        "all": GROUPS,
    }))
}

fn handle_students_list(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    ctx.require(Module::Students)?;
    let groups = match get_optional_str(params, "grupo") {
        Some(g) => {
            ctx.require_group(Module::Students, &g)?;
            vec![g]
        }
        None => browsable_groups(Module::Students, ctx.role),
    };
    let mut students = Vec::new();
    for g in &groups {
        students.extend(roster::list_students(&ctx.store, Some(g))?);
    }
    if let Some(term) = get_optional_str(params, "search") {
        students = roster::search_students(students, &term);
    }
    Ok(json!({ "students": students }))
}

fn handle_students_create(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(Module::Students, &grupo)?;
    let nombre = get_required_str(params, "nombre")?;
    let mut created = roster::add_students(&ctx.store, &grupo, &[nombre])?;
    tracing::info!(grupo = %grupo, "student created");
    Ok(json!({ "student": created.pop() }))
}

fn handle_students_import(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(Module::Students, &grupo)?;
    let Some(raw) = params.get("nombres").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("nombres must be an array"));
    };
    let nombres: Vec<String> = raw
        .iter()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if nombres.is_empty() {
        return Err(HandlerErr::bad_params("nombres must contain at least one name"));
    }
    let created = roster::add_students(&ctx.store, &grupo, &nombres)?;
    tracing::info!(grupo = %grupo, count = created.len(), "students imported");
    Ok(json!({ "imported": created.len(), "students": created }))
}

fn handle_students_rename(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(Module::Students, &grupo)?;
    let id = get_required_str(params, "estudianteId")?;
    let nombre = get_required_str(params, "nombre")?;
    let student = roster::rename_student(&ctx.store, &grupo, &id, &nombre)?;
    Ok(json!({ "student": student }))
}

fn handle_students_detail(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(Module::Students, &grupo)?;
    let id = get_required_str(params, "estudianteId")?;
    let Some(student) = roster::find_student(&ctx.store, &grupo, &id)? else {
        return Err(CoreError::invalid("student not found").into());
    };

    let scheme = config::load_scheme(ctx.conn)?;
    let sheet = AttendanceSheet::load(&ctx.store, Roll::Group(grupo.clone()), scheme)?;
    let attendance: serde_json::Map<String, Value> = sheet
        .scheme()
        .keys()
        .iter()
        .map(|k| (k.to_string(), json!(sheet.state(&id, k).as_str())))
        .collect();
    let states = sheet.row(&id);
    let total_sessions = states.len();
    let rate = attendance_rate(states);

    let documents = deliveries::load_student(&ctx.store, &grupo, &id, DeliveryKind::Documents)?;
    let documents_delivered = documents.values().filter(|v| **v).count();

    let mut out = json!({
        "student": student,
        "attendance": attendance,
        "presentCount": sheet.present_count(&id),
        "totalSessions": total_sessions,
        "attendanceRate": rate,
        "documents": documents,
        "documentsDelivered": documents_delivered,
        "notas": roster::load_notes(&ctx.store, &grupo, &id)?,
        "contacto": roster::load_contact(&ctx.store, &grupo, &id)?,
    });
    if can_access(Module::Pagos, ctx.role) {
        let required = config::load_payment_amounts(ctx.conn)?.retiro;
        let payer = payments::Payer::Student {
            grupo: grupo.clone(),
            estudiante_id: id.clone(),
            nombre: None,
        };
        let record = payments::load_payment(&ctx.store, &payer)?
            .map(|p| p.record)
            .unwrap_or_else(|| PaymentRecord::unpaid(required));
        out["payment"] = record.to_json();
    }
    if can_access(Module::Cartas, ctx.role) {
        let letter = deliveries::load_student(&ctx.store, &grupo, &id, DeliveryKind::Letters)?;
        out["cartaEntregada"] = json!(letter.values().any(|v| *v));
    }
    if can_access(Module::Sabanas, ctx.role) {
        let sheet = deliveries::load_student(&ctx.store, &grupo, &id, DeliveryKind::Sheets)?;
        out["sabanaEntregada"] = json!(sheet.values().any(|v| *v));
    }
    Ok(out)
}

fn handle_notes_update(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(Module::Students, &grupo)?;
    let id = get_required_str(params, "estudianteId")?;
    let notas = params
        .get("notas")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("notas must be a string"))?;
    if notas.chars().count() > 5000 {
        return Err(HandlerErr::bad_params("notas must be at most 5000 characters"));
    }
    roster::save_notes(&ctx.store, &grupo, &id, notas)?;
    Ok(json!({ "ok": true }))
}

fn handle_contact_update(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(Module::Students, &grupo)?;
    let id = get_required_str(params, "estudianteId")?;
    if roster::find_student(&ctx.store, &grupo, &id)?.is_none() {
        return Err(CoreError::invalid("student not found").into());
    }
    let contact = Contact {
        cedula: get_optional_str(params, "cedula"),
        telefono: get_optional_str(params, "telefono"),
        email: get_optional_str(params, "email"),
        encargado: get_optional_str(params, "encargado"),
    }
    .validated()?;
    roster::save_contact(&ctx.store, &grupo, &id, &contact)?;
    Ok(json!({ "contacto": contact }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "groups.list" => handle_groups_list(state, &req.params),
        "students.list" => handle_students_list(state, &req.params),
        "students.create" => handle_students_create(state, &req.params),
        "students.import" => handle_students_import(state, &req.params),
        "students.rename" => handle_students_rename(state, &req.params),
        "students.detail" => handle_students_detail(state, &req.params),
        "students.notes.update" => handle_notes_update(state, &req.params),
        "students.contact.update" => handle_contact_update(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
