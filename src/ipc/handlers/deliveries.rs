use serde_json::{json, Map, Value};

use crate::access::Module;
use crate::deliveries::{
    self, document_types_json, DeliveryItem, DeliveryKind, DocumentType, DOCUMENT_TYPES,
};
use crate::ipc::helpers::{
    get_required_bool, get_required_str, respond, workspace, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, Student};

fn module_of(kind: DeliveryKind) -> Module {
    match kind {
        DeliveryKind::Documents => Module::Documents,
        DeliveryKind::Letters => Module::Cartas,
        DeliveryKind::Sheets => Module::Sabanas,
    }
}

fn find_in_group(students: &[Student], id: &str) -> Result<Student, HandlerErr> {
    students
        .iter()
        .find(|s| s.id == id)
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown student: {}", id)))
}

fn handle_open(state: &mut AppState, params: &Value, kind: DeliveryKind) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(module_of(kind), &grupo)?;
    let students = roster::list_students(&ctx.store, Some(&grupo))?;
    let flags = deliveries::load_group(&ctx.store, &grupo, kind)?;

    let rows: Vec<Value> = students
        .iter()
        .map(|s| {
            let mut row = json!({ "estudianteId": s.id, "nombre": s.nombre });
            match kind {
                DeliveryKind::Documents => {
                    let mut docs = Map::new();
                    for d in DOCUMENT_TYPES {
                        let v = flags
                            .get(&(s.id.clone(), d.id().to_string()))
                            .copied()
                            .unwrap_or(false);
                        docs.insert(d.id().to_string(), Value::Bool(v));
                    }
                    let delivered = docs.values().filter(|v| v.as_bool() == Some(true)).count();
                    row["documentos"] = Value::Object(docs);
                    row["entregados"] = json!(delivered);
                    row["completo"] = json!(delivered == DOCUMENT_TYPES.len());
                }
                DeliveryKind::Letters | DeliveryKind::Sheets => {
                    let v = flags.get(&(s.id.clone(), String::new())).copied().unwrap_or(false);
                    row["entregado"] = json!(v);
                }
            }
            row
        })
        .collect();
    let done_field = match kind {
        DeliveryKind::Documents => "completo",
        DeliveryKind::Letters | DeliveryKind::Sheets => "entregado",
    };
    let delivered_count = rows
        .iter()
        .filter(|r| r.get(done_field).and_then(|v| v.as_bool()) == Some(true))
        .count();

    let mut out = json!({
        "grupo": grupo,
        "students": rows,
        "completados": delivered_count,
    });
    if kind == DeliveryKind::Documents {
        out["documentTypes"] = document_types_json();
    }
    Ok(out)
}

fn handle_set(state: &mut AppState, params: &Value, kind: DeliveryKind) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(module_of(kind), &grupo)?;
    let id = get_required_str(params, "estudianteId")?;
    let entregado = get_required_bool(params, "entregado")?;
    let student = find_in_group(&roster::list_students(&ctx.store, Some(&grupo))?, &id)?;
    let item = match kind {
        DeliveryKind::Documents => {
            let doc_id = get_required_str(params, "documentoId")?;
            let doc = DocumentType::parse(&doc_id)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown document type: {}", doc_id)))?;
            DeliveryItem::Document(doc)
        }
        DeliveryKind::Letters => DeliveryItem::Letter,
        DeliveryKind::Sheets => DeliveryItem::Sheet,
    };
    let stored = deliveries::set_delivered(
        &ctx.store,
        &grupo,
        &id,
        Some(&student.nombre),
        item,
        entregado,
    )?;
    Ok(json!({ "estudianteId": id, "entregado": stored }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "documents.open" => handle_open(state, &req.params, DeliveryKind::Documents),
        "documents.set" => handle_set(state, &req.params, DeliveryKind::Documents),
        "letters.open" => handle_open(state, &req.params, DeliveryKind::Letters),
        "letters.set" => handle_set(state, &req.params, DeliveryKind::Letters),
        "sheets.open" => handle_open(state, &req.params, DeliveryKind::Sheets),
        "sheets.set" => handle_set(state, &req.params, DeliveryKind::Sheets),
        _ => return None,
    };
    Some(respond(req, result))
}
