use serde_json::{json, Value};

use crate::access::Module;
use crate::config;
use crate::ipc::helpers::{
    get_required_i64, get_required_str, respond, workspace, Ctx, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::payments::{self, Payer, PaymentRecord};
use crate::roster::{self, CATECHISTS_PSEUDO_GROUP};

/// `(person id, display name, payer)` for everyone who owes in `grupo`.
fn payers(ctx: &Ctx<'_>, grupo: &str) -> Result<Vec<(String, String, Payer)>, HandlerErr> {
    if grupo == CATECHISTS_PSEUDO_GROUP {
        return Ok(roster::list_catechists(&ctx.store)?
            .into_iter()
            .map(|c| {
                let payer = Payer::Catechist {
                    nombre: c.nombre.clone(),
                };
                (c.nombre.clone(), c.nombre, payer)
            })
            .collect());
    }
    Ok(roster::list_students(&ctx.store, Some(grupo))?
        .into_iter()
        .map(|s| {
            let payer = Payer::Student {
                grupo: grupo.to_string(),
                estudiante_id: s.id.clone(),
                nombre: Some(s.nombre.clone()),
            };
            (s.id, s.nombre, payer)
        })
        .collect())
}

fn required_for(ctx: &Ctx<'_>, grupo: &str) -> Result<i64, HandlerErr> {
    let amounts = config::load_payment_amounts(ctx.conn)?;
    Ok(if grupo == CATECHISTS_PSEUDO_GROUP {
        amounts.catequista
    } else {
        amounts.retiro
    })
}

/// Every payer of `grupo` with their stored record, or an unpaid one at the
/// configured amount.
pub(super) fn records_for(
    ctx: &Ctx<'_>,
    grupo: &str,
) -> Result<Vec<(String, String, PaymentRecord)>, HandlerErr> {
    let required = required_for(ctx, grupo)?;
    let stored = if grupo == CATECHISTS_PSEUDO_GROUP {
        payments::load_catechists(&ctx.store)?
    } else {
        payments::load_group(&ctx.store, grupo)?
    };
    Ok(payers(ctx, grupo)?
        .into_iter()
        .map(|(id, nombre, _)| {
            let record = stored
                .get(&id)
                .copied()
                .unwrap_or_else(|| PaymentRecord::unpaid(required));
            (id, nombre, record)
        })
        .collect())
}

fn handle_payments_open(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(Module::Pagos, &grupo)?;
    let records = records_for(&ctx, &grupo)?;
    let rows: Vec<Value> = records
        .iter()
        .map(|(id, nombre, record)| {
            let mut row = record.to_json();
            row["personId"] = json!(id);
            row["nombre"] = json!(nombre);
            row
        })
        .collect();
    Ok(json!({
        "grupo": grupo,
        "montoRequerido": required_for(&ctx, &grupo)?,
        "rows": rows,
        "totals": payments::totals(records.iter().map(|(_, _, r)| r)),
    }))
}

fn handle_payments_set(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let grupo = get_required_str(params, "grupo")?;
    ctx.require_group(Module::Pagos, &grupo)?;
    let person = get_required_str(params, "personId")?;
    let amount = get_required_i64(params, "montoPagado")?;
    let record = PaymentRecord::new(amount, required_for(&ctx, &grupo)?)?;
    let Some((_, _, payer)) = payers(&ctx, &grupo)?.into_iter().find(|(id, _, _)| *id == person)
    else {
        return Err(HandlerErr::bad_params(format!("unknown person in {}: {}", grupo, person)));
    };
    let saved = payments::save_payment(&ctx.store, &payer, record)?;
    let mut out = saved.to_json();
    out["personId"] = json!(person);
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "payments.open" => handle_payments_open(state, &req.params),
        "payments.set" => handle_payments_set(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
