use chrono::Local;
use serde_json::{json, Value};

use crate::access::Module;
use crate::ipc::helpers::{get_required_str, respond, workspace, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, Expense, Income, LedgerEntry};

fn handle_list<E: LedgerEntry>(state: &mut AppState, module: Module) -> HandlerResult {
    let ctx = workspace(state)?;
    ctx.require(module)?;
    let entries: Vec<E> = ledger::list(&ctx.store)?;
    let summary = ledger::summarize(&entries);
    Ok(json!({ "entries": entries, "summary": summary }))
}

fn handle_create<E: LedgerEntry>(state: &mut AppState, params: &Value, module: Module) -> HandlerResult {
    let ctx = workspace(state)?;
    ctx.require(module)?;
    let entry = E::from_params(params, Local::now().date_naive())?;
    let created = ledger::create(&ctx.store, entry)?;
    Ok(json!({ "entry": created }))
}

fn handle_update<E: LedgerEntry>(state: &mut AppState, params: &Value, module: Module) -> HandlerResult {
    let ctx = workspace(state)?;
    ctx.require(module)?;
    let id = get_required_str(params, "id")?;
    let entry = E::from_params(params, Local::now().date_naive())?;
    let updated = ledger::update(&ctx.store, &id, entry)?;
    Ok(json!({ "entry": updated }))
}

fn handle_delete<E: LedgerEntry>(state: &mut AppState, params: &Value, module: Module) -> HandlerResult {
    let ctx = workspace(state)?;
    ctx.require(module)?;
    let id = get_required_str(params, "id")?;
    if !ledger::delete::<E>(&ctx.store, &id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: format!("no entry with id {}", id),
            details: None,
        });
    }
    Ok(json!({ "ok": true, "id": id }))
}

/// Needs both ledgers, so both modules.
fn handle_balance(state: &mut AppState, _params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    ctx.require(Module::Gastos)?;
    ctx.require(Module::Ingresos)?;
    let expenses = ledger::summarize(&ledger::list::<Expense>(&ctx.store)?);
    let incomes = ledger::summarize(&ledger::list::<Income>(&ctx.store)?);
    Ok(json!({
        "ingresos": incomes.total,
        "gastos": expenses.total,
        "balance": incomes.total - expenses.total,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let p = &req.params;
    let result = match req.method.as_str() {
        "expenses.list" => handle_list::<Expense>(state, Module::Gastos),
        "expenses.create" => handle_create::<Expense>(state, p, Module::Gastos),
        "expenses.update" => handle_update::<Expense>(state, p, Module::Gastos),
        "expenses.delete" => handle_delete::<Expense>(state, p, Module::Gastos),
        "incomes.list" => handle_list::<Income>(state, Module::Ingresos),
        "incomes.create" => handle_create::<Income>(state, p, Module::Ingresos),
        "incomes.update" => handle_update::<Income>(state, p, Module::Ingresos),
        "incomes.delete" => handle_delete::<Income>(state, p, Module::Ingresos),
        "ledger.balance" => handle_balance(state, p),
        _ => return None,
    };
    Some(respond(req, result))
}
