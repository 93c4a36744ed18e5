use serde_json::{json, Map, Value};

use crate::access::{browsable_groups, can_access, Module};
use crate::attendance::{AttendanceSheet, Roll};
use crate::config;
use crate::error::CoreError;
use crate::export::{self, ExportKind};
use crate::ipc::handlers::payments::records_for;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, respond, workspace, write_text_file, Ctx, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, Expense, Income};
use crate::roster::{self, CATECHISTS_PSEUDO_GROUP};
use crate::stats::{attendance_rate, group_stats, monthly_totals, outstanding_payments};

fn attendance_section(ctx: &Ctx<'_>, groups: &[String]) -> Result<Value, HandlerErr> {
    let scheme = config::load_scheme(ctx.conn)?;
    let mut students = Vec::new();
    let mut rates = Map::new();
    for g in groups {
        let in_group = roster::list_students(&ctx.store, Some(g))?;
        let sheet = AttendanceSheet::load(&ctx.store, Roll::Group(g.clone()), scheme.clone())?;
        let rate = attendance_rate(in_group.iter().flat_map(|s| sheet.row(&s.id)));
        rates.insert(g.clone(), json!(rate));
        students.extend(in_group);
    }
    Ok(json!({
        "studentsByGroup": group_stats(students.iter().map(|s| Some(s.grupo.as_str()))),
        "attendanceRate": rates,
    }))
}

fn outstanding_section(ctx: &Ctx<'_>, groups: &[String]) -> Result<Value, HandlerErr> {
    let mut out = Map::new();
    for g in groups {
        let records = records_for(ctx, g)?;
        let Some(expected) = records.first().map(|(_, _, r)| r.required) else {
            out.insert(g.clone(), json!([]));
            continue;
        };
        let lines: Vec<Value> = records
            .iter()
            .map(|(id, _, r)| json!({ "id": id, "monto": r.amount_paid }))
            .collect();
        let pending: Vec<_> = outstanding_payments(&lines, expected as f64)
            .into_iter()
            .filter(|o| o.remaining > 0.0)
            .collect();
        out.insert(g.clone(), json!(pending));
    }
    Ok(Value::Object(out))
}

fn handle_summary(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    if ctx.role.is_none() {
        return Err(CoreError::NoSession.into());
    }
    let only = get_optional_str(params, "grupo");
    // Groups a section covers; `None` leaves the section out.
    let scope = |module: Module| -> Option<Vec<String>> {
        if !can_access(module, ctx.role) {
            return None;
        }
        match &only {
            Some(g) => ctx.require_group(module, g).ok().map(|_| vec![g.clone()]),
            None => Some(browsable_groups(module, ctx.role)),
        }
    };

    let attendance = scope(Module::Attendance);
    let outstanding = scope(Module::Pagos);
    // a group no section may show is refused outright
    let grouped = [Module::Attendance, Module::Pagos]
        .into_iter()
        .find(|m| can_access(*m, ctx.role));
    if let (Some(g), Some(module)) = (&only, grouped) {
        if attendance.is_none() && outstanding.is_none() {
            ctx.require_group(module, g)?;
        }
    }

    let mut out = Map::new();
    if let Some(groups) = attendance {
        out.insert("attendance".into(), attendance_section(&ctx, &groups)?);
    }
    if let Some(groups) = outstanding {
        out.insert("outstanding".into(), outstanding_section(&ctx, &groups)?);
    }
    if can_access(Module::Gastos, ctx.role) {
        let values: Vec<Value> = ledger::list::<Expense>(&ctx.store)?
            .iter()
            .filter_map(|e| serde_json::to_value(e).ok())
            .collect();
        out.insert("gastosMensuales".into(), json!(monthly_totals(&values)));
    }
    if can_access(Module::Ingresos, ctx.role) {
        let values: Vec<Value> = ledger::list::<Income>(&ctx.store)?
            .iter()
            .filter_map(|e| serde_json::to_value(e).ok())
            .collect();
        out.insert("ingresosMensuales".into(), json!(monthly_totals(&values)));
    }
    Ok(Value::Object(out))
}

fn handle_export_csv(state: &mut AppState, params: &Value) -> HandlerResult {
    let ctx = workspace(state)?;
    let kind_raw = get_required_str(params, "kind")?;
    let Some(kind) = ExportKind::parse(&kind_raw) else {
        return Err(HandlerErr::bad_params(format!("unknown export kind: {}", kind_raw)));
    };
    let out_path = get_required_str(params, "outPath")?;
    let grupo = if kind.needs_group() {
        get_required_str(params, "grupo")?
    } else {
        String::new()
    };

    let table = match kind {
        ExportKind::Attendance => {
            ctx.require_group(Module::Attendance, &grupo)?;
            let people: Vec<(String, String)> = roster::list_students(&ctx.store, Some(&grupo))?
                .into_iter()
                .map(|s| (s.id, s.nombre))
                .collect();
            let scheme = config::load_scheme(ctx.conn)?;
            let sheet = AttendanceSheet::load(&ctx.store, Roll::Group(grupo.clone()), scheme)?;
            export::attendance_table(&people, &sheet)
        }
        ExportKind::Payments => {
            ctx.require_group(Module::Pagos, &grupo)?;
            let people: Vec<_> = records_for(&ctx, &grupo)?
                .into_iter()
                .map(|(_, nombre, record)| (nombre, record))
                .collect();
            export::payments_table(&people)
        }
        ExportKind::Expenses => {
            ctx.require(Module::Gastos)?;
            export::expenses_table(&ledger::list::<Expense>(&ctx.store)?)
        }
        ExportKind::Incomes => {
            ctx.require(Module::Ingresos)?;
            export::incomes_table(&ledger::list::<Income>(&ctx.store)?)
        }
        ExportKind::SignatureList => {
            if grupo == CATECHISTS_PSEUDO_GROUP {
                ctx.require(Module::Catequistas)?;
                let nombres: Vec<String> = roster::list_catechists(&ctx.store)?
                    .into_iter()
                    .map(|c| c.nombre)
                    .collect();
                export::signature_table(&grupo, &nombres)
            } else {
                ctx.require_group(Module::Students, &grupo)?;
                let nombres: Vec<String> = roster::list_students(&ctx.store, Some(&grupo))?
                    .into_iter()
                    .map(|s| s.nombre)
                    .collect();
                export::signature_table(&grupo, &nombres)
            }
        }
    };
    write_text_file(&out_path, &table.to_csv())?;
    tracing::info!(kind = %kind_raw, path = %out_path, rows = table.rows.len(), "csv exported");
    Ok(json!({
        "path": out_path,
        "rowsExported": table.rows.len(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "reports.summary" => handle_summary(state, &req.params),
        "reports.exportCsv" => handle_export_csv(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
