//! Expense and income bookkeeping. Unlike every other table, ledger rows
//! can be deleted.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::format::parse_date;
use crate::roster::as_row;
use crate::stats::{amount_of, monthly_totals};
use crate::store::{now_stamp, Filter, Store};
use crate::validation::{is_positive_amount, max_length, required};

pub const EXPENSE_CATEGORIES: [&str; 6] = [
    "transporte",
    "alimentacion",
    "materiales",
    "hospedaje",
    "servicios",
    "otros",
];

pub const INCOME_METHODS: [&str; 3] = ["efectivo", "sinpe", "transferencia"];

pub trait LedgerEntry: Serialize + DeserializeOwned + Clone {
    const TABLE: &'static str;

    /// Build from request params, filling defaults and validating.
    fn from_params(params: &Value, today: NaiveDate) -> CoreResult<Self>;
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn monto(&self) -> f64;
    /// `categoria` for expenses, `metodo` for incomes.
    fn class(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(default)]
    pub id: String,
    pub concepto: String,
    pub monto: f64,
    pub fecha: String,
    pub categoria: String,
    pub descripcion: Option<String>,
    pub pagado_por: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    #[serde(default)]
    pub id: String,
    pub origen: String,
    pub monto: f64,
    pub fecha: String,
    pub metodo: String,
    pub descripcion: Option<String>,
}

fn required_text(params: &Value, key: &str, max: usize) -> CoreResult<String> {
    if !required(params.get(key)) {
        return Err(CoreError::invalid(format!("{} is required", key)));
    }
    let s = params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| CoreError::invalid(format!("{} must be a string", key)))?
        .trim()
        .to_string();
    if !max_length(&s, max) {
        return Err(CoreError::invalid(format!("{} must be at most {} characters", key, max)));
    }
    Ok(s)
}

fn optional_text(params: &Value, key: &str, max: usize) -> CoreResult<Option<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => {
            if !max_length(s.trim(), max) {
                return Err(CoreError::invalid(format!(
                    "{} must be at most {} characters",
                    key, max
                )));
            }
            Ok(Some(s.trim().to_string()))
        }
        Some(_) => Err(CoreError::invalid(format!("{} must be a string", key))),
    }
}

fn positive_amount(params: &Value) -> CoreResult<f64> {
    let v = params.get("monto").unwrap_or(&Value::Null);
    if !is_positive_amount(v) {
        return Err(CoreError::invalid("monto must be a positive amount"));
    }
    amount_of(v).ok_or_else(|| CoreError::invalid("monto must be a positive amount"))
}

fn date_or_today(params: &Value, today: NaiveDate) -> CoreResult<String> {
    match params.get("fecha").and_then(|v| v.as_str()).map(str::trim) {
        None | Some("") => Ok(today.format("%Y-%m-%d").to_string()),
        Some(s) => parse_date(s)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .ok_or_else(|| CoreError::invalid("fecha must be YYYY-MM-DD")),
    }
}

fn one_of(params: &Value, key: &str, allowed: &[&str], default: &str) -> CoreResult<String> {
    match params.get(key).and_then(|v| v.as_str()).map(str::trim) {
        None | Some("") => Ok(default.to_string()),
        Some(s) if allowed.contains(&s) => Ok(s.to_string()),
        Some(_) => Err(CoreError::invalid(format!(
            "{} must be one of: {}",
            key,
            allowed.join(", ")
        ))),
    }
}

impl LedgerEntry for Expense {
    const TABLE: &'static str = "gastos_confirmacion";

    fn from_params(params: &Value, today: NaiveDate) -> CoreResult<Self> {
        Ok(Self {
            id: String::new(),
            concepto: required_text(params, "concepto", 200)?,
            monto: positive_amount(params)?,
            fecha: date_or_today(params, today)?,
            categoria: one_of(params, "categoria", &EXPENSE_CATEGORIES, "transporte")?,
            descripcion: optional_text(params, "descripcion", 1000)?,
            pagado_por: optional_text(params, "pagado_por", 120)?,
        })
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn monto(&self) -> f64 {
        self.monto
    }

    fn class(&self) -> &str {
        &self.categoria
    }
}

impl LedgerEntry for Income {
    const TABLE: &'static str = "ingresos_confirmacion";

    fn from_params(params: &Value, today: NaiveDate) -> CoreResult<Self> {
        Ok(Self {
            id: String::new(),
            origen: required_text(params, "origen", 200)?,
            monto: positive_amount(params)?,
            fecha: date_or_today(params, today)?,
            metodo: one_of(params, "metodo", &INCOME_METHODS, "efectivo")?,
            descripcion: optional_text(params, "descripcion", 1000)?,
        })
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn monto(&self) -> f64 {
        self.monto
    }

    fn class(&self) -> &str {
        &self.metodo
    }
}

/// Newest first.
pub fn list<E: LedgerEntry>(store: &dyn Store) -> CoreResult<Vec<E>> {
    let rows = store.select(E::TABLE, &Filter::new().order_by("fecha", false))?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<E>(Value::Object(row)) {
            Ok(e) => out.push(e),
            Err(e) => tracing::warn!(table = E::TABLE, error = %e, "skipping malformed ledger row"),
        }
    }
    Ok(out)
}

fn write<E: LedgerEntry>(store: &dyn Store, entry: &E, is_new: bool) -> CoreResult<()> {
    let value = serde_json::to_value(entry).map_err(|e| CoreError::invalid(e.to_string()))?;
    let mut row = as_row(value);
    if is_new {
        row.insert("created_at".into(), Value::String(now_stamp()));
    }
    store.upsert(E::TABLE, row, &["id"])
}

pub fn create<E: LedgerEntry>(store: &dyn Store, mut entry: E) -> CoreResult<E> {
    entry.set_id(uuid::Uuid::new_v4().to_string());
    write(store, &entry, true)?;
    tracing::info!(table = E::TABLE, id = entry.id(), monto = entry.monto(), "ledger entry created");
    Ok(entry)
}

pub fn update<E: LedgerEntry>(store: &dyn Store, id: &str, mut entry: E) -> CoreResult<E> {
    if store
        .select(E::TABLE, &Filter::new().eq("id", id))?
        .is_empty()
    {
        return Err(CoreError::invalid(format!("no entry with id {}", id)));
    }
    entry.set_id(id.to_string());
    write(store, &entry, false)?;
    tracing::info!(table = E::TABLE, id, "ledger entry updated");
    Ok(entry)
}

/// `false` when nothing had that id.
pub fn delete<E: LedgerEntry>(store: &dyn Store, id: &str) -> CoreResult<bool> {
    let n = store.delete(E::TABLE, &Filter::new().eq("id", id))?;
    tracing::info!(table = E::TABLE, id, deleted = n, "ledger entry deleted");
    Ok(n > 0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub total: f64,
    #[serde(rename = "byClass")]
    pub by_class: BTreeMap<String, f64>,
    pub monthly: BTreeMap<String, f64>,
}

pub fn summarize<E: LedgerEntry>(entries: &[E]) -> LedgerSummary {
    let mut s = LedgerSummary::default();
    let mut values = Vec::with_capacity(entries.len());
    for e in entries {
        s.total += e.monto();
        *s.by_class.entry(e.class().to_string()).or_insert(0.0) += e.monto();
        if let Ok(v) = serde_json::to_value(e) {
            values.push(v);
        }
    }
    s.monthly = monthly_totals(&values);
    s
}
