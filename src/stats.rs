use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::attendance::Estado;
use crate::format::parse_date;
use crate::roster::NO_GROUP;

/// Percentage of `presente` records, rounded; 0 for no records.
pub fn attendance_rate<I>(records: I) -> u32
where
    I: IntoIterator<Item = Estado>,
{
    let mut total: usize = 0;
    let mut present: usize = 0;
    for e in records {
        total += 1;
        if e == Estado::Present {
            present += 1;
        }
    }
    if total == 0 {
        return 0;
    }
    ((present as f64 / total as f64) * 100.0).round() as u32
}

/// Numbers or numeric strings; anything else is not an amount.
pub fn amount_of(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn payment_id(row: &Value) -> Option<String> {
    ["estudianteId", "id", "studentId"]
        .iter()
        .filter_map(|k| row.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outstanding {
    pub id: String,
    pub paid: f64,
    pub remaining: f64,
}

/// Sums payment lines per person against one expected amount. Lines with
/// no id or a non-numeric `monto` are skipped. Output follows first
/// appearance of each id.
pub fn outstanding_payments(payments: &[Value], expected: f64) -> Vec<Outstanding> {
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, f64> = HashMap::new();
    for p in payments {
        let Some(id) = payment_id(p) else { continue };
        let Some(amount) = p.get("monto").and_then(amount_of) else {
            continue;
        };
        if !sums.contains_key(&id) {
            order.push(id.clone());
        }
        *sums.entry(id).or_insert(0.0) += amount;
    }
    order
        .into_iter()
        .map(|id| {
            let paid = sums.get(&id).copied().unwrap_or(0.0);
            Outstanding {
                id,
                paid,
                remaining: (expected - paid).max(0.0),
            }
        })
        .collect()
}

/// Sums `monto` by the `YYYY-MM` of `fecha`. Rows with an unparseable date
/// or amount are left out of the sums.
pub fn monthly_totals(transactions: &[Value]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for t in transactions {
        let Some(date) = t.get("fecha").and_then(|v| v.as_str()).and_then(parse_date) else {
            continue;
        };
        let Some(amount) = t.get("monto").and_then(amount_of) else {
            continue;
        };
        *totals.entry(date.format("%Y-%m").to_string()).or_insert(0.0) += amount;
    }
    totals
}

/// Head count per group label; blank or missing labels count as "Sin grupo".
pub fn group_stats<'a, I>(groups: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut stats = BTreeMap::new();
    for g in groups {
        let label = g.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(NO_GROUP);
        *stats.entry(label.to_string()).or_insert(0) += 1;
    }
    stats
}
