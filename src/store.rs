//! Keyed read/write access to the workspace tables.
//!
//! Everything above this module talks to tables through [`Store`] only:
//! `select` with equality filters, `upsert` on a declared conflict key and
//! `delete`. [`SqliteStore`] is the production implementation.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Int,
    Real,
    Bool,
}

pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [(&'static str, ColumnKind)],
}

impl TableSpec {
    fn kind_of(&self, column: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, k)| *k)
    }
}

use ColumnKind::{Bool, Int, Real, Text};

pub const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "usuarios",
        columns: &[("usuario", Text), ("password_hash", Text), ("rol", Text)],
    },
    TableSpec {
        name: "estudiantes",
        columns: &[
            ("id", Text),
            ("grupo", Text),
            ("nombre", Text),
            ("sort_order", Int),
            ("created_at", Text),
        ],
    },
    TableSpec {
        name: "catequistas",
        columns: &[("nombre", Text), ("grupo", Text), ("sort_order", Int)],
    },
    TableSpec {
        name: "asistencias",
        columns: &[
            ("grupo", Text),
            ("estudiante_id", Text),
            ("fecha", Text),
            ("catequesis_num", Int),
            ("estado", Text),
            ("updated_at", Text),
        ],
    },
    TableSpec {
        name: "asistencia_catequistas",
        columns: &[
            ("catequista_nombre", Text),
            ("grupo", Text),
            ("fecha", Text),
            ("catequesis_num", Int),
            ("estado", Text),
            ("updated_at", Text),
        ],
    },
    TableSpec {
        name: "documentos_entregados",
        columns: &[
            ("grupo", Text),
            ("estudiante_id", Text),
            ("documento_tipo", Text),
            ("entregado", Bool),
            ("updated_at", Text),
        ],
    },
    TableSpec {
        name: "cartas_entregadas",
        columns: &[
            ("grupo", Text),
            ("estudiante_id", Text),
            ("estudiante_nombre", Text),
            ("entregada", Bool),
            ("updated_at", Text),
        ],
    },
    TableSpec {
        name: "sabanas_entregadas",
        columns: &[
            ("grupo", Text),
            ("estudiante_id", Text),
            ("estudiante_nombre", Text),
            ("entregado", Bool),
            ("updated_at", Text),
        ],
    },
    TableSpec {
        name: "pagos_retiro",
        columns: &[
            ("grupo", Text),
            ("estudiante_id", Text),
            ("estudiante_nombre", Text),
            ("monto_pagado", Int),
            ("monto_requerido", Int),
            ("pagado", Bool),
            ("updated_at", Text),
        ],
    },
    TableSpec {
        name: "pagos_catequistas",
        columns: &[
            ("catequista_nombre", Text),
            ("monto_pagado", Int),
            ("monto_requerido", Int),
            ("pagado", Bool),
            ("updated_at", Text),
        ],
    },
    TableSpec {
        name: "notas_estudiantes",
        columns: &[
            ("grupo", Text),
            ("estudiante_id", Text),
            ("notas", Text),
            ("updated_at", Text),
        ],
    },
    TableSpec {
        name: "contactos_estudiantes",
        columns: &[
            ("grupo", Text),
            ("estudiante_id", Text),
            ("cedula", Text),
            ("telefono", Text),
            ("email", Text),
            ("encargado", Text),
            ("updated_at", Text),
        ],
    },
    TableSpec {
        name: "gastos_confirmacion",
        columns: &[
            ("id", Text),
            ("concepto", Text),
            ("monto", Real),
            ("fecha", Text),
            ("categoria", Text),
            ("descripcion", Text),
            ("pagado_por", Text),
            ("created_at", Text),
        ],
    },
    TableSpec {
        name: "ingresos_confirmacion",
        columns: &[
            ("id", Text),
            ("origen", Text),
            ("monto", Real),
            ("fecha", Text),
            ("metodo", Text),
            ("descripcion", Text),
            ("created_at", Text),
        ],
    },
];

pub fn table_spec(table: &str) -> CoreResult<&'static TableSpec> {
    TABLES
        .iter()
        .find(|t| t.name == table)
        .ok_or_else(|| CoreError::Persistence(format!("unknown table: {}", table)))
}

/// Equality filter plus optional ordering, the `select().eq().order()`
/// shape every caller needs.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    eqs: Vec<(String, Value)>,
    order: Vec<(String, bool)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.eqs.push((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    #[cfg(test)]
    pub(crate) fn matches(&self, row: &Row) -> bool {
        self.eqs
            .iter()
            .all(|(col, want)| row.get(col).unwrap_or(&Value::Null) == want)
    }
}

pub trait Store {
    fn select(&self, table: &str, filter: &Filter) -> CoreResult<Vec<Row>>;
    fn upsert(&self, table: &str, row: Row, conflict_keys: &[&str]) -> CoreResult<()>;
    fn delete(&self, table: &str, filter: &Filter) -> CoreResult<usize>;
}

pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

fn check_column(spec: &TableSpec, column: &str) -> CoreResult<ColumnKind> {
    spec.kind_of(column).ok_or_else(|| {
        CoreError::Persistence(format!("unknown column {}.{}", spec.name, column))
    })
}

fn to_sql(kind: ColumnKind, column: &str, v: &Value) -> CoreResult<SqlValue> {
    let bad = || CoreError::invalid(format!("{} has the wrong type", column));
    Ok(match (kind, v) {
        (_, Value::Null) => SqlValue::Null,
        (ColumnKind::Text, Value::String(s)) => SqlValue::Text(s.clone()),
        (ColumnKind::Int, Value::Number(n)) => SqlValue::Integer(n.as_i64().ok_or_else(bad)?),
        (ColumnKind::Real, Value::Number(n)) => SqlValue::Real(n.as_f64().ok_or_else(bad)?),
        (ColumnKind::Bool, Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        _ => return Err(bad()),
    })
}

fn from_sql(kind: ColumnKind, v: SqlValue) -> Value {
    match (kind, v) {
        (_, SqlValue::Null) => Value::Null,
        (ColumnKind::Bool, SqlValue::Integer(i)) => Value::Bool(i != 0),
        (_, SqlValue::Integer(i)) => Value::from(i),
        (_, SqlValue::Real(f)) => Value::from(f),
        (_, SqlValue::Text(s)) => Value::String(s),
        (_, SqlValue::Blob(_)) => Value::Null,
    }
}

fn where_clause(
    spec: &TableSpec,
    filter: &Filter,
    params: &mut Vec<SqlValue>,
) -> CoreResult<String> {
    if filter.eqs.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(filter.eqs.len());
    for (col, v) in &filter.eqs {
        let kind = check_column(spec, col)?;
        if v.is_null() {
            parts.push(format!("{} IS NULL", col));
        } else {
            parts.push(format!("{} = ?", col));
            params.push(to_sql(kind, col, v)?);
        }
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

impl Store for SqliteStore<'_> {
    fn select(&self, table: &str, filter: &Filter) -> CoreResult<Vec<Row>> {
        let spec = table_spec(table)?;
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}",
            spec.columns
                .iter()
                .map(|(c, _)| *c)
                .collect::<Vec<_>>()
                .join(", "),
            spec.name
        );
        sql.push_str(&where_clause(spec, filter, &mut params)?);
        let mut order = Vec::with_capacity(filter.order.len() + 1);
        for (col, asc) in &filter.order {
            check_column(spec, col)?;
            order.push(format!("{} {}", col, if *asc { "ASC" } else { "DESC" }));
        }
        order.push("rowid ASC".to_string());
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |r| {
                let mut row = Row::new();
                for (i, (col, kind)) in spec.columns.iter().enumerate() {
                    let v: SqlValue = r.get(i)?;
                    row.insert(col.to_string(), from_sql(*kind, v));
                }
                Ok(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn upsert(&self, table: &str, row: Row, conflict_keys: &[&str]) -> CoreResult<()> {
        let spec = table_spec(table)?;
        let mut cols = Vec::with_capacity(row.len());
        let mut params = Vec::with_capacity(row.len());
        for (col, v) in &row {
            let kind = check_column(spec, col)?;
            cols.push(col.as_str());
            params.push(to_sql(kind, col, v)?);
        }
        for key in conflict_keys {
            check_column(spec, key)?;
            if !row.contains_key(*key) {
                return Err(CoreError::invalid(format!("missing key column {}", key)));
            }
        }
        let updates: Vec<String> = cols
            .iter()
            .filter(|c| !conflict_keys.contains(c))
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        let action = if updates.is_empty() {
            "NOTHING".to_string()
        } else {
            format!("UPDATE SET {}", updates.join(", "))
        };
        let sql = format!(
            "INSERT INTO {}({}) VALUES({}) ON CONFLICT({}) DO {}",
            spec.name,
            cols.join(", "),
            vec!["?"; cols.len()].join(", "),
            conflict_keys.join(", "),
            action
        );
        self.conn.execute(&sql, params_from_iter(params))?;
        Ok(())
    }

    fn delete(&self, table: &str, filter: &Filter) -> CoreResult<usize> {
        let spec = table_spec(table)?;
        if filter.eqs.is_empty() {
            return Err(CoreError::invalid("refusing to delete without a filter"));
        }
        let mut params = Vec::new();
        let sql = format!(
            "DELETE FROM {}{}",
            spec.name,
            where_clause(spec, filter, &mut params)?
        );
        Ok(self.conn.execute(&sql, params_from_iter(params))?)
    }
}

/// Read a text column, treating null and missing alike.
pub fn text<'r>(row: &'r Row, column: &str) -> Option<&'r str> {
    row.get(column).and_then(|v| v.as_str())
}

pub fn flag(row: &Row, column: &str) -> bool {
    row.get(column).and_then(|v| v.as_bool()).unwrap_or(false)
}

pub fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-process stores for unit tests.
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct MemoryStore {
        tables: RefCell<HashMap<String, Vec<Row>>>,
        pub writes: Cell<usize>,
    }

    impl MemoryStore {
        pub fn rows(&self, table: &str) -> Vec<Row> {
            self.tables.borrow().get(table).cloned().unwrap_or_default()
        }
    }

    impl Store for MemoryStore {
        fn select(&self, table: &str, filter: &Filter) -> CoreResult<Vec<Row>> {
            table_spec(table)?;
            Ok(self
                .rows(table)
                .into_iter()
                .filter(|r| filter.matches(r))
                .collect())
        }

        fn upsert(&self, table: &str, row: Row, conflict_keys: &[&str]) -> CoreResult<()> {
            table_spec(table)?;
            self.writes.set(self.writes.get() + 1);
            let mut tables = self.tables.borrow_mut();
            let rows = tables.entry(table.to_string()).or_default();
            let same_key = |existing: &Row| {
                conflict_keys.iter().all(|k| {
                    let v = row.get(*k).unwrap_or(&Value::Null);
                    !v.is_null() && existing.get(*k) == Some(v)
                })
            };
            if let Some(existing) = rows.iter_mut().find(|r| same_key(r)) {
                for (k, v) in row {
                    existing.insert(k, v);
                }
            } else {
                rows.push(row);
            }
            Ok(())
        }

        fn delete(&self, table: &str, filter: &Filter) -> CoreResult<usize> {
            let mut tables = self.tables.borrow_mut();
            let rows = tables.entry(table.to_string()).or_default();
            let before = rows.len();
            rows.retain(|r| !filter.matches(r));
            Ok(before - rows.len())
        }
    }

    /// Reads succeed against the wrapped store, writes always fail.
    pub struct ReadOnlyStore<'a>(pub &'a MemoryStore);

    impl Store for ReadOnlyStore<'_> {
        fn select(&self, table: &str, filter: &Filter) -> CoreResult<Vec<Row>> {
            self.0.select(table, filter)
        }

        fn upsert(&self, _table: &str, _row: Row, _keys: &[&str]) -> CoreResult<()> {
            Err(CoreError::Persistence("store unavailable".to_string()))
        }

        fn delete(&self, _table: &str, _filter: &Filter) -> CoreResult<usize> {
            Err(CoreError::Persistence("store unavailable".to_string()))
        }
    }
}
