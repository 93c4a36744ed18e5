//! Three-state attendance for students and catechists.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::roster::as_row;
use crate::sessions::{SessionKey, SessionScheme};
use crate::store::{now_stamp, text, Filter, Row, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Estado {
    #[default]
    #[serde(rename = "ausente")]
    Absent,
    #[serde(rename = "presente")]
    Present,
    #[serde(rename = "justificado")]
    Justified,
}

impl Estado {
    /// absent → present → justified → absent
    pub fn next(self) -> Self {
        match self {
            Estado::Absent => Estado::Present,
            Estado::Present => Estado::Justified,
            Estado::Justified => Estado::Absent,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Estado::Absent => "ausente",
            Estado::Present => "presente",
            Estado::Justified => "justificado",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ausente" => Some(Estado::Absent),
            "presente" => Some(Estado::Present),
            "justificado" => Some(Estado::Justified),
            _ => None,
        }
    }
}

/// Whose attendance a sheet tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Roll {
    Group(String),
    Catechists,
}

impl Roll {
    fn table(&self) -> &'static str {
        match self {
            Roll::Group(_) => "asistencias",
            Roll::Catechists => "asistencia_catequistas",
        }
    }

    fn person_column(&self) -> &'static str {
        match self {
            Roll::Group(_) => "estudiante_id",
            Roll::Catechists => "catequista_nombre",
        }
    }

    fn scope(&self) -> Filter {
        match self {
            Roll::Group(g) => Filter::new().eq("grupo", g.as_str()),
            Roll::Catechists => Filter::new(),
        }
    }

    fn conflict_keys(&self, key: &SessionKey) -> Vec<&'static str> {
        let mut keys = match self {
            Roll::Group(_) => vec!["grupo", "estudiante_id"],
            Roll::Catechists => vec!["catequista_nombre"],
        };
        keys.push(key.column());
        keys
    }

    fn record(&self, person: &str, key: &SessionKey, estado: Estado) -> Row {
        let mut row = as_row(json!({
            "estado": estado.as_str(),
            "updated_at": now_stamp(),
        }));
        row.insert(self.person_column().to_string(), Value::String(person.to_string()));
        row.insert(key.column().to_string(), key.to_value());
        if let Roll::Group(g) = self {
            row.insert("grupo".to_string(), Value::String(g.clone()));
        }
        row
    }
}

fn parse_row(row: &Row, scheme: &SessionScheme, person_column: &str) -> Option<(String, SessionKey, Estado)> {
    let person = text(row, person_column)?.to_string();
    let key = scheme.key_of_row(row)?;
    let estado = Estado::parse(text(row, "estado")?)?;
    Some((person, key, estado))
}

/// Current stored state of one key; absent when no record exists.
pub fn current(store: &dyn Store, roll: &Roll, person: &str, key: &SessionKey) -> CoreResult<Estado> {
    let filter = roll
        .scope()
        .eq(roll.person_column(), person)
        .eq(key.column(), key.to_value());
    Ok(store
        .select(roll.table(), &filter)?
        .first()
        .and_then(|r| text(r, "estado"))
        .and_then(Estado::parse)
        .unwrap_or_default())
}

/// Read, advance and persist one (person, session) state. Concurrent
/// toggles of the same key are not detected: the last upsert wins.
pub fn toggle(store: &dyn Store, roll: &Roll, person: &str, key: &SessionKey) -> CoreResult<Estado> {
    if person.trim().is_empty() {
        return Err(CoreError::invalid("person is required"));
    }
    let next = current(store, roll, person, key)?.next();
    if let Err(e) = store.upsert(
        roll.table(),
        roll.record(person, key, next),
        &roll.conflict_keys(key),
    ) {
        tracing::warn!(table = roll.table(), person, session = %key, error = %e, "attendance write failed");
        return Err(e);
    }
    tracing::info!(table = roll.table(), person, session = %key, estado = next.as_str(), "attendance toggled");
    Ok(next)
}

/// Read-only snapshot of a roll's attendance grid under one scheme.
#[derive(Debug, Clone)]
pub struct AttendanceSheet {
    scheme: SessionScheme,
    states: HashMap<(String, SessionKey), Estado>,
}

impl AttendanceSheet {
    pub fn load(store: &dyn Store, roll: Roll, scheme: SessionScheme) -> CoreResult<Self> {
        let mut states = HashMap::new();
        for row in store.select(roll.table(), &roll.scope())? {
            if let Some((person, key, estado)) = parse_row(&row, &scheme, roll.person_column()) {
                if scheme.contains(&key) {
                    states.insert((person, key), estado);
                }
            }
        }
        Ok(Self { scheme, states })
    }

    pub fn scheme(&self) -> &SessionScheme {
        &self.scheme
    }

    pub fn state(&self, person: &str, key: &SessionKey) -> Estado {
        self.states
            .get(&(person.to_string(), *key))
            .copied()
            .unwrap_or_default()
    }

    /// States for every session of the scheme, in scheme order.
    pub fn row(&self, person: &str) -> Vec<Estado> {
        self.scheme.keys().iter().map(|k| self.state(person, k)).collect()
    }

    pub fn present_count(&self, person: &str) -> usize {
        self.row(person).into_iter().filter(|e| *e == Estado::Present).count()
    }

    /// `{ person: { sessionKey: estado } }` for stored, non-default states.
    pub fn to_json(&self) -> Value {
        let mut out = serde_json::Map::new();
        for ((person, key), estado) in &self.states {
            let entry = out
                .entry(person.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Some(m) = entry.as_object_mut() {
                m.insert(key.to_string(), Value::String(estado.as_str().to_string()));
            }
        }
        Value::Object(out)
    }
}
