//! Session numbering schemes.
//!
//! A workspace either keys meetings by calendar Thursday or by index, with a
//! few indices standing for named events (retreats, rehearsal).

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::store::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionKey {
    Date(NaiveDate),
    Index(u32),
}

impl SessionKey {
    /// Column holding this key in the session-keyed tables.
    pub fn column(&self) -> &'static str {
        match self {
            SessionKey::Date(_) => "fecha",
            SessionKey::Index(_) => "catequesis_num",
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            SessionKey::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            SessionKey::Index(i) => Value::from(*i),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SessionKey::Index(i) => write!(f, "{}", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub key: String,
    pub label: String,
    pub special: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionScheme {
    DateKeyed { dates: Vec<NaiveDate> },
    IndexKeyed { count: u32, specials: BTreeMap<u32, String> },
}

pub const DEFAULT_SESSION_COUNT: u32 = 25;

/// Upper bound on the sessions of either scheme.
pub const MAX_SESSIONS: usize = 200;

pub fn default_specials() -> BTreeMap<u32, String> {
    BTreeMap::from([
        (11, "Retiro Familia".to_string()),
        (20, "Retiro Padrinos".to_string()),
        (24, "Ensayo Confirma".to_string()),
    ])
}

impl Default for SessionScheme {
    fn default() -> Self {
        SessionScheme::IndexKeyed {
            count: DEFAULT_SESSION_COUNT,
            specials: default_specials(),
        }
    }
}

impl SessionScheme {
    /// Build a date-keyed scheme. Dates must be Thursdays and strictly
    /// increasing.
    pub fn dated(dates: Vec<NaiveDate>) -> CoreResult<Self> {
        if dates.len() > MAX_SESSIONS {
            return Err(CoreError::invalid(format!(
                "at most {} session dates are allowed",
                MAX_SESSIONS
            )));
        }
        for pair in dates.windows(2) {
            if pair[0] >= pair[1] {
                return Err(CoreError::invalid("session dates must be strictly increasing"));
            }
        }
        if let Some(d) = dates.iter().find(|d| d.weekday() != Weekday::Thu) {
            return Err(CoreError::invalid(format!("{} is not a Thursday", d)));
        }
        Ok(SessionScheme::DateKeyed { dates })
    }

    pub fn indexed(count: u32, specials: BTreeMap<u32, String>) -> CoreResult<Self> {
        if count == 0 {
            return Err(CoreError::invalid("session count must be positive"));
        }
        if let Some(idx) = specials.keys().find(|i| **i >= count) {
            return Err(CoreError::invalid(format!(
                "special session {} is outside 0..{}",
                idx, count
            )));
        }
        Ok(SessionScheme::IndexKeyed { count, specials })
    }

    pub fn key_column(&self) -> &'static str {
        match self {
            SessionScheme::DateKeyed { .. } => "fecha",
            SessionScheme::IndexKeyed { .. } => "catequesis_num",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SessionScheme::DateKeyed { dates } => dates.len(),
            SessionScheme::IndexKeyed { count, .. } => *count as usize,
        }
    }

    pub fn keys(&self) -> Vec<SessionKey> {
        match self {
            SessionScheme::DateKeyed { dates } => dates.iter().copied().map(SessionKey::Date).collect(),
            SessionScheme::IndexKeyed { count, .. } => (0..*count).map(SessionKey::Index).collect(),
        }
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        match (self, key) {
            (SessionScheme::DateKeyed { dates }, SessionKey::Date(d)) => dates.contains(d),
            (SessionScheme::IndexKeyed { count, .. }, SessionKey::Index(i)) => i < count,
            _ => false,
        }
    }

    /// Ordinary sessions are numbered from 0, skipping the special indices
    /// before them: with the default specials, index 12 is "Catequesis 11".
    pub fn label(&self, key: &SessionKey) -> String {
        match (self, key) {
            (SessionScheme::IndexKeyed { specials, .. }, SessionKey::Index(i)) => {
                if let Some(name) = specials.get(i) {
                    return name.clone();
                }
                let before = specials.range(..*i).count() as u32;
                format!("Catequesis {}", i - before)
            }
            (_, SessionKey::Date(d)) => d.format("%d/%m").to_string(),
            (_, SessionKey::Index(i)) => format!("Catequesis {}", i),
        }
    }

    pub fn is_special(&self, key: &SessionKey) -> bool {
        match (self, key) {
            (SessionScheme::IndexKeyed { specials, .. }, SessionKey::Index(i)) => specials.contains_key(i),
            _ => false,
        }
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.keys()
            .iter()
            .map(|k| Session {
                key: k.to_string(),
                label: self.label(k),
                special: self.is_special(k),
            })
            .collect()
    }

    /// Parse a request's session key and check it belongs to this scheme.
    pub fn parse_key(&self, v: &Value) -> CoreResult<SessionKey> {
        let key = match self {
            SessionScheme::DateKeyed { .. } => {
                let s = v
                    .as_str()
                    .ok_or_else(|| CoreError::invalid("session must be a YYYY-MM-DD date"))?;
                let d = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map_err(|_| CoreError::invalid("session must be a YYYY-MM-DD date"))?;
                SessionKey::Date(d)
            }
            SessionScheme::IndexKeyed { .. } => {
                let n = v
                    .as_u64()
                    .or_else(|| v.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
                    .ok_or_else(|| CoreError::invalid("session must be a session index"))?;
                SessionKey::Index(
                    u32::try_from(n).map_err(|_| CoreError::invalid("session index out of range"))?,
                )
            }
        };
        if !self.contains(&key) {
            return Err(CoreError::invalid(format!("unknown session: {}", key)));
        }
        Ok(key)
    }

    /// Key of a stored row under this scheme; rows written under the other
    /// scheme yield `None`.
    pub fn key_of_row(&self, row: &Row) -> Option<SessionKey> {
        match self {
            SessionScheme::DateKeyed { .. } => row
                .get("fecha")
                .and_then(|v| v.as_str())
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(SessionKey::Date),
            SessionScheme::IndexKeyed { .. } => row
                .get("catequesis_num")
                .and_then(|v| v.as_u64())
                .and_then(|n| u32::try_from(n).ok())
                .map(SessionKey::Index),
        }
    }
}

/// Every Thursday in `[from, to]`, or `None` when the range holds more than
/// [`MAX_SESSIONS`] of them. Stops at the end of the calendar.
pub fn thursdays_between(from: NaiveDate, to: NaiveDate) -> Option<Vec<NaiveDate>> {
    let offset = (7 + Weekday::Thu.num_days_from_monday() as i64
        - from.weekday().num_days_from_monday() as i64)
        % 7;
    let mut out = Vec::new();
    let mut next = from.checked_add_signed(chrono::Duration::days(offset));
    while let Some(d) = next.filter(|d| *d <= to) {
        if out.len() == MAX_SESSIONS {
            return None;
        }
        out.push(d);
        next = d.checked_add_signed(chrono::Duration::days(7));
    }
    Some(out)
}
