use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::db;
use crate::sessions::{
    default_specials, thursdays_between, SessionScheme, DEFAULT_SESSION_COUNT, MAX_SESSIONS,
};

pub const DEFAULT_RETIRO_AMOUNT: i64 = 50_000;
pub const DEFAULT_CATEQUISTA_AMOUNT: i64 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupSection {
    Sessions,
    Payments,
}

pub const SETUP_SECTIONS: [SetupSection; 2] = [SetupSection::Sessions, SetupSection::Payments];

impl SetupSection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sessions" => Some(Self::Sessions),
            "payments" => Some(Self::Payments),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sessions => "sessions",
            Self::Payments => "payments",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Sessions => "setup.sessions",
            Self::Payments => "setup.payments",
        }
    }
}

fn specials_json(specials: &BTreeMap<u32, String>) -> Value {
    Value::Object(
        specials
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect(),
    )
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Sessions => json!({
            "scheme": "indexed",
            "count": DEFAULT_SESSION_COUNT,
            "specials": specials_json(&default_specials()),
            "dates": []
        }),
        SetupSection::Payments => json!({
            "retiroAmount": DEFAULT_RETIRO_AMOUNT,
            "catequistaAmount": DEFAULT_CATEQUISTA_AMOUNT
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_specials(v: &Value) -> Result<BTreeMap<u32, String>, String> {
    let obj = v
        .as_object()
        .ok_or_else(|| "specials must be an object of index -> label".to_string())?;
    let mut out = BTreeMap::new();
    for (k, label) in obj {
        let idx: u32 = k
            .trim()
            .parse()
            .map_err(|_| format!("specials key {} is not an index", k))?;
        let label = label
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("specials label for {} must be a non-empty string", k))?;
        out.insert(idx, label.to_string());
    }
    Ok(out)
}

fn parse_dates(v: &Value) -> Result<Vec<NaiveDate>, String> {
    let arr = v.as_array().ok_or_else(|| "dates must be an array".to_string())?;
    arr.iter()
        .map(|d| {
            d.as_str()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                .ok_or_else(|| "dates must be YYYY-MM-DD strings".to_string())
        })
        .collect()
}

fn dates_json(dates: &[NaiveDate]) -> Value {
    Value::Array(
        dates
            .iter()
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .collect(),
    )
}

/// Scheme described by a sessions section, validated as a whole.
fn scheme_of(section: &Value) -> Result<SessionScheme, String> {
    let kind = section.get("scheme").and_then(|v| v.as_str()).unwrap_or("indexed");
    match kind {
        "dated" => {
            let dates = parse_dates(section.get("dates").unwrap_or(&Value::Null))?;
            if dates.is_empty() {
                return Err("a dated scheme needs at least one date".into());
            }
            SessionScheme::dated(dates).map_err(|e| e.to_string())
        }
        _ => {
            let count = section
                .get("count")
                .and_then(|v| v.as_u64())
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(DEFAULT_SESSION_COUNT);
            let specials = match section.get("specials") {
                Some(v) => parse_specials(v)?,
                None => default_specials(),
            };
            SessionScheme::indexed(count, specials).map_err(|e| e.to_string())
        }
    }
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Sessions => match k.as_str() {
                "scheme" => {
                    let s = v
                        .as_str()
                        .map(|s| s.trim().to_ascii_lowercase())
                        .ok_or_else(|| "scheme must be string".to_string())?;
                    if s != "indexed" && s != "dated" {
                        return Err("scheme must be one of: indexed, dated".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "count" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, MAX_SESSIONS as i64)?));
                }
                "specials" => {
                    obj.insert(k.clone(), specials_json(&parse_specials(v)?));
                }
                "dates" => {
                    obj.insert(k.clone(), dates_json(&parse_dates(v)?));
                }
                // {from, to}: every Thursday in the range becomes a session
                "thursdays" => {
                    let bound = |name: &str| {
                        v.get(name)
                            .and_then(|d| d.as_str())
                            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                            .ok_or_else(|| format!("thursdays.{} must be a YYYY-MM-DD date", name))
                    };
                    let (from, to) = (bound("from")?, bound("to")?);
                    let dates = thursdays_between(from, to).ok_or_else(|| {
                        format!("thursdays range holds more than {} sessions", MAX_SESSIONS)
                    })?;
                    obj.insert("dates".into(), dates_json(&dates));
                }
                _ => return Err(format!("unknown sessions field: {}", k)),
            },
            SetupSection::Payments => match k.as_str() {
                "retiroAmount" | "catequistaAmount" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 10_000_000)?));
                }
                _ => return Err(format!("unknown payments field: {}", k)),
            },
        }
    }
    if section == SetupSection::Sessions {
        scheme_of(current)?;
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            let mut merged = current.clone();
            match merge_section_patch(section, &mut merged, saved_obj) {
                Ok(()) => current = merged,
                Err(e) => tracing::warn!(section = section.name(), error = %e, "ignoring saved setup"),
            }
        }
    }
    Ok(current)
}

/// Validate `patch` against the saved section and persist the result.
pub fn update_section(
    conn: &Connection,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> anyhow::Result<Result<Value, String>> {
    let mut current = load_section(conn, section)?;
    if let Err(msg) = merge_section_patch(section, &mut current, patch) {
        return Ok(Err(msg));
    }
    db::settings_set_json(conn, section.key(), &current)?;
    tracing::info!(section = section.name(), "setup updated");
    Ok(Ok(current))
}

pub fn load_scheme(conn: &Connection) -> anyhow::Result<SessionScheme> {
    let section = load_section(conn, SetupSection::Sessions)?;
    Ok(scheme_of(&section).unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentAmounts {
    pub retiro: i64,
    pub catequista: i64,
}

impl Default for PaymentAmounts {
    fn default() -> Self {
        Self {
            retiro: DEFAULT_RETIRO_AMOUNT,
            catequista: DEFAULT_CATEQUISTA_AMOUNT,
        }
    }
}

pub fn load_payment_amounts(conn: &Connection) -> anyhow::Result<PaymentAmounts> {
    let section = load_section(conn, SetupSection::Payments)?;
    let d = PaymentAmounts::default();
    Ok(PaymentAmounts {
        retiro: section.get("retiroAmount").and_then(|v| v.as_i64()).unwrap_or(d.retiro),
        catequista: section
            .get("catequistaAmount")
            .and_then(|v| v.as_i64())
            .unwrap_or(d.catequista),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionKey;

    fn scratch() -> Connection {
        let dir = std::env::temp_dir().join(format!("confirmacion-config-{}", uuid::Uuid::new_v4()));
        db::open_db(&dir).expect("open db")
    }

    fn patch(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn defaults_without_saved_settings() {
        let conn = scratch();
        assert_eq!(load_scheme(&conn).expect("scheme"), SessionScheme::default());
        assert_eq!(load_payment_amounts(&conn).expect("amounts"), PaymentAmounts::default());
    }

    #[test]
    fn switching_to_dated_scheme() {
        let conn = scratch();
        let res = update_section(
            &conn,
            SetupSection::Sessions,
            &patch(json!({"scheme": "dated", "dates": ["2026-02-05", "2026-02-12"]})),
        )
        .expect("db");
        assert!(res.is_ok());
        let scheme = load_scheme(&conn).expect("scheme");
        assert_eq!(scheme.key_column(), "fecha");
        assert_eq!(scheme.len(), 2);
        let first = SessionKey::Date(NaiveDate::from_ymd_opt(2026, 2, 5).expect("date"));
        assert!(scheme.contains(&first));
    }

    #[test]
    fn thursday_range_expands_into_dates() {
        let conn = scratch();
        let saved = update_section(
            &conn,
            SetupSection::Sessions,
            &patch(json!({"scheme": "dated", "thursdays": {"from": "2026-02-01", "to": "2026-02-28"}})),
        )
        .expect("db")
        .expect("valid");
        assert_eq!(
            saved["dates"],
            json!(["2026-02-05", "2026-02-12", "2026-02-19", "2026-02-26"])
        );
        assert_eq!(load_scheme(&conn).expect("scheme").len(), 4);

        let res = update_section(
            &conn,
            SetupSection::Sessions,
            &patch(json!({"thursdays": {"from": "2026-02-01"}})),
        )
        .expect("db");
        assert!(res.is_err());
    }

    #[test]
    fn thursday_ranges_are_bounded() {
        let conn = scratch();
        // a range at the end of the calendar answers instead of overflowing
        let res = update_section(
            &conn,
            SetupSection::Sessions,
            &patch(json!({"scheme": "dated", "thursdays": {"from": "+262142-12-20", "to": "+262142-12-31"}})),
        )
        .expect("db");
        if let Ok(saved) = res {
            assert!(saved["dates"].as_array().is_some_and(|d| d.len() <= 2));
        }
        update_section(&conn, SetupSection::Sessions, &patch(json!({"scheme": "indexed"})))
            .expect("db")
            .expect("back to indexed");

        let res = update_section(
            &conn,
            SetupSection::Sessions,
            &patch(json!({"scheme": "dated", "thursdays": {"from": "2026-01-01", "to": "2100-01-01"}})),
        )
        .expect("db");
        assert!(res.expect_err("too many").contains("more than 200"));
        assert_eq!(load_scheme(&conn).expect("scheme"), SessionScheme::default());
    }

    #[test]
    fn invalid_patches_are_rejected_and_not_saved() {
        let conn = scratch();
        // 2026-02-06 is a Friday
        let res = update_section(
            &conn,
            SetupSection::Sessions,
            &patch(json!({"scheme": "dated", "dates": ["2026-02-06"]})),
        )
        .expect("db");
        assert!(res.is_err());
        let res = update_section(&conn, SetupSection::Sessions, &patch(json!({"scheme": "dated"})))
            .expect("db");
        assert!(res.is_err());
        let res = update_section(&conn, SetupSection::Payments, &patch(json!({"retiroAmount": -1})))
            .expect("db");
        assert!(res.is_err());
        let res = update_section(&conn, SetupSection::Payments, &patch(json!({"colones": 1})))
            .expect("db");
        assert!(res.is_err());
        assert_eq!(load_scheme(&conn).expect("scheme"), SessionScheme::default());
    }

    #[test]
    fn custom_specials_change_labels() {
        let conn = scratch();
        update_section(
            &conn,
            SetupSection::Sessions,
            &patch(json!({"count": 10, "specials": {"4": "Convivio"}})),
        )
        .expect("db")
        .expect("valid");
        let scheme = load_scheme(&conn).expect("scheme");
        assert_eq!(scheme.len(), 10);
        assert_eq!(scheme.label(&SessionKey::Index(4)), "Convivio");
        assert_eq!(scheme.label(&SessionKey::Index(5)), "Catequesis 4");

        // specials outside the count do not validate
        let res = update_section(&conn, SetupSection::Sessions, &patch(json!({"count": 3})))
            .expect("db");
        assert!(res.is_err());
    }

    #[test]
    fn payment_amounts_round_trip() {
        let conn = scratch();
        update_section(
            &conn,
            SetupSection::Payments,
            &patch(json!({"retiroAmount": 45000})),
        )
        .expect("db")
        .expect("valid");
        let amounts = load_payment_amounts(&conn).expect("amounts");
        assert_eq!(amounts.retiro, 45000);
        assert_eq!(amounts.catequista, DEFAULT_CATEQUISTA_AMOUNT);
    }
}
