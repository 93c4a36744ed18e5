use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::stats::amount_of;

/// Present and, for strings and arrays, non-empty.
pub fn required(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("static email regex"))
}

pub fn is_email(email: &str) -> bool {
    !email.is_empty() && email_re().is_match(&email.to_lowercase())
}

fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Costa Rica numbers are 8 digits; separators are ignored.
pub fn is_phone_cr(phone: &str) -> bool {
    digits(phone).len() == 8
}

/// Cédula formats vary; 9 to 12 digits once separators are dropped.
pub fn is_cedula_cr(id: &str) -> bool {
    (9..=12).contains(&digits(id).len())
}

pub fn is_positive_amount(value: &Value) -> bool {
    amount_of(value).map(|n| n > 0.0).unwrap_or(false)
}

pub fn max_length(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}
