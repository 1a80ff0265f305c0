//! Form value maps and loose value semantics
//!
//! Field values are untyped at the core level (`serde_json::Value`). The helpers
//! here give conditions, rules and option lookups one shared notion of
//! "empty", "equal" and "ordered" so that `"5"` typed into a text box compares
//! equal to the number `5` declared in a schema.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Current value per field name
pub type FormValues = HashMap<String, Value>;

/// Touched flag per field name
pub type Touched = HashMap<String, bool>;

/// One human-readable message per invalid field
pub type FieldErrors = HashMap<String, String>;

/// Null, empty string, empty array and `false` count as "no value"
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(b) => !b,
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}

/// Numeric view of a value, if it has one
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
        _ => None,
    }
}

/// Key used to look a parent value up in an `optionsMap`
///
/// Returns `None` when the parent has no value.
pub fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Equality that tolerates string/number/bool representation differences
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, other) | (other, Value::Null) => match other {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        },
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Bool(x), Value::String(s)) | (Value::String(s), Value::Bool(x)) => {
            s == if *x { "true" } else { "false" }
        }
        (Value::Number(_), _) | (_, Value::Number(_)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

/// Ordering for `lessThan` / `greaterThan` style comparisons
///
/// Numbers (including numeric strings) compare numerically, ISO dates and
/// datetimes compare chronologically, other strings lexically. Anything else
/// is unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            if let (Some(dx), Some(dy)) = (parse_datetime(x), parse_datetime(y)) {
                return Some(dx.cmp(&dy));
            }
            Some(x.cmp(y))
        }
        _ => None,
    }
}

/// Parse the date formats produced by date / datetime inputs
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_empty_value() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(" ")));
        assert!(!is_empty_value(&json!(["a"])));
    }

    #[test]
    fn test_loose_eq() {
        assert!(loose_eq(&json!("5"), &json!(5)));
        assert!(loose_eq(&json!(true), &json!("true")));
        assert!(loose_eq(&json!(null), &json!("")));
        assert!(!loose_eq(&json!("usa"), &json!("canada")));
        assert!(!loose_eq(&json!(null), &json!(0)));
        assert!(!loose_eq(&json!("abc"), &json!(1)));
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&json!(3), &json!("10")), Some(Ordering::Less));
        assert_eq!(
            compare_values(&json!("2024-03-01"), &json!("2024-02-28")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_values(&json!("2024-03-01T10:00"), &json!("2024-03-01")),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_values(&json!(null), &json!(1)), None);
    }

    #[test]
    fn test_value_key() {
        assert_eq!(value_key(&json!("usa")), Some("usa".to_string()));
        assert_eq!(value_key(&json!(2)), Some("2".to_string()));
        assert_eq!(value_key(&json!(true)), Some("true".to_string()));
        assert_eq!(value_key(&json!("")), None);
        assert_eq!(value_key(&json!(null)), None);
    }
}
