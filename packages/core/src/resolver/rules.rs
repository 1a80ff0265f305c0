//! Synchronous field rules
//!
//! One message per field, first failing rule wins:
//!
//! 1. `required` / `requiredIf`
//! 2. `requiredTrue`
//! 3. (an empty value passes every remaining rule)
//! 4. email format
//! 5. `minLength` / `maxLength`
//! 6. numeric `min` / `max`
//! 7. `pattern`
//! 8. `matchesField`, `greaterThanField`
//! 9. selection and item counts
//! 10. mask completeness

use crate::mask;
use crate::models::{
    as_number, compare_values, is_empty_value, loose_eq, Field, FieldType, FormValues,
    Validations,
};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::OnceLock;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| Regex::new(EMAIL_PATTERN).unwrap())
}

/// Everything a rule may look at besides the field itself
pub struct RuleContext<'a> {
    pub values: &'a FormValues,
    pub fields: &'a [Field],
    pub index: &'a HashMap<String, usize>,
    /// Compiled `validations.pattern` per field; invalid patterns are absent
    pub patterns: &'a HashMap<String, Regex>,
}

impl<'a> RuleContext<'a> {
    /// Current value of a schema field; `None` only for unknown names
    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        static NULL: Value = Value::Null;
        if self.index.contains_key(name) {
            Some(self.values.get(name).unwrap_or(&NULL))
        } else {
            None
        }
    }

    fn label_of<'b>(&'b self, name: &'b str) -> &'b str {
        self.index
            .get(name)
            .map(|i| self.fields[*i].display_label())
            .unwrap_or(name)
    }
}

/// First failing rule's message for `field`, if any
///
/// Computed fields hold display text and are never validated.
pub fn field_error(field: &Field, ctx: &RuleContext<'_>) -> Option<String> {
    if field.computed.is_some() {
        return None;
    }

    let value = ctx.lookup(&field.name).unwrap_or(&Value::Null);
    let label = field.display_label();
    let validations = field.validations.as_ref();
    let kind = field.kind();

    let required_if = validations
        .and_then(|v| v.required_if.as_ref())
        .map(|condition| condition.evaluate(&|name: &str| ctx.lookup(name)))
        .unwrap_or(false);
    if (field.is_required() || required_if) && is_empty_value(value) {
        return Some(format!("{} is required", label));
    }

    if validations.and_then(|v| v.required_true) == Some(true) && *value != Value::Bool(true) {
        return Some(format!("{} must be accepted", label));
    }

    if is_empty_value(value) {
        return None;
    }

    if let Some(message) = validations.and_then(|v| check_text(field, v, value, label, ctx)) {
        return Some(message);
    }

    if let Some(message) = check_number(field, value, label) {
        return Some(message);
    }

    if let Some(v) = validations {
        if let Some(other) = &v.matches_field {
            let other_value = ctx.lookup(other).unwrap_or(&Value::Null);
            if !loose_eq(value, other_value) {
                return Some(format!("{} must match {}", label, ctx.label_of(other)));
            }
        }
        if let Some(other) = &v.greater_than_field {
            let other_value = ctx.lookup(other).unwrap_or(&Value::Null);
            if !is_empty_value(other_value)
                && compare_values(value, other_value) != Some(Ordering::Greater)
            {
                return Some(format!(
                    "{} must be greater than {}",
                    label,
                    ctx.label_of(other)
                ));
            }
        }
    }

    if let Value::Array(items) = value {
        let bounds = match kind {
            Some(FieldType::Multiselect) => Some(("option", field.min_selections, field.max_selections)),
            Some(FieldType::Array) => field
                .array_config
                .as_ref()
                .map(|c| ("item", c.min_items, c.max_items)),
            _ => None,
        };
        if let Some((noun, min, max)) = bounds {
            if let Some(min) = min.filter(|m| items.len() < *m) {
                return Some(format!("Select at least {} {}{}", min, noun, plural(min)));
            }
            if let Some(max) = max.filter(|m| items.len() > *m) {
                return Some(format!("Select at most {} {}{}", max, noun, plural(max)));
            }
        }
    }

    if let (Some(mask_spec), Value::String(s)) = (&field.mask, value) {
        if !mask::is_complete(s, Some(mask_spec)) {
            return Some(format!("{} is incomplete", label));
        }
    }

    None
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn check_text(
    field: &Field,
    v: &Validations,
    value: &Value,
    label: &str,
    ctx: &RuleContext<'_>,
) -> Option<String> {
    let Value::String(text) = value else {
        return None;
    };

    let wants_email = v.email == Some(true) || field.is_kind(FieldType::Email);
    if wants_email && !email_regex().is_match(text) {
        return Some("Please enter a valid email address".to_string());
    }

    let length = text.chars().count();
    if let Some(min) = v.min_length.filter(|m| length < *m) {
        return Some(format!("{} must be at least {} characters", label, min));
    }
    if let Some(max) = v.max_length.filter(|m| length > *m) {
        return Some(format!("{} must be at most {} characters", label, max));
    }

    if let Some(re) = ctx.patterns.get(&field.name) {
        if !re.is_match(text) {
            return Some(
                v.pattern_message
                    .clone()
                    .unwrap_or_else(|| format!("{} has an invalid format", label)),
            );
        }
    }

    None
}

fn check_number(field: &Field, value: &Value, label: &str) -> Option<String> {
    let numeric_kind = matches!(field.kind(), Some(FieldType::Number | FieldType::Range));
    let validations = field.validations.as_ref();
    let min = validations
        .and_then(|v| v.min)
        .or(if numeric_kind { field.min } else { None });
    let max = validations
        .and_then(|v| v.max)
        .or(if numeric_kind { field.max } else { None });

    if !numeric_kind && min.is_none() && max.is_none() {
        return None;
    }

    let Some(n) = as_number(value) else {
        return if numeric_kind {
            Some(format!("{} must be a number", label))
        } else {
            None
        };
    };

    if let Some(min) = min.filter(|m| n < *m) {
        return Some(format!("{} must be at least {}", label, trim_number(min)));
    }
    if let Some(max) = max.filter(|m| n > *m) {
        return Some(format!("{} must be at most {}", label, trim_number(max)));
    }
    None
}

fn trim_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Compile every field's `validations.pattern`, skipping invalid ones
pub fn compile_patterns(fields: &[Field]) -> HashMap<String, Regex> {
    fields
        .iter()
        .filter_map(|f| {
            let pattern = f.validations.as_ref()?.pattern.as_ref()?;
            match Regex::new(pattern) {
                Ok(re) => Some((f.name.clone(), re)),
                Err(e) => {
                    tracing::debug!(field = %f.name, "Skipping invalid pattern: {}", e);
                    None
                }
            }
        })
        .collect()
}
