//! Computed field evaluation and display formatting

use crate::models::{ComputedConfig, Field, FormValues, FormatAs};
use formspec_formula::{FormulaEngine, Value as FormulaValue, Variables};
use std::collections::{HashMap, HashSet};

/// Upper bound on `decimal`; larger values are clamped
pub const MAX_DECIMAL_PLACES: u32 = 20;

/// Computed field names ordered so every computed dependency comes first
///
/// Fields caught in a loop (rejected by the schema validator) are appended in
/// declaration order.
pub fn evaluation_order(fields: &[Field]) -> Vec<String> {
    let computed: Vec<&Field> = fields.iter().filter(|f| f.computed.is_some()).collect();
    let names: HashSet<&str> = computed.iter().map(|f| f.name.as_str()).collect();

    let mut ordered: Vec<String> = Vec::with_capacity(computed.len());
    let mut placed: HashSet<&str> = HashSet::new();

    loop {
        let mut progressed = false;
        for field in &computed {
            if placed.contains(field.name.as_str()) {
                continue;
            }
            let ready = field
                .computed
                .iter()
                .flat_map(|c| c.dependencies.iter())
                .filter(|d| **d != field.name && names.contains(d.as_str()))
                .all(|d| placed.contains(d.as_str()));
            if ready {
                placed.insert(field.name.as_str());
                ordered.push(field.name.clone());
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    for field in computed {
        if !placed.contains(field.name.as_str()) {
            ordered.push(field.name.clone());
        }
    }
    ordered
}

/// Bind declared dependencies as formula variables
///
/// `raw` holds unformatted results of computed fields evaluated earlier in
/// the same pass, so chained formulas see numbers rather than display text.
pub fn bind_variables(
    config: &ComputedConfig,
    values: &FormValues,
    raw: &HashMap<String, FormulaValue>,
) -> Variables {
    let as_text = config.format_as == Some(FormatAs::Text);
    config
        .dependencies
        .iter()
        .map(|name| {
            let value = match raw.get(name) {
                Some(result) if as_text => FormulaValue::Text(result.to_string()),
                Some(result) => result.clone(),
                None => {
                    let json = values.get(name).unwrap_or(&serde_json::Value::Null);
                    if as_text {
                        FormulaValue::text_from_json(json)
                    } else {
                        FormulaValue::number_from_json(json)
                    }
                }
            };
            (name.clone(), value)
        })
        .collect()
}

/// Render a formula result as the field's display string
pub fn format_result(value: &FormulaValue, config: &ComputedConfig) -> String {
    let places = config.decimal.map(|d| d.min(MAX_DECIMAL_PLACES) as usize);
    let body = match (config.format_as, value) {
        (Some(FormatAs::Text), v) => v.to_string(),
        (Some(FormatAs::Currency), FormulaValue::Number(n)) => format_grouped(*n, places.unwrap_or(2)),
        (_, FormulaValue::Number(n)) => match places {
            Some(places) => format_fixed(*n, places),
            None => value.to_string(),
        },
        (_, v) => v.to_string(),
    };

    // sign goes ahead of a currency symbol style prefix: -$1.00
    let (sign, body) = match (value, body.strip_prefix('-')) {
        (FormulaValue::Number(_), Some(rest)) => ("-", rest.to_string()),
        _ => ("", body),
    };

    format!(
        "{}{}{}{}",
        sign,
        config.prefix.as_deref().unwrap_or(""),
        body,
        config.suffix.as_deref().unwrap_or("")
    )
}

/// Fixed decimals; values that round to zero carry no sign
fn format_fixed(n: f64, places: usize) -> String {
    let fixed = format!("{:.*}", places, n.abs());
    if is_negative(n, &fixed) {
        format!("-{}", fixed)
    } else {
        fixed
    }
}

fn is_negative(n: f64, rendered: &str) -> bool {
    n < 0.0 && rendered.chars().any(|c| c.is_ascii_digit() && c != '0')
}

/// Fixed decimals with `,` thousands separators
fn format_grouped(n: f64, places: usize) -> String {
    let fixed = format!("{:.*}", places, n.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let mut out = String::new();
    if is_negative(n, &fixed) {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Evaluate every computed field in dependency order, writing display
/// strings into `values`
///
/// A failing formula sets its field to `""` and is logged, never returned.
/// Returns the names whose stored value changed.
pub fn apply_computed(
    engine: &FormulaEngine,
    order: &[String],
    index: &HashMap<String, usize>,
    fields: &[Field],
    values: &mut FormValues,
) -> Vec<String> {
    let mut raw: HashMap<String, FormulaValue> = HashMap::new();
    let mut changed = Vec::new();

    for name in order {
        let Some(field) = index.get(name).map(|i| &fields[*i]) else {
            continue;
        };
        let Some(config) = &field.computed else {
            continue;
        };

        let variables = bind_variables(config, values, &raw);
        let display = match engine.evaluate(&config.formula, &variables) {
            Ok(result) => {
                let display = format_result(&result, config);
                raw.insert(name.clone(), result);
                display
            }
            Err(e) => {
                tracing::warn!(
                    field = %name,
                    formula = %config.formula,
                    "Computed field evaluation failed: {}",
                    e
                );
                String::new()
            }
        };

        let next = serde_json::Value::String(display);
        if values.get(name) != Some(&next) {
            values.insert(name.clone(), next);
            changed.push(name.clone());
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(raw: serde_json::Value) -> ComputedConfig {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_number_with_decimals() {
        let c = config(json!({"formula": "x", "formatAs": "number", "decimal": 2}));
        assert_eq!(format_result(&FormulaValue::Number(50.0), &c), "50.00");

        let plain = config(json!({"formula": "x", "formatAs": "number"}));
        assert_eq!(format_result(&FormulaValue::Number(50.0), &plain), "50");
    }

    #[test]
    fn test_number_rounding_to_zero_has_no_sign() {
        let c = config(json!({"formula": "x", "formatAs": "number", "decimal": 2}));
        assert_eq!(format_result(&FormulaValue::Number(-0.001), &c), "0.00");
        assert_eq!(format_result(&FormulaValue::Number(-1.5), &c), "-1.50");

        let money = config(json!({"formula": "x", "formatAs": "currency"}));
        assert_eq!(format_result(&FormulaValue::Number(-0.001), &money), "0.00");
    }

    #[test]
    fn test_decimal_is_clamped() {
        let c = config(json!({"formula": "x", "formatAs": "number", "decimal": 4_000_000_000u32}));
        let rendered = format_result(&FormulaValue::Number(1.0), &c);
        assert_eq!(rendered.len(), 2 + MAX_DECIMAL_PLACES as usize);

        let money = config(json!({"formula": "x", "formatAs": "currency", "decimal": 4_000_000_000u32}));
        let rendered = format_result(&FormulaValue::Number(1.0), &money);
        assert_eq!(rendered.len(), 2 + MAX_DECIMAL_PLACES as usize);
    }

    #[test]
    fn test_currency_grouping() {
        let c = config(json!({"formula": "x", "formatAs": "currency", "prefix": "$"}));
        assert_eq!(format_result(&FormulaValue::Number(1234567.891), &c), "$1,234,567.89");
        assert_eq!(format_result(&FormulaValue::Number(999.5), &c), "$999.50");
        assert_eq!(format_result(&FormulaValue::Number(-1234.5), &c), "-$1,234.50");

        let whole = config(json!({"formula": "x", "formatAs": "currency", "decimal": 0}));
        assert_eq!(format_result(&FormulaValue::Number(1000.0), &whole), "1,000");
    }

    #[test]
    fn test_text_with_suffix() {
        let c = config(json!({"formula": "x", "formatAs": "text", "suffix": " years"}));
        assert_eq!(format_result(&FormulaValue::Number(42.0), &c), "42 years");
    }

    #[test]
    fn test_evaluation_order_resolves_chains() {
        let fields: Vec<Field> = serde_json::from_value(json!([
            {"name": "total", "type": "number", "label": "Total",
             "computed": {"formula": "subtotal + tax", "dependencies": ["subtotal", "tax"]}},
            {"name": "tax", "type": "number", "label": "Tax",
             "computed": {"formula": "subtotal * 0.25", "dependencies": ["subtotal"]}},
            {"name": "price", "type": "number", "label": "Price"},
            {"name": "subtotal", "type": "number", "label": "Subtotal",
             "computed": {"formula": "price * 2", "dependencies": ["price"]}}
        ]))
        .unwrap();

        assert_eq!(evaluation_order(&fields), vec!["subtotal", "tax", "total"]);
    }

    #[test]
    fn test_text_binding_of_blank_values() {
        let c = config(json!({"formula": "a + b", "dependencies": ["a", "b"], "formatAs": "text"}));
        let values: FormValues = serde_json::from_value(json!({"a": "Ada", "b": null})).unwrap();
        let vars = bind_variables(&c, &values, &HashMap::new());
        assert_eq!(vars["a"], FormulaValue::Text("Ada".into()));
        assert_eq!(vars["b"], FormulaValue::Text(String::new()));
    }
}
