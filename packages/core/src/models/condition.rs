//! Condition Trees
//!
//! `visibleWhen` and `requiredIf` use the same boolean tree: leaves compare one
//! field's current value against a literal, inner nodes combine children with
//! `and` / `or`.
//!
//! ```json
//! {
//!   "operator": "or",
//!   "conditions": [
//!     { "field": "country", "operator": "equals", "value": "usa" },
//!     {
//!       "operator": "and",
//!       "conditions": [
//!         { "field": "age", "operator": "greaterThan", "value": 17 },
//!         { "field": "consent", "operator": "equals", "value": true }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::models::values::{compare_values, is_empty_value, loose_eq};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// A boolean condition over form values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    /// Inner node combining child conditions
    Group(ConditionGroup),
    /// Leaf comparing a field value
    Rule(ConditionRule),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub operator: LogicalOperator,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    pub field: String,
    pub operator: ComparisonOperator,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

/// `and` / `or`; anything else is kept verbatim and evaluates to false
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogicalOperator {
    And,
    Or,
    Unsupported(String),
}

impl From<String> for LogicalOperator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "and" | "AND" => Self::And,
            "or" | "OR" => Self::Or,
            _ => Self::Unsupported(s),
        }
    }
}

impl From<LogicalOperator> for String {
    fn from(op: LogicalOperator) -> Self {
        match op {
            LogicalOperator::And => "and".to_string(),
            LogicalOperator::Or => "or".to_string(),
            LogicalOperator::Unsupported(s) => s,
        }
    }
}

/// Leaf comparison operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    In,
    NotIn,
    IsEmpty,
    IsNotEmpty,
    Unsupported(String),
}

impl ComparisonOperator {
    const NAMES: &'static [(&'static str, ComparisonOperator)] = &[
        ("equals", ComparisonOperator::Equals),
        ("notEquals", ComparisonOperator::NotEquals),
        ("greaterThan", ComparisonOperator::GreaterThan),
        ("greaterThanOrEqual", ComparisonOperator::GreaterThanOrEqual),
        ("lessThan", ComparisonOperator::LessThan),
        ("lessThanOrEqual", ComparisonOperator::LessThanOrEqual),
        ("contains", ComparisonOperator::Contains),
        ("notContains", ComparisonOperator::NotContains),
        ("in", ComparisonOperator::In),
        ("notIn", ComparisonOperator::NotIn),
        ("isEmpty", ComparisonOperator::IsEmpty),
        ("isNotEmpty", ComparisonOperator::IsNotEmpty),
    ];
}

impl From<String> for ComparisonOperator {
    fn from(s: String) -> Self {
        Self::NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, op)| op.clone())
            .unwrap_or(Self::Unsupported(s))
    }
}

impl From<ComparisonOperator> for String {
    fn from(op: ComparisonOperator) -> Self {
        if let ComparisonOperator::Unsupported(s) = op {
            return s;
        }
        ComparisonOperator::NAMES
            .iter()
            .find(|(_, known)| *known == op)
            .map(|(name, _)| name.to_string())
            .unwrap_or_default()
    }
}

impl Condition {
    /// Evaluate against current values
    ///
    /// `lookup` returns `None` for a name the schema does not define, which
    /// makes the leaf false. A defined field without a value reads as null.
    pub fn evaluate<'a, F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<&'a Value>,
    {
        match self {
            Condition::Group(group) => match group.operator {
                LogicalOperator::And => group.conditions.iter().all(|c| c.evaluate(lookup)),
                LogicalOperator::Or => group.conditions.iter().any(|c| c.evaluate(lookup)),
                LogicalOperator::Unsupported(_) => false,
            },
            Condition::Rule(rule) => match lookup(&rule.field) {
                Some(actual) => rule.matches(actual),
                None => false,
            },
        }
    }

    /// Every field name referenced by a leaf anywhere in the tree
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Group(group) => {
                for child in &group.conditions {
                    child.collect_fields(out);
                }
            }
            Condition::Rule(rule) => out.push(rule.field.as_str()),
        }
    }

    /// Operators in the tree that have no defined semantics
    pub fn unsupported_operators(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_unsupported(&mut out);
        out
    }

    fn collect_unsupported(&self, out: &mut Vec<String>) {
        match self {
            Condition::Group(group) => {
                if let LogicalOperator::Unsupported(op) = &group.operator {
                    out.push(op.clone());
                }
                for child in &group.conditions {
                    child.collect_unsupported(out);
                }
            }
            Condition::Rule(rule) => {
                if let ComparisonOperator::Unsupported(op) = &rule.operator {
                    out.push(op.clone());
                }
            }
        }
    }
}

impl ConditionRule {
    pub fn matches(&self, actual: &Value) -> bool {
        let expected = &self.value;
        match &self.operator {
            ComparisonOperator::Equals => loose_eq(actual, expected),
            ComparisonOperator::NotEquals => !loose_eq(actual, expected),
            ComparisonOperator::GreaterThan => {
                compare_values(actual, expected) == Some(Ordering::Greater)
            }
            ComparisonOperator::GreaterThanOrEqual => matches!(
                compare_values(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            ComparisonOperator::LessThan => compare_values(actual, expected) == Some(Ordering::Less),
            ComparisonOperator::LessThanOrEqual => matches!(
                compare_values(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            ComparisonOperator::Contains => contains(actual, expected),
            ComparisonOperator::NotContains => !contains(actual, expected),
            ComparisonOperator::In => contains(expected, actual),
            ComparisonOperator::NotIn => !contains(expected, actual),
            ComparisonOperator::IsEmpty => is_empty_value(actual),
            ComparisonOperator::IsNotEmpty => !is_empty_value(actual),
            ComparisonOperator::Unsupported(_) => false,
        }
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
        Value::String(s) => match needle {
            Value::String(n) => s.contains(n.as_str()),
            Value::Number(n) => s.contains(&n.to_string()),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn values(v: Value) -> HashMap<String, Value> {
        serde_json::from_value(v).unwrap()
    }

    fn eval(condition: &Condition, vals: &HashMap<String, Value>) -> bool {
        condition.evaluate(&|name: &str| vals.get(name))
    }

    #[test]
    fn test_leaf_operators() {
        let vals = values(json!({ "age": 21, "country": "usa", "tags": ["a", "b"] }));

        let cases = [
            (json!({"field": "age", "operator": "greaterThan", "value": 18}), true),
            (json!({"field": "age", "operator": "lessThan", "value": "18"}), false),
            (json!({"field": "age", "operator": "greaterThanOrEqual", "value": 21}), true),
            (json!({"field": "country", "operator": "equals", "value": "usa"}), true),
            (json!({"field": "country", "operator": "notEquals", "value": "usa"}), false),
            (json!({"field": "tags", "operator": "contains", "value": "b"}), true),
            (json!({"field": "country", "operator": "in", "value": ["usa", "mexico"]}), true),
            (json!({"field": "country", "operator": "isNotEmpty"}), true),
        ];

        for (raw, expected) in cases {
            let condition: Condition = serde_json::from_value(raw.clone()).unwrap();
            assert_eq!(eval(&condition, &vals), expected, "condition {}", raw);
        }
    }

    #[test]
    fn test_nested_groups() {
        let condition: Condition = serde_json::from_value(json!({
            "operator": "or",
            "conditions": [
                { "field": "country", "operator": "equals", "value": "usa" },
                {
                    "operator": "and",
                    "conditions": [
                        { "field": "age", "operator": "greaterThan", "value": 17 },
                        { "field": "consent", "operator": "equals", "value": true }
                    ]
                }
            ]
        }))
        .unwrap();

        assert!(eval(&condition, &values(json!({"country": "usa"}))));
        assert!(eval(
            &condition,
            &values(json!({"country": "canada", "age": 30, "consent": true}))
        ));
        assert!(!eval(
            &condition,
            &values(json!({"country": "canada", "age": 30, "consent": false}))
        ));
    }

    #[test]
    fn test_unknown_field_evaluates_false() {
        let condition: Condition = serde_json::from_value(json!({
            "field": "removed", "operator": "isEmpty"
        }))
        .unwrap();
        assert!(!eval(&condition, &HashMap::new()));
    }

    #[test]
    fn test_unsupported_operator_round_trips_and_is_false() {
        let raw = json!({"field": "a", "operator": "matchesRegex", "value": "x"});
        let condition: Condition = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(condition.unsupported_operators(), vec!["matchesRegex"]);
        assert!(!eval(&condition, &values(json!({"a": "x"}))));
        assert_eq!(serde_json::to_value(&condition).unwrap(), raw);
    }

    #[test]
    fn test_referenced_fields() {
        let condition: Condition = serde_json::from_value(json!({
            "operator": "and",
            "conditions": [
                { "field": "a", "operator": "equals", "value": 1 },
                { "operator": "or", "conditions": [
                    { "field": "b", "operator": "isEmpty" },
                    { "field": "c", "operator": "isEmpty" }
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(condition.referenced_fields(), vec!["a", "b", "c"]);
    }
}
