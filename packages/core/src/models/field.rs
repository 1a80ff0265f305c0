//! Field Descriptors
//!
//! A [`Field`] is the declarative description of one form input: its kind,
//! validation rules, dependencies on other fields, visibility condition,
//! computed formula and input mask.
//!
//! ## Example Field
//!
//! ```json
//! {
//!   "name": "state",
//!   "type": "select",
//!   "label": "State / Province",
//!   "dependsOn": "country",
//!   "optionsMap": {
//!     "usa": [{ "value": "ca", "label": "California" }],
//!     "canada": [{ "value": "on", "label": "Ontario" }]
//!   },
//!   "validations": { "required": true }
//! }
//! ```
//!
//! The `type` string is kept as written so unknown kinds survive a round-trip
//! and can be reported by the schema validator instead of failing to parse.

use crate::mask::MaskSpec;
use crate::models::condition::Condition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Known field kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Email,
    Password,
    Number,
    Date,
    DateTime,
    Textarea,
    Select,
    Multiselect,
    Radio,
    Checkbox,
    Array,
    Range,
    Color,
    File,
    RichText,
    Table,
    Timeline,
}

impl FieldType {
    pub const ALL: &'static [FieldType] = &[
        FieldType::Text,
        FieldType::Email,
        FieldType::Password,
        FieldType::Number,
        FieldType::Date,
        FieldType::DateTime,
        FieldType::Textarea,
        FieldType::Select,
        FieldType::Multiselect,
        FieldType::Radio,
        FieldType::Checkbox,
        FieldType::Array,
        FieldType::Range,
        FieldType::Color,
        FieldType::File,
        FieldType::RichText,
        FieldType::Table,
        FieldType::Timeline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Password => "password",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Multiselect => "multiselect",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Array => "array",
            FieldType::Range => "range",
            FieldType::Color => "color",
            FieldType::File => "file",
            FieldType::RichText => "richtext",
            FieldType::Table => "table",
            FieldType::Timeline => "timeline",
        }
    }

    /// Kinds whose value is picked from an option list
    pub fn has_options(&self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Multiselect | FieldType::Radio
        )
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown field type '{}'", s))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selectable option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub value: Value,
    pub label: String,
}

impl OptionItem {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// `dependsOn` accepts a single name or an ordered list of names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOn {
    Single(String),
    Many(Vec<String>),
}

impl DependsOn {
    pub fn names(&self) -> Vec<&str> {
        match self {
            DependsOn::Single(name) => vec![name.as_str()],
            DependsOn::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Remote options source; `{{param}}` placeholders resolve from field values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionsEndpoint {
    Url(String),
    Config(EndpointConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OptionsEndpoint {
    pub fn url(&self) -> &str {
        match self {
            OptionsEndpoint::Url(url) => url,
            OptionsEndpoint::Config(config) => &config.url,
        }
    }
}

/// How a remote validation response is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidWhen {
    /// Valid when the remote reports the value exists
    Exists,
    /// Valid when the remote reports the value does not exist (e.g. username available)
    NotExists,
    /// Valid when the response carries `valid: true`
    Custom,
}

/// Remote check attached to a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncValidatorConfig {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_when: Option<ValidWhen>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AsyncValidatorConfig {
    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or("GET")
    }
}

/// Synchronous and asynchronous validation rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_true: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_if: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_validator: Option<AsyncValidatorConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Output formatting of a computed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatAs {
    Number,
    Currency,
    Text,
}

/// Formula-derived field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedConfig {
    pub formula: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_as: Option<FormatAs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

/// Repeatable group definition for `array` fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayConfig {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_items: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Declarative descriptor of a single form field
///
/// `name`, `type` and `label` default to empty so a schema missing them still
/// parses and the validator can report exactly what is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub field_type: String,

    #[serde(default)]
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionItem>>,

    /// Parent value → applicable options (used with `dependsOn`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_map: Option<BTreeMap<String, Vec<OptionItem>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_endpoint: Option<OptionsEndpoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<DependsOn>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<Validations>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed: Option<ComputedConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<MaskSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_config: Option<ArrayConfig>,

    /// `readOnly` spelling is also honored; it stays in `extra` so the
    /// document is written back with the key it was read with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    /// Bounds for number / range inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,

    /// Selection count bounds for multiselect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_characters: Option<i64>,

    /// Presentation-only attributes (rows, accept, helpText, ...) kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.as_str().to_string(),
            label: label.into(),
            ..Default::default()
        }
    }

    /// Parsed kind, `None` for an unknown `type` string
    pub fn kind(&self) -> Option<FieldType> {
        self.field_type.parse().ok()
    }

    pub fn is_kind(&self, kind: FieldType) -> bool {
        self.kind() == Some(kind)
    }

    pub fn is_required(&self) -> bool {
        self.validations
            .as_ref()
            .and_then(|v| v.required)
            .unwrap_or(false)
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
            .or_else(|| self.extra.get("readOnly").and_then(Value::as_bool))
            .unwrap_or(false)
    }

    pub fn depends_on_names(&self) -> Vec<&str> {
        self.depends_on
            .as_ref()
            .map(DependsOn::names)
            .unwrap_or_default()
    }

    pub fn async_validator(&self) -> Option<&AsyncValidatorConfig> {
        self.validations.as_ref()?.async_validator.as_ref()
    }

    /// Label used in messages, falling back to the name
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.name
        } else {
            &self.label
        }
    }

    /// Value a fresh form starts with
    ///
    /// `defaultValue` wins; otherwise checkbox → `false`, multiselect → `[]`,
    /// array → `initialItems` empty items, everything else → `""`.
    pub fn initial_value(&self) -> Value {
        if let Some(default) = &self.default_value {
            return default.clone();
        }
        match self.kind() {
            Some(FieldType::Checkbox) => Value::Bool(false),
            Some(FieldType::Multiselect) => Value::Array(Vec::new()),
            Some(FieldType::Array) => {
                let count = self
                    .array_config
                    .as_ref()
                    .and_then(|c| c.initial_items)
                    .unwrap_or(0);
                Value::Array((0..count).map(|_| Value::Object(Map::new())).collect())
            }
            _ => Value::String(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_type_parsing() {
        assert_eq!("select".parse::<FieldType>(), Ok(FieldType::Select));
        assert_eq!("datetime".parse::<FieldType>(), Ok(FieldType::DateTime));
        assert!("slider".parse::<FieldType>().is_err());
        for kind in FieldType::ALL {
            assert_eq!(kind.as_str().parse::<FieldType>(), Ok(*kind));
        }
    }

    #[test]
    fn test_deserialize_dependent_select() {
        let field: Field = serde_json::from_value(json!({
            "name": "state",
            "type": "select",
            "label": "State",
            "dependsOn": "country",
            "optionsMap": {
                "usa": [{"value": "ca", "label": "California"}]
            },
            "validations": {"required": true},
            "helpText": "Pick one"
        }))
        .unwrap();

        assert_eq!(field.kind(), Some(FieldType::Select));
        assert_eq!(field.depends_on_names(), vec!["country"]);
        assert!(field.is_required());
        assert_eq!(field.options_map.as_ref().unwrap()["usa"][0].label, "California");
        assert_eq!(field.extra["helpText"], "Pick one");
    }

    #[test]
    fn test_depends_on_list() {
        let field: Field = serde_json::from_value(json!({
            "name": "city", "type": "select", "label": "City",
            "dependsOn": ["country", "state"]
        }))
        .unwrap();
        assert_eq!(field.depends_on_names(), vec!["country", "state"]);
    }

    #[test]
    fn test_missing_attributes_default_to_empty() {
        let field: Field = serde_json::from_value(json!({"label": "Orphan"})).unwrap();
        assert!(field.name.is_empty());
        assert!(field.field_type.is_empty());
        assert_eq!(field.kind(), None);
    }

    #[test]
    fn test_round_trip_preserves_extra_attributes() {
        let raw = json!({
            "name": "bio",
            "type": "textarea",
            "label": "Bio",
            "rows": 4,
            "validations": {"maxLength": 200, "customHint": "short"},
            "readonly": true
        });
        let field: Field = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&field).unwrap(), raw);
    }

    #[test]
    fn test_read_only_spelling_is_kept() {
        let raw = json!({
            "name": "total",
            "type": "number",
            "label": "Total",
            "readOnly": true
        });
        let field: Field = serde_json::from_value(raw.clone()).unwrap();
        assert!(field.is_readonly());
        assert_eq!(field.readonly, None);
        assert_eq!(serde_json::to_value(&field).unwrap(), raw);

        let plain: Field =
            serde_json::from_value(json!({"name": "n", "type": "text", "label": "N"})).unwrap();
        assert!(!plain.is_readonly());
    }

    #[test]
    fn test_initial_values() {
        assert_eq!(Field::new("agree", FieldType::Checkbox, "Agree").initial_value(), json!(false));
        assert_eq!(Field::new("tags", FieldType::Multiselect, "Tags").initial_value(), json!([]));
        assert_eq!(Field::new("name", FieldType::Text, "Name").initial_value(), json!(""));

        let mut items = Field::new("items", FieldType::Array, "Items");
        items.array_config = Some(ArrayConfig {
            initial_items: Some(2),
            ..Default::default()
        });
        assert_eq!(items.initial_value(), json!([{}, {}]));

        let mut with_default = Field::new("qty", FieldType::Number, "Qty");
        with_default.default_value = Some(json!(1));
        assert_eq!(with_default.initial_value(), json!(1));
    }

    #[test]
    fn test_async_validator_defaults() {
        let field: Field = serde_json::from_value(json!({
            "name": "username", "type": "text", "label": "Username",
            "validations": {
                "asyncValidator": {"endpoint": "/api/users/check", "validWhen": "notExists"}
            }
        }))
        .unwrap();
        let config = field.async_validator().unwrap();
        assert_eq!(config.method(), "GET");
        assert_eq!(config.valid_when, Some(ValidWhen::NotExists));
        assert_eq!(config.debounce_ms, None);
    }
}
