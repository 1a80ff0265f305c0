//! Form Schema Types
//!
//! A [`FormSchema`] is the persisted JSON document describing a whole form.
//! Fields are declared either flat (`fields`) or grouped into ordered steps
//! (`sections`). Everything that works on the field set (validation,
//! resolution, initial values) sees the *flattened* list: section fields in
//! section order first, then any top-level fields.
//!
//! ## Example Schema
//!
//! ```json
//! {
//!   "title": "Shipping",
//!   "sections": [
//!     {
//!       "title": "Address",
//!       "fields": [
//!         { "name": "country", "type": "select", "label": "Country",
//!           "options": [{ "value": "usa", "label": "USA" }] },
//!         { "name": "zip", "type": "text", "label": "ZIP", "mask": "zip" }
//!       ]
//!     }
//!   ],
//!   "submission": { "endpoint": "/api/orders" }
//! }
//! ```
//!
//! `autosave`, `submission` and `i18n` blocks are opaque to the core and are
//! carried through unchanged.

use crate::models::field::Field;
use crate::models::values::{FormValues, Touched};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step of a multi-step form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub fields: Vec<Field>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Declarative description of a form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autosave: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FormSchema {
    /// Flat schema with the given fields
    pub fn with_fields(title: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            title: title.into(),
            fields: Some(fields),
            ..Default::default()
        }
    }

    /// Multi-step schema with the given sections
    pub fn with_sections(title: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            title: title.into(),
            sections: Some(sections),
            ..Default::default()
        }
    }

    /// Section fields first, then top-level fields
    pub fn flattened_fields(&self) -> Vec<&Field> {
        let from_sections = self
            .sections
            .iter()
            .flatten()
            .flat_map(|section| section.fields.iter());
        from_sections.chain(self.fields.iter().flatten()).collect()
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.flattened_fields().into_iter().find(|f| f.name == name)
    }

    /// One value per field as a fresh form starts
    pub fn initial_values(&self) -> FormValues {
        self.flattened_fields()
            .into_iter()
            .filter(|f| !f.name.is_empty())
            .map(|f| (f.name.clone(), f.initial_value()))
            .collect()
    }

    /// Every field untouched
    pub fn initial_touched(&self) -> Touched {
        self.flattened_fields()
            .into_iter()
            .filter(|f| !f.name.is_empty())
            .map(|f| (f.name.clone(), false))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::FieldType;
    use serde_json::json;

    #[test]
    fn test_flattening_puts_sections_first() {
        let mut schema = FormSchema::with_sections(
            "Wizard",
            vec![
                Section {
                    title: "One".into(),
                    fields: vec![Field::new("a", FieldType::Text, "A")],
                    ..Default::default()
                },
                Section {
                    title: "Two".into(),
                    fields: vec![Field::new("b", FieldType::Text, "B")],
                    ..Default::default()
                },
            ],
        );
        schema.fields = Some(vec![Field::new("c", FieldType::Text, "C")]);

        let names: Vec<&str> = schema
            .flattened_fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(schema.get_field("b").is_some());
        assert!(schema.get_field("z").is_none());
    }

    #[test]
    fn test_initial_values_and_touched() {
        let schema = FormSchema::with_fields(
            "Signup",
            vec![
                Field::new("email", FieldType::Email, "Email"),
                Field::new("terms", FieldType::Checkbox, "Terms"),
            ],
        );

        let values = schema.initial_values();
        assert_eq!(values["email"], json!(""));
        assert_eq!(values["terms"], json!(false));

        let touched = schema.initial_touched();
        assert_eq!(touched.len(), 2);
        assert!(touched.values().all(|t| !t));
    }

    #[test]
    fn test_opaque_blocks_round_trip() {
        let raw = json!({
            "title": "Feedback",
            "fields": [{"name": "comment", "type": "textarea", "label": "Comment"}],
            "autosave": {"enabled": true, "intervalMs": 5000},
            "i18n": {"defaultLocale": "en"},
            "theme": "compact"
        });
        let schema: FormSchema = serde_json::from_value(raw.clone()).unwrap();
        assert!(schema.autosave.is_some());
        assert_eq!(schema.extra["theme"], "compact");
        assert_eq!(serde_json::to_value(&schema).unwrap(), raw);
    }
}
