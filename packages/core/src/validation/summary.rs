//! Schema summary aggregation

use crate::models::FormSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate counts describing a schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSummary {
    pub total_fields: usize,
    pub required_fields: usize,
    pub optional_fields: usize,
    /// `type` string → number of fields declaring it
    pub field_types: BTreeMap<String, usize>,
    pub has_autosave: bool,
    pub has_submission: bool,
    pub has_i18n: bool,
    pub error_count: usize,
    pub warning_count: usize,
}

impl SchemaSummary {
    pub fn from_schema(schema: &FormSchema, error_count: usize, warning_count: usize) -> Self {
        let fields = schema.flattened_fields();
        let required_fields = fields.iter().filter(|f| f.is_required()).count();

        let mut field_types = BTreeMap::new();
        for field in fields.iter().filter(|f| !f.field_type.is_empty()) {
            *field_types.entry(field.field_type.clone()).or_insert(0) += 1;
        }

        Self {
            total_fields: fields.len(),
            required_fields,
            optional_fields: fields.len() - required_fields,
            field_types,
            has_autosave: schema.autosave.is_some(),
            has_submission: schema.submission.is_some(),
            has_i18n: schema.i18n.is_some(),
            error_count,
            warning_count,
        }
    }
}
