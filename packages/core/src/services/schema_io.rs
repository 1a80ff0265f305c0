//! Schema Import / Export
//!
//! `parse_json_to_schema` and `serialize_schema` are a pure pair; unknown
//! attributes survive through each model's flattened `extra` map, so
//! `parse(serialize(s)) == s`. `import_schema` additionally runs the schema
//! validator and refuses anything with errors.

use crate::models::FormSchema;
use crate::services::error::FormServiceError;
use crate::validation::{validate_schema, ValidationReport};
use std::path::Path;

/// A schema accepted by import, with its advisory warnings
#[derive(Debug, Clone)]
pub struct ImportedSchema {
    pub schema: FormSchema,
    pub report: ValidationReport,
}

pub fn parse_json_to_schema(json: &str) -> Result<FormSchema, FormServiceError> {
    Ok(serde_json::from_str(json)?)
}

/// Pretty-printed JSON
pub fn serialize_schema(schema: &FormSchema) -> Result<String, FormServiceError> {
    Ok(serde_json::to_string_pretty(schema)?)
}

/// Parse and validate; a schema with errors is rejected with the full list
pub fn import_schema(json: &str) -> Result<ImportedSchema, FormServiceError> {
    let schema = parse_json_to_schema(json)?;
    let report = validate_schema(&schema);

    if !report.is_valid {
        tracing::info!(
            title = %schema.title,
            errors = report.errors.len(),
            "Schema import rejected"
        );
        return Err(FormServiceError::schema_rejected(report.errors));
    }

    Ok(ImportedSchema { schema, report })
}

/// Read and import a schema file
pub async fn load_schema_file(path: impl AsRef<Path>) -> Result<ImportedSchema, FormServiceError> {
    let json = tokio::fs::read_to_string(path.as_ref()).await?;
    import_schema(&json)
}

/// Write a schema file, creating parent directories as needed
pub async fn save_schema_file(path: impl AsRef<Path>, schema: &FormSchema) -> Result<(), FormServiceError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, serialize_schema(schema)?).await?;
    tracing::debug!(path = %path.display(), "Schema saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::DiagnosticKind;
    use serde_json::json;
    use tempfile::TempDir;

    const CONTACT: &str = r#"{
        "title": "Contact",
        "description": "Reach out",
        "fields": [
            {"name": "name", "type": "text", "label": "Name", "helpText": "Full name",
             "validations": {"required": true, "minLength": 2}},
            {"name": "email", "type": "email", "label": "Email", "mask": {"type": "custom", "pattern": "*"}}
        ],
        "submission": {"endpoint": "/api/contact"},
        "theme": "dark"
    }"#;

    #[test]
    fn test_round_trip_preserves_unknown_attributes() {
        let schema = parse_json_to_schema(CONTACT).unwrap();
        assert_eq!(schema.extra.get("theme"), Some(&json!("dark")));

        let fields = schema.fields.as_ref().unwrap();
        assert_eq!(fields[0].extra.get("helpText"), Some(&json!("Full name")));

        let serialized = serialize_schema(&schema).unwrap();
        assert_eq!(parse_json_to_schema(&serialized).unwrap(), schema);
    }

    #[test]
    fn test_import_rejects_invalid_schema() {
        let err = import_schema(r#"{"fields": [{"name": "a", "type": "text", "label": "A"},
                                              {"name": "a", "type": "text", "label": "A again"}]}"#)
            .unwrap_err();

        match err {
            FormServiceError::SchemaRejected { errors } => {
                let kinds: Vec<DiagnosticKind> = errors.iter().map(|d| d.kind).collect();
                assert!(kinds.contains(&DiagnosticKind::MissingTitle));
                assert!(kinds.contains(&DiagnosticKind::DuplicateName));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_import_keeps_warnings() {
        let imported = import_schema(
            r#"{"title": "T", "fields": [{"name": "pick", "type": "select", "label": "Pick"}]}"#,
        )
        .unwrap();
        assert!(imported.report.has_warning(DiagnosticKind::MissingOptions));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_json_to_schema("{ not json"),
            Err(FormServiceError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schemas").join("contact.json");
        let schema = parse_json_to_schema(CONTACT).unwrap();

        save_schema_file(&path, &schema).await.unwrap();
        let loaded = load_schema_file(&path).await.unwrap();
        assert_eq!(loaded.schema, schema);

        let missing = load_schema_file(dir.path().join("missing.json")).await;
        assert!(matches!(missing, Err(FormServiceError::Io(_))));
    }
}
