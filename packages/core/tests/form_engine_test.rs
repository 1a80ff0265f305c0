//! End-to-end tests for the form engine
//!
//! Tests cover:
//! - Import of a multi-step schema and session initialization
//! - Cascading resets, computed values and conditional requirements
//! - Import rejection for cyclic schemas
//! - File round-trips through the schema IO helpers

use anyhow::Result;
use formspec_core::{
    apply_mask, import_schema, load_schema_file, save_schema_file, serialize_schema,
    DiagnosticKind, FormServiceError, FormSession,
};
use serde_json::json;
use tempfile::TempDir;

const ORDER_FORM: &str = r#"{
    "title": "Order",
    "sections": [
        {
            "title": "Customer",
            "fields": [
                {"name": "email", "type": "email", "label": "Email", "validations": {"required": true}},
                {"name": "phone", "type": "text", "label": "Phone", "mask": "phone"},
                {"name": "hasReferral", "type": "checkbox", "label": "Referred by a friend"},
                {"name": "referralCode", "type": "text", "label": "Referral code",
                 "visibleWhen": {"field": "hasReferral", "operator": "equals", "value": true},
                 "validations": {"requiredIf": {"field": "hasReferral", "operator": "equals", "value": true}}}
            ]
        },
        {
            "title": "Shipping",
            "fields": [
                {"name": "country", "type": "select", "label": "Country",
                 "options": [{"value": "usa", "label": "USA"}, {"value": "canada", "label": "Canada"}]},
                {"name": "state", "type": "select", "label": "State", "dependsOn": "country",
                 "optionsMap": {
                     "usa": [{"value": "ca", "label": "California"}, {"value": "ny", "label": "New York"}],
                     "canada": [{"value": "on", "label": "Ontario"}]
                 }}
            ]
        },
        {
            "title": "Items",
            "fields": [
                {"name": "price", "type": "number", "label": "Price", "min": 0},
                {"name": "quantity", "type": "number", "label": "Quantity", "defaultValue": 1},
                {"name": "total", "type": "text", "label": "Total", "readonly": true,
                 "computed": {"formula": "price * quantity", "dependencies": ["price", "quantity"],
                              "formatAs": "number", "decimal": 2}}
            ]
        }
    ],
    "autosave": {"intervalMs": 5000}
}"#;

fn order_session() -> Result<FormSession> {
    let imported = import_schema(ORDER_FORM)?;
    assert!(imported.report.warnings.is_empty());
    assert!(imported.report.summary.has_autosave);
    Ok(FormSession::new(imported.schema))
}

#[test]
fn test_order_form_flow() -> Result<()> {
    let mut session = order_session()?;

    let snapshot = session.snapshot();
    assert!(!snapshot.visible_fields.contains(&"referralCode".to_string()));
    assert_eq!(snapshot.errors["email"], "Email is required");

    session.set_value("email", json!("ada@example.com"))?;
    session.set_value("phone", json!("5551234567"))?;
    assert_eq!(session.value("phone"), Some(&json!("(555) 123-4567")));

    session.set_value("country", json!("usa"))?;
    session.set_value("state", json!("ny"))?;
    let evaluation = session.set_value("country", json!("canada"))?;
    assert_eq!(evaluation.resets, vec!["state"]);
    assert_eq!(session.value("state"), Some(&json!("")));

    session.set_value("price", json!(10))?;
    session.set_value("quantity", json!(5))?;
    assert_eq!(session.value("total"), Some(&json!("50.00")));

    assert!(session.submit());
    Ok(())
}

#[test]
fn test_required_if_follows_condition() -> Result<()> {
    let mut session = order_session()?;
    session.set_value("email", json!("ada@example.com"))?;

    session.set_value("hasReferral", json!(true))?;
    let snapshot = session.snapshot();
    assert!(snapshot.visible_fields.contains(&"referralCode".to_string()));
    assert_eq!(snapshot.errors["referralCode"], "Referral code is required");

    session.set_value("referralCode", json!("anything"))?;
    session.set_value("hasReferral", json!(false))?;
    assert!(session.snapshot().errors.is_empty());
    assert_eq!(session.value("referralCode"), Some(&json!("anything")));
    Ok(())
}

#[test]
fn test_computed_cycle_is_rejected() {
    let result = import_schema(
        r#"{
            "title": "Loop",
            "fields": [
                {"name": "a", "type": "number", "label": "A", "readonly": true,
                 "computed": {"formula": "b + 1", "dependencies": ["b"]}},
                {"name": "b", "type": "number", "label": "B", "readonly": true,
                 "computed": {"formula": "a + 1", "dependencies": ["a"]}}
            ]
        }"#,
    );

    match result {
        Err(FormServiceError::SchemaRejected { errors }) => {
            let cycle = errors
                .iter()
                .find(|d| d.kind == DiagnosticKind::CircularDependency)
                .expect("cycle diagnostic");
            assert!(cycle.message.to_lowercase().contains("circular dependency"));
        }
        other => panic!("expected rejection, got {:?}", other.map(|i| i.schema.title)),
    }
}

#[test]
fn test_mask_is_idempotent() {
    for (mask, raw) in [("phone", "5551234567"), ("ssn", "123456789"), ("date", "12252024")] {
        let spec = serde_json::from_value(json!(mask)).unwrap();
        let once = apply_mask(raw, Some(&spec));
        assert_eq!(apply_mask(&once, Some(&spec)), once, "mask {}", mask);
    }
}

#[tokio::test]
async fn test_schema_file_round_trip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("order.json");

    let imported = import_schema(ORDER_FORM)?;
    save_schema_file(&path, &imported.schema).await?;

    let loaded = load_schema_file(&path).await?;
    assert_eq!(loaded.schema, imported.schema);
    assert_eq!(
        serialize_schema(&loaded.schema)?,
        serialize_schema(&imported.schema)?
    );
    Ok(())
}

#[test]
fn test_missing_schema_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = tokio_test::block_on(load_schema_file(temp_dir.path().join("absent.json")));
    assert!(matches!(result, Err(FormServiceError::Io(_))));
}
