//! Schema Validator
//!
//! Static correctness checks for a [`FormSchema`], run once on import and
//! whenever the schema is edited. Validation never fails: every problem is
//! returned as a [`SchemaDiagnostic`] in either the blocking `errors` list or
//! the advisory `warnings` list of a [`ValidationReport`].
//!
//! ## Checks
//!
//! - **Structure** (errors): missing title, no `fields`/`sections`, fields
//!   missing `name`/`type`/`label`, duplicate names, `array` without
//!   `arrayConfig`. Nested `arrayConfig.fields` form their own name scope.
//! - **Ranges** (errors): `min > max` on number, `min >= max` on range,
//!   `minSelections > maxSelections`, `minItems > maxItems`.
//!   `minLength > maxLength` is a warning.
//! - **References** (errors): every name used by `dependsOn`, `visibleWhen`,
//!   `computed.dependencies`, `matchesField`, `greaterThanField` and
//!   `requiredIf` must exist; a computed field may not list itself.
//! - **Cycles** (errors): `dependsOn` edges and computed dependency edges are
//!   two independent graphs, each of which must be acyclic.
//! - **Advisory** (warnings): unknown types and masks, option-based fields
//!   without options, `optionsMap` without `dependsOn`, invalid patterns and
//!   formulas, writable computed fields, `decimal` beyond the rendered
//!   maximum, `requiredTrue` outside checkboxes, non-positive limits.

mod cycles;
mod summary;

pub use cycles::{find_cycles, CycleReport, EdgeMap};
pub use summary::SchemaSummary;

use crate::models::{Field, FieldType, FormSchema};
use crate::resolver::MAX_DECIMAL_PLACES;
use formspec_formula::FormulaConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Category of a schema problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    MissingTitle,
    NoFields,
    FieldsAndSections,
    MissingAttribute,
    DuplicateName,
    MissingArrayConfig,
    InvalidRange,
    InvalidLengthRange,
    UnknownReference,
    SelfDependency,
    CircularDependency,
    UnknownType,
    MissingOptions,
    InvalidPattern,
    InvalidFormula,
    ComputedNotReadonly,
    RequiredTrueOnNonCheckbox,
    NonPositiveLimit,
    UnknownMask,
    UnsupportedOperator,
    OptionsMapWithoutParent,
    DecimalOutOfRange,
}

/// One schema error or warning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDiagnostic {
    pub kind: DiagnosticKind,
    /// Field the problem belongs to; nested fields are written `parent.child`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl SchemaDiagnostic {
    pub fn new(kind: DiagnosticKind, field: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field,
            message: message.into(),
        }
    }
}

/// Result of validating a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<SchemaDiagnostic>,
    pub warnings: Vec<SchemaDiagnostic>,
    pub summary: SchemaSummary,
}

impl ValidationReport {
    pub fn has_error(&self, kind: DiagnosticKind) -> bool {
        self.errors.iter().any(|d| d.kind == kind)
    }

    pub fn has_warning(&self, kind: DiagnosticKind) -> bool {
        self.warnings.iter().any(|d| d.kind == kind)
    }
}

/// Validate `schema`; pure, never panics on malformed input
pub fn validate_schema(schema: &FormSchema) -> ValidationReport {
    SchemaValidator::new(schema).run()
}

struct SchemaValidator<'s> {
    schema: &'s FormSchema,
    max_formula_depth: usize,
    errors: Vec<SchemaDiagnostic>,
    warnings: Vec<SchemaDiagnostic>,
}

impl<'s> SchemaValidator<'s> {
    fn new(schema: &'s FormSchema) -> Self {
        Self {
            schema,
            max_formula_depth: FormulaConfig::default().max_nesting_depth,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn run(mut self) -> ValidationReport {
        self.check_document();

        let schema = self.schema;
        let fields = schema.flattened_fields();
        self.check_scope(&fields, "");
        self.check_references(&fields);
        self.check_cycles(&fields);

        let summary = SchemaSummary::from_schema(schema, self.errors.len(), self.warnings.len());
        ValidationReport {
            is_valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            summary,
        }
    }

    fn error(&mut self, kind: DiagnosticKind, field: Option<String>, message: String) {
        self.errors.push(SchemaDiagnostic::new(kind, field, message));
    }

    fn warn(&mut self, kind: DiagnosticKind, field: Option<String>, message: String) {
        self.warnings.push(SchemaDiagnostic::new(kind, field, message));
    }

    fn check_document(&mut self) {
        if self.schema.title.trim().is_empty() {
            self.error(
                DiagnosticKind::MissingTitle,
                None,
                "Schema is missing a title".to_string(),
            );
        }
        match (&self.schema.fields, &self.schema.sections) {
            (None, None) => self.error(
                DiagnosticKind::NoFields,
                None,
                "Schema must define either fields or sections".to_string(),
            ),
            (Some(_), Some(_)) => self.warn(
                DiagnosticKind::FieldsAndSections,
                None,
                "Schema defines both fields and sections; section fields come first".to_string(),
            ),
            _ => {}
        }
    }

    /// Structural and per-field checks for one name scope
    fn check_scope(&mut self, fields: &[&Field], prefix: &str) {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for field in fields.iter().filter(|f| !f.name.is_empty()) {
            match counts.iter_mut().find(|(name, _)| *name == field.name) {
                Some((_, count)) => *count += 1,
                None => counts.push((field.name.as_str(), 1)),
            }
        }
        for (name, count) in counts.into_iter().filter(|(_, count)| *count > 1) {
            self.error(
                DiagnosticKind::DuplicateName,
                Some(format!("{}{}", prefix, name)),
                format!("Duplicate field name '{}{}' appears {} times", prefix, name, count),
            );
        }

        for (index, field) in fields.iter().enumerate() {
            let path = if field.name.is_empty() {
                format!("{}#{}", prefix, index + 1)
            } else {
                format!("{}{}", prefix, field.name)
            };
            self.check_field(field, &path);
        }
    }

    fn check_field(&mut self, field: &Field, path: &str) {
        let at = || Some(path.to_string());

        for (attribute, missing) in [
            ("name", field.name.trim().is_empty()),
            ("type", field.field_type.trim().is_empty()),
            ("label", field.label.trim().is_empty()),
        ] {
            if missing {
                self.error(
                    DiagnosticKind::MissingAttribute,
                    at(),
                    format!("Field '{}' is missing required attribute '{}'", path, attribute),
                );
            }
        }

        let kind = field.kind();
        if kind.is_none() && !field.field_type.trim().is_empty() {
            self.warn(
                DiagnosticKind::UnknownType,
                at(),
                format!("Field '{}' has unknown type '{}'", path, field.field_type),
            );
        }

        match kind {
            Some(FieldType::Array) => match &field.array_config {
                Some(config) => {
                    if let (Some(min), Some(max)) = (config.min_items, config.max_items) {
                        if min > max {
                            self.error(
                                DiagnosticKind::InvalidRange,
                                at(),
                                format!("Field '{}' has minItems {} greater than maxItems {}", path, min, max),
                            );
                        }
                    }
                    let nested: Vec<&Field> = config.fields.iter().collect();
                    self.check_scope(&nested, &format!("{}.", path));
                }
                None => self.error(
                    DiagnosticKind::MissingArrayConfig,
                    at(),
                    format!("Array field '{}' is missing arrayConfig", path),
                ),
            },
            Some(FieldType::Number) => {
                if let (Some(min), Some(max)) = (field.min, field.max) {
                    if min > max {
                        self.error(
                            DiagnosticKind::InvalidRange,
                            at(),
                            format!("Field '{}' has min {} greater than max {}", path, min, max),
                        );
                    }
                }
            }
            Some(FieldType::Range) => {
                if let (Some(min), Some(max)) = (field.min, field.max) {
                    if min >= max {
                        self.error(
                            DiagnosticKind::InvalidRange,
                            at(),
                            format!("Range field '{}' needs min {} below max {}", path, min, max),
                        );
                    }
                }
            }
            Some(FieldType::Multiselect) => {
                if let (Some(min), Some(max)) = (field.min_selections, field.max_selections) {
                    if min > max {
                        self.error(
                            DiagnosticKind::InvalidRange,
                            at(),
                            format!(
                                "Field '{}' has minSelections {} greater than maxSelections {}",
                                path, min, max
                            ),
                        );
                    }
                }
            }
            _ => {}
        }

        if kind.map(|k| k.has_options()).unwrap_or(false)
            && field.options.is_none()
            && field.options_endpoint.is_none()
            && field.options_map.is_none()
        {
            self.warn(
                DiagnosticKind::MissingOptions,
                at(),
                format!("Field '{}' has no options, optionsEndpoint or optionsMap", path),
            );
        }

        if field.options_map.is_some() && field.depends_on_names().is_empty() {
            self.warn(
                DiagnosticKind::OptionsMapWithoutParent,
                at(),
                format!("Field '{}' has optionsMap but no dependsOn; it stays disabled", path),
            );
        }

        if let Some(validations) = &field.validations {
            if let (Some(min), Some(max)) = (validations.min_length, validations.max_length) {
                if min > max {
                    self.warn(
                        DiagnosticKind::InvalidLengthRange,
                        at(),
                        format!("Field '{}' has minLength {} greater than maxLength {}", path, min, max),
                    );
                }
            }
            if let (Some(min), Some(max)) = (validations.min, validations.max) {
                if min > max {
                    self.error(
                        DiagnosticKind::InvalidRange,
                        at(),
                        format!("Field '{}' validation min {} is greater than max {}", path, min, max),
                    );
                }
            }
            if let Some(pattern) = &validations.pattern {
                if let Err(e) = regex::Regex::new(pattern) {
                    self.warn(
                        DiagnosticKind::InvalidPattern,
                        at(),
                        format!("Field '{}' has an invalid pattern: {}", path, e),
                    );
                }
            }
            if validations.required_true == Some(true) && kind != Some(FieldType::Checkbox) {
                self.warn(
                    DiagnosticKind::RequiredTrueOnNonCheckbox,
                    at(),
                    format!("Field '{}' uses requiredTrue but is not a checkbox", path),
                );
            }
            if let Some(condition) = &validations.required_if {
                for op in condition.unsupported_operators() {
                    self.warn(
                        DiagnosticKind::UnsupportedOperator,
                        at(),
                        format!("Field '{}' requiredIf uses unsupported operator '{}'", path, op),
                    );
                }
            }
        }

        if let Some(condition) = &field.visible_when {
            for op in condition.unsupported_operators() {
                self.warn(
                    DiagnosticKind::UnsupportedOperator,
                    at(),
                    format!("Field '{}' visibleWhen uses unsupported operator '{}'", path, op),
                );
            }
        }

        if let Some(computed) = &field.computed {
            if !field.is_readonly() {
                self.warn(
                    DiagnosticKind::ComputedNotReadonly,
                    at(),
                    format!("Computed field '{}' should be readonly", path),
                );
            }
            if let Some(decimal) = computed.decimal.filter(|d| *d > MAX_DECIMAL_PLACES) {
                self.warn(
                    DiagnosticKind::DecimalOutOfRange,
                    at(),
                    format!(
                        "Computed field '{}' asks for {} decimal places; at most {} are rendered",
                        path, decimal, MAX_DECIMAL_PLACES
                    ),
                );
            }
            match formspec_formula::parse(&computed.formula, self.max_formula_depth) {
                Ok(expr) => {
                    for variable in expr.variables() {
                        if !computed.dependencies.contains(&variable) {
                            self.warn(
                                DiagnosticKind::InvalidFormula,
                                at(),
                                format!(
                                    "Formula of '{}' uses '{}' which is not listed in dependencies",
                                    path, variable
                                ),
                            );
                        }
                    }
                }
                Err(e) => self.warn(
                    DiagnosticKind::InvalidFormula,
                    at(),
                    format!("Formula of '{}' cannot be parsed: {}", path, e),
                ),
            }
        }

        for (attribute, limit) in [
            ("maxFileSize", field.max_file_size),
            ("maxCharacters", field.max_characters.map(|n| n as f64)),
        ] {
            if let Some(limit) = limit.filter(|l| *l <= 0.0) {
                self.warn(
                    DiagnosticKind::NonPositiveLimit,
                    at(),
                    format!("Field '{}' has non-positive {} {}", path, attribute, limit),
                );
            }
        }

        if let Some(problem) = field.mask.as_ref().and_then(|m| m.problem()) {
            self.warn(
                DiagnosticKind::UnknownMask,
                at(),
                format!("Field '{}' has {}", path, problem),
            );
        }
    }

    fn check_references(&mut self, fields: &[&Field]) {
        let names: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();

        for field in fields.iter().filter(|f| !f.name.is_empty()) {
            let mut references: Vec<(&str, &str)> = Vec::new();
            references.extend(field.depends_on_names().into_iter().map(|n| ("dependsOn", n)));
            if let Some(condition) = &field.visible_when {
                references.extend(condition.referenced_fields().into_iter().map(|n| ("visibleWhen", n)));
            }
            if let Some(computed) = &field.computed {
                references.extend(
                    computed
                        .dependencies
                        .iter()
                        .map(|n| ("computed.dependencies", n.as_str())),
                );
            }
            if let Some(validations) = &field.validations {
                if let Some(other) = &validations.matches_field {
                    references.push(("matchesField", other.as_str()));
                }
                if let Some(other) = &validations.greater_than_field {
                    references.push(("greaterThanField", other.as_str()));
                }
                if let Some(condition) = &validations.required_if {
                    references.extend(condition.referenced_fields().into_iter().map(|n| ("requiredIf", n)));
                }
            }

            for (attribute, target) in references {
                if !names.contains(target) {
                    self.error(
                        DiagnosticKind::UnknownReference,
                        Some(field.name.clone()),
                        format!(
                            "Field '{}' {} references unknown field '{}'",
                            field.name, attribute, target
                        ),
                    );
                }
            }

            if let Some(computed) = &field.computed {
                if computed.dependencies.iter().any(|d| *d == field.name) {
                    self.error(
                        DiagnosticKind::SelfDependency,
                        Some(field.name.clone()),
                        format!("Computed field '{}' depends on itself", field.name),
                    );
                }
            }
        }
    }

    fn check_cycles(&mut self, fields: &[&Field]) {
        let mut depends_edges: EdgeMap = HashMap::new();
        let mut computed_edges: EdgeMap = HashMap::new();
        let mut depends_origins = Vec::new();
        let mut computed_origins = Vec::new();

        for field in fields.iter().filter(|f| !f.name.is_empty()) {
            let parents = field.depends_on_names();
            if !parents.is_empty() {
                depends_origins.push(field.name.as_str());
                depends_edges
                    .entry(field.name.as_str())
                    .or_default()
                    .extend(parents);
            }
            if let Some(computed) = &field.computed {
                computed_origins.push(field.name.as_str());
                computed_edges
                    .entry(field.name.as_str())
                    .or_default()
                    .extend(computed.dependencies.iter().map(String::as_str));
            }
        }

        let found = find_cycles(&depends_origins, &depends_edges, false)
            .into_iter()
            .map(|c| ("dependsOn", c))
            .chain(
                find_cycles(&computed_origins, &computed_edges, true)
                    .into_iter()
                    .map(|c| ("computed dependencies", c)),
            )
            .map(|(graph, c)| {
                SchemaDiagnostic::new(
                    DiagnosticKind::CircularDependency,
                    Some(c.origin.to_string()),
                    format!(
                        "Circular dependency detected in {} of '{}': {}",
                        graph,
                        c.origin,
                        c.describe()
                    ),
                )
            })
            .collect::<Vec<_>>();
        self.errors.extend(found);
    }
}
