//! Service Layer Error Types
//!
//! Errors returned by the form services (schema import/export, sessions,
//! collaborator calls). Schema problems and field validation messages are
//! data, not errors; only a rejected import surfaces the diagnostic list here.

use crate::validation::SchemaDiagnostic;
use thiserror::Error;

/// Form service operation errors
#[derive(Error, Debug)]
pub enum FormServiceError {
    /// Field name not defined by the schema
    #[error("Unknown field: {name}")]
    UnknownField { name: String },

    /// Import refused because the schema failed structural checks
    #[error("Schema rejected with {} error(s)", errors.len())]
    SchemaRejected { errors: Vec<SchemaDiagnostic> },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Schema file read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormServiceError {
    /// Create an unknown field error
    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField { name: name.into() }
    }

    /// Create a schema rejected error
    pub fn schema_rejected(errors: Vec<SchemaDiagnostic>) -> Self {
        Self::SchemaRejected { errors }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<formspec_formula::FormulaError> for FormServiceError {
    fn from(err: formspec_formula::FormulaError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
