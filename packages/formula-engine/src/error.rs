/// Error types for the formula engine
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function '{name}' expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Formula produced a non-finite number")]
    NonFiniteResult,

    #[error("Formula exceeds maximum length of {max} characters")]
    FormulaTooLong { max: usize },

    #[error("Formula nesting exceeds maximum depth of {max}")]
    NestingTooDeep { max: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FormulaError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FormulaError>;
