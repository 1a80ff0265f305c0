//! Data Models
//!
//! This module contains the declarative form description and the runtime
//! value maps:
//!
//! - `FormSchema` / `Section` - the persisted form document
//! - `Field` - one field descriptor with its rules, dependencies and mask
//! - `Condition` - `visibleWhen` / `requiredIf` boolean trees
//! - `FormValues`, `Touched`, `FieldErrors` - per-field runtime maps

mod condition;
mod field;
mod schema;
mod values;

pub use condition::{
    ComparisonOperator, Condition, ConditionGroup, ConditionRule, LogicalOperator,
};
pub use field::{
    ArrayConfig, AsyncValidatorConfig, ComputedConfig, DependsOn, EndpointConfig, Field,
    FieldType, FormatAs, OptionItem, OptionsEndpoint, ValidWhen, Validations,
};
pub use schema::{FormSchema, Section};
pub use values::{
    as_number, compare_values, is_empty_value, loose_eq, parse_datetime, value_key, FieldErrors,
    FormValues, Touched,
};
