//! FormSpec Core
//!
//! This crate evaluates declarative form schemas against live input: it
//! validates schema documents, resolves field dependencies, computes derived
//! values, formats masked input and coordinates remote validation.
//!
//! # Architecture
//!
//! - **Schema as data**: a `FormSchema` is parsed from JSON and treated as an
//!   immutable value; edits replace it wholesale
//! - **Explicit recompute**: the resolver is a synchronous function of
//!   `(schema, values)` run after every mutation, never an implicit graph
//! - **No code execution**: formulas go through the restricted
//!   `formspec-formula` expression engine
//! - **Async at the edges only**: debounce timers and option fetches live in
//!   the services layer, stamped with per-field sequence numbers
//!
//! # Modules
//!
//! - [`models`] - Schema, field and value types
//! - [`validation`] - Static schema validator
//! - [`resolver`] - Dependency graph resolver (visibility, options, resets, errors)
//! - [`mask`] - Input mask engine
//! - [`services`] - Form sessions, async validation, options provider, schema IO
//! - [`config`] - Engine configuration

pub mod config;
pub mod mask;
pub mod models;
pub mod resolver;
pub mod services;
pub mod validation;

// Re-export commonly used types
pub use config::FormEngineConfig;
pub use mask::{apply_mask, is_complete, max_length, pattern_of, MaskSpec};
pub use models::*;
pub use resolver::{DependencyResolver, Evaluation, ResolvedOptions};
pub use services::*;
pub use validation::{validate_schema, DiagnosticKind, SchemaDiagnostic, ValidationReport};
