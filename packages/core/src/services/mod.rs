//! Form Services
//!
//! This module contains the runtime services layered on the pure core:
//!
//! - `FormSession` - one live form: values, touched flags, snapshots
//! - `AsyncValidationCoordinator` - debounced remote validation per field
//! - `OptionsProvider` / `CachedOptionsProvider` - remote option lists
//! - `RemoteValidator` - remote validation collaborator
//! - Schema import/export (`import_schema`, `serialize_schema`, files)
//!
//! The transports behind `OptionsProvider` and `RemoteValidator` belong to
//! the embedding application.

pub mod async_validation;
pub mod error;
pub mod form_session;
pub mod options_provider;
pub mod remote_validator;
pub mod schema_io;

pub use async_validation::{
    AsyncValidationCoordinator, AsyncValidationEvent, AsyncValidationState,
    DEFAULT_INVALID_MESSAGE, REQUEST_FAILED_MESSAGE,
};
pub use error::FormServiceError;
pub use form_session::{FormSession, FormSnapshot};
pub use options_provider::{
    endpoint_params, resolve_endpoint, CachedOptionsProvider, OptionsProvider, OptionsRequest,
};
pub use remote_validator::{RemoteValidationRequest, RemoteValidator, Verdict};
pub use schema_io::{
    import_schema, load_schema_file, parse_json_to_schema, save_schema_file, serialize_schema,
    ImportedSchema,
};
