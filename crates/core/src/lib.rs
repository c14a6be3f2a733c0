//! Core business logic for civica.
//!
//! Category form schemas, the additional-data validator built from them, and
//! the services driving a proposal from draft to publication and voting.

pub mod lifecycle;
pub mod schema;
pub mod services;

pub use lifecycle::Transition;
pub use schema::{
    FieldKind, FormField, FormSchema, LocalizedText, SchemaError, ValidationMode, Validator,
    build_validator,
};
pub use services::*;
