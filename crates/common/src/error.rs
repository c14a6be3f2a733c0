//! Error types for civica.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Per-field validation messages, one message per offending key.
///
/// Keys are either `additionalData` field keys, attachment slot keys, or the
/// proposal's own columns (`title`, `description`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Create an empty set of field errors.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record a message for `key`. The first message recorded for a key wins.
    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.0.entry(key.into()).or_insert_with(|| message.into());
    }

    /// Merge another set of errors into this one.
    pub fn extend(&mut self, other: Self) {
        for (key, message) in other.0 {
            self.add(key, message);
        }
    }

    /// Message recorded for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether `key` has a message.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Offending keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when empty, otherwise `AppError::ValidationFailed`.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationFailed(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{key}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (key, message) in iter {
            errors.add(key, message);
        }
        errors
    }
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(FieldErrors),

    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    #[error("Slot {slot} is full (capacity {capacity})")]
    CapacityExceeded { slot: String, capacity: u32 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid attachment slot: {0}")]
    InvalidSlot(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid form schema: {0}")]
    InvalidSchema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status the transport layer should answer with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::ValidationFailed(_) | Self::InvalidInput(_) | Self::InvalidSlot(_) => 400,
            Self::IllegalTransition(_) | Self::CapacityExceeded { .. } => 409,
            Self::Database(_) | Self::InvalidSchema(_) | Self::Config(_) | Self::Internal(_) => {
                500
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::IllegalTransition(_) => "ILLEGAL_TRANSITION",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidSlot(_) => "INVALID_SLOT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::InvalidSchema(_) => "INVALID_SCHEMA",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }

    /// Per-field messages carried by a `ValidationFailed` error.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::ValidationFailed(errors) => Some(errors),
            _ => None,
        }
    }

    /// Shorthand for a single-field validation failure.
    #[must_use]
    pub fn field(key: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(key, message);
        Self::ValidationFailed(errors)
    }

    /// Emit this error through `tracing` at a level matching its class.
    pub fn trace(&self) {
        let code = self.error_code();
        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let errors = err
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map_or_else(|| e.code.to_string(), ToString::to_string)
                    })
                    .unwrap_or_else(|| "invalid".to_string());
                (field.to_string(), message)
            })
            .collect();
        Self::ValidationFailed(errors)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_first_message_wins() {
        let mut errors = FieldErrors::new();
        errors.add("budget", "required");
        errors.add("budget", "must be >= 0");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("budget"), Some("required"));
    }

    #[test]
    fn test_field_errors_display_is_sorted() {
        let errors: FieldErrors = [("title", "too short"), ("budget", "required")]
            .into_iter()
            .collect();

        assert_eq!(errors.to_string(), "budget: required; title: too short");
    }

    #[test]
    fn test_empty_field_errors_into_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_non_empty_field_errors_into_validation_failed() {
        let err = AppError::field("budget", "required");

        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.field_errors().and_then(|e| e.get("budget")), Some("required"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).http_status(), 404);
        assert_eq!(AppError::Forbidden("x".into()).http_status(), 403);
        assert_eq!(AppError::IllegalTransition("x".into()).http_status(), 409);
        assert_eq!(
            AppError::CapacityExceeded {
                slot: "photos".into(),
                capacity: 2
            }
            .http_status(),
            409
        );
        assert_eq!(AppError::InvalidInput("x".into()).http_status(), 400);
        assert!(AppError::Database("x".into()).is_server_error());
        assert!(!AppError::Forbidden("x".into()).is_server_error());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let errors: FieldErrors = [("budget", "required")].into_iter().collect();
        let json = serde_json::to_value(&errors).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "budget": "required" }));
    }
}
