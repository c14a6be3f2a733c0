//! Additional-data validator compiled from a form schema.
//!
//! One schema yields two validators: [`ValidationMode::Draft`] treats every
//! field as optional, [`ValidationMode::Publish`] enforces `required`. Both
//! reject keys the schema does not declare.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use civica_common::{AppResult, FieldErrors};
use serde_json::Value as JsonValue;

use super::{FieldKind, FormSchema, Pattern, parse_iso_date};

/// Error key used when the additional data is not an object at all.
pub const ADDITIONAL_DATA_KEY: &str = "additionalData";

pub const MSG_REQUIRED: &str = "required";
pub const MSG_UNKNOWN_FIELD: &str = "unknown field";

/// Which set of rules a validator applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Every field optional. Used while a proposal is a draft.
    Draft,
    /// Declared `required` fields must be present.
    Publish,
}

#[derive(Debug, Clone)]
enum Constraint {
    Text {
        min_length: Option<u32>,
        max_length: Option<u32>,
        pattern: Option<Pattern>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Boolean,
    OneOf(Vec<String>),
    ManyOf(Vec<String>),
    Date {
        min: Option<NaiveDate>,
        max: Option<NaiveDate>,
    },
    Object,
}

impl Constraint {
    /// `None` for kinds that do not live in the additional data.
    fn compile(kind: &FieldKind) -> Option<Self> {
        let constraint = match kind {
            FieldKind::Text(rules) => Self::Text {
                min_length: rules.min_length,
                max_length: rules.max_length,
                pattern: rules.pattern.clone(),
            },
            FieldKind::Number(rules) => Self::Number {
                min: rules.min,
                max: rules.max,
            },
            FieldKind::Boolean => Self::Boolean,
            FieldKind::Select(rules) => Self::OneOf(rules.values()),
            FieldKind::Multiselect(rules) => Self::ManyOf(rules.values()),
            FieldKind::Date(rules) => Self::Date {
                min: rules.min,
                max: rules.max,
            },
            FieldKind::Map(_) => Self::Object,
            FieldKind::File(_) => return None,
        };
        Some(constraint)
    }

    fn check(&self, value: &JsonValue) -> Result<(), String> {
        match self {
            Self::Text {
                min_length,
                max_length,
                pattern,
            } => {
                let text = value.as_str().ok_or("must be a string")?;
                let len = text.chars().count();
                if let Some(min) = min_length.filter(|&min| len < min as usize) {
                    return Err(format!("must be at least {min} characters"));
                }
                if let Some(max) = max_length.filter(|&max| len > max as usize) {
                    return Err(format!("must be at most {max} characters"));
                }
                if pattern.as_ref().is_some_and(|p| !p.is_match(text)) {
                    return Err("does not match the required format".to_string());
                }
            }
            Self::Number { min, max } => {
                let number = value.as_f64().ok_or("must be a number")?;
                if let Some(min) = min.filter(|&min| number < min) {
                    return Err(format!("must be at least {min}"));
                }
                if let Some(max) = max.filter(|&max| number > max) {
                    return Err(format!("must be at most {max}"));
                }
            }
            Self::Boolean => {
                if !value.is_boolean() {
                    return Err("must be true or false".to_string());
                }
            }
            Self::OneOf(options) => {
                let choice = value.as_str().filter(|v| options.iter().any(|o| o == v));
                if choice.is_none() {
                    return Err(format!("must be one of: {}", options.join(", ")));
                }
            }
            Self::ManyOf(options) => {
                let items = value.as_array().ok_or("must be a list")?;
                for item in items {
                    if !item.as_str().is_some_and(|v| options.iter().any(|o| o == v)) {
                        return Err(format!("contains an invalid option: {item}"));
                    }
                }
            }
            Self::Date { min, max } => {
                let text = value.as_str().ok_or("must be a date (YYYY-MM-DD)")?;
                let date = parse_iso_date(text)?;
                if let Some(min) = min.filter(|&min| date < min) {
                    return Err(format!("must be on or after {min}"));
                }
                if let Some(max) = max.filter(|&max| date > max) {
                    return Err(format!("must be on or before {max}"));
                }
            }
            Self::Object => {
                if !value.is_object() {
                    return Err("must be an object".to_string());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Rule {
    required: bool,
    constraint: Constraint,
}

/// Closed-shape validator for a proposal's additional data.
#[derive(Debug, Clone)]
pub struct Validator {
    mode: ValidationMode,
    rules: BTreeMap<String, Rule>,
}

/// Compile `schema` into a validator for `mode`.
///
/// `file` fields are left out: their presence is tracked through attachments.
#[must_use]
pub fn build_validator(schema: &FormSchema, mode: ValidationMode) -> Validator {
    let rules = schema
        .fields()
        .iter()
        .filter_map(|field| {
            let constraint = Constraint::compile(&field.kind)?;
            let rule = Rule {
                required: mode == ValidationMode::Publish && field.required,
                constraint,
            };
            Some((field.key.clone(), rule))
        })
        .collect();

    Validator { mode, rules }
}

impl Validator {
    #[must_use]
    pub const fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Keys this validator accepts.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Collect one message per offending key. A JSON `null` counts as absent.
    #[must_use]
    pub fn check(&self, data: &JsonValue) -> FieldErrors {
        let mut errors = FieldErrors::new();

        let Some(object) = data.as_object() else {
            errors.add(ADDITIONAL_DATA_KEY, "must be an object");
            return errors;
        };

        for key in object.keys() {
            if !self.rules.contains_key(key) {
                errors.add(key.as_str(), MSG_UNKNOWN_FIELD);
            }
        }

        for (key, rule) in &self.rules {
            match object.get(key) {
                None | Some(JsonValue::Null) => {
                    if rule.required {
                        errors.add(key.as_str(), MSG_REQUIRED);
                    }
                }
                Some(value) => {
                    if let Err(message) = rule.constraint.check(value) {
                        errors.add(key.as_str(), message);
                    }
                }
            }
        }

        errors
    }

    /// `Err(ValidationFailed)` carrying every message from [`Self::check`].
    pub fn validate(&self, data: &JsonValue) -> AppResult<()> {
        self.check(data).into_result()
    }
}
