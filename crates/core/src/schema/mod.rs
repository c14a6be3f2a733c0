//! Category form schemas.
//!
//! A category stores its field catalogue as an untyped JSON array.
//! [`FormSchema::parse`] turns that array into typed [`FormField`]s and rejects
//! malformed definitions; [`build_validator`] compiles a parsed schema into the
//! validator applied to a proposal's additional data.

#![allow(missing_docs)]

mod validate;

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

pub use validate::{
    ADDITIONAL_DATA_KEY, MSG_REQUIRED, MSG_UNKNOWN_FIELD, ValidationMode, Validator,
    build_validator,
};

/// Capacity of a `multiple` file slot that declares no `maxFiles`.
pub const DEFAULT_MULTIPLE_MAX_FILES: u32 = 5;

/// Capacity of a single file slot that declares no `maxFiles`.
pub const DEFAULT_SINGLE_MAX_FILES: u32 = 1;

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap_or_else(|_| unreachable!("static regex"))
});

/// Structural problems found while parsing a stored form schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("form schema must be an array of field definitions")]
    NotAnArray,

    #[error("field #{index}: {reason}")]
    Malformed { index: usize, reason: String },

    #[error("field {key:?}: {reason}")]
    InvalidField { key: String, reason: String },

    #[error("duplicate field key {0:?}")]
    DuplicateKey(String),
}

/// A label that is either a plain string or a `{lang: text}` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Translated(BTreeMap<String, String>),
}

impl LocalizedText {
    /// Text for `lang`, falling back to the first available translation.
    #[must_use]
    pub fn get(&self, lang: &str) -> Option<&str> {
        match self {
            Self::Plain(text) => Some(text),
            Self::Translated(map) => map
                .get(lang)
                .or_else(|| map.values().next())
                .map(String::as_str),
        }
    }
}

/// A compiled regular expression that serializes as its source.
///
/// Patterns use the `regex` crate syntax. It has no lookaround and no
/// backreferences, so a pattern relying on them fails to parse and the
/// category's schema is rejected as a whole with an error naming the field.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Unanchored match: the pattern may occur anywhere in `text`.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::new(&source)
            .map_err(|_| serde::de::Error::custom(format!("invalid pattern {source:?}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TextRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NumberRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Input granularity hint. Not enforced on values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChoiceOption {
    pub value: String,
    pub label: LocalizedText,
}

/// Options of a `select` or `multiselect` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChoiceRules {
    pub options: Vec<ChoiceOption>,
}

impl ChoiceRules {
    /// Declared option values, in schema order.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        self.options.iter().map(|o| o.value.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateRules {
    #[serde(
        default,
        deserialize_with = "deserialize_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub min: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "deserialize_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub max: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MapRules {
    /// Opaque description of the geometry the map widget collects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_schema: Option<JsonValue>,
}

/// Attachment slot declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileRules {
    /// Lowercased MIME types (`image/png`), wildcards (`image/*`) or
    /// extensions (`.pdf`). Empty accepts anything.
    #[serde(
        default,
        deserialize_with = "deserialize_accept",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub accept: Vec<String>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u32>,
    #[serde(rename = "maxSizeMB", skip_serializing_if = "Option::is_none")]
    pub max_size_mb: Option<f64>,
}

impl FileRules {
    /// Number of attachments the slot holds.
    ///
    /// An explicit `maxFiles` wins; otherwise 5 for `multiple` slots, else 1.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.max_files.unwrap_or(if self.multiple {
            DEFAULT_MULTIPLE_MAX_FILES
        } else {
            DEFAULT_SINGLE_MAX_FILES
        })
    }

    /// Whether a file reporting this type and name satisfies `accept`.
    ///
    /// A file that reports neither is let through.
    #[must_use]
    pub fn accepts(&self, file_type: Option<&str>, file_name: Option<&str>) -> bool {
        if self.accept.is_empty() || (file_type.is_none() && file_name.is_none()) {
            return true;
        }

        let mime = file_type.map(str::to_ascii_lowercase);
        let extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| format!(".{}", ext.to_ascii_lowercase()));

        self.accept.iter().any(|pattern| {
            if pattern == "*" || pattern == "*/*" {
                true
            } else if pattern.starts_with('.') {
                extension.as_deref() == Some(pattern.as_str())
            } else if let Some(family) = pattern.strip_suffix("/*") {
                mime.as_deref()
                    .and_then(|m| m.split_once('/'))
                    .is_some_and(|(top, _)| top == family)
            } else {
                mime.as_deref() == Some(pattern.as_str())
            }
        })
    }

    /// Whether a file of `size_bytes` fits under `maxSizeMB`.
    #[must_use]
    pub fn allows_size(&self, size_bytes: i64) -> bool {
        self.max_size_mb
            .is_none_or(|mb| size_bytes as f64 <= mb * 1024.0 * 1024.0)
    }
}

/// Kind-specific part of a field definition, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKind {
    Text(TextRules),
    Number(NumberRules),
    Boolean,
    Select(ChoiceRules),
    Multiselect(ChoiceRules),
    Date(DateRules),
    Map(MapRules),
    File(FileRules),
}

impl FieldKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Boolean => "boolean",
            Self::Select(_) => "select",
            Self::Multiselect(_) => "multiselect",
            Self::Date(_) => "date",
            Self::Map(_) => "map",
            Self::File(_) => "file",
        }
    }
}

/// One entry of a category's form schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub key: String,
    pub label: LocalizedText,
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<LocalizedText>,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FormField {
    /// Slot rules if this is a `file` field.
    #[must_use]
    pub const fn file_rules(&self) -> Option<&FileRules> {
        match &self.kind {
            FieldKind::File(rules) => Some(rules),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, FieldKind::File(_))
    }
}

/// Parsed, structurally valid field catalogue of a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormSchema {
    fields: Vec<FormField>,
}

impl FormSchema {
    /// A schema with no fields.
    #[must_use]
    pub const fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    /// Parse a stored field-definition array.
    pub fn parse(value: &JsonValue) -> Result<Self, SchemaError> {
        let items = value.as_array().ok_or(SchemaError::NotAnArray)?;

        let mut seen = HashSet::with_capacity(items.len());
        let mut fields = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let field = parse_field(index, item)?;
            if !seen.insert(field.key.clone()) {
                return Err(SchemaError::DuplicateKey(field.key));
            }
            fields.push(field);
        }

        Ok(Self { fields })
    }

    #[must_use]
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field declared under `key`.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Slot rules for `key` if it names a `file` field.
    #[must_use]
    pub fn file_rules(&self, key: &str) -> Option<&FileRules> {
        self.field(key).and_then(FormField::file_rules)
    }

    pub fn file_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|f| f.is_file())
    }

    pub fn required_file_fields(&self) -> impl Iterator<Item = &FormField> {
        self.file_fields().filter(|f| f.required)
    }
}

impl<'a> IntoIterator for &'a FormSchema {
    type Item = &'a FormField;
    type IntoIter = std::slice::Iter<'a, FormField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Attributes shared by every kind. Whatever is left over belongs to the kind.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    kind: String,
    key: String,
    label: LocalizedText,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    help_text: Option<LocalizedText>,
    #[serde(flatten)]
    rest: Map<String, JsonValue>,
}

fn parse_field(index: usize, item: &JsonValue) -> Result<FormField, SchemaError> {
    let malformed = |reason: String| SchemaError::Malformed { index, reason };

    if !item.is_object() {
        return Err(malformed("field definition must be an object".to_string()));
    }
    let RawField {
        kind,
        key,
        label,
        required,
        help_text,
        rest,
    } = RawField::deserialize(item).map_err(|e| malformed(e.to_string()))?;

    if key.trim().is_empty() {
        return Err(malformed("key must not be empty".to_string()));
    }
    let invalid = |reason: String| SchemaError::InvalidField {
        key: key.clone(),
        reason,
    };

    let kind = match kind.as_str() {
        "text" => FieldKind::Text(kind_rules(rest).map_err(invalid)?),
        "number" => FieldKind::Number(kind_rules(rest).map_err(invalid)?),
        "boolean" => {
            if let Some(attr) = rest.keys().next() {
                return Err(invalid(format!("unknown attribute `{attr}`")));
            }
            FieldKind::Boolean
        }
        "select" => FieldKind::Select(kind_rules(rest).map_err(invalid)?),
        "multiselect" => FieldKind::Multiselect(kind_rules(rest).map_err(invalid)?),
        "date" => FieldKind::Date(kind_rules(rest).map_err(invalid)?),
        "map" => FieldKind::Map(kind_rules(rest).map_err(invalid)?),
        "file" => FieldKind::File(kind_rules(rest).map_err(invalid)?),
        other => return Err(invalid(format!("unknown field kind {other:?}"))),
    };
    check_rules(&kind).map_err(invalid)?;

    Ok(FormField {
        key,
        label,
        required,
        help_text,
        kind,
    })
}

fn kind_rules<T: DeserializeOwned>(attrs: Map<String, JsonValue>) -> Result<T, String> {
    serde_json::from_value(JsonValue::Object(attrs)).map_err(|e| e.to_string())
}

/// Cross-attribute constraints serde cannot express.
fn check_rules(kind: &FieldKind) -> Result<(), String> {
    match kind {
        FieldKind::Text(rules) => {
            if let (Some(min), Some(max)) = (rules.min_length, rules.max_length) {
                if min > max {
                    return Err("minLength must not exceed maxLength".to_string());
                }
            }
        }
        FieldKind::Number(rules) => {
            if let (Some(min), Some(max)) = (rules.min, rules.max) {
                if min > max {
                    return Err("min must not exceed max".to_string());
                }
            }
            if rules.step.is_some_and(|step| step <= 0.0) {
                return Err("step must be positive".to_string());
            }
        }
        FieldKind::Select(rules) | FieldKind::Multiselect(rules) => {
            if rules.options.is_empty() {
                return Err("options must not be empty".to_string());
            }
            let mut seen = HashSet::with_capacity(rules.options.len());
            for option in &rules.options {
                if !seen.insert(option.value.as_str()) {
                    return Err(format!("duplicate option value {:?}", option.value));
                }
            }
        }
        FieldKind::Date(rules) => {
            if let (Some(min), Some(max)) = (rules.min, rules.max) {
                if min > max {
                    return Err("min must not be after max".to_string());
                }
            }
        }
        FieldKind::File(rules) => {
            if rules.max_files == Some(0) {
                return Err("maxFiles must be at least 1".to_string());
            }
            if rules.max_size_mb.is_some_and(|mb| mb <= 0.0) {
                return Err("maxSizeMB must be positive".to_string());
            }
        }
        FieldKind::Boolean | FieldKind::Map(_) => {}
    }
    Ok(())
}

/// Parse a strict `YYYY-MM-DD` calendar date.
pub(crate) fn parse_iso_date(text: &str) -> Result<NaiveDate, &'static str> {
    if !ISO_DATE.is_match(text) {
        return Err("must be a date (YYYY-MM-DD)");
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| "is not a valid calendar date")
}

fn deserialize_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    Option::<String>::deserialize(deserializer)?
        .map(|text| {
            parse_iso_date(&text)
                .map_err(|reason| serde::de::Error::custom(format!("{text:?} {reason}")))
        })
        .transpose()
}

fn deserialize_accept<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Accept {
        Joined(String),
        List(Vec<String>),
    }

    let entries = match Option::<Accept>::deserialize(deserializer)? {
        None => return Ok(Vec::new()),
        Some(Accept::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
        Some(Accept::List(list)) => list,
    };

    Ok(entries
        .iter()
        .map(|entry| entry.trim().to_ascii_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect())
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}
