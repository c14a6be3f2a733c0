//! Form schema loading.

use civica_common::{AppError, AppResult};
use civica_db::{entities::category, repositories::CategoryRepository};
use sea_orm::ConnectionTrait;
use tracing::warn;

use crate::schema::{FormSchema, ValidationMode, Validator, build_validator};

/// Loads and parses the form schema stored on a category.
#[derive(Clone)]
pub struct FormSchemaService {
    category_repo: CategoryRepository,
}

impl FormSchemaService {
    #[must_use]
    pub const fn new(category_repo: CategoryRepository) -> Self {
        Self { category_repo }
    }

    /// Load the parsed schema of a category.
    ///
    /// Fails with `NotFound` for an unknown category and `InvalidSchema` for a
    /// stored array holding malformed fields.
    pub async fn load_form_schema(&self, category_id: i32) -> AppResult<FormSchema> {
        let category = self.category_repo.get_by_id(category_id).await?;
        schema_of(&category)
    }

    /// Same as [`Self::load_form_schema`], reading through `conn`.
    ///
    /// Callers holding a proposal lock pass their transaction, so the request
    /// runs on a single connection.
    pub async fn load_form_schema_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        category_id: i32,
    ) -> AppResult<FormSchema> {
        let category = self.category_repo.get_by_id_in(conn, category_id).await?;
        schema_of(&category)
    }

    /// Load a category's schema through `conn` and compile it for `mode`.
    pub async fn validator_for<C: ConnectionTrait>(
        &self,
        conn: &C,
        category_id: i32,
        mode: ValidationMode,
    ) -> AppResult<Validator> {
        let schema = self.load_form_schema_in(conn, category_id).await?;
        Ok(build_validator(&schema, mode))
    }
}

/// Parse the schema stored on `category`.
///
/// A missing or non-array blob reads as an empty schema.
pub fn schema_of(category: &category::Model) -> AppResult<FormSchema> {
    match &category.form_schema {
        Some(blob) if blob.is_array() => FormSchema::parse(blob).map_err(|e| {
            AppError::InvalidSchema(format!("category {}: {e}", category.code))
        }),
        Some(blob) if !blob.is_null() => {
            warn!(
                category_id = category.id,
                code = %category.code,
                "Stored form schema is not an array; treating it as empty"
            );
            Ok(FormSchema::empty())
        }
        _ => Ok(FormSchema::empty()),
    }
}
