//! Category entity.
//!
//! Categories are managed by configuration; the core only reads them. The
//! `form_schema` blob is the untyped field catalogue that shapes a
//! proposal's additional data.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "category")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Stable machine code (unique)
    #[sea_orm(unique)]
    pub code: String,

    /// Localized display labels (language -> text)
    #[sea_orm(column_type = "JsonBinary")]
    pub labels: Json,

    /// Display colour (CSS value)
    #[sea_orm(nullable)]
    pub colour: Option<String>,

    /// Stored form schema, parsed by the core on every read
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub form_schema: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
