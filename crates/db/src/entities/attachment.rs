//! Attachment entity for files uploaded to a proposal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Owning proposal
    #[sea_orm(indexed)]
    pub proposal_id: i32,

    pub file_url: String,

    /// MIME type reported at upload
    #[sea_orm(nullable)]
    pub file_type: Option<String>,

    /// Original file name
    #[sea_orm(nullable)]
    pub file_name: Option<String>,

    /// Size in bytes reported at upload
    #[sea_orm(nullable)]
    pub size_bytes: Option<i64>,

    /// Key of the `file` form field this attachment fills (null for extras)
    #[sea_orm(nullable)]
    pub slot_key: Option<String>,

    pub uploaded_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::proposal::Entity",
        from = "Column::ProposalId",
        to = "super::proposal::Column::Id",
        on_delete = "Cascade"
    )]
    Proposal,
}

impl Related<super::proposal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Proposal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
