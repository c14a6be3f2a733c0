//! Proposal entity.

use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Proposal lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Draft, visible only to its author.
    #[sea_orm(string_value = "bozza")]
    Bozza,
    /// Published, visible to everyone and open to votes.
    #[sea_orm(string_value = "pubblicata")]
    Pubblicata,
}

impl ProposalStatus {
    /// Status code as stored.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Bozza => "bozza",
            Self::Pubblicata => "pubblicata",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "proposal")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Category whose form schema shapes `additional_data`
    #[sea_orm(indexed)]
    pub category_id: i32,

    /// Author (the only principal allowed to mutate the proposal)
    #[sea_orm(indexed)]
    pub author_id: i32,

    #[sea_orm(indexed)]
    pub status: ProposalStatus,

    /// Category-specific payload (JSON object)
    #[sea_orm(column_type = "JsonBinary")]
    pub additional_data: Json,

    /// Content version, bumped on every accepted post-publication update
    #[sea_orm(default_value = 1)]
    pub current_version: i32,

    /// Cached sum of the votes cast against `current_version`
    #[sea_orm(default_value = 0)]
    pub vote_value: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.status == ProposalStatus::Bozza
    }

    #[must_use]
    pub const fn is_authored_by(&self, user_id: i32) -> bool {
        self.author_id == user_id
    }

    /// Whether `viewer` may read this proposal. Drafts are private to their author.
    #[must_use]
    pub fn is_visible_to(&self, viewer: Option<i32>) -> bool {
        !self.is_draft() || viewer.is_some_and(|id| self.is_authored_by(id))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attachment::Entity")]
    Attachment,

    #[sea_orm(has_many = "super::proposal_vote::Entity")]
    ProposalVote,
}

impl Related<super::attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachment.def()
    }
}

impl Related<super::proposal_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProposalVote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
