//! Proposal vote entity.
//!
//! Votes are tagged with the proposal version they were cast against. Rows
//! for superseded versions stay in the table but drop out of every tally.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "proposal_vote")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Voter
    #[sea_orm(indexed)]
    pub user_id: i32,

    #[sea_orm(indexed)]
    pub proposal_id: i32,

    /// Proposal version the vote applies to
    pub proposal_version: i32,

    /// +1 or -1
    pub vote_value: i32,

    pub created_at: DateTimeWithTimeZone,
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
