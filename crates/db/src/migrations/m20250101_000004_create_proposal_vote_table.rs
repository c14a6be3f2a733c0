//! Create proposal vote table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProposalVote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProposalVote::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProposalVote::UserId).integer().not_null())
                    .col(ColumnDef::new(ProposalVote::ProposalId).integer().not_null())
                    .col(
                        ColumnDef::new(ProposalVote::ProposalVersion)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProposalVote::VoteValue)
                            .integer()
                            .not_null()
                            .check(Expr::col(ProposalVote::VoteValue).is_in([-1, 1])),
                    )
                    .col(
                        ColumnDef::new(ProposalVote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_proposal_vote_proposal")
                            .from(ProposalVote::Table, ProposalVote::ProposalId)
                            .to(Proposal::Table, Proposal::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one vote per user per proposal version
        manager
            .create_index(
                Index::create()
                    .name("idx_proposal_vote_user_proposal_version")
                    .table(ProposalVote::Table)
                    .col(ProposalVote::UserId)
                    .col(ProposalVote::ProposalId)
                    .col(ProposalVote::ProposalVersion)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (proposal_id, proposal_version) for tallies
        manager
            .create_index(
                Index::create()
                    .name("idx_proposal_vote_proposal_version")
                    .table(ProposalVote::Table)
                    .col(ProposalVote::ProposalId)
                    .col(ProposalVote::ProposalVersion)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProposalVote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ProposalVote {
    Table,
    Id,
    UserId,
    ProposalId,
    ProposalVersion,
    VoteValue,
    CreatedAt,
}

#[derive(Iden)]
enum Proposal {
    Table,
    Id,
}
