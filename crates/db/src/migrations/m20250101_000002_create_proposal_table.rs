//! Create proposal table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // category_id is deliberately not a foreign key: drafts may point at a
        // category that is only checked when they are published.
        manager
            .create_table(
                Table::create()
                    .table(Proposal::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Proposal::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Proposal::Title).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Proposal::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Proposal::CategoryId).integer().not_null())
                    .col(ColumnDef::new(Proposal::AuthorId).integer().not_null())
                    .col(
                        ColumnDef::new(Proposal::Status)
                            .string_len(16)
                            .not_null()
                            .default("bozza"),
                    )
                    .col(
                        ColumnDef::new(Proposal::AdditionalData)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(Proposal::CurrentVersion)
                            .integer()
                            .not_null()
                            .default(1)
                            .check(Expr::col(Proposal::CurrentVersion).gte(1)),
                    )
                    .col(
                        ColumnDef::new(Proposal::VoteValue)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Proposal::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Proposal::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: author_id (for "my drafts" and ownership lookups)
        manager
            .create_index(
                Index::create()
                    .name("idx_proposal_author_id")
                    .table(Proposal::Table)
                    .col(Proposal::AuthorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_proposal_category_id")
                    .table(Proposal::Table)
                    .col(Proposal::CategoryId)
                    .to_owned(),
            )
            .await?;

        // Index: (status, created_at) for public listings
        manager
            .create_index(
                Index::create()
                    .name("idx_proposal_status_created_at")
                    .table(Proposal::Table)
                    .col(Proposal::Status)
                    .col(Proposal::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Proposal::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Proposal {
    Table,
    Id,
    Title,
    Description,
    CategoryId,
    AuthorId,
    Status,
    AdditionalData,
    CurrentVersion,
    VoteValue,
    CreatedAt,
    UpdatedAt,
}
