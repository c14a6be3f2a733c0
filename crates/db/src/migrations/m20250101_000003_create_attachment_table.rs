//! Create attachment table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Attachment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Attachment::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Attachment::ProposalId).integer().not_null())
                    .col(ColumnDef::new(Attachment::FileUrl).string_len(1024).not_null())
                    .col(ColumnDef::new(Attachment::FileType).string_len(128))
                    .col(ColumnDef::new(Attachment::FileName).string_len(256))
                    .col(ColumnDef::new(Attachment::SizeBytes).big_integer())
                    .col(ColumnDef::new(Attachment::SlotKey).string_len(128))
                    .col(
                        ColumnDef::new(Attachment::UploadedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attachment_proposal")
                            .from(Attachment::Table, Attachment::ProposalId)
                            .to(Proposal::Table, Proposal::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (proposal_id, slot_key) for slot occupancy counts
        manager
            .create_index(
                Index::create()
                    .name("idx_attachment_proposal_slot")
                    .table(Attachment::Table)
                    .col(Attachment::ProposalId)
                    .col(Attachment::SlotKey)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attachment::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Attachment {
    Table,
    Id,
    ProposalId,
    FileUrl,
    FileType,
    FileName,
    SizeBytes,
    SlotKey,
    UploadedAt,
}

#[derive(Iden)]
enum Proposal {
    Table,
    Id,
}
