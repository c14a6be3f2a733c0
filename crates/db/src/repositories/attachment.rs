//! Attachment repository.

use std::sync::Arc;

use crate::entities::{Attachment, attachment};
use civica_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};

/// Attachment repository for database operations.
#[derive(Clone)]
pub struct AttachmentRepository {
    db: Arc<DatabaseConnection>,
}

impl AttachmentRepository {
    /// Create a new attachment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an attachment by ID.
    pub async fn find_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i32,
    ) -> AppResult<Option<attachment::Model>> {
        Attachment::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All attachments of a proposal, oldest first.
    pub async fn find_by_proposal(&self, proposal_id: i32) -> AppResult<Vec<attachment::Model>> {
        self.find_by_proposal_in(self.db.as_ref(), proposal_id).await
    }

    /// All attachments of a proposal, oldest first, on an explicit connection.
    pub async fn find_by_proposal_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        proposal_id: i32,
    ) -> AppResult<Vec<attachment::Model>> {
        Attachment::find()
            .filter(attachment::Column::ProposalId.eq(proposal_id))
            .order_by_asc(attachment::Column::UploadedAt)
            .order_by_asc(attachment::Column::Id)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count attachments occupying `(proposal_id, slot_key)`.
    pub async fn count_in_slot<C: ConnectionTrait>(
        &self,
        conn: &C,
        proposal_id: i32,
        slot_key: &str,
    ) -> AppResult<u64> {
        Attachment::find()
            .filter(attachment::Column::ProposalId.eq(proposal_id))
            .filter(attachment::Column::SlotKey.eq(slot_key))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new attachment.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: attachment::ActiveModel,
    ) -> AppResult<attachment::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an attachment.
    pub async fn delete<C: ConnectionTrait>(&self, conn: &C, id: i32) -> AppResult<()> {
        Attachment::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
