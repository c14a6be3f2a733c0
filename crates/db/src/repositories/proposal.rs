//! Proposal repository.
//!
//! Mutating methods take an explicit connection so that services can run them
//! inside a transaction opened with [`ProposalRepository::begin`].

use std::sync::Arc;

use crate::entities::{
    Proposal,
    proposal::{self, ProposalStatus},
};
use civica_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use serde_json::Value as JsonValue;

/// New content for a published proposal.
#[derive(Debug, Clone)]
pub struct ContentRevision {
    pub title: String,
    pub description: String,
    pub additional_data: JsonValue,
    pub updated_at: DateTimeWithTimeZone,
}

/// Proposal repository for database operations.
#[derive(Clone)]
pub struct ProposalRepository {
    db: Arc<DatabaseConnection>,
}

impl ProposalRepository {
    /// Create a new proposal repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Open a transaction on the underlying connection.
    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a proposal by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<proposal::Model>> {
        Proposal::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a proposal by ID, returning error if not found.
    pub async fn get_by_id(&self, id: i32) -> AppResult<proposal::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Proposal not found: {id}")))
    }

    /// Load a proposal and lock its row until the surrounding transaction ends.
    pub async fn lock_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i32,
    ) -> AppResult<proposal::Model> {
        Proposal::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Proposal not found: {id}")))
    }

    /// Create a new proposal.
    pub async fn create(&self, model: proposal::ActiveModel) -> AppResult<proposal::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a proposal.
    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: proposal::ActiveModel,
    ) -> AppResult<proposal::Model> {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace the content of a published proposal, bump its version and
    /// reset its vote tally in one statement.
    ///
    /// The update only applies while the row is still published and owned by
    /// `author_id`; the returned row count is 0 otherwise.
    pub async fn revise_published<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i32,
        author_id: i32,
        revision: ContentRevision,
    ) -> AppResult<u64> {
        let result = Proposal::update_many()
            .col_expr(proposal::Column::Title, Expr::value(revision.title))
            .col_expr(
                proposal::Column::Description,
                Expr::value(revision.description),
            )
            .col_expr(
                proposal::Column::AdditionalData,
                Expr::value(revision.additional_data),
            )
            .col_expr(
                proposal::Column::CurrentVersion,
                Expr::col(proposal::Column::CurrentVersion).add(1),
            )
            .col_expr(proposal::Column::VoteValue, Expr::value(0))
            .col_expr(proposal::Column::UpdatedAt, Expr::value(revision.updated_at))
            .filter(proposal::Column::Id.eq(id))
            .filter(proposal::Column::AuthorId.eq(author_id))
            .filter(proposal::Column::Status.eq(ProposalStatus::Pubblicata))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Store a recomputed vote tally for the version it was computed against.
    ///
    /// Returns 0 affected rows if the proposal moved to another version meanwhile.
    pub async fn store_vote_value<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i32,
        version: i32,
        vote_value: i32,
    ) -> AppResult<u64> {
        let result = Proposal::update_many()
            .col_expr(proposal::Column::VoteValue, Expr::value(vote_value))
            .filter(proposal::Column::Id.eq(id))
            .filter(proposal::Column::CurrentVersion.eq(version))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Delete a proposal. Attachments and votes go with it.
    pub async fn delete<C: ConnectionTrait>(&self, conn: &C, id: i32) -> AppResult<()> {
        Proposal::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Drafts written by `author_id`, most recently edited first.
    pub async fn find_drafts_by_author(
        &self,
        author_id: i32,
        limit: u64,
    ) -> AppResult<Vec<proposal::Model>> {
        Proposal::find()
            .filter(proposal::Column::AuthorId.eq(author_id))
            .filter(proposal::Column::Status.eq(ProposalStatus::Bozza))
            .order_by_desc(proposal::Column::UpdatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn create_test_proposal(id: i32, author_id: i32, status: ProposalStatus) -> proposal::Model {
        proposal::Model {
            id,
            title: "Nuova Bozza".to_string(),
            description: String::new(),
            category_id: 1,
            author_id,
            status,
            additional_data: json!({}),
            current_version: 1,
            vote_value: 0,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<proposal::Model>::new()])
                .into_connection(),
        );

        let repo = ProposalRepository::new(db);
        let result = repo.get_by_id(7).await;

        match result {
            Err(AppError::NotFound(msg)) => assert!(msg.contains("Proposal not found: 7")),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lock_by_id_uses_row_lock() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_proposal(1, 10, ProposalStatus::Bozza)]])
                .into_connection(),
        );

        let repo = ProposalRepository::new(db.clone());
        let found = repo.lock_by_id(db.as_ref(), 1).await.unwrap();
        assert_eq!(found.author_id, 10);
        drop(repo);

        let db = Arc::try_unwrap(db).unwrap();
        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        assert!(format!("{:?}", log[0]).contains("FOR UPDATE"));
    }

    #[tokio::test]
    async fn test_revise_published_reports_rows_affected() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = ProposalRepository::new(db.clone());
        let rows = repo
            .revise_published(
                db.as_ref(),
                1,
                10,
                ContentRevision {
                    title: "A better title".to_string(),
                    description: "A longer description".to_string(),
                    additional_data: json!({ "budget": 500 }),
                    updated_at: Utc::now().into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(rows, 1);
        drop(repo);

        let db = Arc::try_unwrap(db).unwrap();
        let sql = format!("{:?}", db.into_transaction_log());
        assert!(sql.contains("UPDATE"));
        assert!(sql.contains("current_version"));
        assert!(sql.contains("vote_value"));
    }

    #[tokio::test]
    async fn test_find_drafts_by_author() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_proposal(1, 10, ProposalStatus::Bozza),
                    create_test_proposal(2, 10, ProposalStatus::Bozza),
                ]])
                .into_connection(),
        );

        let repo = ProposalRepository::new(db);
        let drafts = repo.find_drafts_by_author(10, 20).await.unwrap();

        assert_eq!(drafts.len(), 2);
        assert!(drafts.iter().all(proposal::Model::is_draft));
    }

    #[test]
    fn test_visibility_rules() {
        let draft = create_test_proposal(1, 10, ProposalStatus::Bozza);
        assert!(draft.is_visible_to(Some(10)));
        assert!(!draft.is_visible_to(Some(11)));
        assert!(!draft.is_visible_to(None));

        let published = create_test_proposal(2, 10, ProposalStatus::Pubblicata);
        assert!(published.is_visible_to(None));
        assert!(published.is_visible_to(Some(11)));
    }
}
