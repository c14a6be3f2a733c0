//! Proposal vote repository.
//!
//! Every query is scoped to one proposal version; votes cast against earlier
//! versions are never touched, only filtered out.

use std::sync::Arc;

use crate::entities::{ProposalVote, proposal_vote};
use civica_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QuerySelect, Set, prelude::DateTimeWithTimeZone,
    sea_query::OnConflict,
};

/// Up/down split of the votes on one proposal version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteCounts {
    pub up: u64,
    pub down: u64,
}

/// Proposal vote repository for database operations.
#[derive(Clone)]
pub struct ProposalVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl ProposalVoteRepository {
    /// Create a new proposal vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the vote a user cast against a specific proposal version.
    pub async fn find_by_user(
        &self,
        user_id: i32,
        proposal_id: i32,
        version: i32,
    ) -> AppResult<Option<proposal_vote::Model>> {
        self.find_for_version(self.db.as_ref(), user_id, proposal_id, version)
            .await
    }

    /// Same as [`Self::find_by_user`] on an explicit connection.
    pub async fn find_for_version<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i32,
        proposal_id: i32,
        version: i32,
    ) -> AppResult<Option<proposal_vote::Model>> {
        ProposalVote::find()
            .filter(proposal_vote::Column::UserId.eq(user_id))
            .filter(proposal_vote::Column::ProposalId.eq(proposal_id))
            .filter(proposal_vote::Column::ProposalVersion.eq(version))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert or overwrite the vote keyed by `(user, proposal, version)`.
    ///
    /// Relies on the unique index so concurrent casts collapse into one row.
    pub async fn upsert<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i32,
        proposal_id: i32,
        version: i32,
        vote_value: i32,
        cast_at: DateTimeWithTimeZone,
    ) -> AppResult<()> {
        let model = proposal_vote::ActiveModel {
            user_id: Set(user_id),
            proposal_id: Set(proposal_id),
            proposal_version: Set(version),
            vote_value: Set(vote_value),
            created_at: Set(cast_at),
            ..Default::default()
        };

        ProposalVote::insert(model)
            .on_conflict(
                OnConflict::columns([
                    proposal_vote::Column::UserId,
                    proposal_vote::Column::ProposalId,
                    proposal_vote::Column::ProposalVersion,
                ])
                .update_columns([
                    proposal_vote::Column::VoteValue,
                    proposal_vote::Column::CreatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Delete the vote keyed by `(user, proposal, version)`. Returns rows removed.
    pub async fn delete_for_version<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i32,
        proposal_id: i32,
        version: i32,
    ) -> AppResult<u64> {
        let result = ProposalVote::delete_many()
            .filter(proposal_vote::Column::UserId.eq(user_id))
            .filter(proposal_vote::Column::ProposalId.eq(proposal_id))
            .filter(proposal_vote::Column::ProposalVersion.eq(version))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Sum of vote values cast against one proposal version.
    pub async fn sum_for_version<C: ConnectionTrait>(
        &self,
        conn: &C,
        proposal_id: i32,
        version: i32,
    ) -> AppResult<i64> {
        #[derive(FromQueryResult)]
        struct SumResult {
            total: Option<i64>,
        }

        let result = ProposalVote::find()
            .filter(proposal_vote::Column::ProposalId.eq(proposal_id))
            .filter(proposal_vote::Column::ProposalVersion.eq(version))
            .select_only()
            .column_as(proposal_vote::Column::VoteValue.sum(), "total")
            .into_model::<SumResult>()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.and_then(|r| r.total).unwrap_or(0))
    }

    /// Up/down vote counts for one proposal version.
    pub async fn counts_for_version(&self, proposal_id: i32, version: i32) -> AppResult<VoteCounts> {
        #[derive(FromQueryResult)]
        struct CountRow {
            vote_value: i32,
            votes: i64,
        }

        let rows = ProposalVote::find()
            .filter(proposal_vote::Column::ProposalId.eq(proposal_id))
            .filter(proposal_vote::Column::ProposalVersion.eq(version))
            .select_only()
            .column(proposal_vote::Column::VoteValue)
            .column_as(proposal_vote::Column::Id.count(), "votes")
            .group_by(proposal_vote::Column::VoteValue)
            .into_model::<CountRow>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut counts = VoteCounts::default();
        for row in rows {
            let votes = u64::try_from(row.votes).unwrap_or(0);
            if row.vote_value > 0 {
                counts.up += votes;
            } else {
                counts.down += votes;
            }
        }
        Ok(counts)
    }

    /// Number of vote rows ever stored for a proposal, across all versions.
    pub async fn count_all_versions(&self, proposal_id: i32) -> AppResult<u64> {
        ProposalVote::find()
            .filter(proposal_vote::Column::ProposalId.eq(proposal_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    #[tokio::test]
    async fn test_sum_for_version() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! {
                    "total" => Value::BigInt(Some(7)),
                }]])
                .into_connection(),
        );

        let repo = ProposalVoteRepository::new(db.clone());
        let total = repo.sum_for_version(db.as_ref(), 1, 1).await.unwrap();

        assert_eq!(total, 7);
    }

    #[tokio::test]
    async fn test_sum_for_version_without_votes_is_zero() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! {
                    "total" => Value::BigInt(None),
                }]])
                .into_connection(),
        );

        let repo = ProposalVoteRepository::new(db.clone());
        let total = repo.sum_for_version(db.as_ref(), 1, 2).await.unwrap();

        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_upsert_issues_on_conflict() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = ProposalVoteRepository::new(db.clone());
        repo.upsert(db.as_ref(), 3, 1, 2, -1, Utc::now().into())
            .await
            .unwrap();
        drop(repo);

        let db = Arc::try_unwrap(db).unwrap();
        let sql = format!("{:?}", db.into_transaction_log());
        assert!(sql.contains("ON CONFLICT"));
        assert!(sql.contains("DO UPDATE"));
    }

    #[tokio::test]
    async fn test_counts_for_version() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    btreemap! {
                        "vote_value" => Value::Int(Some(1)),
                        "votes" => Value::BigInt(Some(5)),
                    },
                    btreemap! {
                        "vote_value" => Value::Int(Some(-1)),
                        "votes" => Value::BigInt(Some(2)),
                    },
                ]])
                .into_connection(),
        );

        let repo = ProposalVoteRepository::new(db);
        let counts = repo.counts_for_version(1, 1).await.unwrap();

        assert_eq!(counts, VoteCounts { up: 5, down: 2 });
    }

    #[tokio::test]
    async fn test_find_for_version_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<proposal_vote::Model>::new()])
                .into_connection(),
        );

        let repo = ProposalVoteRepository::new(db.clone());
        let found = repo.find_for_version(db.as_ref(), 3, 1, 2).await.unwrap();

        assert!(found.is_none());
    }
}
