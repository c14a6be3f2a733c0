//! Voting service.
//!
//! Votes are keyed by `(user, proposal, version)`. Only rows matching the
//! proposal's current version count; the cached `vote_value` on the proposal
//! is always recomputed from them inside the same transaction as the vote
//! write, never adjusted in place.

use std::fmt;

use chrono::Utc;
use civica_common::{AppError, AppResult};
use civica_db::{
    entities::proposal,
    repositories::{ProposalRepository, ProposalVoteRepository},
};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use tracing::{debug, info};

use super::commit;

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i32")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Stored value: `1` or `-1`.
    #[must_use]
    pub const fn value(self) -> i32 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

impl TryFrom<i32> for VoteDirection {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(AppError::InvalidInput(format!(
                "Vote value must be 1 or -1, got {other}"
            ))),
        }
    }
}

impl From<VoteDirection> for i32 {
    fn from(direction: VoteDirection) -> Self {
        direction.value()
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.value())
    }
}

/// Result of casting or removing a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    /// The caller's vote after the operation, `None` once removed.
    pub value: Option<VoteDirection>,
    pub total_votes: i32,
}

/// Tally of a proposal's current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub proposal_id: i32,
    pub version: i32,
    pub total_votes: i32,
    pub up_votes: u64,
    pub down_votes: u64,
}

/// Vote service for business logic.
#[derive(Clone)]
pub struct VoteService {
    proposal_repo: ProposalRepository,
    vote_repo: ProposalVoteRepository,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub const fn new(proposal_repo: ProposalRepository, vote_repo: ProposalVoteRepository) -> Self {
        Self {
            proposal_repo,
            vote_repo,
        }
    }

    /// Cast or change a vote on the proposal's current version.
    ///
    /// Casting the same direction twice keeps one row and the same total.
    pub async fn cast_vote(
        &self,
        user_id: i32,
        proposal_id: i32,
        value: i32,
    ) -> AppResult<VoteOutcome> {
        let direction = VoteDirection::try_from(value)?;

        let txn = self.proposal_repo.begin().await?;
        let proposal = self.proposal_repo.lock_by_id(&txn, proposal_id).await?;
        ensure_votable(&proposal, user_id)?;

        let version = proposal.current_version;
        self.vote_repo
            .upsert(
                &txn,
                user_id,
                proposal_id,
                version,
                direction.value(),
                Utc::now().into(),
            )
            .await?;
        let total_votes = self.refresh_total(&txn, proposal_id, version).await?;
        commit(txn).await?;

        info!(
            proposal_id,
            user_id,
            version,
            value = direction.value(),
            total_votes,
            "Vote cast"
        );
        Ok(VoteOutcome {
            value: Some(direction),
            total_votes,
        })
    }

    /// Withdraw the caller's vote on the current version, if any.
    pub async fn remove_vote(&self, user_id: i32, proposal_id: i32) -> AppResult<VoteOutcome> {
        let txn = self.proposal_repo.begin().await?;
        let proposal = self.proposal_repo.lock_by_id(&txn, proposal_id).await?;
        ensure_votable(&proposal, user_id)?;

        let version = proposal.current_version;
        let removed = self
            .vote_repo
            .delete_for_version(&txn, user_id, proposal_id, version)
            .await?;
        let total_votes = self.refresh_total(&txn, proposal_id, version).await?;
        commit(txn).await?;

        info!(proposal_id, user_id, version, removed, total_votes, "Vote removed");
        Ok(VoteOutcome {
            value: None,
            total_votes,
        })
    }

    /// The caller's vote on the current version.
    ///
    /// A vote cast before the last revision reads as `None`.
    pub async fn get_my_vote(
        &self,
        user_id: i32,
        proposal_id: i32,
    ) -> AppResult<Option<VoteDirection>> {
        let proposal = self.visible_proposal(Some(user_id), proposal_id).await?;

        self.vote_repo
            .find_by_user(user_id, proposal_id, proposal.current_version)
            .await?
            .map(|vote| VoteDirection::try_from(vote.vote_value))
            .transpose()
    }

    /// Up/down split and total for the current version.
    pub async fn get_vote_summary(
        &self,
        viewer_id: Option<i32>,
        proposal_id: i32,
    ) -> AppResult<VoteSummary> {
        let proposal = self.visible_proposal(viewer_id, proposal_id).await?;
        let counts = self
            .vote_repo
            .counts_for_version(proposal_id, proposal.current_version)
            .await?;

        Ok(VoteSummary {
            proposal_id,
            version: proposal.current_version,
            total_votes: proposal.vote_value,
            up_votes: counts.up,
            down_votes: counts.down,
        })
    }

    async fn visible_proposal(
        &self,
        viewer_id: Option<i32>,
        proposal_id: i32,
    ) -> AppResult<proposal::Model> {
        let proposal = self.proposal_repo.get_by_id(proposal_id).await?;
        if !proposal.is_visible_to(viewer_id) {
            return Err(AppError::NotFound(format!(
                "Proposal not found: {proposal_id}"
            )));
        }
        Ok(proposal)
    }

    /// Recompute the current-version sum and store it on the proposal.
    async fn refresh_total<C: ConnectionTrait>(
        &self,
        conn: &C,
        proposal_id: i32,
        version: i32,
    ) -> AppResult<i32> {
        let sum = self
            .vote_repo
            .sum_for_version(conn, proposal_id, version)
            .await?;
        let total = i32::try_from(sum)
            .map_err(|_| AppError::Internal(format!("Vote total out of range: {sum}")))?;

        self.proposal_repo
            .store_vote_value(conn, proposal_id, version, total)
            .await?;
        Ok(total)
    }
}

/// Only published proposals take votes. Someone else's draft does not exist.
fn ensure_votable(proposal: &proposal::Model, user_id: i32) -> AppResult<()> {
    if !proposal.is_draft() {
        return Ok(());
    }

    debug!(proposal_id = proposal.id, user_id, "Rejected vote on a draft");
    if proposal.is_visible_to(Some(user_id)) {
        Err(AppError::IllegalTransition(
            "Cannot vote on a draft".to_string(),
        ))
    } else {
        Err(AppError::NotFound(format!(
            "Proposal not found: {}",
            proposal.id
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use civica_db::entities::{proposal::ProposalStatus, proposal_vote};
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
    use serde_json::json;
    use std::{collections::BTreeMap, sync::Arc};

    fn create_test_proposal(status: ProposalStatus, version: i32, vote_value: i32) -> proposal::Model {
        proposal::Model {
            id: 1,
            title: "Pista ciclabile".to_string(),
            description: "Collegare il centro alla stazione".to_string(),
            category_id: 3,
            author_id: 10,
            status,
            additional_data: json!({}),
            current_version: version,
            vote_value,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn create_test_vote(user_id: i32, version: i32, vote_value: i32) -> proposal_vote::Model {
        proposal_vote::Model {
            id: 100,
            user_id,
            proposal_id: 1,
            proposal_version: version,
            vote_value,
            created_at: Utc::now().into(),
        }
    }

    fn sum_row(total: Option<i64>) -> BTreeMap<&'static str, Value> {
        btreemap! { "total" => Value::BigInt(total) }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn service(db: &Arc<DatabaseConnection>) -> VoteService {
        VoteService::new(
            ProposalRepository::new(Arc::clone(db)),
            ProposalVoteRepository::new(Arc::clone(db)),
        )
    }

    #[test]
    fn test_vote_direction_values() {
        assert_eq!(VoteDirection::try_from(1).unwrap(), VoteDirection::Up);
        assert_eq!(VoteDirection::try_from(-1).unwrap(), VoteDirection::Down);
        for bad in [0, 2, -2, i32::MAX] {
            assert!(matches!(
                VoteDirection::try_from(bad),
                Err(AppError::InvalidInput(_))
            ));
        }
        assert_eq!(VoteDirection::Down.to_string(), "-1");
        assert_eq!(serde_json::to_value(VoteDirection::Up).unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_invalid_value_rejected_before_any_read() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = service(&db);

        let result = service.cast_vote(20, 1, 5).await;

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        drop(service);
        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_cast_vote() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_proposal(ProposalStatus::Pubblicata, 1, 0)]])
                .append_query_results([[sum_row(Some(1))]])
                .append_exec_results([exec(1), exec(1)])
                .into_connection(),
        );

        let outcome = service(&db).cast_vote(20, 1, 1).await.unwrap();

        assert_eq!(
            outcome,
            VoteOutcome {
                value: Some(VoteDirection::Up),
                total_votes: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_flip_vote_moves_total_by_two() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_proposal(ProposalStatus::Pubblicata, 1, 0)]])
                .append_query_results([[sum_row(Some(1))]])
                .append_query_results([[create_test_proposal(ProposalStatus::Pubblicata, 1, 1)]])
                .append_query_results([[sum_row(Some(-1))]])
                .append_exec_results([exec(1), exec(1), exec(1), exec(1)])
                .into_connection(),
        );
        let service = service(&db);

        let first = service.cast_vote(20, 1, 1).await.unwrap();
        let second = service.cast_vote(20, 1, -1).await.unwrap();

        assert_eq!(first.total_votes - second.total_votes, 2);
        assert_eq!(second.value, Some(VoteDirection::Down));

        drop(service);
        let log = format!("{:?}", Arc::try_unwrap(db).unwrap().into_transaction_log());
        assert_eq!(log.matches("ON CONFLICT").count(), 2);
        assert!(log.contains("FOR UPDATE"));
    }

    #[tokio::test]
    async fn test_vote_on_missing_proposal() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<proposal::Model>::new()])
                .into_connection(),
        );

        let result = service(&db).cast_vote(20, 99, 1).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_vote_on_draft() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_proposal(ProposalStatus::Bozza, 1, 0)]])
                .append_query_results([[create_test_proposal(ProposalStatus::Bozza, 1, 0)]])
                .into_connection(),
        );
        let service = service(&db);

        assert!(matches!(
            service.cast_vote(10, 1, 1).await,
            Err(AppError::IllegalTransition(_))
        ));
        assert!(matches!(
            service.cast_vote(20, 1, 1).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_vote() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_proposal(ProposalStatus::Pubblicata, 1, 1)]])
                .append_query_results([[sum_row(None)]])
                .append_exec_results([exec(1), exec(1)])
                .into_connection(),
        );

        let outcome = service(&db).remove_vote(20, 1).await.unwrap();

        assert_eq!(outcome.value, None);
        assert_eq!(outcome.total_votes, 0);
    }

    #[tokio::test]
    async fn test_remove_without_vote_is_noop() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_proposal(ProposalStatus::Pubblicata, 1, 4)]])
                .append_query_results([[sum_row(Some(4))]])
                .append_exec_results([exec(0), exec(1)])
                .into_connection(),
        );

        let outcome = service(&db).remove_vote(20, 1).await.unwrap();

        assert_eq!(outcome.total_votes, 4);
    }

    #[tokio::test]
    async fn test_get_my_vote_current_version() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_proposal(ProposalStatus::Pubblicata, 1, 1)]])
                .append_query_results([[create_test_vote(20, 1, 1)]])
                .into_connection(),
        );

        let vote = service(&db).get_my_vote(20, 1).await.unwrap();

        assert_eq!(vote, Some(VoteDirection::Up));
    }

    #[tokio::test]
    async fn test_get_my_vote_after_revision_is_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_proposal(ProposalStatus::Pubblicata, 2, 0)]])
                .append_query_results([Vec::<proposal_vote::Model>::new()])
                .into_connection(),
        );
        let service = service(&db);

        let vote = service.get_my_vote(20, 1).await.unwrap();
        assert_eq!(vote, None);

        drop(service);
        let log = format!("{:?}", Arc::try_unwrap(db).unwrap().into_transaction_log());
        assert!(log.contains("proposal_version"));
    }

    #[tokio::test]
    async fn test_vote_summary() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_proposal(ProposalStatus::Pubblicata, 3, 3)]])
                .append_query_results([[
                    btreemap! { "vote_value" => Value::Int(Some(1)), "votes" => Value::BigInt(Some(4)) },
                    btreemap! { "vote_value" => Value::Int(Some(-1)), "votes" => Value::BigInt(Some(1)) },
                ]])
                .into_connection(),
        );

        let summary = service(&db).get_vote_summary(None, 1).await.unwrap();

        assert_eq!(
            summary,
            VoteSummary {
                proposal_id: 1,
                version: 3,
                total_votes: 3,
                up_votes: 4,
                down_votes: 1,
            }
        );
    }
}
