//! Business logic services.

#![allow(missing_docs)]

pub mod attachment;
pub mod form_schema;
pub mod proposal;
pub mod vote;

pub use attachment::{AttachFileInput, AttachmentService};
pub use form_schema::FormSchemaService;
pub use proposal::{FullUpdateInput, PatchDraftInput, ProposalService};
pub use vote::{VoteDirection, VoteOutcome, VoteService, VoteSummary};

use civica_common::{AppError, AppResult};
use sea_orm::DatabaseTransaction;

/// Commit a service transaction.
async fn commit(txn: DatabaseTransaction) -> AppResult<()> {
    txn.commit()
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
