//! Proposal lifecycle rules.
//!
//! A proposal starts as a draft (`bozza`) and becomes published
//! (`pubblicata`) once; there is no way back. Every mutation is reserved to
//! the author. The checks here are pure and run after the proposal row has
//! been locked, so a failing guard never leaves partial writes behind.

use civica_common::{AppError, AppResult, FieldErrors};
use civica_db::entities::proposal::{self, ProposalStatus};
use tracing::debug;

/// Title given to a freshly created draft.
pub const DRAFT_TITLE: &str = "Nuova Bozza";

/// Minimum title length, in characters, to publish or update a published proposal.
pub const MIN_TITLE_CHARS: usize = 5;

/// Minimum description length, in characters, for a published proposal update.
pub const MIN_DESCRIPTION_CHARS: usize = 10;

/// Author-initiated operations on an existing proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Edit a draft in place.
    PatchDraft,
    /// Draft to published.
    Publish,
    /// Revise a published proposal, starting a new version.
    FullUpdate,
    /// Remove the proposal in any state.
    Delete,
}

impl Transition {
    /// Name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PatchDraft => "patch-draft",
            Self::Publish => "publish",
            Self::FullUpdate => "full-update",
            Self::Delete => "delete",
        }
    }

    /// Whether the transition may start from `status`.
    #[must_use]
    pub const fn allowed_from(self, status: ProposalStatus) -> bool {
        match self {
            Self::PatchDraft | Self::Publish => matches!(status, ProposalStatus::Bozza),
            Self::FullUpdate => matches!(status, ProposalStatus::Pubblicata),
            Self::Delete => true,
        }
    }
}

/// Check ownership, then the source state.
pub fn ensure_transition(
    proposal: &proposal::Model,
    actor_id: i32,
    transition: Transition,
) -> AppResult<()> {
    if !proposal.is_authored_by(actor_id) {
        debug!(
            proposal_id = proposal.id,
            actor_id,
            transition = transition.name(),
            "Rejected: not the author"
        );
        return Err(AppError::Forbidden(
            "Only the author can modify this proposal".to_string(),
        ));
    }

    if !transition.allowed_from(proposal.status) {
        debug!(
            proposal_id = proposal.id,
            status = %proposal.status,
            transition = transition.name(),
            "Rejected: illegal transition"
        );
        return Err(AppError::IllegalTransition(format!(
            "Cannot {} a proposal in status {}",
            transition.name(),
            proposal.status
        )));
    }

    Ok(())
}

/// Record a message under `title` unless it has enough characters.
pub fn check_title(title: &str, errors: &mut FieldErrors) {
    if title.chars().count() < MIN_TITLE_CHARS {
        errors.add(
            "title",
            format!("must be at least {MIN_TITLE_CHARS} characters"),
        );
    }
}

/// Record a message under `description` unless it has enough characters.
pub fn check_description(description: &str, errors: &mut FieldErrors) {
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        errors.add(
            "description",
            format!("must be at least {MIN_DESCRIPTION_CHARS} characters"),
        );
    }
}
