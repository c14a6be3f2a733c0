//! Proposal service.
//!
//! Every mutation locks the proposal row, evaluates its guards and writes
//! inside one transaction. A rejected guard drops the transaction, which rolls
//! back and leaves the stored proposal as it was.

use chrono::Utc;
use civica_common::{AppError, AppResult, FieldErrors, ensure_id};
use civica_db::{
    entities::proposal::{self, ProposalStatus},
    repositories::{ContentRevision, ProposalRepository},
};
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info};
use validator::Validate;

use super::{attachment::AttachmentService, commit, form_schema::FormSchemaService};
use crate::{
    lifecycle::{DRAFT_TITLE, Transition, check_description, check_title, ensure_transition},
    schema::{ValidationMode, build_validator},
};

/// Message for a required `file` slot with no attachment at publish time.
pub const MSG_FILE_REQUIRED: &str = "file required";

/// Upper bound on drafts returned by [`ProposalService::list_my_drafts`].
pub const MAX_DRAFTS_LISTED: u64 = 100;

/// Input for editing a draft. Each provided field replaces the stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatchDraftInput {
    #[validate(length(max = 256))]
    pub title: Option<String>,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    pub additional_data: Option<JsonValue>,
}

/// Input for revising a published proposal.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FullUpdateInput {
    #[validate(length(max = 256))]
    pub title: String,
    #[validate(length(max = 20000))]
    pub description: String,
    /// Kept as stored when omitted.
    pub additional_data: Option<JsonValue>,
}

/// Proposal service for business logic.
#[derive(Clone)]
pub struct ProposalService {
    proposal_repo: ProposalRepository,
    attachment_service: AttachmentService,
    schema_service: FormSchemaService,
}

impl ProposalService {
    /// Create a new proposal service.
    #[must_use]
    pub const fn new(
        proposal_repo: ProposalRepository,
        attachment_service: AttachmentService,
        schema_service: FormSchemaService,
    ) -> Self {
        Self {
            proposal_repo,
            attachment_service,
            schema_service,
        }
    }

    /// Start an empty draft. The category is only checked at publish time.
    pub async fn create_draft(&self, author_id: i32, category_id: i32) -> AppResult<proposal::Model> {
        ensure_id(author_id)?;
        ensure_id(category_id)?;

        let now: DateTimeWithTimeZone = Utc::now().into();
        let model = proposal::ActiveModel {
            title: Set(DRAFT_TITLE.to_string()),
            description: Set(String::new()),
            category_id: Set(category_id),
            author_id: Set(author_id),
            status: Set(ProposalStatus::Bozza),
            additional_data: Set(json!({})),
            current_version: Set(1),
            vote_value: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let draft = self.proposal_repo.create(model).await?;
        info!(proposal_id = draft.id, author_id, category_id, "Draft created");
        Ok(draft)
    }

    /// Replace the provided fields of a draft.
    ///
    /// Additional data goes through the lenient draft validator: missing
    /// required fields are fine, undeclared keys and malformed values are not.
    pub async fn patch_draft(
        &self,
        author_id: i32,
        proposal_id: i32,
        input: PatchDraftInput,
    ) -> AppResult<proposal::Model> {
        input.validate()?;

        let txn = self.proposal_repo.begin().await?;
        let proposal = self.proposal_repo.lock_by_id(&txn, proposal_id).await?;
        ensure_transition(&proposal, author_id, Transition::PatchDraft)?;

        if let Some(data) = &input.additional_data {
            self.schema_service
                .validator_for(&txn, proposal.category_id, ValidationMode::Draft)
                .await?
                .validate(data)?;
        }

        let mut active: proposal::ActiveModel = proposal.into();
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(data) = input.additional_data {
            active.additional_data = Set(data);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = self.proposal_repo.update(&txn, active).await?;
        commit(txn).await?;

        debug!(proposal_id, "Draft updated");
        Ok(updated)
    }

    /// Publish a draft.
    ///
    /// Title length, the strict additional-data validator and the required
    /// file slots are all checked; every failure is reported at once. On
    /// success the publish moment becomes the proposal's `created_at`.
    pub async fn publish(&self, author_id: i32, proposal_id: i32) -> AppResult<proposal::Model> {
        let txn = self.proposal_repo.begin().await?;
        let proposal = self.proposal_repo.lock_by_id(&txn, proposal_id).await?;
        ensure_transition(&proposal, author_id, Transition::Publish)?;

        let schema = self
            .schema_service
            .load_form_schema_in(&txn, proposal.category_id)
            .await?;

        let mut errors = FieldErrors::new();
        check_title(&proposal.title, &mut errors);
        errors.extend(
            build_validator(&schema, ValidationMode::Publish).check(&proposal.additional_data),
        );
        for slot in self
            .attachment_service
            .missing_slots_in(&txn, &schema, proposal_id)
            .await?
        {
            errors.add(slot, MSG_FILE_REQUIRED);
        }

        if !errors.is_empty() {
            debug!(proposal_id, errors = %errors, "Publish rejected");
            return Err(AppError::ValidationFailed(errors));
        }

        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut active: proposal::ActiveModel = proposal.into();
        active.status = Set(ProposalStatus::Pubblicata);
        active.created_at = Set(now);
        active.updated_at = Set(now);

        let published = self.proposal_repo.update(&txn, active).await?;
        commit(txn).await?;

        info!(proposal_id, author_id, "Proposal published");
        Ok(published)
    }

    /// Revise a published proposal.
    ///
    /// An accepted revision bumps `current_version` and zeroes `vote_value`
    /// in the same statement; votes cast against earlier versions stay stored
    /// but no longer count.
    pub async fn full_update(
        &self,
        author_id: i32,
        proposal_id: i32,
        input: FullUpdateInput,
    ) -> AppResult<proposal::Model> {
        input.validate()?;

        let txn = self.proposal_repo.begin().await?;
        let proposal = self.proposal_repo.lock_by_id(&txn, proposal_id).await?;
        ensure_transition(&proposal, author_id, Transition::FullUpdate)?;

        let mut errors = FieldErrors::new();
        check_title(&input.title, &mut errors);
        check_description(&input.description, &mut errors);
        if let Some(data) = &input.additional_data {
            let validator = self
                .schema_service
                .validator_for(&txn, proposal.category_id, ValidationMode::Publish)
                .await?;
            errors.extend(validator.check(data));
        }

        if !errors.is_empty() {
            debug!(proposal_id, errors = %errors, "Full update rejected");
            return Err(AppError::ValidationFailed(errors));
        }

        let revision = ContentRevision {
            title: input.title,
            description: input.description,
            additional_data: input
                .additional_data
                .unwrap_or_else(|| proposal.additional_data.clone()),
            updated_at: Utc::now().into(),
        };
        let rows = self
            .proposal_repo
            .revise_published(&txn, proposal_id, author_id, revision.clone())
            .await?;
        if rows == 0 {
            return Err(AppError::IllegalTransition(
                "Proposal is no longer published".to_string(),
            ));
        }
        commit(txn).await?;

        let revised = proposal::Model {
            title: revision.title,
            description: revision.description,
            additional_data: revision.additional_data,
            current_version: proposal.current_version + 1,
            vote_value: 0,
            updated_at: revision.updated_at,
            ..proposal
        };

        info!(
            proposal_id,
            version = revised.current_version,
            "Published proposal revised, votes reset"
        );
        Ok(revised)
    }

    /// Delete a proposal in any state. Attachments and votes cascade.
    pub async fn delete_proposal(&self, author_id: i32, proposal_id: i32) -> AppResult<()> {
        let txn = self.proposal_repo.begin().await?;
        let proposal = self.proposal_repo.lock_by_id(&txn, proposal_id).await?;
        ensure_transition(&proposal, author_id, Transition::Delete)?;

        self.proposal_repo.delete(&txn, proposal_id).await?;
        commit(txn).await?;

        info!(proposal_id, author_id, status = %proposal.status, "Proposal deleted");
        Ok(())
    }

    /// Get a proposal. Someone else's draft reads as not found.
    pub async fn get_proposal(
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

    /// The caller's own drafts, most recently edited first.
    pub async fn list_my_drafts(&self, author_id: i32) -> AppResult<Vec<proposal::Model>> {
        self.proposal_repo
            .find_drafts_by_author(author_id, MAX_DRAFTS_LISTED)
            .await
    }
}
