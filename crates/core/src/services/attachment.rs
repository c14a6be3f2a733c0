//! Attachment slot service.

use chrono::Utc;
use civica_common::{AppError, AppResult};
use civica_db::{
    entities::attachment,
    repositories::{AttachmentRepository, ProposalRepository},
};
use sea_orm::{ConnectionTrait, Set};
use serde::Deserialize;
use tracing::{debug, info};
use validator::Validate;

use super::{commit, form_schema::FormSchemaService};
use crate::schema::{FileRules, FormSchema};

/// Metadata of an uploaded file.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttachFileInput {
    /// Key of a `file` field, or `None` for an unslotted extra.
    #[validate(length(min = 1, max = 128))]
    pub slot_key: Option<String>,
    #[validate(length(min = 1, max = 1024))]
    pub file_url: String,
    #[validate(length(max = 128))]
    pub file_type: Option<String>,
    #[validate(length(max = 256))]
    pub file_name: Option<String>,
    #[validate(range(min = 0))]
    pub size_bytes: Option<i64>,
}

/// Records attachments and keeps slotted ones within their declared capacity.
#[derive(Clone)]
pub struct AttachmentService {
    proposal_repo: ProposalRepository,
    attachment_repo: AttachmentRepository,
    schema_service: FormSchemaService,
}

impl AttachmentService {
    #[must_use]
    pub const fn new(
        proposal_repo: ProposalRepository,
        attachment_repo: AttachmentRepository,
        schema_service: FormSchemaService,
    ) -> Self {
        Self {
            proposal_repo,
            attachment_repo,
            schema_service,
        }
    }

    /// Attach a file to a proposal, optionally into a schema slot.
    ///
    /// The slot count and the insert run under the proposal row lock, so two
    /// concurrent uploads cannot both take the last free place.
    pub async fn attach_file(
        &self,
        author_id: i32,
        proposal_id: i32,
        input: AttachFileInput,
    ) -> AppResult<attachment::Model> {
        input.validate()?;

        let txn = self.proposal_repo.begin().await?;
        let proposal = self.proposal_repo.lock_by_id(&txn, proposal_id).await?;

        if !proposal.is_authored_by(author_id) {
            debug!(proposal_id, author_id, "Rejected attachment: not the author");
            return Err(AppError::Forbidden(
                "Only the author can attach files".to_string(),
            ));
        }

        if let Some(slot_key) = input.slot_key.as_deref() {
            let schema = self
                .schema_service
                .load_form_schema_in(&txn, proposal.category_id)
                .await?;
            let rules = schema.file_rules(slot_key).ok_or_else(|| {
                AppError::InvalidSlot(format!("{slot_key} is not a file field of this category"))
            })?;
            check_file_meta(slot_key, rules, &input)?;

            let capacity = rules.capacity();
            let used = self
                .attachment_repo
                .count_in_slot(&txn, proposal_id, slot_key)
                .await?;
            if used >= u64::from(capacity) {
                debug!(proposal_id, slot_key, used, capacity, "Rejected attachment: slot full");
                return Err(AppError::CapacityExceeded {
                    slot: slot_key.to_string(),
                    capacity,
                });
            }
        }

        let model = attachment::ActiveModel {
            proposal_id: Set(proposal_id),
            file_url: Set(input.file_url),
            file_type: Set(input.file_type),
            file_name: Set(input.file_name),
            size_bytes: Set(input.size_bytes),
            slot_key: Set(input.slot_key),
            uploaded_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let attachment = self.attachment_repo.create(&txn, model).await?;
        commit(txn).await?;

        info!(
            proposal_id,
            attachment_id = attachment.id,
            slot_key = ?attachment.slot_key,
            "Attachment added"
        );
        Ok(attachment)
    }

    /// Delete an attachment. Other attachments, slotted or not, are untouched.
    pub async fn delete_attachment(
        &self,
        author_id: i32,
        attachment_id: i32,
    ) -> AppResult<attachment::Model> {
        let txn = self.proposal_repo.begin().await?;
        let attachment = self
            .attachment_repo
            .find_by_id(&txn, attachment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attachment not found: {attachment_id}")))?;
        let proposal = self
            .proposal_repo
            .lock_by_id(&txn, attachment.proposal_id)
            .await?;

        if !proposal.is_authored_by(author_id) {
            debug!(attachment_id, author_id, "Rejected attachment delete: not the author");
            return Err(AppError::Forbidden(
                "Only the author can delete attachments".to_string(),
            ));
        }

        self.attachment_repo.delete(&txn, attachment_id).await?;
        commit(txn).await?;

        info!(proposal_id = proposal.id, attachment_id, "Attachment removed");
        Ok(attachment)
    }

    /// Attachments of a proposal the viewer is allowed to see.
    pub async fn list_attachments(
        &self,
        viewer_id: Option<i32>,
        proposal_id: i32,
    ) -> AppResult<Vec<attachment::Model>> {
        let proposal = self.proposal_repo.get_by_id(proposal_id).await?;
        if !proposal.is_visible_to(viewer_id) {
            return Err(AppError::NotFound(format!(
                "Proposal not found: {proposal_id}"
            )));
        }

        self.attachment_repo.find_by_proposal(proposal_id).await
    }

    /// Whether every required `file` field of the category has an attachment.
    pub async fn required_files_satisfied(
        &self,
        category_id: i32,
        proposal_id: i32,
    ) -> AppResult<bool> {
        Ok(self
            .missing_required_slots(category_id, proposal_id)
            .await?
            .is_empty())
    }

    /// Keys of required `file` fields that have no attachment yet.
    pub async fn missing_required_slots(
        &self,
        category_id: i32,
        proposal_id: i32,
    ) -> AppResult<Vec<String>> {
        let schema = self.schema_service.load_form_schema(category_id).await?;
        if schema.required_file_fields().next().is_none() {
            return Ok(Vec::new());
        }

        let attachments = self.attachment_repo.find_by_proposal(proposal_id).await?;
        Ok(missing_slots(&schema, &attachments))
    }

    /// Same as [`Self::missing_required_slots`] with an already loaded schema,
    /// reading attachments through `conn`.
    pub(crate) async fn missing_slots_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        schema: &FormSchema,
        proposal_id: i32,
    ) -> AppResult<Vec<String>> {
        if schema.required_file_fields().next().is_none() {
            return Ok(Vec::new());
        }

        let attachments = self
            .attachment_repo
            .find_by_proposal_in(conn, proposal_id)
            .await?;
        Ok(missing_slots(schema, &attachments))
    }
}

fn missing_slots(schema: &FormSchema, attachments: &[attachment::Model]) -> Vec<String> {
    schema
        .required_file_fields()
        .filter(|field| {
            !attachments
                .iter()
                .any(|a| a.slot_key.as_deref() == Some(field.key.as_str()))
        })
        .map(|field| field.key.clone())
        .collect()
}

fn check_file_meta(slot_key: &str, rules: &FileRules, input: &AttachFileInput) -> AppResult<()> {
    if !rules.accepts(input.file_type.as_deref(), input.file_name.as_deref()) {
        return Err(AppError::field(
            slot_key,
            format!("file type not accepted (expected {})", rules.accept.join(", ")),
        ));
    }

    if input.size_bytes.is_some_and(|size| !rules.allows_size(size)) {
        return Err(AppError::field(
            slot_key,
            format!(
                "file exceeds the {} MB limit",
                rules.max_size_mb.unwrap_or_default()
            ),
        ));
    }

    Ok(())
}
