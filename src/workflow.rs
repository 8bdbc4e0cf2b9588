// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registration and edit workflows.
//!
//! A new entry moves through `Drafting -> Validated -> AwaitingConfirmation -> Persisted`: the
//! draft is checked for required fields, its contact is normalized, a possession code is generated
//! and embedded in a confirmation link. Nothing is written until the user separately acknowledges
//! that they sent the confirmation message. A draft which is never acknowledged simply never
//! reaches the store.
//!
//! Existing entries are reached by their possession code: `CodeEntered -> Found`, followed by
//! either `Editing -> (AwaitingReconfirmation) -> Updated` or `Deleting -> Deleted`. Changing the
//! contact number of an entry requires a second confirmation round before the update is
//! committed, any other edit is committed directly.
//!
//! The acknowledgment is a manual trust boundary: the bulletin board can not observe whether the
//! confirmation message was actually sent, it only records that the user claims so.
//!
//! All per-user state (the current stage and the undo/redo history) lives in a [`Session`] which
//! is passed into every operation. Every successful create, update, delete first records a
//! snapshot of the store in the session's history and clears its redo steps.
use std::mem;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::code::{CodeError, CodeGenerator, PossessionCode, RandomCodeGenerator};
use crate::config::{Config, ConfigError};
use crate::history::HistoryStack;
use crate::link::{ConfirmationLink, ConfirmationLinkBuilder};
use crate::listing::{CropAvailability, ListingEntry, availability};
use crate::phone::{PhoneRejection, PhoneValidator};
use crate::registration::{Amendment, Draft, Field, Registration, Role};
use crate::store::{RegistrationStore, StoreError};

/// What a looked-up registration is about to be used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Edit,
    Delete,
}

/// Stage of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Nothing in flight, ready for a new draft or code lookup.
    Drafting,

    /// A validated draft with a generated code waits for the user's acknowledgment.
    AwaitingConfirmation(PendingRegistration),

    /// A registration was found by its code and can be edited.
    Editing(Registration),

    /// An edit changing the contact number waits for the user's acknowledgment.
    AwaitingReconfirmation(PendingUpdate),

    /// A registration was found by its code and waits for the yes/no delete confirmation.
    Deleting(Registration),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Drafting => "drafting",
            Stage::AwaitingConfirmation(_) => "awaiting confirmation",
            Stage::Editing(_) => "editing",
            Stage::AwaitingReconfirmation(_) => "awaiting reconfirmation",
            Stage::Deleting(_) => "deleting",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRegistration {
    pub registration: Registration,
    pub link: ConfirmationLink,
    pub possible_duplicate: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUpdate {
    pub original: Registration,
    pub amendment: Amendment,
    pub link: ConfirmationLink,
}

/// What the user needs to complete a confirmation round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub code: PossessionCode,
    pub link: ConfirmationLink,

    /// Set when a live registration with the same role, name and detail exists already.
    pub possible_duplicate: bool,
}

/// Successful end of a workflow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Persisted(Registration),
    Updated(Registration),
    Deleted(Registration),
}

impl Outcome {
    pub fn registration(&self) -> &Registration {
        match self {
            Outcome::Persisted(registration)
            | Outcome::Updated(registration)
            | Outcome::Deleted(registration) => registration,
        }
    }

    pub fn code(&self) -> &PossessionCode {
        &self.registration().code
    }
}

/// Result of submitting an edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// Contact unchanged, the update was committed.
    Updated(Registration),

    /// Contact changed, the update waits for [`Workflow::acknowledge`].
    AwaitingReconfirmation(ConfirmationRequest),
}

/// Result of an undo or redo request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryOutcome {
    Undone,
    Redone,
    NothingToUndo,
    NothingToRedo,
}

/// Per-user workflow context.
#[derive(Clone, Debug)]
pub struct Session {
    stage: Stage,
    history: HistoryStack,
}

impl Session {
    pub fn new(history_limit: Option<usize>) -> Self {
        Self {
            stage: Stage::Drafting,
            history: HistoryStack::new(history_limit),
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    /// Confirmation currently waiting for the user's acknowledgment, if any.
    pub fn pending_confirmation(&self) -> Option<ConfirmationRequest> {
        match &self.stage {
            Stage::AwaitingConfirmation(pending) => Some(ConfirmationRequest {
                code: pending.registration.code.clone(),
                link: pending.link.clone(),
                possible_duplicate: pending.possible_duplicate,
            }),
            Stage::AwaitingReconfirmation(pending) => Some(ConfirmationRequest {
                code: pending.original.code.clone(),
                link: pending.link.clone(),
                possible_duplicate: false,
            }),
            _ => None,
        }
    }

    /// Drop whatever is in flight and return to drafting.
    ///
    /// Returns `true` if something was discarded. Nothing was written for a discarded stage, so
    /// there is nothing to roll back.
    pub fn cancel(&mut self) -> bool {
        let previous = mem::replace(&mut self.stage, Stage::Drafting);
        if previous != Stage::Drafting {
            debug!(stage = previous.name(), "session cancelled");
            true
        } else {
            false
        }
    }

    fn invalid(&self, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidTransition {
            action,
            stage: self.stage.name(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Some(crate::defaults::DEFAULT_HISTORY_LIMIT))
    }
}

/// Orchestrates registration, edit and delete flows on top of a store.
#[derive(Debug)]
pub struct Workflow<S, G = RandomCodeGenerator> {
    store: S,
    codes: G,
    phones: PhoneValidator,
    links: ConfirmationLinkBuilder,
    max_code_attempts: usize,
    history_limit: Option<usize>,
}

impl<S> Workflow<S, RandomCodeGenerator>
where
    S: RegistrationStore,
{
    /// Workflow generating random possession codes of the configured length.
    pub fn from_config(store: S, config: &Config) -> Result<Self, ConfigError> {
        Self::new(store, RandomCodeGenerator::new(config.code_length), config)
    }
}

impl<S, G> Workflow<S, G>
where
    S: RegistrationStore,
    G: CodeGenerator,
{
    pub fn new(store: S, codes: G, config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            codes,
            phones: PhoneValidator::new(config.region()?),
            links: ConfirmationLinkBuilder::new(config.channel_url.clone()),
            max_code_attempts: config.max_code_attempts,
            history_limit: config.history_limit,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn links(&self) -> &ConfirmationLinkBuilder {
        &self.links
    }

    /// Start a new session with the configured history limit.
    pub fn session(&self) -> Session {
        Session::new(self.history_limit)
    }

    /// Validate a draft and prepare its confirmation.
    ///
    /// On success the session waits for [`Workflow::acknowledge`]. Submitting again replaces the
    /// pending draft. A rejected draft leaves the session in drafting and the store untouched.
    pub async fn submit(
        &self,
        session: &mut Session,
        draft: &Draft,
    ) -> Result<ConfirmationRequest, WorkflowError> {
        match session.stage {
            Stage::Drafting | Stage::AwaitingConfirmation(_) => (),
            _ => return Err(session.invalid("submit a new registration")),
        }
        session.stage = Stage::Drafting;

        let validated = draft.require().map_err(|field| {
            debug!(%field, "draft rejected, missing field");
            WorkflowError::MissingField(field)
        })?;

        let contact = self.phones.normalize(&validated.raw_contact).map_err(|err| {
            debug!("draft rejected: {err}");
            WorkflowError::InvalidPhone(err)
        })?;

        let code = self.fresh_code().await?;
        let amendment = validated.into_amendment(contact);
        let possible_duplicate = self.has_duplicate(&amendment).await?;
        if possible_duplicate {
            warn!(%code, "draft looks like an existing registration");
        }

        let link = self.links.build(
            &amendment.contact,
            amendment.listing.role(),
            &amendment.name,
            &code,
        );
        let registration = Registration {
            code: code.clone(),
            name: amendment.name,
            listing: amendment.listing,
            quantity: amendment.quantity,
            address: amendment.address,
            contact: amendment.contact,
        };

        info!(%code, role = %registration.role(), "awaiting confirmation");

        let request = ConfirmationRequest {
            code,
            link: link.clone(),
            possible_duplicate,
        };
        session.stage = Stage::AwaitingConfirmation(PendingRegistration {
            registration,
            link,
            possible_duplicate,
        });
        Ok(request)
    }

    /// The user claims to have sent the confirmation message: commit what is pending.
    ///
    /// Persists a pending registration or commits a pending contact change. When the store fails
    /// the pending stage is kept so the acknowledgment can be repeated.
    pub async fn acknowledge(&mut self, session: &mut Session) -> Result<Outcome, WorkflowError> {
        match mem::replace(&mut session.stage, Stage::Drafting) {
            Stage::AwaitingConfirmation(pending) => self.persist(session, pending).await,
            Stage::AwaitingReconfirmation(pending) => {
                let PendingUpdate {
                    original,
                    amendment,
                    link,
                } = pending;
                let result = self
                    .commit_update(session, &original.code, amendment.clone())
                    .await;
                if let Err(WorkflowError::Storage(_)) = &result {
                    session.stage = Stage::AwaitingReconfirmation(PendingUpdate {
                        original,
                        amendment,
                        link,
                    });
                }
                result.map(Outcome::Updated)
            }
            stage => {
                session.stage = stage;
                Err(session.invalid("acknowledge"))
            }
        }
    }

    /// Look up a registration by its possession code and prepare `action` on it.
    ///
    /// Anything in flight in the session is abandoned. Unknown codes can simply be entered again.
    pub async fn lookup(
        &self,
        session: &mut Session,
        code: &str,
        action: Action,
    ) -> Result<Registration, WorkflowError> {
        session.cancel();

        let not_found = || {
            debug!(code, "no registration for entered code");
            WorkflowError::CodeNotFound(code.trim().to_owned())
        };
        let parsed: PossessionCode = code.parse().map_err(|_| not_found())?;
        let registration = self
            .store
            .find_by_code(&parsed)
            .await?
            .ok_or_else(not_found)?;

        debug!(code = %parsed, ?action, "found registration");
        session.stage = match action {
            Action::Edit => Stage::Editing(registration.clone()),
            Action::Delete => Stage::Deleting(registration.clone()),
        };
        Ok(registration)
    }

    /// Submit the edited form of a looked-up registration.
    ///
    /// The edit is validated like a new draft. An unchanged contact commits directly, a changed
    /// one needs another confirmation round. Rejections keep the registration open for editing.
    pub async fn submit_edit(
        &mut self,
        session: &mut Session,
        draft: &Draft,
    ) -> Result<EditOutcome, WorkflowError> {
        let original = match &session.stage {
            Stage::Editing(original) => original.clone(),
            Stage::AwaitingReconfirmation(pending) => pending.original.clone(),
            _ => return Err(session.invalid("submit an edit")),
        };
        session.stage = Stage::Editing(original.clone());

        let validated = draft.require().map_err(|field| {
            debug!(code = %original.code, %field, "edit rejected, missing field");
            WorkflowError::MissingField(field)
        })?;
        let contact = self.phones.normalize(&validated.raw_contact).map_err(|err| {
            debug!(code = %original.code, "edit rejected: {err}");
            WorkflowError::InvalidPhone(err)
        })?;
        let amendment = validated.into_amendment(contact);

        if amendment.contact == original.contact {
            let registration = self
                .commit_update(session, &original.code, amendment)
                .await?;
            return Ok(EditOutcome::Updated(registration));
        }

        let link = self.links.build_reconfirmation(
            &amendment.contact,
            amendment.listing.role(),
            &amendment.name,
            &original.code,
        );
        info!(code = %original.code, "contact changed, awaiting reconfirmation");

        let request = ConfirmationRequest {
            code: original.code.clone(),
            link: link.clone(),
            possible_duplicate: false,
        };
        session.stage = Stage::AwaitingReconfirmation(PendingUpdate {
            original,
            amendment,
            link,
        });
        Ok(EditOutcome::AwaitingReconfirmation(request))
    }

    /// Answer "yes" to the delete confirmation of a looked-up registration.
    ///
    /// Answering "no" is [`Session::cancel`].
    pub async fn confirm_delete(&mut self, session: &mut Session) -> Result<Outcome, WorkflowError> {
        let registration = match &session.stage {
            Stage::Deleting(registration) => registration.clone(),
            _ => return Err(session.invalid("delete")),
        };

        // On storage failures the delete stays pending and can be confirmed again.
        let before = self.store.snapshot().await?;
        match self.store.delete(&registration.code).await {
            Ok(deleted) => {
                session.stage = Stage::Drafting;
                session.history.record(before);
                info!(code = %deleted.code, "registration deleted");
                Ok(Outcome::Deleted(deleted))
            }
            Err(err @ StoreError::NotFound(_)) => {
                session.stage = Stage::Drafting;
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Restore the store to how it was before this session's latest mutation.
    pub async fn undo(&mut self, session: &mut Session) -> Result<HistoryOutcome, WorkflowError> {
        let current = self.store.snapshot().await?;
        let Some(previous) = session.history.undo(current) else {
            return Ok(HistoryOutcome::NothingToUndo);
        };

        if let Err(err) = self.store.restore(previous.clone()).await {
            session.history.revert_undo(previous);
            return Err(err.into());
        }

        info!(registrations = previous.len(), "undone");
        Ok(HistoryOutcome::Undone)
    }

    /// Re-apply the latest undone mutation.
    pub async fn redo(&mut self, session: &mut Session) -> Result<HistoryOutcome, WorkflowError> {
        let current = self.store.snapshot().await?;
        let Some(next) = session.history.redo(current) else {
            return Ok(HistoryOutcome::NothingToRedo);
        };

        if let Err(err) = self.store.restore(next.clone()).await {
            session.history.revert_redo(next);
            return Err(err.into());
        }

        info!(registrations = next.len(), "redone");
        Ok(HistoryOutcome::Redone)
    }

    /// Listing of one role, most recently created first.
    pub async fn listings(&self, role: Role) -> Result<Vec<ListingEntry>, WorkflowError> {
        Ok(self.store.list_by_role(role).await?)
    }

    /// Total quantities per crop over all producer listings.
    pub async fn availability(&self) -> Result<Vec<CropAvailability>, WorkflowError> {
        let producers = self.store.list_by_role(Role::Producer).await?;
        Ok(availability(&producers))
    }

    async fn persist(
        &mut self,
        session: &mut Session,
        pending: PendingRegistration,
    ) -> Result<Outcome, WorkflowError> {
        let before = match self.store.snapshot().await {
            Ok(before) => before,
            Err(err) => {
                session.stage = Stage::AwaitingConfirmation(pending);
                return Err(err.into());
            }
        };

        match self.store.create(pending.registration.clone()).await {
            Ok(()) => {
                session.history.record(before);
                info!(code = %pending.registration.code, "registration persisted");
                Ok(Outcome::Persisted(pending.registration))
            }
            Err(StoreError::DuplicateCode(code)) => {
                // The code got taken after it was handed out, the user has to confirm again with
                // a fresh one.
                warn!(%code, "possession code taken before acknowledgment, issuing a new one");
                let fresh = self.fresh_code().await?;
                let PendingRegistration {
                    mut registration,
                    possible_duplicate,
                    ..
                } = pending;
                registration.code = fresh;
                let link = self.links.build(
                    &registration.contact,
                    registration.role(),
                    &registration.name,
                    &registration.code,
                );
                session.stage = Stage::AwaitingConfirmation(PendingRegistration {
                    registration,
                    link,
                    possible_duplicate,
                });
                Err(WorkflowError::DuplicateCode(code))
            }
            Err(err) => {
                session.stage = Stage::AwaitingConfirmation(pending);
                Err(err.into())
            }
        }
    }

    async fn commit_update(
        &mut self,
        session: &mut Session,
        code: &PossessionCode,
        amendment: Amendment,
    ) -> Result<Registration, WorkflowError> {
        let before = self.store.snapshot().await?;
        let registration = match self.store.update(code, amendment).await {
            Ok(registration) => registration,
            Err(err @ StoreError::NotFound(_)) => {
                session.stage = Stage::Drafting;
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };
        session.history.record(before);
        session.stage = Stage::Drafting;
        info!(%code, "registration updated");
        Ok(registration)
    }

    /// Generate a possession code which is not used by any live registration.
    async fn fresh_code(&self) -> Result<PossessionCode, WorkflowError> {
        for _ in 0..self.max_code_attempts {
            let code = self.codes.generate()?;
            if !self.store.contains_code(&code).await? {
                return Ok(code);
            }
            debug!(%code, "possession code collision, resampling");
        }
        Err(CodeError::Exhausted(self.max_code_attempts).into())
    }

    async fn has_duplicate(&self, amendment: &Amendment) -> Result<bool, WorkflowError> {
        let entries = self.store.list_by_role(amendment.listing.role()).await?;
        Ok(entries.iter().any(|entry| {
            entry.name.eq_ignore_ascii_case(&amendment.name)
                && entry.detail.eq_ignore_ascii_case(amendment.listing.detail())
        }))
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("required field \"{0}\" is missing")]
    MissingField(Field),

    #[error("invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneRejection),

    #[error("no registration found for code \"{0}\"")]
    CodeNotFound(String),

    #[error("possession code {0} was taken in the meantime, confirm again with the new code")]
    DuplicateCode(PossessionCode),

    #[error("storage failed, please try again: {0}")]
    Storage(StoreError),

    #[error(transparent)]
    CodeGeneration(#[from] CodeError),

    #[error("can not {action} while {stage}")]
    InvalidTransition {
        action: &'static str,
        stage: &'static str,
    },
}

impl WorkflowError {
    /// Returns `true` if storage failed and the same step can simply be repeated.
    ///
    /// The session keeps whatever was pending in that case.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Storage(_))
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(code) => WorkflowError::CodeNotFound(code.to_string()),
            StoreError::DuplicateCode(code) => WorkflowError::DuplicateCode(code),
            err => WorkflowError::Storage(err),
        }
    }
}
