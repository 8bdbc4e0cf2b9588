// SPDX-License-Identifier: MIT OR Apache-2.0

//! Community bulletin board connecting producers, buyers and volunteers.
//!
//! Participants register structured listings (what they have, need or offer, how to reach them
//! and where they are) which others browse per role. There are no accounts: whoever holds the
//! short possession code handed out at registration may edit or delete that one entry.
//!
//! ## Registering
//!
//! A [`Draft`] coming from a form is validated, its contact number normalized into the canonical
//! form used by the messaging channel and a fresh possession code generated. The user receives a
//! [`ConfirmationLink`] pre-filled with a role-specific message containing the code. Only after a
//! separate acknowledgment ("I sent it") the registration is written to the store.
//!
//! ```rust
//! # use agrilink::{Config, Draft, MemoryStore, Outcome, Role, Workflow};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut workflow = Workflow::from_config(MemoryStore::new(), &Config::default())?;
//! let mut session = workflow.session();
//!
//! let draft = Draft {
//!     role: Some(Role::Producer),
//!     name: "Asha".into(),
//!     detail: "Wheat".into(),
//!     quantity: "50".into(),
//!     address: "Near the well".into(),
//!     contact: "9876543210".into(),
//!     bank_details: None,
//! };
//!
//! // Nothing is stored yet, the user is asked to send the confirmation message first.
//! let request = workflow.submit(&mut session, &draft).await?;
//! assert!(request.link.url().starts_with("whatsapp://send/919876543210?text="));
//!
//! let outcome = workflow.acknowledge(&mut session).await?;
//! assert_eq!(outcome.code(), &request.code);
//! assert_eq!(workflow.listings(Role::Producer).await?.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Editing and deleting
//!
//! Presenting a possession code to [`Workflow::lookup`] opens the matching registration for
//! editing or deletion. Edits are validated like new drafts; a changed contact number needs
//! another confirmation round. Deletions need a yes/no confirmation.
//!
//! Every committed change records a snapshot of the whole store in the session's history, so it
//! can be undone and redone.
//!
//! ## Stores
//!
//! [`MemoryStore`] keeps registrations in memory, [`FileStore`] writes them through to a JSON
//! file, atomically replaced on every change.
pub mod code;
pub mod config;
pub mod defaults;
pub mod history;
pub mod link;
pub mod listing;
pub mod phone;
pub mod registration;
pub mod store;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod workflow;

pub use code::{CodeError, CodeGenerator, PossessionCode, RandomCodeGenerator};
pub use config::{Config, ConfigError};
pub use history::HistoryStack;
pub use link::{ConfirmationLink, ConfirmationLinkBuilder};
pub use listing::{CropAvailability, ListingEntry, availability};
pub use phone::{CanonicalPhone, PhoneRejection, PhoneValidator, Region, normalize};
pub use registration::{Amendment, Draft, Field, Listing, Registration, Role};
pub use store::{
    FileStore, MemoryStore, RegistrationRow, RegistrationStore, Snapshot, StoreError, StoreState,
};
pub use workflow::{
    Action, ConfirmationRequest, EditOutcome, HistoryOutcome, Outcome, Session, Stage, Workflow,
    WorkflowError,
};
