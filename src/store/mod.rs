// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence of registrations.
//!
//! All stores implement [`RegistrationStore`]. Mutating calls are serialized behind one writer
//! lock per store, concurrent sessions observe "last writer wins" but never an interleaved or
//! half-written state. Persistent stores write the complete state through to disk before a
//! mutating call returns; when that write fails the in-memory state stays at the last
//! acknowledged operation.
//!
//! Two implementations are provided: [`MemoryStore`] which does not persist anything and
//! [`FileStore`] which keeps all registrations in one JSON file, replaced atomically on every
//! change.
mod file;
mod memory;
mod state;

use std::future::Future;

use thiserror::Error;

use crate::code::PossessionCode;
use crate::listing::ListingEntry;
use crate::registration::{Amendment, Registration, Role};

pub use file::{FileStore, RegistrationRow};
pub use memory::MemoryStore;
pub use state::{Snapshot, StoreState};

/// Durable mapping of possession codes to registrations.
pub trait RegistrationStore {
    /// Append a registration.
    ///
    /// Fails with [`StoreError::DuplicateCode`] when a registration with the same possession code
    /// is already present.
    fn create(
        &mut self,
        registration: Registration,
    ) -> impl Future<Output = Result<(), StoreError>>;

    /// Get the registration identified by `code`.
    fn find_by_code(
        &self,
        code: &PossessionCode,
    ) -> impl Future<Output = Result<Option<Registration>, StoreError>>;

    /// Replace all mutable fields of a registration, returns the updated record.
    fn update(
        &mut self,
        code: &PossessionCode,
        amendment: Amendment,
    ) -> impl Future<Output = Result<Registration, StoreError>>;

    /// Remove a registration, returns the removed record.
    fn delete(
        &mut self,
        code: &PossessionCode,
    ) -> impl Future<Output = Result<Registration, StoreError>>;

    /// Registrations of one role, most recently created first.
    fn list_by_role(&self, role: Role) -> impl Future<Output = Result<Vec<ListingEntry>, StoreError>>;

    /// Copy of the complete store content.
    fn snapshot(&self) -> impl Future<Output = Result<Snapshot, StoreError>>;

    /// Replace the complete store content with `snapshot`.
    fn restore(&mut self, snapshot: Snapshot) -> impl Future<Output = Result<(), StoreError>>;

    /// Number of live registrations.
    fn len(&self) -> impl Future<Output = Result<usize, StoreError>>;

    /// Returns `true` if a registration with this code exists.
    fn contains_code(&self, code: &PossessionCode) -> impl Future<Output = Result<bool, StoreError>>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a registration with possession code {0} already exists")]
    DuplicateCode(PossessionCode),

    #[error("no registration with possession code {0}")]
    NotFound(PossessionCode),

    #[error("could not write registrations to storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode or decode registrations: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stored registration {index} is invalid: {reason}")]
    Corrupt { index: usize, reason: String },
}
