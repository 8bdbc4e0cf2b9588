// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for registrations.
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::code::PossessionCode;
use crate::listing::ListingEntry;
use crate::registration::{Amendment, Registration, Role};
use crate::store::{RegistrationStore, Snapshot, StoreError, StoreState};

/// An in-memory registration store.
///
/// This does not persist data permanently, all changes are lost when the process ends. Use this
/// only in development or test contexts.
///
/// `MemoryStore` can be cloned and shared between sessions, all clones see the same state behind
/// an `RwLock`.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory store holding `state`.
    pub fn from_state(state: StoreState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Obtain a read-lock on the store.
    pub fn read_store(&self) -> RwLockReadGuard<'_, StoreState> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    pub fn write_store(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }
}

impl RegistrationStore for MemoryStore {
    async fn create(&mut self, registration: Registration) -> Result<(), StoreError> {
        let code = registration.code.clone();
        self.write_store().create(registration)?;
        debug!(%code, "created registration");
        Ok(())
    }

    async fn find_by_code(
        &self,
        code: &PossessionCode,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self.read_store().find_by_code(code).cloned())
    }

    async fn update(
        &mut self,
        code: &PossessionCode,
        amendment: Amendment,
    ) -> Result<Registration, StoreError> {
        let registration = self.write_store().update(code, amendment)?;
        debug!(%code, "updated registration");
        Ok(registration)
    }

    async fn delete(&mut self, code: &PossessionCode) -> Result<Registration, StoreError> {
        let registration = self.write_store().delete(code)?;
        debug!(%code, "deleted registration");
        Ok(registration)
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<ListingEntry>, StoreError> {
        Ok(self.read_store().list_by_role(role))
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.read_store().snapshot())
    }

    async fn restore(&mut self, snapshot: Snapshot) -> Result<(), StoreError> {
        let len = snapshot.len();
        self.write_store().restore(snapshot);
        debug!(len, "restored store snapshot");
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read_store().len())
    }

    async fn contains_code(&self, code: &PossessionCode) -> Result<bool, StoreError> {
        Ok(self.read_store().contains_code(code))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::registration::Role;
    use crate::store::{RegistrationStore, StoreError};
    use crate::test_utils::{amendment_from, registration};

    use super::MemoryStore;

    #[tokio::test]
    async fn create_and_find() {
        let mut store = MemoryStore::new();
        let asha = registration("K3F9QZ", Role::Producer);

        store.create(asha.clone()).await.expect("no errors");

        let found = store
            .find_by_code(&asha.code)
            .await
            .expect("no errors")
            .expect("registration should exist");
        assert_eq!(found, asha);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let mut store = MemoryStore::new();
        let view = store.clone();

        store
            .create(registration("AAAAAA", Role::Buyer))
            .await
            .expect("no errors");
        assert_eq!(view.len().await.unwrap(), 1);
        assert_eq!(view.list_by_role(Role::Buyer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_twice() {
        let mut store = MemoryStore::new();
        let asha = registration("AAAAAA", Role::Producer);
        store.create(asha.clone()).await.unwrap();

        let deleted = store.delete(&asha.code).await.expect("no errors");
        assert_eq!(deleted, asha);
        assert_matches!(
            store.delete(&asha.code).await,
            Err(StoreError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn update_round_trip() {
        let mut store = MemoryStore::new();
        let asha = registration("AAAAAA", Role::Producer);
        store.create(asha.clone()).await.unwrap();

        let mut amendment = amendment_from(&asha);
        amendment.quantity = Some("75".into());
        amendment.address = "Plot 12".into();
        store.update(&asha.code, amendment.clone()).await.unwrap();

        let found = store.find_by_code(&asha.code).await.unwrap().unwrap();
        assert_eq!(found.code, asha.code);
        assert_eq!(found.quantity, amendment.quantity);
        assert_eq!(found.address, amendment.address);
        assert_eq!(found.name, asha.name);
    }

    #[tokio::test]
    async fn snapshot_and_restore() {
        let mut store = MemoryStore::new();
        store.create(registration("AAAAAA", Role::Producer)).await.unwrap();
        store.create(registration("BBBBBB", Role::Volunteer)).await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        store
            .delete(&"AAAAAA".parse().unwrap())
            .await
            .expect("no errors");
        store.create(registration("CCCCCC", Role::Buyer)).await.unwrap();

        store.restore(snapshot.clone()).await.unwrap();
        assert_eq!(store.snapshot().await.unwrap(), snapshot);
        assert_eq!(store.read_store().registrations()[0].code.as_str(), "AAAAAA");
    }
}
