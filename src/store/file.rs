// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed persistence for registrations.
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::code::PossessionCode;
use crate::listing::ListingEntry;
use crate::phone::CanonicalPhone;
use crate::registration::{Amendment, Listing, Registration, Role};
use crate::store::{RegistrationStore, Snapshot, StoreError, StoreState};

/// Persisted form of a registration, one entry of the store file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRow {
    pub name: String,
    pub role: String,
    pub detail: String,
    #[serde(default)]
    pub quantity: String,
    pub address: String,
    pub contact: String,
    #[serde(default)]
    pub bank_details: String,
    pub possession_code: String,
}

impl From<&Registration> for RegistrationRow {
    fn from(registration: &Registration) -> Self {
        Self {
            name: registration.name.clone(),
            role: registration.role().to_string(),
            detail: registration.listing.detail().to_owned(),
            quantity: registration.quantity.clone().unwrap_or_default(),
            address: registration.address.clone(),
            contact: registration.contact.to_string(),
            bank_details: registration
                .listing
                .bank_details()
                .unwrap_or_default()
                .to_owned(),
            possession_code: registration.code.to_string(),
        }
    }
}

impl RegistrationRow {
    /// Validate a stored row.
    ///
    /// Bank details on rows of roles other than producer are dropped, they are never carried into
    /// a registration.
    pub fn into_registration(self, index: usize) -> Result<Registration, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt { index, reason };

        let role: Role = self.role.parse().map_err(|err| corrupt(format!("{err}")))?;
        let code: PossessionCode = self
            .possession_code
            .parse()
            .map_err(|err| corrupt(format!("{err}")))?;
        let contact: CanonicalPhone = self
            .contact
            .parse()
            .map_err(|err| corrupt(format!("{err}")))?;

        if self.name.trim().is_empty() {
            return Err(corrupt("name is empty".into()));
        }
        if self.detail.trim().is_empty() {
            return Err(corrupt("detail is empty".into()));
        }

        if role != Role::Producer && !self.bank_details.is_empty() {
            warn!(%code, "dropping bank details stored for {role} registration");
        }

        let bank_details = Some(self.bank_details).filter(|value| !value.is_empty());
        let quantity = Some(self.quantity).filter(|value| !value.is_empty());

        Ok(Registration {
            code,
            name: self.name,
            listing: Listing::new(role, self.detail, bank_details),
            quantity,
            address: self.address,
            contact,
        })
    }
}

/// Registration store persisted as one JSON file.
///
/// The complete state is written on every mutation: first into a temporary file next to the
/// store file, which is synced and then renamed over it. A crash in the middle of a write leaves
/// either the old or the new file behind, never a partial one. The in-memory state only advances
/// after the write succeeded.
///
/// All mutations are serialized by the store's writer lock, clones share the same file and lock.
/// Stores opened separately on the same path do not share a lock: the last write wins, but the
/// file always holds the complete state of one of them.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: Arc<RwLock<StoreState>>,
}

impl FileStore {
    /// Open the store at `path`, a missing file is an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => decode(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file does not exist yet");
                StoreState::new()
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            path = %path.display(),
            registrations = state.len(),
            "opened registration store"
        );

        Ok(Self {
            path,
            inner: Arc::new(RwLock::new(state)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `mutation` to a copy of the current state, persist the copy and only then make it
    /// the current state.
    async fn mutate<T>(
        &self,
        mutation: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.inner.write().await;
        let mut next = state.clone();
        let result = mutation(&mut next)?;

        if let Err(err) = write_atomic(&self.path, encode(&next)?).await {
            warn!(path = %self.path.display(), "could not persist registrations: {err}");
            return Err(err);
        }

        *state = next;
        Ok(result)
    }
}

impl RegistrationStore for FileStore {
    async fn create(&mut self, registration: Registration) -> Result<(), StoreError> {
        let code = registration.code.clone();
        self.mutate(|state| state.create(registration)).await?;
        debug!(%code, "created registration");
        Ok(())
    }

    async fn find_by_code(
        &self,
        code: &PossessionCode,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self.inner.read().await.find_by_code(code).cloned())
    }

    async fn update(
        &mut self,
        code: &PossessionCode,
        amendment: Amendment,
    ) -> Result<Registration, StoreError> {
        let registration = self.mutate(|state| state.update(code, amendment)).await?;
        debug!(%code, "updated registration");
        Ok(registration)
    }

    async fn delete(&mut self, code: &PossessionCode) -> Result<Registration, StoreError> {
        let registration = self.mutate(|state| state.delete(code)).await?;
        debug!(%code, "deleted registration");
        Ok(registration)
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<ListingEntry>, StoreError> {
        Ok(self.inner.read().await.list_by_role(role))
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.inner.read().await.snapshot())
    }

    async fn restore(&mut self, snapshot: Snapshot) -> Result<(), StoreError> {
        let len = snapshot.len();
        self.mutate(|state| {
            state.restore(snapshot);
            Ok(())
        })
        .await?;
        debug!(len, "restored store snapshot");
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.len())
    }

    async fn contains_code(&self, code: &PossessionCode) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.contains_code(code))
    }
}

fn encode(state: &StoreState) -> Result<Vec<u8>, StoreError> {
    let rows: Vec<RegistrationRow> = state
        .registrations()
        .iter()
        .map(RegistrationRow::from)
        .collect();
    Ok(serde_json::to_vec_pretty(&rows)?)
}

fn decode(bytes: &[u8]) -> Result<StoreState, StoreError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(StoreState::new());
    }

    let rows: Vec<RegistrationRow> = serde_json::from_slice(bytes)?;
    let registrations = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| row.into_registration(index))
        .collect::<Result<Vec<_>, _>>()?;

    StoreState::from_registrations(registrations)
}

/// Write `bytes` to a temporary file of its own next to `path`, sync it and rename it over `path`.
///
/// Every write gets a uniquely named temporary file, so concurrent writers to the same path never
/// share one. A temporary file which could not be renamed is removed again.
async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent).await?;

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("registrations");
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".tmp")
            .tempfile_in(&parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;

        tmp.persist(&path).map_err(|err| {
            debug!(path = %err.file.path().display(), "removing temporary store file");
            err.error
        })?;

        if let Err(err) = std::fs::File::open(&parent).and_then(|dir| dir.sync_all()) {
            debug!(path = %parent.display(), "could not sync store directory: {err}");
        }
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(std::io::Error::other)??;

    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::registration::{Listing, Role};
    use crate::store::{RegistrationStore, StoreError};
    use crate::test_utils::{amendment_from, registration};

    use super::{FileStore, RegistrationRow};

    #[tokio::test]
    async fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("registrations.json"))
            .await
            .expect("no errors");
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn writes_through_on_every_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registrations.json");

        let mut store = FileStore::open(&path).await.unwrap();
        let asha = registration("AAAAAA", Role::Producer);
        let ravi = registration("BBBBBB", Role::Volunteer);
        store.create(asha.clone()).await.unwrap();
        store.create(ravi.clone()).await.unwrap();

        let mut amendment = amendment_from(&ravi);
        amendment.listing = Listing::new(Role::Volunteer, "Harvest help", None);
        store.update(&ravi.code, amendment).await.unwrap();

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);
        let found = reopened.find_by_code(&ravi.code).await.unwrap().unwrap();
        assert_eq!(found.listing.detail(), "Harvest help");
        assert_eq!(
            reopened.snapshot().await.unwrap(),
            store.snapshot().await.unwrap()
        );

        store.delete(&asha.code).await.unwrap();
        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_write_keeps_last_good_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registrations.json");
        let mut store = FileStore::open(&path).await.unwrap();
        store.create(registration("AAAAAA", Role::Buyer)).await.unwrap();

        // Renaming onto a directory fails.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert_matches!(
            store.create(registration("BBBBBB", Role::Buyer)).await,
            Err(StoreError::Io(_))
        );
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(!store.contains_code(&"BBBBBB".parse().unwrap()).await.unwrap());

        // The temporary file of the failed write is gone.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn separately_opened_stores_never_corrupt_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registrations.json");

        let mut store_a = FileStore::open(&path).await.unwrap();
        let mut store_b = FileStore::open(&path).await.unwrap();

        for round in 0..25 {
            let (result_a, result_b) = tokio::join!(
                store_a.create(registration(&format!("A{round}"), Role::Producer)),
                store_b.create(registration(&format!("B{round}"), Role::Buyer)),
            );
            result_a.unwrap();
            result_b.unwrap();

            // Whichever write came last, the file holds one complete state.
            let reopened = FileStore::open(&path).await.unwrap();
            assert_eq!(reopened.len().await.unwrap(), round + 1);
        }

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "registrations.json")
            .collect();
        assert!(leftovers.is_empty(), "temporary files left: {leftovers:?}");
    }

    #[tokio::test]
    async fn stored_bank_details_never_leak() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registrations.json");

        let mut buyer = RegistrationRow::from(&registration("AAAAAA", Role::Buyer));
        buyer.bank_details = "IBAN DE00 1234".into();
        std::fs::write(&path, serde_json::to_vec(&vec![buyer]).unwrap()).unwrap();

        let store = FileStore::open(&path).await.unwrap();
        let entries = store.list_by_role(Role::Buyer).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].bank_details, None);
    }

    #[tokio::test]
    async fn invalid_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registrations.json");

        let mut row = RegistrationRow::from(&registration("AAAAAA", Role::Producer));
        row.contact = "123".into();
        std::fs::write(&path, serde_json::to_vec(&vec![row]).unwrap()).unwrap();
        assert_matches!(
            FileStore::open(&path).await,
            Err(StoreError::Corrupt { index: 0, .. })
        );

        let row = RegistrationRow::from(&registration("AAAAAA", Role::Producer));
        std::fs::write(&path, serde_json::to_vec(&vec![row.clone(), row]).unwrap()).unwrap();
        assert_matches!(
            FileStore::open(&path).await,
            Err(StoreError::DuplicateCode(_))
        );
    }

    #[test]
    fn row_columns() {
        let mut asha = registration("K3F9QZ", Role::Producer);
        asha.listing = Listing::new(Role::Producer, "Wheat", None);
        let json = serde_json::to_value(RegistrationRow::from(&asha)).unwrap();

        assert_eq!(json["role"], "producer");
        assert_eq!(json["detail"], "Wheat");
        assert_eq!(json["bankDetails"], "");
        assert_eq!(json["possessionCode"], "K3F9QZ");
        assert_eq!(json["contact"], "919876543210");
    }
}
