// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::code::PossessionCode;
use crate::listing::ListingEntry;
use crate::registration::{Amendment, Registration, Role};
use crate::store::StoreError;

/// Registrations in insertion order, oldest first.
///
/// Shared by all store implementations. Every operation either applies completely or leaves the
/// state untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreState {
    registrations: Vec<Registration>,
}

/// Whole-store copy used for undo and redo.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot(StoreState);

impl Snapshot {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn registrations(&self) -> &[Registration] {
        self.0.registrations()
    }
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from registrations in insertion order.
    ///
    /// Fails on the first possession code which appears twice.
    pub fn from_registrations(registrations: Vec<Registration>) -> Result<Self, StoreError> {
        let mut state = Self::new();
        for registration in registrations {
            state.create(registration)?;
        }
        Ok(state)
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn contains_code(&self, code: &PossessionCode) -> bool {
        self.position(code).is_some()
    }

    pub fn find_by_code(&self, code: &PossessionCode) -> Option<&Registration> {
        self.registrations
            .iter()
            .find(|registration| &registration.code == code)
    }

    pub fn create(&mut self, registration: Registration) -> Result<(), StoreError> {
        if self.contains_code(&registration.code) {
            return Err(StoreError::DuplicateCode(registration.code));
        }
        self.registrations.push(registration);
        Ok(())
    }

    pub fn update(
        &mut self,
        code: &PossessionCode,
        amendment: Amendment,
    ) -> Result<Registration, StoreError> {
        let index = self
            .position(code)
            .ok_or_else(|| StoreError::NotFound(code.to_owned()))?;
        let registration = &mut self.registrations[index];
        registration.amend(amendment);
        Ok(registration.clone())
    }

    pub fn delete(&mut self, code: &PossessionCode) -> Result<Registration, StoreError> {
        let index = self
            .position(code)
            .ok_or_else(|| StoreError::NotFound(code.to_owned()))?;
        Ok(self.registrations.remove(index))
    }

    /// Projection of all registrations of `role`, most recently created first.
    pub fn list_by_role(&self, role: Role) -> Vec<ListingEntry> {
        self.registrations
            .iter()
            .rev()
            .filter(|registration| registration.role() == role)
            .map(ListingEntry::from)
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.clone())
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        *self = snapshot.0;
    }

    fn position(&self, code: &PossessionCode) -> Option<usize> {
        self.registrations
            .iter()
            .position(|registration| &registration.code == code)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::registration::{Listing, Role};
    use crate::store::StoreError;
    use crate::test_utils::{amendment_from, registration};

    use super::StoreState;

    #[test]
    fn create_rejects_duplicate_codes() {
        let mut state = StoreState::new();
        state.create(registration("AAAAAA", Role::Producer)).unwrap();

        assert_matches!(
            state.create(registration("AAAAAA", Role::Buyer)),
            Err(StoreError::DuplicateCode(code)) if code.as_str() == "AAAAAA"
        );
        assert_eq!(state.len(), 1);
        assert_eq!(state.registrations()[0].role(), Role::Producer);
    }

    #[test]
    fn update_keeps_code_and_position() {
        let mut state = StoreState::new();
        state.create(registration("AAAAAA", Role::Producer)).unwrap();
        state.create(registration("BBBBBB", Role::Producer)).unwrap();

        let original = state.registrations()[0].clone();
        let mut amendment = amendment_from(&original);
        amendment.name = "Asha Devi".into();
        amendment.listing = Listing::new(Role::Buyer, "Rice seedlings", Some("IBAN".into()));

        let updated = state.update(&original.code, amendment).unwrap();
        assert_eq!(updated.code, original.code);
        assert_eq!(updated.name, "Asha Devi");
        assert_eq!(updated.listing.bank_details(), None);
        assert_eq!(state.registrations()[0], updated);
    }

    #[test]
    fn missing_codes() {
        let mut state = StoreState::new();
        let other = registration("CCCCCC", Role::Volunteer);

        assert_matches!(
            state.update(&other.code, amendment_from(&other)),
            Err(StoreError::NotFound(_))
        );
        assert_matches!(state.delete(&other.code), Err(StoreError::NotFound(_)));
        assert!(state.is_empty());
    }

    #[test]
    fn role_partitions_newest_first() {
        let mut state = StoreState::new();
        state.create(registration("AAAAAA", Role::Producer)).unwrap();
        state.create(registration("BBBBBB", Role::Buyer)).unwrap();
        state.create(registration("CCCCCC", Role::Producer)).unwrap();

        let producers = state.list_by_role(Role::Producer);
        let names: Vec<&str> = producers.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["Member CCCCCC", "Member AAAAAA"]);

        let buyers = state.list_by_role(Role::Buyer);
        assert_eq!(buyers.len(), 1);
        assert!(state.list_by_role(Role::Volunteer).is_empty());
    }

    #[test]
    fn snapshot_restores_order() {
        let mut state = StoreState::new();
        state.create(registration("AAAAAA", Role::Producer)).unwrap();
        state.create(registration("BBBBBB", Role::Buyer)).unwrap();

        let snapshot = state.snapshot();
        state.delete(&snapshot.registrations()[0].code).unwrap();
        state.create(registration("CCCCCC", Role::Volunteer)).unwrap();
        assert_ne!(state.snapshot(), snapshot);

        state.restore(snapshot.clone());
        assert_eq!(state.registrations(), snapshot.registrations());
    }
}
