// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only projections of registrations for display.
//!
//! Listings never carry the possession code. Bank details only appear in producer listings: the
//! field is absent from the projection of every other role, not merely blank.
use serde::Serialize;

use crate::phone::CanonicalPhone;
use crate::registration::{Registration, Role};

/// One row of a role-partitioned listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub role: Role,
    pub name: String,
    pub detail: String,
    pub quantity: Option<String>,
    pub address: String,
    pub contact: CanonicalPhone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_details: Option<String>,
}

impl From<&Registration> for ListingEntry {
    fn from(registration: &Registration) -> Self {
        Self {
            role: registration.role(),
            name: registration.name.clone(),
            detail: registration.listing.detail().to_owned(),
            quantity: registration.quantity.clone(),
            address: registration.address.clone(),
            contact: registration.contact.clone(),
            bank_details: registration.listing.bank_details().map(str::to_owned),
        }
    }
}

/// Total quantity offered for one crop.
#[derive(Clone, Debug, PartialEq)]
pub struct CropAvailability {
    /// Crop name as spelled in its first entry.
    pub crop: String,

    /// Sum of all numeric quantities.
    pub total: f64,

    /// Number of producer listings for this crop.
    pub listings: usize,

    /// Listings without a numeric quantity, these are not part of `total`.
    pub unquantified: usize,
}

/// Sum up producer quantities per crop.
///
/// Crops are grouped case-insensitively and reported in the order of `entries`. Entries of other
/// roles are ignored.
pub fn availability(entries: &[ListingEntry]) -> Vec<CropAvailability> {
    let mut result: Vec<CropAvailability> = Vec::new();

    for entry in entries.iter().filter(|entry| entry.role == Role::Producer) {
        let quantity = entry
            .quantity
            .as_deref()
            .and_then(|quantity| quantity.trim().parse::<f64>().ok())
            .filter(|quantity| quantity.is_finite());

        let index = match result
            .iter()
            .position(|crop| crop.crop.eq_ignore_ascii_case(entry.detail.trim()))
        {
            Some(index) => index,
            None => {
                result.push(CropAvailability {
                    crop: entry.detail.trim().to_owned(),
                    total: 0.0,
                    listings: 0,
                    unquantified: 0,
                });
                result.len() - 1
            }
        };

        let crop = &mut result[index];
        crop.listings += 1;
        match quantity {
            Some(quantity) => crop.total += quantity,
            None => crop.unquantified += 1,
        }
    }

    result
}
