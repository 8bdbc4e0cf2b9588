// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registration records and the drafts they are built from.
//!
//! A [`Registration`] is what the bulletin board stores. Its role-specific payload lives in a
//! [`Listing`], a tagged union where only the producer variant carries bank details. Other roles
//! can not hold bank details at all, no matter how the record was built or loaded.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::code::PossessionCode;
use crate::phone::CanonicalPhone;

/// Kind of participant a registration belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Producer,
    Buyer,
    Volunteer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Producer, Role::Buyer, Role::Volunteer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Buyer => "buyer",
            Role::Volunteer => "volunteer",
        }
    }

    /// Human-readable label of the role-specific detail field.
    pub fn detail_label(&self) -> &'static str {
        match self {
            Role::Producer => "crop",
            Role::Buyer => "requirement",
            Role::Volunteer => "service",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "producer" | "farmer" => Ok(Role::Producer),
            "buyer" => Ok(Role::Buyer),
            "volunteer" | "sponsor" => Ok(Role::Volunteer),
            _ => Err(RoleError::Unknown(value.to_owned())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("unknown role \"{0}\", expected producer, buyer or volunteer")]
    Unknown(String),
}

/// Role-specific payload of a registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Listing {
    Producer { crop: String, bank_details: String },
    Buyer { requirement: String },
    Volunteer { service: String },
}

impl Listing {
    /// Build the listing for `role`.
    ///
    /// Bank details are only kept for producers, for every other role they are discarded.
    pub fn new(role: Role, detail: impl Into<String>, bank_details: Option<String>) -> Self {
        let detail = detail.into();
        match role {
            Role::Producer => Listing::Producer {
                crop: detail,
                bank_details: bank_details.unwrap_or_default(),
            },
            Role::Buyer => Listing::Buyer {
                requirement: detail,
            },
            Role::Volunteer => Listing::Volunteer { service: detail },
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Listing::Producer { .. } => Role::Producer,
            Listing::Buyer { .. } => Role::Buyer,
            Listing::Volunteer { .. } => Role::Volunteer,
        }
    }

    /// The single free-text payload: crop, requirement or offered service.
    pub fn detail(&self) -> &str {
        match self {
            Listing::Producer { crop, .. } => crop,
            Listing::Buyer { requirement } => requirement,
            Listing::Volunteer { service } => service,
        }
    }

    /// Bank details, `None` for every role except producers.
    pub fn bank_details(&self) -> Option<&str> {
        match self {
            Listing::Producer { bank_details, .. } => Some(bank_details),
            _ => None,
        }
    }
}

/// A confirmed, persisted entry on the bulletin board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub code: PossessionCode,
    pub name: String,
    pub listing: Listing,
    pub quantity: Option<String>,
    pub address: String,
    pub contact: CanonicalPhone,
}

impl Registration {
    pub fn role(&self) -> Role {
        self.listing.role()
    }

    /// Replace every mutable field with the ones from `amendment`, keeping the possession code.
    pub fn amend(&mut self, amendment: Amendment) {
        self.name = amendment.name;
        self.listing = amendment.listing;
        self.quantity = amendment.quantity;
        self.address = amendment.address;
        self.contact = amendment.contact;
    }
}

/// Full set of mutable fields of a registration, applied as one atomic update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Amendment {
    pub name: String,
    pub listing: Listing,
    pub quantity: Option<String>,
    pub address: String,
    pub contact: CanonicalPhone,
}

/// Required form fields, used to name what is missing in a rejected draft.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Role,
    Name,
    Detail,
    Address,
    Contact,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Role => "role",
            Field::Name => "name",
            Field::Detail => "detail",
            Field::Address => "address",
            Field::Contact => "contact",
        };
        write!(f, "{name}")
    }
}

/// Raw form input as handed over by the form-rendering front-end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub role: Option<Role>,
    pub name: String,
    pub detail: String,
    pub quantity: String,
    pub address: String,
    pub contact: String,
    pub bank_details: Option<String>,
}

impl Draft {
    pub fn new(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }

    /// Check that every required field is present.
    ///
    /// Fields are checked in form order, the first empty one is reported.
    pub(crate) fn require(&self) -> Result<ValidatedDraft, Field> {
        let role = self.role.ok_or(Field::Role)?;
        let name = required(&self.name, Field::Name)?;
        let detail = required(&self.detail, Field::Detail)?;
        let address = required(&self.address, Field::Address)?;
        let contact = required(&self.contact, Field::Contact)?;

        let quantity = Some(self.quantity.trim())
            .filter(|quantity| !quantity.is_empty())
            .map(str::to_owned);
        let bank_details = self
            .bank_details
            .as_deref()
            .map(str::trim)
            .filter(|bank_details| !bank_details.is_empty())
            .map(str::to_owned);

        Ok(ValidatedDraft {
            name,
            listing: Listing::new(role, detail, bank_details),
            quantity,
            address,
            raw_contact: contact,
        })
    }
}

fn required(value: &str, field: Field) -> Result<String, Field> {
    let value = value.trim();
    if value.is_empty() {
        return Err(field);
    }
    Ok(value.to_owned())
}

/// Draft with all required fields present, the contact not yet normalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ValidatedDraft {
    pub name: String,
    pub listing: Listing,
    pub quantity: Option<String>,
    pub address: String,
    pub raw_contact: String,
}

impl ValidatedDraft {
    pub fn into_amendment(self, contact: CanonicalPhone) -> Amendment {
        Amendment {
            name: self.name,
            listing: self.listing,
            quantity: self.quantity,
            address: self.address,
            contact,
        }
    }
}
