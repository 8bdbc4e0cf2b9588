// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone number normalization for the messaging channel.
//!
//! The messaging channel addresses people by their full international number written without
//! punctuation and without a leading plus sign, for example `919876543210`. Everything entering
//! the bulletin board as a contact passes through [`PhoneValidator::normalize`] first; a rejected
//! number is an ordinary outcome the caller branches on.
use std::fmt;
use std::str::FromStr;

use phonenumber::country;
use phonenumber::{Mode, PhoneNumber};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Country used to interpret numbers written without an international prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region(country::Id);

impl Region {
    pub fn id(&self) -> country::Id {
        self.0
    }
}

impl FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let code = value.trim().to_ascii_uppercase();
        code.parse::<country::Id>()
            .map(Region)
            .map_err(|_| UnknownRegion(value.to_owned()))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown region code \"{0}\"")]
pub struct UnknownRegion(pub String);

/// Phone number in canonical dialable form: country code followed by the national number, digits
/// only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalPhone(String);

impl CanonicalPhone {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_number(number: &PhoneNumber) -> Self {
        let e164 = number.format().mode(Mode::E164).to_string();
        Self(e164.trim_start_matches('+').to_owned())
    }
}

impl fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CanonicalPhone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Re-validates a number which is expected to already be in canonical form, for example when
/// loading persisted registrations.
impl FromStr for CanonicalPhone {
    type Err = PhoneRejection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(PhoneRejection::NotCanonical(value.to_owned()));
        }

        let canonical = normalize_number(&format!("+{value}"), None)?;
        if canonical.0 != value {
            return Err(PhoneRejection::NotCanonical(value.to_owned()));
        }

        Ok(canonical)
    }
}

impl TryFrom<String> for CanonicalPhone {
    type Error = PhoneRejection;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CanonicalPhone> for String {
    fn from(value: CanonicalPhone) -> Self {
        value.0
    }
}

/// Reasons a phone number is not usable by the messaging channel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneRejection {
    /// Nothing but whitespace was entered.
    #[error("phone number is empty")]
    Empty,

    /// Input could not be read as a phone number at all, for example because of letters or an
    /// unknown country code.
    #[error("phone number \"{0}\" could not be parsed: {1}")]
    Malformed(String, String),

    /// Number parsed but is not a valid, dialable number for its region.
    #[error("phone number \"{0}\" is not a valid number")]
    Invalid(String),

    /// Stored number is not in canonical form.
    #[error("\"{0}\" is not a canonical phone number")]
    NotCanonical(String),
}

/// Turns raw user input into canonical phone numbers.
#[derive(Clone, Copy, Debug)]
pub struct PhoneValidator {
    region: Region,
}

impl PhoneValidator {
    pub fn new(region: Region) -> Self {
        Self { region }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Normalize `raw`, interpreting numbers without an international prefix as belonging to the
    /// configured default region.
    pub fn normalize(&self, raw: &str) -> Result<CanonicalPhone, PhoneRejection> {
        normalize(raw, self.region)
    }
}

/// Normalize `raw` into canonical form, falling back to `default_region` for numbers written
/// without a country code.
pub fn normalize(raw: &str, default_region: Region) -> Result<CanonicalPhone, PhoneRejection> {
    normalize_number(raw, Some(default_region.id()))
}

fn normalize_number(
    raw: &str,
    region: Option<country::Id>,
) -> Result<CanonicalPhone, PhoneRejection> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PhoneRejection::Empty);
    }

    let number = phonenumber::parse(region, raw)
        .map_err(|err| PhoneRejection::Malformed(raw.to_owned(), err.to_string()))?;

    if !number.is_valid() {
        return Err(PhoneRejection::Invalid(raw.to_owned()));
    }

    Ok(CanonicalPhone::from_number(&number))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::{CanonicalPhone, PhoneRejection, PhoneValidator, Region, normalize};

    fn india() -> Region {
        "IN".parse().unwrap()
    }

    #[test]
    fn national_number_uses_default_region() {
        let phone = normalize("9876543210", india()).unwrap();
        assert_eq!(phone.as_str(), "919876543210");
    }

    #[test]
    fn punctuation_and_prefix_are_stripped() {
        let validator = PhoneValidator::new(india());
        let phone = validator.normalize(" +91 98765-43210 ").unwrap();
        assert_eq!(phone.as_str(), "919876543210");
    }

    #[test]
    fn international_number_ignores_default_region() {
        let phone = normalize("+1 650-253-0000", india()).unwrap();
        assert_eq!(phone.as_str(), "16502530000");
    }

    #[test]
    fn short_numbers_are_rejected() {
        assert_matches!(
            normalize("123", india()),
            Err(PhoneRejection::Invalid(_) | PhoneRejection::Malformed(_, _))
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(normalize("   ", india()), Err(PhoneRejection::Empty));
        assert_matches!(
            normalize("call me maybe", india()),
            Err(PhoneRejection::Invalid(_) | PhoneRejection::Malformed(_, _))
        );
    }

    #[test]
    fn canonical_form_is_revalidated() {
        let phone: CanonicalPhone = "919876543210".parse().unwrap();
        assert_eq!(phone.as_str(), "919876543210");

        assert_matches!(
            "+919876543210".parse::<CanonicalPhone>(),
            Err(PhoneRejection::NotCanonical(_))
        );
        assert_matches!("91123".parse::<CanonicalPhone>(), Err(_));
    }

    #[test]
    fn region_codes() {
        assert_eq!(india().to_string(), "IN");
        assert!("in".parse::<Region>().is_ok());
        assert!("XX".parse::<Region>().is_err());
    }
}
