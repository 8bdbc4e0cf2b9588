// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures and deterministic code generators for tests.
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::code::{CodeError, CodeGenerator, PossessionCode};
use crate::registration::{Amendment, Draft, Listing, Registration, Role};

/// Install a log subscriber when `RUST_LOG` is set.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Hands out a scripted sequence of codes, repeating the last one once the script is used up.
#[derive(Debug)]
pub struct SequenceGenerator {
    codes: Mutex<VecDeque<PossessionCode>>,
}

impl SequenceGenerator {
    pub fn new(codes: &[&str]) -> Self {
        let codes = codes
            .iter()
            .map(|code| code.parse().expect("valid possession code"))
            .collect();
        Self {
            codes: Mutex::new(codes),
        }
    }
}

impl CodeGenerator for SequenceGenerator {
    fn generate(&self) -> Result<PossessionCode, CodeError> {
        let mut codes = self.codes.lock().map_err(|_| CodeError::LockPoisoned)?;
        let code = if codes.len() > 1 {
            codes.pop_front()
        } else {
            codes.front().cloned()
        };
        code.ok_or(CodeError::NotEnoughRandomness)
    }
}

/// Complete registration with a fixed, valid contact number.
pub fn registration(code: &str, role: Role) -> Registration {
    let detail = match role {
        Role::Producer => "Wheat",
        Role::Buyer => "Rice",
        Role::Volunteer => "Transport",
    };
    Registration {
        code: code.parse().expect("valid possession code"),
        name: format!("Member {code}"),
        listing: Listing::new(role, detail, None),
        quantity: Some("10".into()),
        address: "Village square".into(),
        contact: "919876543210".parse().expect("valid phone number"),
    }
}

/// Amendment leaving every field of `registration` as it is.
pub fn amendment_from(registration: &Registration) -> Amendment {
    Amendment {
        name: registration.name.clone(),
        listing: registration.listing.clone(),
        quantity: registration.quantity.clone(),
        address: registration.address.clone(),
        contact: registration.contact.clone(),
    }
}

/// Filled-in form of a producer in India.
pub fn asha() -> Draft {
    Draft {
        role: Some(Role::Producer),
        name: "Asha".into(),
        detail: "Wheat".into(),
        quantity: "50".into(),
        address: "X".into(),
        contact: "9876543210".into(),
        bank_details: Some("".into()),
    }
}

/// Filled-in form of a buyer in India.
pub fn buyer() -> Draft {
    Draft {
        role: Some(Role::Buyer),
        name: "Farid".into(),
        detail: "Basmati rice".into(),
        quantity: "2 tons".into(),
        address: "Market road 4".into(),
        contact: "+91 98765 43219".into(),
        bank_details: None,
    }
}
