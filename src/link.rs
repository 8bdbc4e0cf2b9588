// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deep-links into the messaging channel.
//!
//! A confirmation link opens the messaging app with a pre-filled, role-specific message which
//! contains the possession code. The bulletin board never dispatches anything itself and has no
//! way of observing whether the message was actually sent: the following "I sent it" step is a
//! manual trust boundary, not a proof of delivery.
use std::fmt;

use crate::code::PossessionCode;
use crate::defaults::DEFAULT_CHANNEL_URL;
use crate::phone::CanonicalPhone;
use crate::registration::Role;

/// Pre-filled message link handed to the front-end for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationLink {
    url: String,
    message: String,
}

impl ConfirmationLink {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Plain text of the pre-filled message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConfirmationLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Builds `{channel_url}/{phone}?text={message}` links.
#[derive(Clone, Debug)]
pub struct ConfirmationLinkBuilder {
    channel_url: String,
}

impl ConfirmationLinkBuilder {
    pub fn new(channel_url: impl Into<String>) -> Self {
        let channel_url: String = channel_url.into();
        Self {
            channel_url: channel_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Link confirming a new registration.
    pub fn build(
        &self,
        phone: &CanonicalPhone,
        role: Role,
        name: &str,
        code: &PossessionCode,
    ) -> ConfirmationLink {
        let message = match role {
            Role::Producer => format!(
                "Hello AgriLink! I am {name} and I want to list my produce. \
                 My edit code is {code}."
            ),
            Role::Buyer => format!(
                "Hello AgriLink! I am {name} and I am looking to buy produce. \
                 My edit code is {code}."
            ),
            Role::Volunteer => format!(
                "Hello AgriLink! I am {name} and I would like to volunteer my help. \
                 My edit code is {code}."
            ),
        };
        self.with_message(phone, message)
    }

    /// Link confirming that an existing registration moves to a new contact number.
    pub fn build_reconfirmation(
        &self,
        phone: &CanonicalPhone,
        role: Role,
        name: &str,
        code: &PossessionCode,
    ) -> ConfirmationLink {
        let message = format!(
            "Hello AgriLink! I am {name} and I changed the contact number of my {role} listing. \
             My edit code is {code}."
        );
        self.with_message(phone, message)
    }

    /// Link opening a conversation with `phone` without any pre-filled text.
    pub fn contact_link(&self, phone: &CanonicalPhone) -> String {
        format!("{}/{}", self.channel_url, phone)
    }

    fn with_message(&self, phone: &CanonicalPhone, message: String) -> ConfirmationLink {
        let url = format!(
            "{}/{}?text={}",
            self.channel_url,
            phone,
            urlencoding::encode(&message)
        );
        ConfirmationLink { url, message }
    }
}

impl Default for ConfirmationLinkBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_URL)
    }
}

#[cfg(test)]
mod tests {
    use crate::code::PossessionCode;
    use crate::phone::CanonicalPhone;
    use crate::registration::Role;

    use super::ConfirmationLinkBuilder;

    fn phone() -> CanonicalPhone {
        "919876543210".parse().unwrap()
    }

    fn code() -> PossessionCode {
        "K3F9QZ".parse().unwrap()
    }

    #[test]
    fn link_format() {
        let builder = ConfirmationLinkBuilder::new("whatsapp://send/");
        let link = builder.build(&phone(), Role::Producer, "Asha", &code());

        assert!(link.url().starts_with("whatsapp://send/919876543210?text="));
        assert!(link.url().contains("K3F9QZ"));
        assert!(!link.url().contains(' '));
        assert!(link.url().contains("Hello%20AgriLink%21"));
        assert!(link.message().contains("Asha"));
    }

    #[test]
    fn wording_differs_per_role() {
        let builder = ConfirmationLinkBuilder::default();
        let messages: Vec<String> = Role::ALL
            .iter()
            .map(|role| {
                builder
                    .build(&phone(), *role, "Asha", &code())
                    .message()
                    .to_owned()
            })
            .collect();

        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert_ne!(messages[0], messages[2]);
        assert!(messages.iter().all(|message| message.contains("K3F9QZ")));
    }

    #[test]
    fn reconfirmation_keeps_code() {
        let builder = ConfirmationLinkBuilder::default();
        let link = builder.build_reconfirmation(&phone(), Role::Buyer, "Asha", &code());
        assert!(link.message().contains("K3F9QZ"));
        assert!(link.message().contains("buyer listing"));
    }

    #[test]
    fn contact_link_has_no_text() {
        let builder = ConfirmationLinkBuilder::default();
        assert_eq!(
            builder.contact_link(&phone()),
            "whatsapp://send/919876543210"
        );
    }
}
