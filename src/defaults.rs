// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default values used for bulletin board configuration.

/// Country context for phone numbers entered without an international prefix.
pub const DEFAULT_REGION: &str = "IN";

/// Number of characters in a possession code.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Deep-link base of the messaging channel, the canonical phone number is appended as a path
/// segment.
pub const DEFAULT_CHANNEL_URL: &str = "whatsapp://send";

/// Number of undo steps kept per session.
pub const DEFAULT_HISTORY_LIMIT: usize = 32;

/// How often a colliding possession code is resampled before giving up.
pub const DEFAULT_MAX_CODE_ATTEMPTS: usize = 16;
