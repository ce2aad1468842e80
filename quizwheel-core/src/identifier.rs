//! Client-supplied player identifiers.
//!
//! Identifiers are opaque and unauthenticated. They are validated for shape at
//! the boundary and never logged verbatim.
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

use crate::error::{IdentifierIssue, WheelError};

/// Default upper bound on identifier length, in characters.
pub const DEFAULT_MAX_IDENTIFIER_LEN: usize = 128;

/// A validated identifier, stored byte-for-byte as the client sent it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Validate a raw string.
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentifier` for blank input and `InvalidIdentifier` when
    /// the value is too long, contains control characters, or is padded with
    /// whitespace. Padding is refused rather than stripped so that distinct
    /// strings never share a ledger entry.
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, WheelError> {
        if raw.trim().is_empty() {
            return Err(WheelError::MissingIdentifier);
        }
        if raw.chars().count() > max_len {
            return Err(IdentifierIssue::TooLong { max: max_len }.into());
        }
        if raw.chars().any(char::is_control) {
            return Err(IdentifierIssue::ControlCharacters.into());
        }
        if raw.trim() != raw {
            return Err(IdentifierIssue::SurroundingWhitespace.into());
        }
        Ok(Self(raw.to_string()))
    }

    /// Validate the `userIdentifier` field of a decoded request body.
    ///
    /// # Errors
    ///
    /// Absent, `null`, or non-string values are `MissingIdentifier`.
    pub fn from_json(value: Option<&Value>, max_len: usize) -> Result<Self, WheelError> {
        match value {
            Some(Value::String(raw)) => Self::parse(raw, max_len),
            _ => Err(WheelError::MissingIdentifier),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short stable digest used in log lines instead of the raw value.
    #[must_use]
    pub fn log_tag(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        digest.iter().take(4).fold(String::with_capacity(8), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
