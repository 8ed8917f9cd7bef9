//! Opaque submission keys.
//!
//! A key wraps the store identifier of a pending submission and is rendered as URL-safe
//! base64 so the moderation UI can round-trip it through forms without learning anything
//! about the underlying identifier.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionKey(Uuid);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyDecodeError {
    #[error("submission key is empty")]
    Empty,
    #[error("submission key is not valid base64")]
    Encoding,
    #[error("submission key has invalid length {0}")]
    Length(usize),
}

impl SubmissionKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_bytes())
    }

    pub fn decode(raw: &str) -> Result<Self, KeyDecodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(KeyDecodeError::Empty);
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(trimmed)
            .map_err(|_| KeyDecodeError::Encoding)?;
        let id = Uuid::from_slice(&bytes).map_err(|_| KeyDecodeError::Length(bytes.len()))?;
        Ok(Self(id))
    }
}

impl Default for SubmissionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
