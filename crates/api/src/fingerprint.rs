//! Request identity.
//!
//! A [Fingerprint] is derived only from what the caller asks for, never from
//! anything local to the execution context, so every context of the same
//! application computes the same fingerprint for the same logical request.
//! That is what lets contexts coordinate without a server.

use crate::{CacheError, CacheResult};
use base64::prelude::*;
use sha2::{Digest, Sha256};

/// Deterministic digest identifying a logical request.
///
/// Rendered as the url-safe, unpadded base64 encoding of a SHA-256 digest.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Calculate the fingerprint of a request.
    ///
    /// The digest input is the compact JSON array
    /// `[locator, payload, disambiguator]`, with `null` for an absent
    /// payload.
    pub fn calculate(
        locator: &str,
        payload: Option<&serde_json::Value>,
        disambiguator: &str,
    ) -> CacheResult<Self> {
        let input = serde_json::to_vec(&(locator, payload, disambiguator))
            .map_err(|e| {
                CacheError::serialization_src("request payload", e)
            })?;

        let mut hasher = Sha256::new();
        hasher.update(&input);

        Ok(Self(BASE64_URL_SAFE_NO_PAD.encode(hasher.finalize())))
    }
}

impl std::ops::Deref for Fingerprint {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
