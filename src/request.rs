//! Validated build request
//!
//! Every field is checked once at the boundary so the pipeline stages can
//! assume well-formed input.

use crate::error::{ShipyardError, ShipyardResult};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Token used to authenticate against the source repository
pub struct Credential(SecretString);

impl Credential {
    /// Username sent alongside the token for HTTP basic auth
    pub const USERNAME: &'static str = "token";

    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Borrow the secret for the transport layer
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Inputs for a single build, immutable once constructed
#[derive(Debug, Clone)]
pub struct BuildRequest {
    push_location: String,
    source_location: String,
    source_ref: String,
    credential: Credential,
}

impl BuildRequest {
    /// Validate and assemble a request
    pub fn new(
        push_location: impl Into<String>,
        source_location: impl Into<String>,
        source_ref: impl Into<String>,
        credential: Credential,
    ) -> ShipyardResult<Self> {
        let push_location = push_location.into();
        let source_location = source_location.into();
        let source_ref = source_ref.into();

        validate_push_location(&push_location)?;

        if source_location.trim().is_empty() {
            return Err(ShipyardError::configuration(
                "source location",
                "must not be empty",
            ));
        }

        if source_ref.is_empty() {
            return Err(ShipyardError::configuration("source ref", "must not be empty"));
        }
        if !git2::Remote::is_valid_name(&source_ref) {
            return Err(ShipyardError::configuration(
                "source ref",
                format!("'{}' is not a valid remote name", source_ref),
            ));
        }

        if credential.expose().is_empty() {
            return Err(ShipyardError::configuration("credential", "must not be empty"));
        }

        Ok(Self {
            push_location,
            source_location,
            source_ref,
            credential,
        })
    }

    /// Image reference the build is pushed under (before the commit suffix)
    pub fn push_location(&self) -> &str {
        &self.push_location
    }

    /// Repository URL or path to clone
    pub fn source_location(&self) -> &str {
        &self.source_location
    }

    /// Remote name bound during clone
    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

fn validate_push_location(push_location: &str) -> ShipyardResult<()> {
    if push_location.is_empty() {
        return Err(ShipyardError::configuration(
            "push location",
            "must not be empty",
        ));
    }
    if let Some(c) = push_location
        .chars()
        .find(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ShipyardError::configuration(
            "push location",
            format!("contains illegal character {:?}", c),
        ));
    }
    Ok(())
}
