// src/error.rs

use thiserror::Error;

/// The primary error type for the `veritas-oidc` library.
///
/// Every failure is terminal for the call that produced it; the library never
/// retries internally.
#[derive(Debug, Error)]
pub enum OidcError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Discovery document or static configuration is malformed or missing a
    /// required field. Fatal to the construction/discovery call.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The identity token is missing, its signature did not verify, or its
    /// claims failed validation. Fatal to the login call.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// An HTTP fetch failed; `step` names which one.
    #[error("HTTP request failed while {step}: {source}")]
    Transport {
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Converting a JWK into a verification key failed.
    #[error("Failed to convert JWK into a verification key: {0}")]
    KeyConversion(#[source] jsonwebtoken::errors::Error),

    #[error("Invalid JWK format: {0}")]
    InvalidKeyFormat(String),
}
