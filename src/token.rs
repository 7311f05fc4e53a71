// src/token.rs

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

use crate::error::OidcError;

/// A read-only view of a decoded identity token: the header's algorithm plus
/// a flat map from claim name to claim value.
///
/// Constructed once from the raw compact serialization and never mutated.
/// Claim values are scalars or arrays of scalars (e.g. `aud`).
#[derive(Debug, Clone)]
pub struct TokenView {
    algorithm: Algorithm,
    claims: Map<String, Value>,
}

impl TokenView {
    /// Decodes the header and payload segments without verifying anything.
    pub fn decode(raw: &str) -> Result<Self, OidcError> {
        let header = decode_header(raw)
            .map_err(|e| OidcError::InvalidToken(format!("malformed token header: {e}")))?;

        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 3 {
            return Err(OidcError::InvalidToken(
                "expected JWT compact serialization".to_string(),
            ));
        }
        let payload_bytes = base64_url::decode(parts[1])
            .map_err(|e| OidcError::InvalidToken(format!("malformed token payload: {e}")))?;
        let claims: Map<String, Value> = serde_json::from_slice(&payload_bytes)
            .map_err(|e| OidcError::InvalidToken(format!("token payload is not a JSON object: {e}")))?;

        Ok(Self {
            algorithm: header.alg,
            claims,
        })
    }

    /// The signing algorithm declared in the token header.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Looks up a claim by name. Absent claims return `None`.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn has_claim(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }

    /// The full claim map.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

/// Verifies a raw token's signature against an ordered key set.
///
/// Keys are tried in configured order and the first one that verifies wins;
/// no claim is inspected at this layer. If no key verifies, the call fails
/// with `InvalidToken("signature verification failed")`.
pub fn verify_signature(
    raw: &str,
    keys: &[DecodingKey],
    algorithm: Algorithm,
) -> Result<TokenView, OidcError> {
    // Signature-only check: every claim validation the JWT library would
    // normally perform is handled later by the rule chain.
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    for (index, key) in keys.iter().enumerate() {
        match decode::<Value>(raw, key, &validation) {
            Ok(_) => {
                debug!(key_index = index, "token signature verified");
                return TokenView::decode(raw);
            }
            Err(e) => {
                debug!(key_index = index, error = %e, "signing key did not verify token");
            }
        }
    }

    Err(OidcError::InvalidToken(
        "signature verification failed".to_string(),
    ))
}
