// src/discovery.rs

use jsonwebtoken::{Algorithm, DecodingKey};
use std::collections::BTreeSet;
use tracing::{debug, instrument};
use url::Url;

use crate::error::OidcError;
use crate::model::{DiscoveryDocument, JsonWebKey, JsonWebKeySet};

/// The provider settings produced by a successful discovery run.
///
/// Either the whole structure is returned or the call fails; no partial
/// configuration ever escapes the resolver.
pub struct DiscoveredProvider {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Option<Url>,
    pub signing_keys: Vec<DecodingKey>,
}

/// Fetches a provider's `.well-known/openid-configuration` document and its
/// referenced key-set document, and maps them into provider settings.
///
/// The resolver performs no retries; a failed discovery is retried, if at
/// all, by the caller from scratch.
#[derive(Clone, Default)]
pub struct DiscoveryResolver {
    http_client: reqwest::Client,
}

impl DiscoveryResolver {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    /// Resolves provider settings for `issuer`.
    ///
    /// Every entry of `requested_scopes` must appear in the document's
    /// `scopes_supported` when that field is present; when it is absent the
    /// check is skipped entirely. Keys are filtered to signature keys whose
    /// `alg` exactly matches `algorithm`; all surviving keys are retained in
    /// document order so rotation overlap windows keep verifying.
    #[instrument(skip(self, requested_scopes), err)]
    pub async fn resolve(
        &self,
        issuer: &str,
        requested_scopes: &BTreeSet<String>,
        algorithm: Algorithm,
    ) -> Result<DiscoveredProvider, OidcError> {
        let metadata_url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        debug!(url = %metadata_url, "fetching discovery document");

        let response = self
            .http_client
            .get(&metadata_url)
            .send()
            .await
            .map_err(|e| OidcError::Transport {
                step: "fetching the discovery document",
                source: e,
            })?;
        let document: DiscoveryDocument = response.json().await.map_err(|_| {
            OidcError::InvalidConfiguration(format!("expected JSON from {metadata_url}"))
        })?;

        let issuer_id = required_field(document.issuer, "issuer", &metadata_url)?;
        let authorization_endpoint = parse_endpoint(required_field(
            document.authorization_endpoint,
            "authorization_endpoint",
            &metadata_url,
        )?)?;
        let token_endpoint = parse_endpoint(required_field(
            document.token_endpoint,
            "token_endpoint",
            &metadata_url,
        )?)?;
        let userinfo_endpoint = document.userinfo_endpoint.map(parse_endpoint).transpose()?;

        if let Some(supported) = &document.scopes_supported {
            for scope in requested_scopes {
                if !supported.iter().any(|s| s == scope) {
                    return Err(OidcError::InvalidConfiguration(format!(
                        "scope '{scope}' is not supported by {metadata_url}"
                    )));
                }
            }
        }

        let jwks_uri = required_field(document.jwks_uri, "jwks_uri", &metadata_url)?;
        debug!(url = %jwks_uri, "fetching key-set document");
        let response = self
            .http_client
            .get(&jwks_uri)
            .send()
            .await
            .map_err(|e| OidcError::Transport {
                step: "fetching the key-set document",
                source: e,
            })?;
        let jwks: JsonWebKeySet = response.json().await.map_err(|_| {
            OidcError::InvalidConfiguration(format!("expected a JSON key set from {jwks_uri}"))
        })?;

        let matching = filter_signing_keys(&jwks.keys, algorithm);
        if matching.is_empty() {
            return Err(OidcError::InvalidConfiguration(
                "no valid signing keys".to_string(),
            ));
        }

        let signing_keys = matching
            .into_iter()
            .map(to_decoding_key)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = signing_keys.len(), "retained verification keys");

        Ok(DiscoveredProvider {
            issuer: issuer_id,
            authorization_endpoint,
            token_endpoint,
            userinfo_endpoint,
            signing_keys,
        })
    }
}

fn required_field(
    value: Option<String>,
    key: &str,
    document_url: &str,
) -> Result<String, OidcError> {
    value.ok_or_else(|| {
        OidcError::InvalidConfiguration(format!(
            "missing required field '{key}' in {document_url}"
        ))
    })
}

fn parse_endpoint(raw: String) -> Result<Url, OidcError> {
    Url::parse(&raw).map_err(|e| OidcError::InvalidUrl(format!("{raw}: {e}")))
}

/// Keeps the keys usable for verifying this provider's signatures: an
/// explicit `use` other than `sig` excludes the entry, a missing `use` is
/// eligible, and `alg` must exactly equal the configured algorithm (a
/// missing `alg` excludes the entry).
fn filter_signing_keys(keys: &[JsonWebKey], algorithm: Algorithm) -> Vec<&JsonWebKey> {
    let alg_name = format!("{algorithm:?}");
    keys.iter()
        .filter(|key| {
            let for_signatures = key.use_purpose.as_deref().map_or(true, |u| u == "sig");
            let alg_matches = key.alg.as_deref() == Some(alg_name.as_str());
            for_signatures && alg_matches
        })
        .collect()
}

fn to_decoding_key(jwk: &JsonWebKey) -> Result<DecodingKey, OidcError> {
    // We only support RSA keys for now, as they are the most common for OIDC.
    if jwk.kty != "RSA" {
        return Err(OidcError::InvalidKeyFormat(format!(
            "unsupported key type '{}'",
            jwk.kty
        )));
    }
    let n = jwk
        .n
        .as_deref()
        .ok_or_else(|| OidcError::InvalidKeyFormat("RSA key missing 'n' component".to_string()))?;
    let e = jwk
        .e
        .as_deref()
        .ok_or_else(|| OidcError::InvalidKeyFormat("RSA key missing 'e' component".to_string()))?;
    DecodingKey::from_rsa_components(n, e).map_err(OidcError::KeyConversion)
}
