// src/config.rs

use jsonwebtoken::{Algorithm, DecodingKey};
use std::collections::BTreeSet;
use std::fmt;
use url::Url;

use crate::discovery::DiscoveryResolver;
use crate::error::OidcError;

/// The resolved provider configuration used by the client.
///
/// Built once, either from fully explicit options or via discovery, and
/// immutable thereafter; re-discovery means building a new instance.
/// Concurrent verification calls against one configuration need no locking.
#[derive(Clone)]
pub struct ProviderConfig {
    /// The issuer identifier the `iss` claim must equal.
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Option<Url>,
    /// The scope set requested on authorization; always contains `openid`.
    pub scopes: BTreeSet<String>,
    /// Verification keys in attempt order; the first key that verifies a
    /// signature wins. Never empty.
    pub signing_keys: Vec<DecodingKey>,
    pub algorithm: Algorithm,
}

// Key material never renders; only the count does.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("issuer", &self.issuer)
            .field("authorization_endpoint", &self.authorization_endpoint.as_str())
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field(
                "userinfo_endpoint",
                &self.userinfo_endpoint.as_ref().map(Url::as_str),
            )
            .field("scopes", &self.scopes)
            .field(
                "signing_keys",
                &format!("[{} redacted]", self.signing_keys.len()),
            )
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// A builder for creating a `ProviderConfig`.
///
/// Two paths: `build()` when every endpoint and key is supplied explicitly,
/// or `discover().await` to fill the gaps from the issuer's published
/// metadata. Discovered values never overwrite a field the caller set
/// explicitly.
pub struct ProviderConfigBuilder {
    issuer: Option<String>,
    authorization_endpoint: Option<Url>,
    token_endpoint: Option<Url>,
    userinfo_endpoint: Option<Url>,
    scopes: BTreeSet<String>,
    signing_keys: Vec<DecodingKey>,
    algorithm: Algorithm,
}

impl Default for ProviderConfigBuilder {
    fn default() -> Self {
        Self {
            issuer: None,
            authorization_endpoint: None,
            token_endpoint: None,
            userinfo_endpoint: None,
            scopes: BTreeSet::new(),
            signing_keys: Vec::new(),
            // RS256 is the most common algorithm for OIDC.
            algorithm: Algorithm::RS256,
        }
    }
}

impl ProviderConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the issuer. Required. With `build()` this is the issuer
    /// identity directly; with `discover()` it is the fetch target and the
    /// identity is adopted from the document.
    pub fn issuer(mut self, issuer: &str) -> Result<Self, OidcError> {
        Url::parse(issuer).map_err(|e| OidcError::InvalidUrl(e.to_string()))?;
        self.issuer = Some(issuer.to_string());
        Ok(self)
    }

    pub fn authorization_endpoint(mut self, url: &str) -> Result<Self, OidcError> {
        self.authorization_endpoint = Some(parse_url(url)?);
        Ok(self)
    }

    pub fn token_endpoint(mut self, url: &str) -> Result<Self, OidcError> {
        self.token_endpoint = Some(parse_url(url)?);
        Ok(self)
    }

    pub fn userinfo_endpoint(mut self, url: &str) -> Result<Self, OidcError> {
        self.userinfo_endpoint = Some(parse_url(url)?);
        Ok(self)
    }

    /// Adds a single scope; a lone string is treated as a one-element set.
    pub fn scope(mut self, scope: &str) -> Self {
        self.scopes.insert(scope.to_string());
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Adds an explicit verification key. Keys are tried in insertion order.
    pub fn signing_key(mut self, key: DecodingKey) -> Self {
        self.signing_keys.push(key);
        self
    }

    /// Sets the signing algorithm. Defaults to RS256.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Consumes the builder into a configuration from explicit options only.
    ///
    /// Fails with `InvalidConfiguration` naming the first missing required
    /// field: issuer, both endpoints, and at least one signing key.
    pub fn build(mut self) -> Result<ProviderConfig, OidcError> {
        self.scopes.insert("openid".to_string());
        let issuer = self
            .issuer
            .ok_or_else(|| missing("issuer"))?;
        let authorization_endpoint = self
            .authorization_endpoint
            .ok_or_else(|| missing("authorization_endpoint"))?;
        let token_endpoint = self
            .token_endpoint
            .ok_or_else(|| missing("token_endpoint"))?;
        if self.signing_keys.is_empty() {
            return Err(missing("signing keys"));
        }

        Ok(ProviderConfig {
            issuer,
            authorization_endpoint,
            token_endpoint,
            userinfo_endpoint: self.userinfo_endpoint,
            scopes: self.scopes,
            signing_keys: self.signing_keys,
            algorithm: self.algorithm,
        })
    }

    /// Resolves the provider's published metadata and consumes the builder
    /// into a configuration.
    ///
    /// The builder's issuer is the fetch target; the configured issuer
    /// identity — the value the token's `iss` claim must equal — is the one
    /// the document publishes. Discovery fills only the fields the caller
    /// did not set; explicitly supplied endpoints and keys take precedence
    /// over discovered ones. A discovery failure is terminal for this call
    /// and leaves nothing behind; the caller retries from scratch if
    /// desired.
    pub async fn discover(mut self, resolver: &DiscoveryResolver) -> Result<ProviderConfig, OidcError> {
        self.scopes.insert("openid".to_string());
        let target = self.issuer.clone().ok_or_else(|| missing("issuer"))?;

        let discovered = resolver
            .resolve(&target, &self.scopes, self.algorithm)
            .await?;

        self.issuer = Some(discovered.issuer);
        if self.authorization_endpoint.is_none() {
            self.authorization_endpoint = Some(discovered.authorization_endpoint);
        }
        if self.token_endpoint.is_none() {
            self.token_endpoint = Some(discovered.token_endpoint);
        }
        if self.userinfo_endpoint.is_none() {
            self.userinfo_endpoint = discovered.userinfo_endpoint;
        }
        if self.signing_keys.is_empty() {
            self.signing_keys = discovered.signing_keys;
        }

        self.build()
    }
}

fn parse_url(raw: &str) -> Result<Url, OidcError> {
    Url::parse(raw).map_err(|e| OidcError::InvalidUrl(format!("{raw}: {e}")))
}

fn missing(field: &str) -> OidcError {
    OidcError::InvalidConfiguration(format!("missing required field: {field}"))
}

/// Per-login options.
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    /// Tolerance in seconds granted to a token's `nbf` claim: the token is
    /// accepted when `nbf <= now + tolerance`. Defaults to 0.
    pub nbf_tolerance_secs: u64,
    /// The nonce sent on the authorization request, when the caller wants
    /// the token's `nonce` claim enforced. Left unset, the nonce rule
    /// passes vacuously.
    pub expected_nonce: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_all_mandatory_fields() {
        let err = ProviderConfigBuilder::new().build().unwrap_err();
        assert!(matches!(err, OidcError::InvalidConfiguration(msg) if msg.contains("issuer")));

        let err = ProviderConfigBuilder::new()
            .issuer("https://idp.example")
            .unwrap()
            .authorization_endpoint("https://idp.example/auth")
            .unwrap()
            .token_endpoint("https://idp.example/token")
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, OidcError::InvalidConfiguration(msg) if msg.contains("signing keys")));
    }

    #[test]
    fn openid_scope_is_always_present() {
        let config = ProviderConfigBuilder::new()
            .issuer("https://idp.example")
            .unwrap()
            .authorization_endpoint("https://idp.example/auth")
            .unwrap()
            .token_endpoint("https://idp.example/token")
            .unwrap()
            .scope("profile")
            .signing_key(DecodingKey::from_secret(b"k"))
            .build()
            .unwrap();

        assert!(config.scopes.contains("openid"));
        assert!(config.scopes.contains("profile"));
    }

    #[test]
    fn debug_output_redacts_key_material() {
        let config = ProviderConfigBuilder::new()
            .issuer("https://idp.example")
            .unwrap()
            .authorization_endpoint("https://idp.example/auth")
            .unwrap()
            .token_endpoint("https://idp.example/token")
            .unwrap()
            .signing_key(DecodingKey::from_secret(b"very-secret-bytes"))
            .build()
            .unwrap();

        let rendered = format!("{config:?}");
        assert!(rendered.contains("https://idp.example"));
        assert!(rendered.contains("[1 redacted]"));
        assert!(!rendered.contains("very-secret-bytes"));
    }

    #[test]
    fn issuer_must_be_a_url() {
        assert!(matches!(
            ProviderConfigBuilder::new().issuer("not a url"),
            Err(OidcError::InvalidUrl(_))
        ));
    }
}
