// src/client.rs

use async_trait::async_trait;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument};
use url::Url;

use crate::config::{LoginOptions, ProviderConfig};
use crate::error::OidcError;
use crate::model::TokenResponse;
use crate::token::{verify_signature, TokenView};
use crate::validator::{ExpectedClaims, RuleChain};

/// An authorization-code grant handed back by the provider after the user
/// authenticated.
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub code: String,
    pub redirect_uri: Option<Url>,
}

/// The collaborator that turns a grant into a token-endpoint response.
///
/// The client holds one of these rather than inheriting an OAuth2 flow;
/// swap it out to integrate a different transport or to test without HTTP.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, grant: &AuthorizationGrant) -> Result<TokenResponse, OidcError>;
}

/// A `TokenExchanger` that posts the authorization-code grant to the
/// configured token endpoint as a form-encoded request.
pub struct CodeGrantExchanger {
    http_client: reqwest::Client,
    token_endpoint: Url,
    client_id: String,
    client_secret: Option<String>,
}

impl CodeGrantExchanger {
    pub fn new(token_endpoint: Url, client_id: String, client_secret: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            token_endpoint,
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl TokenExchanger for CodeGrantExchanger {
    #[instrument(skip(self, grant), err)]
    async fn exchange(&self, grant: &AuthorizationGrant) -> Result<TokenResponse, OidcError> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", grant.code.clone()),
            ("client_id", self.client_id.clone()),
        ];
        if let Some(redirect_uri) = &grant.redirect_uri {
            form.push(("redirect_uri", redirect_uri.to_string()));
        }
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let response = self
            .http_client
            .post(self.token_endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| OidcError::Transport {
                step: "exchanging the authorization grant",
                source: e,
            })?;
        response.json().await.map_err(|e| OidcError::Transport {
            step: "reading the token-endpoint response",
            source: e,
        })
    }
}

/// The verified outcome of a login: the token-endpoint response plus the
/// decoded, claims-validated identity token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub tokens: TokenResponse,
    claims: TokenView,
}

impl VerifiedIdentity {
    /// The authenticated subject (`sub` claim).
    pub fn subject(&self) -> Option<&str> {
        self.claims.claim("sub").and_then(|v| v.as_str())
    }

    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.claims.claim(name)
    }

    pub fn claims(&self) -> &TokenView {
        &self.claims
    }
}

/// The relying-party client: drives the grant exchange and turns the raw
/// identity token into a verified identity.
///
/// Holds the immutable provider configuration, the claims rule chain, and
/// the exchange collaborator. Create once and reuse; concurrent logins are
/// safe.
pub struct OidcClient {
    config: ProviderConfig,
    client_id: String,
    rule_chain: RuleChain,
    exchanger: Box<dyn TokenExchanger>,
}

impl OidcClient {
    /// Creates a client with the standard rule chain and the given exchange
    /// collaborator.
    pub fn new(
        config: ProviderConfig,
        client_id: impl Into<String>,
        exchanger: Box<dyn TokenExchanger>,
    ) -> Self {
        Self {
            config,
            client_id: client_id.into(),
            rule_chain: RuleChain::standard(),
            exchanger,
        }
    }

    /// Creates a client whose exchanger posts to the configured token
    /// endpoint over HTTP.
    pub fn with_code_grant_exchanger(
        config: ProviderConfig,
        client_id: impl Into<String>,
        client_secret: Option<String>,
    ) -> Self {
        let client_id = client_id.into();
        let exchanger = Box::new(CodeGrantExchanger::new(
            config.token_endpoint.clone(),
            client_id.clone(),
            client_secret,
        ));
        Self::new(config, client_id, exchanger)
    }

    /// Replaces the claims rule chain, e.g. to append rules for custom
    /// claims or reorder the standard ones.
    pub fn with_rule_chain(mut self, rule_chain: RuleChain) -> Self {
        self.rule_chain = rule_chain;
        self
    }

    pub fn rule_chain(&self) -> &RuleChain {
        &self.rule_chain
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Completes a login: exchanges the grant, then verifies the returned
    /// identity token's signature and claims.
    ///
    /// Any failure is terminal for this call; the caller decides whether to
    /// retry the whole login.
    #[instrument(skip(self, grant, options), err)]
    pub async fn complete_login(
        &self,
        grant: &AuthorizationGrant,
        options: &LoginOptions,
    ) -> Result<VerifiedIdentity, OidcError> {
        let tokens = self.exchanger.exchange(grant).await?;
        let raw = tokens
            .id_token
            .as_deref()
            .ok_or_else(|| OidcError::InvalidToken("missing id_token".to_string()))?;

        let claims = verify_signature(raw, &self.config.signing_keys, self.config.algorithm)?;

        let expected = self.expected_claims(&claims, options);
        self.rule_chain.validate(&expected, &claims)?;
        debug!(subject = ?claims.claim("sub"), "identity token verified");

        Ok(VerifiedIdentity { tokens, claims })
    }

    /// Builds the per-call expected-claims map: issuer and audience from
    /// configuration, time-based claims from the current clock, `azp` only
    /// when the token carries it, and `nonce` only when the caller supplied
    /// one.
    fn expected_claims(&self, token: &TokenView, options: &LoginOptions) -> ExpectedClaims {
        let now = unix_now();
        let mut expected = ExpectedClaims::new();
        expected.insert("iss".to_string(), json!(self.config.issuer));
        expected.insert("exp".to_string(), json!(now));
        expected.insert("auth_time".to_string(), json!(now));
        expected.insert("iat".to_string(), json!(now));
        expected.insert(
            "nbf".to_string(),
            json!(now + options.nbf_tolerance_secs),
        );
        expected.insert("aud".to_string(), json!(self.client_id));
        if token.has_claim("azp") {
            expected.insert("azp".to_string(), json!(self.client_id));
        }
        if let Some(nonce) = &options.expected_nonce {
            expected.insert("nonce".to_string(), json!(nonce));
        }
        expected
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
