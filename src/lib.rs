// src/lib.rs

//! Relying-party-side OpenID Connect core: provider discovery and identity
//! token verification.
//!
//! The pipeline is construction (static options or discovery against the
//! issuer's `.well-known/openid-configuration`), then per login: grant
//! exchange (via a pluggable collaborator), signature verification against
//! the configured key set, and an ordered claims-validation chain.

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod token;
pub mod validator;

/// The public prelude for the `veritas-oidc` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::client::{
        AuthorizationGrant, CodeGrantExchanger, OidcClient, TokenExchanger, VerifiedIdentity,
    };
    pub use crate::config::{LoginOptions, ProviderConfig, ProviderConfigBuilder};
    pub use crate::discovery::DiscoveryResolver;
    pub use crate::error::OidcError;
    pub use crate::model::TokenResponse;
    pub use crate::token::TokenView;
    pub use crate::validator::{ClaimComparison, ClaimRule, ExpectedClaims, RuleChain};
    pub use jsonwebtoken::Algorithm;
}
