// src/validator.rs

use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::error::OidcError;
use crate::token::TokenView;

/// The values the verifier expects specific claims to hold at validation
/// time (e.g. `iss` → configured issuer, `exp` → current time).
///
/// Built fresh per validation call and discarded afterwards.
pub type ExpectedClaims = HashMap<String, Value>;

/// How a claim's actual value is compared against its expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimComparison {
    /// Fails only when the rule is required and the claim is absent or empty.
    /// Never consults the expected value.
    NotEmpty,
    /// Exact equality against a single expected value.
    EqualsSingle,
    /// Equality for scalar claims, membership for array claims (e.g. `aud`).
    EqualsOrContains,
    /// Numeric `actual >= expected`; an absent actual fails.
    GreaterOrEqual,
    /// Numeric `actual <= expected`; an absent actual passes.
    LesserOrEqual,
}

/// A single stateless claim-validation rule.
///
/// Rules with an absent expected value pass vacuously unless `required` is
/// set (except `NotEmpty`, which only looks at the token).
#[derive(Debug, Clone)]
pub struct ClaimRule {
    pub claim: String,
    pub comparison: ClaimComparison,
    pub required: bool,
}

impl ClaimRule {
    pub fn new(claim: impl Into<String>, comparison: ClaimComparison, required: bool) -> Self {
        Self {
            claim: claim.into(),
            comparison,
            required,
        }
    }

    fn evaluate(&self, expected: Option<&Value>, actual: Option<&Value>) -> bool {
        match self.comparison {
            ClaimComparison::NotEmpty => !self.required || actual.is_some_and(|v| !is_empty(v)),
            ClaimComparison::EqualsSingle => match expected {
                Some(exp) => actual == Some(exp),
                None => !self.required,
            },
            ClaimComparison::EqualsOrContains => match expected {
                Some(exp) => match actual {
                    Some(Value::Array(values)) => values.contains(exp),
                    Some(value) => value == exp,
                    None => false,
                },
                None => !self.required,
            },
            ClaimComparison::GreaterOrEqual => match expected {
                Some(exp) => matches!(
                    (actual.and_then(as_number), as_number(exp)),
                    (Some(a), Some(e)) if a >= e
                ),
                None => !self.required,
            },
            ClaimComparison::LesserOrEqual => match expected {
                Some(exp) => match actual {
                    None => true,
                    Some(value) => matches!(
                        (as_number(value), as_number(exp)),
                        (Some(a), Some(e)) if a <= e
                    ),
                },
                None => !self.required,
            },
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// An ordered claims-validation chain, evaluated as a short-circuiting
/// conjunction: the first failing rule determines the outcome.
///
/// The chain is inspectable and replaceable on the client, so callers can
/// add or reorder rules (for example to enforce a nonce) without touching
/// the rest of the pipeline.
#[derive(Debug, Clone)]
pub struct RuleChain {
    rules: Vec<ClaimRule>,
}

impl RuleChain {
    pub fn new(rules: Vec<ClaimRule>) -> Self {
        Self { rules }
    }

    /// The production chain, in RFC-emphasized order: freshness and issuer
    /// before audience and subject, optional claims last.
    ///
    /// `jti` and `nonce` only constrain when the caller supplies an expected
    /// value; with none supplied they pass vacuously.
    pub fn standard() -> Self {
        use ClaimComparison::*;
        Self::new(vec![
            ClaimRule::new("iat", NotEmpty, true),
            ClaimRule::new("exp", GreaterOrEqual, true),
            ClaimRule::new("iss", EqualsSingle, true),
            ClaimRule::new("aud", EqualsOrContains, true),
            ClaimRule::new("sub", NotEmpty, true),
            ClaimRule::new("nbf", LesserOrEqual, false),
            ClaimRule::new("jti", EqualsSingle, false),
            ClaimRule::new("azp", EqualsSingle, false),
            ClaimRule::new("nonce", EqualsSingle, false),
        ])
    }

    pub fn rules(&self) -> &[ClaimRule] {
        &self.rules
    }

    pub fn push(&mut self, rule: ClaimRule) {
        self.rules.push(rule);
    }

    /// Evaluates every rule in order against the token's claims, stopping at
    /// the first failure. The error names the failing claim.
    pub fn validate(&self, expected: &ExpectedClaims, token: &TokenView) -> Result<(), OidcError> {
        for rule in &self.rules {
            let actual = token.claim(&rule.claim);
            let exp = expected.get(rule.claim.as_str());
            if !rule.evaluate(exp, actual) {
                debug!(claim = %rule.claim, expected = ?exp, actual = ?actual, "claim rule failed");
                return Err(OidcError::InvalidToken(format!(
                    "claims validation failed: {}",
                    rule.claim
                )));
            }
        }
        Ok(())
    }
}

impl Default for RuleChain {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;

    fn token_with(payload: Value) -> TokenView {
        let raw = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(b"test"),
        )
        .unwrap();
        TokenView::decode(&raw).unwrap()
    }

    fn failing_claim(result: Result<(), OidcError>) -> String {
        match result.unwrap_err() {
            OidcError::InvalidToken(msg) => msg
                .strip_prefix("claims validation failed: ")
                .expect("claim-chain error message")
                .to_string(),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn optional_rules_pass_without_expected_value() {
        use ClaimComparison::*;
        let token = token_with(json!({ "anything": "at all" }));
        let expected = ExpectedClaims::new();

        for comparison in [EqualsSingle, EqualsOrContains, GreaterOrEqual, LesserOrEqual] {
            let rule = ClaimRule::new("anything", comparison, false);
            assert!(
                rule.evaluate(expected.get("anything"), token.claim("anything")),
                "{comparison:?} must pass with no expected value"
            );
        }
    }

    #[test]
    fn required_rules_fail_without_expected_value() {
        use ClaimComparison::*;
        for comparison in [EqualsSingle, EqualsOrContains, GreaterOrEqual, LesserOrEqual] {
            let rule = ClaimRule::new("x", comparison, true);
            assert!(!rule.evaluate(None, None), "{comparison:?} must fail when required");
        }
    }

    #[test]
    fn not_empty_semantics() {
        let rule = ClaimRule::new("sub", ClaimComparison::NotEmpty, true);
        assert!(rule.evaluate(None, Some(&json!("u1"))));
        assert!(!rule.evaluate(None, Some(&json!(""))));
        assert!(!rule.evaluate(None, Some(&Value::Null)));
        assert!(!rule.evaluate(None, None));

        let optional = ClaimRule::new("sub", ClaimComparison::NotEmpty, false);
        assert!(optional.evaluate(None, None));
    }

    #[test]
    fn equals_or_contains_matches_scalar_and_array() {
        let rule = ClaimRule::new("aud", ClaimComparison::EqualsOrContains, true);
        let exp = json!("abc");
        assert!(rule.evaluate(Some(&exp), Some(&json!("abc"))));
        assert!(rule.evaluate(Some(&exp), Some(&json!(["other", "abc"]))));
        assert!(!rule.evaluate(Some(&exp), Some(&json!(["other"]))));
        assert!(!rule.evaluate(Some(&exp), Some(&json!("other"))));
        assert!(!rule.evaluate(Some(&exp), None));
    }

    #[test]
    fn greater_or_equal_fails_on_absent_actual() {
        let rule = ClaimRule::new("exp", ClaimComparison::GreaterOrEqual, true);
        let now = json!(1_000);
        assert!(rule.evaluate(Some(&now), Some(&json!(1_000))));
        assert!(rule.evaluate(Some(&now), Some(&json!(2_000))));
        assert!(!rule.evaluate(Some(&now), Some(&json!(999))));
        assert!(!rule.evaluate(Some(&now), None));
    }

    #[test]
    fn lesser_or_equal_passes_on_absent_actual() {
        let rule = ClaimRule::new("nbf", ClaimComparison::LesserOrEqual, false);
        let limit = json!(1_000);
        assert!(rule.evaluate(Some(&limit), None));
        assert!(rule.evaluate(Some(&limit), Some(&json!(1_000))));
        assert!(!rule.evaluate(Some(&limit), Some(&json!(1_001))));
    }

    #[test]
    fn chain_short_circuits_at_first_failure() {
        // iat is absent and exp is in the past: the chain must report iat,
        // the earlier rule, and never reach exp.
        let token = token_with(json!({ "exp": 1, "iss": "i", "aud": "a", "sub": "s" }));
        let mut expected = ExpectedClaims::new();
        expected.insert("exp".into(), json!(1_000));
        expected.insert("iss".into(), json!("i"));
        expected.insert("aud".into(), json!("a"));

        let result = RuleChain::standard().validate(&expected, &token);
        assert_eq!(failing_claim(result), "iat");
    }

    #[test]
    fn expired_token_fails_and_fresh_token_passes() {
        let now = 1_700_000_000u64;
        let mut expected = ExpectedClaims::new();
        expected.insert("exp".into(), json!(now));
        expected.insert("iss".into(), json!("https://idp.example"));
        expected.insert("aud".into(), json!("abc"));

        let expired = token_with(json!({
            "iat": now - 100, "exp": now - 1,
            "iss": "https://idp.example", "aud": "abc", "sub": "u1",
        }));
        let result = RuleChain::standard().validate(&expected, &expired);
        assert_eq!(failing_claim(result), "exp");

        let fresh = token_with(json!({
            "iat": now - 100, "exp": now + 3600,
            "iss": "https://idp.example", "aud": "abc", "sub": "u1",
        }));
        assert!(RuleChain::standard().validate(&expected, &fresh).is_ok());
    }

    #[test]
    fn nbf_tolerance_window() {
        let now = 1_700_000_000u64;
        let base = json!({
            "iat": now, "exp": now + 3600, "nbf": now + 30,
            "iss": "i", "aud": "a", "sub": "s",
        });
        let token = token_with(base);

        let mut strict = ExpectedClaims::new();
        strict.insert("exp".into(), json!(now));
        strict.insert("iss".into(), json!("i"));
        strict.insert("aud".into(), json!("a"));
        strict.insert("nbf".into(), json!(now));
        let result = RuleChain::standard().validate(&strict, &token);
        assert_eq!(failing_claim(result), "nbf");

        let mut tolerant = strict.clone();
        tolerant.insert("nbf".into(), json!(now + 60));
        assert!(RuleChain::standard().validate(&tolerant, &token).is_ok());
    }

    #[test]
    fn nonce_only_constrains_when_expected() {
        let now = 1_700_000_000u64;
        let token = token_with(json!({
            "iat": now, "exp": now + 60, "iss": "i", "aud": "a", "sub": "s",
            "nonce": "sent-nonce",
        }));

        let mut expected = ExpectedClaims::new();
        expected.insert("exp".into(), json!(now));
        expected.insert("iss".into(), json!("i"));
        expected.insert("aud".into(), json!("a"));
        assert!(RuleChain::standard().validate(&expected, &token).is_ok());

        expected.insert("nonce".into(), json!("different-nonce"));
        let result = RuleChain::standard().validate(&expected, &token);
        assert_eq!(failing_claim(result), "nonce");
    }
}
