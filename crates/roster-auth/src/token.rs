//! Bearer-token extraction and HS256 JWT verification.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use roster_types::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures of bearer-token handling.
///
/// `MissingToken` and `MalformedToken` describe the shape of the request;
/// `InvalidToken` means a well-formed token failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authorization header is missing")]
    MissingToken,

    #[error("authorization header is malformed: {0}")]
    MalformedToken(&'static str),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("failed to issue token: {0}")]
    Issue(String),
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingToken)?.trim();
    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::MalformedToken("expected `Bearer <token>`"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedToken("unsupported authorization scheme"));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedToken("empty bearer token"));
    }
    Ok(token)
}

/// Verifies a bearer token and yields the account it was issued to.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AccountId, AuthError>;
}

/// JWT claims carried by Roster access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account identifier.
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 JWT issuer and verifier sharing one secret.
#[derive(Clone)]
pub struct JwtTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl JwtTokens {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer,
        }
    }

    /// Issues a token for `account` valid for `ttl`.
    pub fn issue(&self, account: AccountId, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs()).map_err(|_| AuthError::Issue("ttl too large".into()))?;
        let claims = Claims {
            sub: account.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now.saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }
}

impl fmt::Debug for JwtTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtTokens")
            .field("issuer", &self.issuer)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenVerifier for JwtTokens {
    fn verify(&self, token: &str) -> Result<AccountId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "token expired".to_string(),
                ErrorKind::InvalidSignature => "signature mismatch".to_string(),
                ErrorKind::InvalidIssuer => "unexpected issuer".to_string(),
                _ => e.to_string(),
            };
            AuthError::InvalidToken(reason)
        })?;

        data.claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken("subject is not an account id".to_string()))
    }
}
