use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, get_current_timestamp,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Activation,
}

impl fmt::Display for TokenKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::Activation => "activation",
        };
        f.write_str(name)
    }
}

/// JWT payload. Session tokens carry `id`, activation tokens carry `email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub kind: TokenKind,
    pub exp: u64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("Invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("Expected {expected} token, got {actual}")]
    WrongKind {
        expected: TokenKind,
        actual: TokenKind,
    },
    #[error("Token is missing the {0} claim")]
    MissingClaim(&'static str),
}

/// HS256 signing and verification keys
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenKeys {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

impl TokenKeys {
    #[inline]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Sign an access or refresh token for `user_id`
    #[inline]
    pub fn issue_session(
        &self,
        user_id: i64,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.sign(&Claims {
            id: Some(user_id),
            email: None,
            kind,
            exp: expiry(ttl),
        })
    }

    #[inline]
    pub fn issue_activation(&self, email: &str, ttl: Duration) -> Result<String, TokenError> {
        self.sign(&Claims {
            id: None,
            email: Some(email.to_string()),
            kind: TokenKind::Activation,
            exp: expiry(ttl),
        })
    }

    #[inline]
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(TokenError::Sign)
    }

    /// Verify signature and expiry, then require the token to be of `expected` kind
    #[inline]
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(TokenError::Invalid)?
            .claims;

        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                actual: claims.kind,
            });
        }

        Ok(claims)
    }

    #[inline]
    pub fn user_id(&self, token: &str, kind: TokenKind) -> Result<i64, TokenError> {
        self.decode(token, kind)?
            .id
            .ok_or(TokenError::MissingClaim("id"))
    }

    #[inline]
    pub fn activation_email(&self, token: &str) -> Result<String, TokenError> {
        self.decode(token, TokenKind::Activation)?
            .email
            .filter(|email| !email.is_empty())
            .ok_or(TokenError::MissingClaim("email"))
    }
}

fn expiry(ttl: Duration) -> u64 {
    get_current_timestamp().saturating_add(ttl.as_secs())
}
