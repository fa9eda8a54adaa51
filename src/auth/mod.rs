//! Accounts and sessions
//!
//! Registration, email verification and JWT sessions on top of the user store.
//! Failures are reported as [`AuthError`] variants that the HTTP layer turns
//! into status codes; the messages are shown to the client as-is.

pub mod mailer;
pub mod password;
pub mod tokens;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{AuthConfig, Config, ConfigError};
use crate::database::{Database, NewUser, User};

pub use mailer::{LogMailer, Mailer, OutgoingMail, SmtpMailer, mailer_from_config};
pub use password::{
    hash_password, hash_password_blocking, verify_password, verify_password_blocking,
};
pub use tokens::{Claims, TokenError, TokenKeys, TokenKind};

const ACTIVATION_SUBJECT: &str = "Activate your account";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("Failed to send email: {0}")]
    Mail(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    fn bad_request(message: &str) -> Self {
        Self::BadRequest(message.to_string())
    }

    fn invalid_refresh_token() -> Self {
        Self::Unauthorized("Invalid refresh token.".to_string())
    }

    fn invalid_credentials() -> Self {
        Self::Unauthorized("Could not validate credentials.".to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    #[inline]
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", error))
    }
}

impl From<TokenError> for AuthError {
    #[inline]
    fn from(error: TokenError) -> Self {
        Self::Internal(error.to_string())
    }
}

/// Body of `POST /users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
    pub activation: Duration,
}

impl From<&AuthConfig> for TokenLifetimes {
    #[inline]
    fn from(config: &AuthConfig) -> Self {
        Self {
            access: Duration::from_secs(config.access_token_expire_minutes * 60),
            refresh: Duration::from_secs(config.refresh_token_expire_days * 24 * 60 * 60),
            activation: Duration::from_secs(config.activation_token_expire_hours * 60 * 60),
        }
    }
}

pub struct AuthService {
    database: Database,
    keys: TokenKeys,
    lifetimes: TokenLifetimes,
    mailer: Arc<dyn Mailer>,
    public_url: String,
}

impl std::fmt::Debug for AuthService {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("lifetimes", &self.lifetimes)
            .field("public_url", &self.public_url)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    #[inline]
    pub fn new(
        database: Database,
        secret: &str,
        lifetimes: TokenLifetimes,
        mailer: Arc<dyn Mailer>,
        public_url: &str,
    ) -> Self {
        Self {
            database,
            keys: TokenKeys::new(secret),
            lifetimes,
            mailer,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fails when no JWT secret is configured
    #[inline]
    pub fn from_config(
        config: &Config,
        database: Database,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, ConfigError> {
        let secret = config.auth.require_secret()?;
        Ok(Self::new(
            database,
            secret,
            TokenLifetimes::from(&config.auth),
            mailer,
            &config.server.public_url,
        ))
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    /// Create an active, unverified account and mail its activation link.
    /// A failed mail is logged; the link can be requested again with
    /// [`AuthService::resend_verification`].
    #[inline]
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AuthError> {
        let email = request.email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::Unprocessable(
                "value is not a valid email address".to_string(),
            ));
        }
        if request.password.is_empty() {
            return Err(AuthError::Unprocessable(
                "Password must not be empty.".to_string(),
            ));
        }

        if let Some(existing) = self.database.get_user_by_email(email).await? {
            return Err(if existing.is_verified {
                AuthError::Unprocessable(
                    "Email is already registered and verified with us.".to_string(),
                )
            } else {
                AuthError::Conflict("Email address not verified".to_string())
            });
        }

        let email = email.to_string();
        let password_hash = hash_password_blocking(request.password).await?;
        let user = self
            .database
            .create_user(NewUser {
                first_name: request.first_name,
                last_name: request.last_name,
                email,
                password_hash,
                is_active: true,
            })
            .await?;

        info!("Registered user {} ({})", user.id, user.email);
        if let Err(e) = self.send_activation_email(&user.email).await {
            error!("Could not send activation email to {}: {}", user.email, e);
        }

        Ok(user)
    }

    /// Password grant: exchange credentials for an access/refresh pair
    #[inline]
    pub async fn issue_tokens(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenResponse, AuthError> {
        let user = self
            .database
            .get_user_by_email(username.trim())
            .await?
            .ok_or_else(|| AuthError::bad_request("Email is not registered with us."))?;

        if !verify_password_blocking(password.to_string(), user.password.clone()).await {
            return Err(AuthError::bad_request("Invalid Login Credentials."));
        }

        if !user.is_active {
            return Err(AuthError::bad_request(
                "Your account is inactive. Please contact support.",
            ));
        }

        if !user.is_verified {
            if let Err(e) = self.send_activation_email(&user.email).await {
                warn!("Could not resend activation email to {}: {}", user.email, e);
            }
            return Err(AuthError::bad_request(
                "Your account is unverified. We have resent the account verification email.",
            ));
        }

        self.token_pair(&user, None)
    }

    /// New access token for a valid refresh token; the refresh token is echoed back
    #[inline]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let user_id = self
            .keys
            .user_id(refresh_token, TokenKind::Refresh)
            .map_err(|_| AuthError::invalid_refresh_token())?;

        let user = self
            .database
            .get_user(user_id)
            .await?
            .ok_or_else(AuthError::invalid_refresh_token)?;

        self.token_pair(&user, Some(refresh_token.to_string()))
    }

    /// Mark the account named by an activation token as verified
    #[inline]
    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        let email = self
            .keys
            .activation_email(token)
            .map_err(|_| AuthError::bad_request("Invalid token."))?;

        let user = self
            .database
            .get_user_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::bad_request("Invalid token."))?;

        if user.is_verified {
            return Err(AuthError::bad_request("Email is already verified."));
        }

        let verified = self
            .database
            .mark_user_verified(user.id)
            .await?
            .ok_or_else(|| AuthError::bad_request("Invalid token."))?;

        info!("Verified email for user {}", verified.id);
        Ok(verified)
    }

    #[inline]
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let user = self
            .database
            .get_user_by_email(email.trim())
            .await?
            .ok_or_else(|| AuthError::bad_request("Email is not registered with us."))?;

        if user.is_verified {
            return Err(AuthError::bad_request("Email is already verified."));
        }

        self.send_activation_email(&user.email).await
    }

    /// Resolve a bearer access token to its user
    #[inline]
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AuthError> {
        let user_id = self
            .keys
            .user_id(access_token, TokenKind::Access)
            .map_err(|_| AuthError::invalid_credentials())?;

        self.database
            .get_user(user_id)
            .await?
            .ok_or_else(AuthError::invalid_credentials)
    }

    #[inline]
    pub async fn send_activation_email(&self, email: &str) -> Result<(), AuthError> {
        let token = self.keys.issue_activation(email, self.lifetimes.activation)?;
        let link = format!("{}/auth/verify?token={}", self.public_url, token);

        self.mailer
            .send(OutgoingMail {
                to: email.to_string(),
                subject: ACTIVATION_SUBJECT.to_string(),
                html_body: format!(
                    "Activate your Smart Lawyer account using this link: <a href=\"{}\">Click here</a>",
                    link
                ),
            })
            .await
            .map_err(|e| AuthError::Mail(format!("{:#}", e)))
    }

    fn token_pair(
        &self,
        user: &User,
        refresh_token: Option<String>,
    ) -> Result<TokenResponse, AuthError> {
        let access_token =
            self.keys
                .issue_session(user.id, TokenKind::Access, self.lifetimes.access)?;
        let refresh_token = match refresh_token {
            Some(token) => token,
            None => self
                .keys
                .issue_session(user.id, TokenKind::Refresh, self.lifetimes.refresh)?,
        };

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.lifetimes.access.as_secs(),
        })
    }
}

/// `local@domain.tld`, no whitespace, one `@`
#[inline]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}
