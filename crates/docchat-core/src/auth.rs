//! Explicit authentication context.
//!
//! Authentication state is a value handed to the components that need it,
//! never ambient process-wide state. Token issuance sits behind the
//! [`TokenIssuer`] trait so a real identity service can be plugged in at the
//! boundary; the shipped issuer hands out a pre-configured token and claims
//! no validation semantics.

use crate::error::{DocChatError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier
    pub id: String,
    /// Sign-in email
    pub email: String,
    /// Name shown in the UI
    pub display_name: String,
}

/// A bearer token with expiry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque token value
    pub token: String,
    /// Issuance timestamp (ISO 8601 format)
    pub issued_at: String,
    /// Expiry timestamp (ISO 8601 format), if the issuer set one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl AccessToken {
    /// Creates a token with no expiry.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            issued_at: chrono::Utc::now().to_rfc3339(),
            expires_at: None,
        }
    }

    /// Whether the token's expiry timestamp has passed.
    ///
    /// Tokens without an expiry, or with an unparsable one, are treated as
    /// expired only when the timestamp is present and in the past.
    pub fn is_expired(&self) -> bool {
        let Some(expires_at) = &self.expires_at else {
            return false;
        };
        match chrono::DateTime::parse_from_rfc3339(expires_at) {
            Ok(expiry) => expiry < chrono::Utc::now(),
            Err(_) => false,
        }
    }
}

/// Authentication context passed explicitly to gateway clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub account: Account,
    pub token: AccessToken,
}

impl AuthContext {
    /// The bearer token value for the `Authorization` header.
    pub fn bearer(&self) -> &str {
        &self.token.token
    }
}

/// Sign-in credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Boundary for token issuance.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Exchanges credentials for an authentication context.
    ///
    /// # Errors
    ///
    /// Returns an `Auth` error when the credentials are rejected or no token
    /// can be issued.
    async fn issue(&self, credentials: &Credentials) -> Result<AuthContext>;
}

/// Issuer backed by a pre-configured token (config file or environment).
///
/// Accepts any credentials and attaches the configured token. Suitable for
/// deployments where the backend sits behind a shared gateway secret.
pub struct StaticTokenIssuer {
    token: String,
}

impl StaticTokenIssuer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenIssuer for StaticTokenIssuer {
    async fn issue(&self, credentials: &Credentials) -> Result<AuthContext> {
        if self.token.is_empty() {
            return Err(DocChatError::auth("no token configured"));
        }
        if credentials.email.trim().is_empty() {
            return Err(DocChatError::auth("email must not be empty"));
        }
        let display_name = credentials
            .email
            .split('@')
            .next()
            .unwrap_or(&credentials.email)
            .to_string();
        Ok(AuthContext {
            account: Account {
                id: uuid::Uuid::new_v4().to_string(),
                email: credentials.email.clone(),
                display_name,
            },
            token: AccessToken::new(self.token.clone()),
        })
    }
}
