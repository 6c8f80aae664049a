//! Token verification: the auth collaborator.
//!
//! DESIGN
//! ======
//! The hub never inspects credentials itself. A `TokenVerifier` turns an
//! opaque bearer token into an `Identity`, and everything downstream trusts
//! that identity. `HttpTokenVerifier` delegates to an identity endpoint;
//! `DevTokenVerifier` accepts `dev:<uid>:<name>` tokens for local work.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AuthConfig;

/// Verified identity of the acting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("access token required")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("token verification unavailable: {0}")]
    Unavailable(String),
}

impl crate::frame::ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingToken => "E_AUTH_MISSING",
            Self::InvalidToken => "E_AUTH_INVALID",
            Self::Unavailable(_) => "E_AUTH_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Build the configured verifier, if any.
///
/// The HTTP verifier wins when both are configured.
///
/// # Errors
///
/// Returns `Unavailable` if the HTTP client cannot be constructed.
pub fn verifier_from_config(config: &AuthConfig) -> Result<Option<Arc<dyn TokenVerifier>>, AuthError> {
    if let Some(url) = &config.verify_url {
        let verifier = HttpTokenVerifier::new(url.clone(), Duration::from_secs(config.timeout_secs))?;
        return Ok(Some(Arc::new(verifier)));
    }
    if config.dev_tokens {
        warn!("AUTH_DEV_TOKENS enabled: accepting unsigned dev:<uid>:<name> tokens");
        return Ok(Some(Arc::new(DevTokenVerifier)));
    }
    Ok(None)
}

// =============================================================================
// HTTP VERIFIER
// =============================================================================

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    uid: String,
    email: Option<String>,
    name: Option<String>,
}

impl From<VerifyResponse> for Identity {
    fn from(resp: VerifyResponse) -> Self {
        let name = resp
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| resp.email.clone())
            .unwrap_or_else(|| resp.uid.clone());
        Self { uid: resp.uid, email: resp.email, name }
    }
}

pub struct HttpTokenVerifier {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenVerifier {
    /// # Errors
    ///
    /// Returns `Unavailable` if the HTTP client cannot be built.
    pub fn new(url: String, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait::async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let resp = self
            .client
            .get(&self.url)
            .header("Authorization", format!("Bearer {token}"))
            .header("User-Agent", "synergy-hub")
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!("identity endpoint returned {status}")));
        }

        let body = resp
            .json::<VerifyResponse>()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        if body.uid.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(body.into())
    }
}

// =============================================================================
// DEV VERIFIER
// =============================================================================

/// Accepts `dev:<uid>` or `dev:<uid>:<name>` without any signature check.
pub struct DevTokenVerifier;

#[async_trait::async_trait]
impl TokenVerifier for DevTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let Some(rest) = token.strip_prefix("dev:") else {
            return Err(AuthError::InvalidToken);
        };
        let (uid, name) = rest.split_once(':').unwrap_or((rest, rest));
        if uid.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        let name = if name.is_empty() { uid } else { name };
        Ok(Identity { uid: uid.to_owned(), email: None, name: name.to_owned() })
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
