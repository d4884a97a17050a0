// crates/users-conformance-core/src/session.rs
// ============================================================================
// Module: Session Manager
// Description: One-shot authentication and bearer credential handling.
// Purpose: Obtain the credential every protected call depends on.
// Dependencies: serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! The session manager logs in once per run and hands out a read-only
//! [`Credential`]. Failure here is fatal: no scenario can proceed without a
//! token, so callers abort the run on [`AuthenticationError`].
//!
//! Security posture: passwords and tokens never appear in logs or debug
//! output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde_json::json;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::normalize::extract_token;
use crate::transport::ApiRequest;
use crate::transport::AuthorizationHeader;
use crate::transport::Transport;
use crate::transport::TransportError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Login credentials submitted to the authentication endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque bearer token obtained from the login endpoint.
///
/// # Invariants
/// - The token is non-empty and carries no `Bearer ` prefix.
/// - Read-only after creation; shared freely across concurrent requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Raw token value.
    token: String,
}

impl Credential {
    /// Wraps a raw token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Returns the raw token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the `Authorization: Bearer <token>` header value.
    #[must_use]
    pub fn authorization_header(&self) -> AuthorizationHeader {
        AuthorizationHeader::bearer(&self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Authentication failure; fatal to the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// The login request never produced a status.
    #[error("login request failed: {0}")]
    Transport(#[from] TransportError),
    /// The login endpoint answered with a non-success status.
    #[error("login rejected with status {status}")]
    Rejected {
        /// Observed status code.
        status: u16,
    },
    /// The login response carried no `authorization` or `token` field.
    #[error("login response (status {status}) carried no token")]
    MissingToken {
        /// Observed status code.
        status: u16,
    },
}

// ============================================================================
// SECTION: Session Manager
// ============================================================================

/// Authenticates against the login endpoint.
#[derive(Debug, Clone)]
pub struct SessionManager {
    /// Path of the login endpoint.
    login_path: String,
}

impl SessionManager {
    /// Creates a session manager for `login_path`.
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    /// Sends one login request and extracts the bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError`] on transport failure, a non-success
    /// status, or a response without a token field.
    pub async fn authenticate(
        &self,
        transport: &dyn Transport,
        credentials: &LoginCredentials,
    ) -> Result<Credential, AuthenticationError> {
        let body = json!({
            "email": credentials.email,
            "password": credentials.password,
        });
        let response = transport.send(ApiRequest::post(&self.login_path, body)).await?;
        if !response.is_success() {
            warn!(status = response.status, "login rejected");
            return Err(AuthenticationError::Rejected {
                status: response.status,
            });
        }
        let token = extract_token(response.json()).ok_or(AuthenticationError::MissingToken {
            status: response.status,
        })?;
        info!(email = %credentials.email, "authenticated");
        Ok(Credential::new(token))
    }
}
