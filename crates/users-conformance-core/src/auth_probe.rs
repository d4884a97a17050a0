// crates/users-conformance-core/src/auth_probe.rs
// ============================================================================
// Module: Auth-Enforcement Prober
// Description: Protected requests issued without a valid credential.
// Purpose: Confirm the API refuses unauthenticated and forged-token access.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! Each case sends a request that must be refused with `401` or `403`. Cases
//! never carry the run's real credential. A case the API accepts is a
//! failure. A user created by a wrongly accepted create is deleted
//! best-effort with the run's credential.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::info;
use tracing::warn;

use crate::record::FieldDialect;
use crate::record::UserTemplate;
use crate::report::CheckGroup;
use crate::report::CheckOutcome;
use crate::report::status_set;
use crate::session::Credential;
use crate::transport::ApiRequest;
use crate::transport::AuthorizationHeader;
use crate::transport::ResourcePaths;
use crate::transport::Transport;
use crate::validation::delete_created_user;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Statuses accepted for a refused request.
pub const REFUSAL_STATUSES: &[u16] = &[401, 403];
/// Token sent by the forged-credential case.
const FORGED_TOKEN: &str = "invalid.token.value";

// ============================================================================
// SECTION: Cases
// ============================================================================

/// One auth-enforcement case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthCase {
    /// List users without an `Authorization` header.
    ListWithoutToken,
    /// Create a user without an `Authorization` header.
    CreateWithoutToken,
    /// List users with a forged bearer token.
    ListWithForgedToken,
}

impl AuthCase {
    /// Every case in execution order.
    pub const ALL: [Self; 3] =
        [Self::ListWithoutToken, Self::CreateWithoutToken, Self::ListWithForgedToken];

    /// Returns the report name for the case.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListWithoutToken => "list_without_token",
            Self::CreateWithoutToken => "create_without_token",
            Self::ListWithForgedToken => "list_with_forged_token",
        }
    }
}

// ============================================================================
// SECTION: Prober
// ============================================================================

/// Runs the auth-enforcement cases.
pub struct AuthEnforcementProber<'a> {
    /// Remote API access.
    transport: &'a dyn Transport,
    /// Run credential, used only to remove a wrongly created user.
    cleanup_authorization: AuthorizationHeader,
    /// Endpoint paths.
    paths: &'a ResourcePaths,
    /// Payload key convention.
    dialect: FieldDialect,
    /// Run-unique suffix for the create payload.
    suffix: u128,
}

impl<'a> AuthEnforcementProber<'a> {
    /// Creates a prober; `credential` is never attached to a case request.
    #[must_use]
    pub fn new(
        transport: &'a dyn Transport,
        credential: &Credential,
        paths: &'a ResourcePaths,
        dialect: FieldDialect,
        suffix: u128,
    ) -> Self {
        Self {
            transport,
            cleanup_authorization: credential.authorization_header(),
            paths,
            dialect,
            suffix,
        }
    }

    /// Builds the request for `case`.
    #[must_use]
    pub fn request(&self, case: AuthCase) -> ApiRequest {
        match case {
            AuthCase::ListWithoutToken => ApiRequest::get(&self.paths.users),
            AuthCase::CreateWithoutToken => {
                let template = UserTemplate {
                    email: format!("no-auth{}@example.com", self.suffix),
                    ..UserTemplate::unique(self.suffix)
                };
                ApiRequest::post(&self.paths.users, template.payload(self.dialect))
            }
            AuthCase::ListWithForgedToken => ApiRequest::get(&self.paths.users)
                .authorized(&AuthorizationHeader::bearer(FORGED_TOKEN)),
        }
    }

    /// Runs every case and returns one outcome per case.
    pub async fn run(&self) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::with_capacity(AuthCase::ALL.len());
        for case in AuthCase::ALL {
            let name = case.as_str();
            let outcome = match self.transport.send(self.request(case)).await {
                Ok(response) if REFUSAL_STATUSES.contains(&response.status) => {
                    info!(case = name, status = response.status, "auth case passed");
                    CheckOutcome::passed(CheckGroup::AuthEnforcement, name)
                }
                Ok(response) => {
                    warn!(case = name, status = response.status, "auth case failed");
                    if case == AuthCase::CreateWithoutToken && response.is_success() {
                        delete_created_user(
                            self.transport,
                            self.paths,
                            &self.cleanup_authorization,
                            name,
                            &response,
                        )
                        .await;
                    }
                    let detail = if response.is_success() {
                        "request without a valid credential was accepted"
                    } else {
                        "request refused with an unexpected status"
                    };
                    CheckOutcome::failed(
                        CheckGroup::AuthEnforcement,
                        name,
                        Some(status_set(REFUSAL_STATUSES)),
                        Some(response.status.to_string()),
                        detail,
                    )
                }
                Err(err) => {
                    warn!(case = name, error = %err, "auth case failed");
                    CheckOutcome::failed(
                        CheckGroup::AuthEnforcement,
                        name,
                        Some(status_set(REFUSAL_STATUSES)),
                        None,
                        err.to_string(),
                    )
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}
