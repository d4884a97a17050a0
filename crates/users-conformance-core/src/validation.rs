// crates/users-conformance-core/src/validation.rs
// ============================================================================
// Module: Validation Prober
// Description: Missing-field rejection matrix for user creation.
// Purpose: Confirm the API rejects every incomplete payload with a client error.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! For each required field the prober submits a payload carrying every other
//! field and expects a client-error status. A control case submits the
//! complete payload and expects creation to succeed. Cases are independent:
//! every case runs and is reported on its own.
//!
//! Users created along the way (the control user, or a user the API wrongly
//! accepted) are deleted best-effort; a failed cleanup is logged, not
//! reported.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::normalize::extract_id;
use crate::normalize::unwrap_user;
use crate::record::FieldDialect;
use crate::record::UserField;
use crate::record::UserTemplate;
use crate::report::CheckGroup;
use crate::report::CheckOutcome;
use crate::report::status_set;
use crate::session::Credential;
use crate::transport::ApiRequest;
use crate::transport::AuthorizationHeader;
use crate::transport::RawResponse;
use crate::transport::ResourcePaths;
use crate::transport::Transport;
use crate::transport::TransportError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Statuses accepted for an incomplete payload.
pub const REJECTION_STATUSES: &[u16] = &[400, 422];
/// Statuses accepted for the complete control payload.
pub const CONTROL_STATUSES: &[u16] = &[200, 201];
/// Case name of the complete-payload control.
pub const CONTROL_CASE: &str = "complete_payload";

// ============================================================================
// SECTION: Cases
// ============================================================================

/// One validation case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCase {
    /// Payload with `field` left out.
    Missing(UserField),
    /// Complete payload.
    Control,
}

impl ValidationCase {
    /// Every case in execution order.
    #[must_use]
    pub fn all() -> Vec<Self> {
        UserField::ALL.into_iter().map(Self::Missing).chain([Self::Control]).collect()
    }

    /// Returns the report name for the case.
    #[must_use]
    pub fn name(self) -> String {
        match self {
            Self::Missing(field) => format!("missing_{}", field.as_str()),
            Self::Control => CONTROL_CASE.to_string(),
        }
    }

    /// Returns the statuses the case accepts.
    #[must_use]
    pub const fn expected_statuses(self) -> &'static [u16] {
        match self {
            Self::Missing(_) => REJECTION_STATUSES,
            Self::Control => CONTROL_STATUSES,
        }
    }

    /// Builds the template for the case, unique to `suffix`.
    #[must_use]
    pub fn template(self, suffix: u128) -> UserTemplate {
        let label = match self {
            Self::Missing(field) => field.as_str().replace('_', "-"),
            Self::Control => "complete".to_string(),
        };
        UserTemplate {
            name: format!("Teste Validação {label} {suffix}"),
            email: format!("no-{label}{suffix}@example.com"),
            ..UserTemplate::unique(suffix)
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// The API's answer to a validation case broke the expectation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationExpectationError {
    /// An incomplete payload was accepted.
    #[error("incomplete payload accepted with status {status}")]
    Accepted {
        /// Observed success status.
        status: u16,
    },
    /// The status was outside the accepted set.
    #[error("unexpected status {observed}, expected {}", status_set(.expected))]
    WrongStatus {
        /// Accepted statuses.
        expected: &'static [u16],
        /// Observed status.
        observed: u16,
    },
    /// The request never produced a status.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ValidationExpectationError {
    /// Returns the observed status, when one was received.
    #[must_use]
    pub const fn observed(&self) -> Option<u16> {
        match self {
            Self::Accepted {
                status,
            } => Some(*status),
            Self::WrongStatus {
                observed, ..
            } => Some(*observed),
            Self::Transport(_) => None,
        }
    }
}

/// Checks a case's response status.
///
/// # Errors
///
/// Returns [`ValidationExpectationError`] when an incomplete payload was
/// accepted or the status falls outside the case's accepted set.
pub fn evaluate(case: ValidationCase, response: &RawResponse) -> Result<(), ValidationExpectationError> {
    if matches!(case, ValidationCase::Missing(_)) && response.is_success() {
        return Err(ValidationExpectationError::Accepted {
            status: response.status,
        });
    }
    let expected = case.expected_statuses();
    if expected.contains(&response.status) {
        Ok(())
    } else {
        Err(ValidationExpectationError::WrongStatus {
            expected,
            observed: response.status,
        })
    }
}

// ============================================================================
// SECTION: Prober
// ============================================================================

/// Runs the missing-field matrix and the control case.
pub struct ValidationProber<'a> {
    /// Remote API access.
    transport: &'a dyn Transport,
    /// Header attached to every request.
    authorization: AuthorizationHeader,
    /// Endpoint paths.
    paths: &'a ResourcePaths,
    /// Payload key convention.
    dialect: FieldDialect,
    /// Run-unique suffix for emails and names.
    suffix: u128,
}

impl<'a> ValidationProber<'a> {
    /// Creates a prober authorized by `credential`.
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
            authorization: credential.authorization_header(),
            paths,
            dialect,
            suffix,
        }
    }

    /// Runs every case and returns one outcome per case.
    pub async fn run(&self) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::new();
        for case in ValidationCase::all() {
            outcomes.push(self.run_case(case).await);
        }
        outcomes
    }

    /// Runs one case.
    async fn run_case(&self, case: ValidationCase) -> CheckOutcome {
        let name = case.name();
        let omitted = match case {
            ValidationCase::Missing(field) => Some(field),
            ValidationCase::Control => None,
        };
        let payload = case.template(self.suffix).payload_without(self.dialect, omitted);
        let request = ApiRequest::post(&self.paths.users, payload).authorized(&self.authorization);
        let result = match self.transport.send(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.cleanup(&name, &response).await;
                }
                evaluate(case, &response)
            }
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(()) => {
                info!(case = %name, "validation case passed");
                CheckOutcome::passed(CheckGroup::Validation, name)
            }
            Err(err) => {
                warn!(case = %name, error = %err, "validation case failed");
                CheckOutcome::failed(
                    CheckGroup::Validation,
                    name,
                    Some(status_set(case.expected_statuses())),
                    err.observed().map(|status| status.to_string()),
                    err.to_string(),
                )
            }
        }
    }

    /// Deletes a user created by a case, ignoring failures.
    async fn cleanup(&self, case: &str, response: &RawResponse) {
        delete_created_user(self.transport, self.paths, &self.authorization, case, response).await;
    }
}

// ============================================================================
// SECTION: Cleanup
// ============================================================================

/// Deletes the user described by a successful create response.
///
/// Best-effort: a missing identifier or a refused delete is logged at `warn`
/// and otherwise ignored.
pub(crate) async fn delete_created_user(
    transport: &dyn Transport,
    paths: &ResourcePaths,
    authorization: &AuthorizationHeader,
    case: &str,
    response: &RawResponse,
) {
    let body = response.json();
    let Some(id) = extract_id(unwrap_user(body)).or_else(|| extract_id(body)) else {
        warn!(case, "created user has no identifier; skipping cleanup");
        return;
    };
    let request = ApiRequest::delete(paths.user(&id)).authorized(authorization);
    match transport.send(request).await {
        Ok(response) if response.is_success() => debug!(case, "cleanup delete succeeded"),
        Ok(response) => warn!(case, status = response.status, "cleanup delete rejected"),
        Err(err) => warn!(case, error = %err, "cleanup delete failed"),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod validation_tests;
