// crates/users-conformance-core/src/lifecycle.rs
// ============================================================================
// Module: Lifecycle Orchestrator
// Description: Ordered create/list/read/update/delete scenario over one user.
// Purpose: Verify that every lifecycle transition leaves the remote state as expected.
// Dependencies: serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! The orchestrator drives one [`ScenarioState`] through
//! `INIT -> CREATED -> LISTED -> READ -> UPDATED -> DELETED -> VERIFIED_GONE`.
//! Steps run strictly in sequence because later steps depend on the
//! identifier produced by create.
//!
//! A failed create is terminal: every later step is reported as skipped. Any
//! other failure is recorded against its step and the scenario continues, so
//! one broken assertion never hides the outcome of the steps after it. No
//! rollback is attempted; re-running the suite with a fresh template is the
//! remediation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::normalize::NormalizationError;
use crate::normalize::NormalizedField;
use crate::normalize::count_email;
use crate::normalize::extract_id;
use crate::normalize::extract_name;
use crate::normalize::normalize_user;
use crate::normalize::unwrap_user;
use crate::record::FieldDialect;
use crate::record::UserRecord;
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

/// Statuses accepted from create.
pub const CREATE_STATUSES: &[u16] = &[200, 201];
/// Statuses accepted from list and read.
pub const READ_STATUSES: &[u16] = &[200];
/// Statuses accepted from update and delete.
pub const MUTATION_STATUSES: &[u16] = &[200, 204];
/// Statuses accepted when reading a deleted user.
pub const GONE_STATUSES: &[u16] = &[400, 404, 410];

// ============================================================================
// SECTION: Steps and Phases
// ============================================================================

/// Named scenario step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStep {
    /// INIT -> CREATED.
    Create,
    /// CREATED -> LISTED.
    List,
    /// LISTED -> READ.
    Read,
    /// READ -> UPDATED.
    Update,
    /// UPDATED -> DELETED.
    Delete,
    /// DELETED -> VERIFIED_GONE.
    VerifyDelete,
}

impl LifecycleStep {
    /// Every step in execution order.
    pub const ORDER: [Self; 6] =
        [Self::Create, Self::List, Self::Read, Self::Update, Self::Delete, Self::VerifyDelete];

    /// Returns the stable label for the step.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::VerifyDelete => "verify_delete",
        }
    }

    /// Returns the phase reached when the step succeeds.
    #[must_use]
    pub const fn target_phase(self) -> ScenarioPhase {
        match self {
            Self::Create => ScenarioPhase::Created,
            Self::List => ScenarioPhase::Listed,
            Self::Read => ScenarioPhase::Read,
            Self::Update => ScenarioPhase::Updated,
            Self::Delete => ScenarioPhase::Deleted,
            Self::VerifyDelete => ScenarioPhase::VerifiedGone,
        }
    }
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Furthest lifecycle phase a scenario has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPhase {
    /// Nothing has been sent yet.
    #[default]
    Init,
    /// The user exists remotely.
    Created,
    /// The user was found exactly once in the listing.
    Listed,
    /// The user was read back by id.
    Read,
    /// The update was confirmed by a follow-up read.
    Updated,
    /// The delete was accepted.
    Deleted,
    /// The user is no longer readable or listed.
    VerifiedGone,
}

/// Mutable state threaded through one scenario run.
///
/// # Invariants
/// - `phase` only moves forward.
/// - `created_user_id` is set exactly when create succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioState {
    /// User the scenario creates.
    template: UserTemplate,
    /// Identifier returned by create.
    created_user_id: Option<String>,
    /// Furthest phase reached.
    phase: ScenarioPhase,
    /// Last step entered; steps may be entered once each, in order.
    cursor: Option<LifecycleStep>,
}

impl ScenarioState {
    /// Starts a scenario for `template`.
    #[must_use]
    pub const fn new(template: UserTemplate) -> Self {
        Self {
            template,
            created_user_id: None,
            phase: ScenarioPhase::Init,
            cursor: None,
        }
    }

    /// Returns the template user.
    #[must_use]
    pub const fn template(&self) -> &UserTemplate {
        &self.template
    }

    /// Returns the identifier assigned by create, if it succeeded.
    #[must_use]
    pub fn created_user_id(&self) -> Option<&str> {
        self.created_user_id.as_deref()
    }

    /// Returns the furthest phase reached.
    #[must_use]
    pub const fn phase(&self) -> ScenarioPhase {
        self.phase
    }

    /// Marks `step` as entered.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFailure::OutOfOrder`] when `step` is not the next
    /// step of the scenario.
    fn enter(&mut self, step: LifecycleStep) -> Result<(), LifecycleError> {
        let expected = match self.cursor {
            None => Some(LifecycleStep::Create),
            Some(current) => LifecycleStep::ORDER
                .iter()
                .position(|candidate| *candidate == current)
                .and_then(|index| LifecycleStep::ORDER.get(index + 1).copied()),
        };
        if expected != Some(step) {
            return Err(LifecycleError::new(step, LifecycleFailure::OutOfOrder {
                previous: self.cursor,
            }));
        }
        self.cursor = Some(step);
        Ok(())
    }

    /// Records that `step` succeeded.
    fn complete(&mut self, step: LifecycleStep) {
        self.phase = self.phase.max(step.target_phase());
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reason a lifecycle step failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleFailure {
    /// The response status was outside the accepted set.
    #[error("unexpected status {observed}, expected {}", status_set(.expected))]
    UnexpectedStatus {
        /// Accepted statuses.
        expected: &'static [u16],
        /// Observed status.
        observed: u16,
    },
    /// The request never produced a status.
    #[error(transparent)]
    Transport(TransportError),
    /// The response matched none of the tolerated shapes.
    #[error(transparent)]
    Normalization(NormalizationError),
    /// A field read back differs from what was written.
    #[error("{field} mismatch: expected {expected:?}, observed {observed:?}")]
    Mismatch {
        /// Field label.
        field: &'static str,
        /// Value written.
        expected: String,
        /// Value read back.
        observed: String,
    },
    /// The listing held the template email the wrong number of times.
    #[error("listing contains the user {observed} time(s), expected {expected}")]
    EmailCount {
        /// Expected occurrences.
        expected: usize,
        /// Observed occurrences.
        observed: usize,
    },
    /// A deleted user was still readable.
    #[error("still exists (status {status})")]
    StillExists {
        /// Observed success status.
        status: u16,
    },
    /// A step was entered twice or before its predecessor.
    #[error("step entered out of order (previous step: {})", .previous.map_or("none", LifecycleStep::as_str))]
    OutOfOrder {
        /// Step entered before this one.
        previous: Option<LifecycleStep>,
    },
}

/// A scenario invariant broke at a named step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lifecycle step `{step}` failed: {kind}")]
pub struct LifecycleError {
    /// Step that failed.
    pub step: LifecycleStep,
    /// Failure reason.
    pub kind: LifecycleFailure,
}

impl LifecycleError {
    /// Creates an error for `step`.
    #[must_use]
    pub const fn new(step: LifecycleStep, kind: LifecycleFailure) -> Self {
        Self {
            step,
            kind,
        }
    }

    /// Returns the expected value for reporting.
    #[must_use]
    pub fn expected(&self) -> Option<String> {
        match &self.kind {
            LifecycleFailure::UnexpectedStatus {
                expected, ..
            } => Some(status_set(expected)),
            LifecycleFailure::Mismatch {
                expected, ..
            } => Some(expected.clone()),
            LifecycleFailure::EmailCount {
                expected, ..
            } => Some(expected.to_string()),
            LifecycleFailure::StillExists {
                ..
            } => Some(status_set(GONE_STATUSES)),
            LifecycleFailure::Transport(_)
            | LifecycleFailure::Normalization(_)
            | LifecycleFailure::OutOfOrder {
                ..
            } => None,
        }
    }

    /// Returns the observed value for reporting.
    #[must_use]
    pub fn observed(&self) -> Option<String> {
        match &self.kind {
            LifecycleFailure::UnexpectedStatus {
                observed, ..
            } => Some(observed.to_string()),
            LifecycleFailure::Mismatch {
                observed, ..
            } => Some(observed.clone()),
            LifecycleFailure::EmailCount {
                observed, ..
            } => Some(observed.to_string()),
            LifecycleFailure::StillExists {
                status,
            } => Some(status.to_string()),
            LifecycleFailure::Transport(_)
            | LifecycleFailure::Normalization(_)
            | LifecycleFailure::OutOfOrder {
                ..
            } => None,
        }
    }

    /// Converts the error into a failed check outcome.
    #[must_use]
    pub fn into_outcome(self) -> CheckOutcome {
        CheckOutcome::failed(
            CheckGroup::Lifecycle,
            self.step.as_str(),
            self.expected(),
            self.observed(),
            self.kind.to_string(),
        )
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Drives the lifecycle scenario against the remote API.
pub struct LifecycleOrchestrator<'a> {
    /// Remote API access.
    transport: &'a dyn Transport,
    /// Header attached to every request.
    authorization: AuthorizationHeader,
    /// Endpoint paths.
    paths: &'a ResourcePaths,
    /// Payload key convention.
    dialect: FieldDialect,
    /// Marker appended to the name on update.
    update_marker: &'a str,
}

impl<'a> LifecycleOrchestrator<'a> {
    /// Creates an orchestrator authorized by `credential`.
    #[must_use]
    pub fn new(
        transport: &'a dyn Transport,
        credential: &Credential,
        paths: &'a ResourcePaths,
        dialect: FieldDialect,
        update_marker: &'a str,
    ) -> Self {
        Self {
            transport,
            authorization: credential.authorization_header(),
            paths,
            dialect,
            update_marker,
        }
    }

    /// Runs every step in order and returns one outcome per step.
    ///
    /// A failed create skips the remaining steps; other failures are
    /// recorded and the scenario continues.
    pub async fn run(&self, state: &mut ScenarioState) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::with_capacity(LifecycleStep::ORDER.len());
        for step in LifecycleStep::ORDER {
            if step != LifecycleStep::Create && state.created_user_id.is_none() {
                outcomes.push(CheckOutcome::skipped(
                    CheckGroup::Lifecycle,
                    step.as_str(),
                    "create did not produce a user",
                ));
                continue;
            }
            let result = match state.enter(step) {
                Ok(()) => self.execute(step, state).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => {
                    state.complete(step);
                    info!(step = step.as_str(), "lifecycle step passed");
                    outcomes.push(CheckOutcome::passed(CheckGroup::Lifecycle, step.as_str()));
                }
                Err(err) => {
                    warn!(step = step.as_str(), error = %err, "lifecycle step failed");
                    outcomes.push(err.into_outcome());
                }
            }
        }
        outcomes
    }

    /// Dispatches one step.
    async fn execute(
        &self,
        step: LifecycleStep,
        state: &mut ScenarioState,
    ) -> Result<(), LifecycleError> {
        match step {
            LifecycleStep::Create => {
                let id = self.create(state.template()).await?;
                state.created_user_id = Some(id);
                Ok(())
            }
            LifecycleStep::List => self.list(state.template()).await,
            LifecycleStep::Read => self.read(state).await,
            LifecycleStep::Update => self.update(state).await,
            LifecycleStep::Delete => self.delete(state).await,
            LifecycleStep::VerifyDelete => self.verify_delete(state).await,
        }
    }

    /// Submits the template and returns the assigned identifier.
    async fn create(&self, template: &UserTemplate) -> Result<String, LifecycleError> {
        let step = LifecycleStep::Create;
        let request = ApiRequest::post(&self.paths.users, template.payload(self.dialect));
        let response = self.send(step, request).await?;
        expect_status(step, &response, CREATE_STATUSES)?;
        let body = response.json();
        extract_id(unwrap_user(body)).or_else(|| extract_id(body)).ok_or_else(|| {
            LifecycleError::new(
                step,
                LifecycleFailure::Normalization(NormalizationError::missing(NormalizedField::Id)),
            )
        })
    }

    /// Asserts the template email is listed exactly once.
    async fn list(&self, template: &UserTemplate) -> Result<(), LifecycleError> {
        self.expect_listed(LifecycleStep::List, &template.email, 1).await
    }

    /// Reads the user back and compares it with the template.
    async fn read(&self, state: &ScenarioState) -> Result<(), LifecycleError> {
        let step = LifecycleStep::Read;
        let record = self.fetch(step, state).await?;
        let template = state.template();
        expect_field(step, "name", &template.name, &record.name)?;
        expect_field(step, "email", &template.email, &record.email)
    }

    /// Renames the user and confirms the change with a follow-up read.
    async fn update(&self, state: &ScenarioState) -> Result<(), LifecycleError> {
        let step = LifecycleStep::Update;
        let updated = state.template().with_name_marker(self.update_marker);
        let id = created_id(step, state)?;
        let request = ApiRequest::put(self.paths.user(id), updated.payload(self.dialect));
        let response = self.send(step, request).await?;
        expect_status(step, &response, MUTATION_STATUSES)?;
        if let Some(echoed) = extract_name(unwrap_user(response.json())) {
            expect_field(step, "name", &updated.name, &echoed)?;
        }
        let record = self.fetch(step, state).await?;
        if record.name.contains(&updated.name) {
            Ok(())
        } else {
            Err(LifecycleError::new(step, LifecycleFailure::Mismatch {
                field: "name",
                expected: updated.name,
                observed: record.name,
            }))
        }
    }

    /// Deletes the user.
    async fn delete(&self, state: &ScenarioState) -> Result<(), LifecycleError> {
        let step = LifecycleStep::Delete;
        let id = created_id(step, state)?;
        let response = self.send(step, ApiRequest::delete(self.paths.user(id))).await?;
        expect_status(step, &response, MUTATION_STATUSES)
    }

    /// Confirms the user is neither readable nor listed.
    async fn verify_delete(&self, state: &ScenarioState) -> Result<(), LifecycleError> {
        let step = LifecycleStep::VerifyDelete;
        let id = created_id(step, state)?;
        let response = self.send(step, ApiRequest::get(self.paths.user(id))).await?;
        if response.is_success() {
            return Err(LifecycleError::new(step, LifecycleFailure::StillExists {
                status: response.status,
            }));
        }
        expect_status(step, &response, GONE_STATUSES)?;
        self.expect_listed(step, &state.template().email, 0).await
    }

    /// Reads the created user by id and normalizes it.
    async fn fetch(
        &self,
        step: LifecycleStep,
        state: &ScenarioState,
    ) -> Result<UserRecord, LifecycleError> {
        let id = created_id(step, state)?;
        let response = self.send(step, ApiRequest::get(self.paths.user(id))).await?;
        expect_status(step, &response, READ_STATUSES)?;
        normalize_user(response.json())
            .map_err(|err| LifecycleError::new(step, LifecycleFailure::Normalization(err)))
    }

    /// Asserts the listing holds `email` exactly `expected` times.
    async fn expect_listed(
        &self,
        step: LifecycleStep,
        email: &str,
        expected: usize,
    ) -> Result<(), LifecycleError> {
        let response = self.send(step, ApiRequest::get(&self.paths.users)).await?;
        expect_status(step, &response, READ_STATUSES)?;
        let observed = count_email(response.json(), email)
            .map_err(|err| LifecycleError::new(step, LifecycleFailure::Normalization(err)))?;
        if observed == expected {
            Ok(())
        } else {
            Err(LifecycleError::new(step, LifecycleFailure::EmailCount {
                expected,
                observed,
            }))
        }
    }

    /// Sends an authorized request, attributing transport failures to `step`.
    async fn send(
        &self,
        step: LifecycleStep,
        request: ApiRequest,
    ) -> Result<RawResponse, LifecycleError> {
        self.transport
            .send(request.authorized(&self.authorization))
            .await
            .map_err(|err| LifecycleError::new(step, LifecycleFailure::Transport(err)))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the created identifier or an ordering failure.
fn created_id(step: LifecycleStep, state: &ScenarioState) -> Result<&str, LifecycleError> {
    state.created_user_id().ok_or(LifecycleError::new(step, LifecycleFailure::OutOfOrder {
        previous: state.cursor,
    }))
}

/// Fails unless the response status is in `expected`.
fn expect_status(
    step: LifecycleStep,
    response: &RawResponse,
    expected: &'static [u16],
) -> Result<(), LifecycleError> {
    if expected.contains(&response.status) {
        Ok(())
    } else {
        Err(LifecycleError::new(step, LifecycleFailure::UnexpectedStatus {
            expected,
            observed: response.status,
        }))
    }
}

/// Fails unless `observed` equals `expected`.
fn expect_field(
    step: LifecycleStep,
    field: &'static str,
    expected: &str,
    observed: &str,
) -> Result<(), LifecycleError> {
    if expected == observed {
        Ok(())
    } else {
        Err(LifecycleError::new(step, LifecycleFailure::Mismatch {
            field,
            expected: expected.to_string(),
            observed: observed.to_string(),
        }))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
