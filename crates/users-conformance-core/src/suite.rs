// crates/users-conformance-core/src/suite.rs
// ============================================================================
// Module: Conformance Suite
// Description: One authenticated run over every selected check group.
// Purpose: Sequence the probers and fold their outcomes into a report.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! A run authenticates once, then executes the selected groups in a fixed
//! order: lifecycle, validation, auth enforcement, rate limit. Only
//! authentication failure aborts the run; every other failure is recorded in
//! the [`SuiteReport`] and the run continues. The rate-limit burst runs last
//! so throttling it provokes cannot disturb the other groups.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::auth_probe::AuthEnforcementProber;
use crate::lifecycle::LifecycleOrchestrator;
use crate::lifecycle::ScenarioState;
use crate::rate_limit::RateLimitOptions;
use crate::rate_limit::RateLimitProber;
use crate::record::FieldDialect;
use crate::record::UserTemplate;
use crate::report::CheckGroup;
use crate::report::SuiteReport;
use crate::session::AuthenticationError;
use crate::session::LoginCredentials;
use crate::session::SessionManager;
use crate::transport::ResourcePaths;
use crate::transport::Transport;
use crate::validation::ValidationProber;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Default marker appended to the name on update.
pub const DEFAULT_UPDATE_MARKER: &str = "Atualizado";

/// Check groups a run executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteSelection {
    /// Groups left out of the run.
    skipped: BTreeSet<CheckGroup>,
}

impl Default for SuiteSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl SuiteSelection {
    /// Selects every group.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            skipped: BTreeSet::new(),
        }
    }

    /// Leaves `group` out of the run.
    #[must_use]
    pub fn without(mut self, group: CheckGroup) -> Self {
        self.skipped.insert(group);
        self
    }

    /// Returns true when `group` runs.
    #[must_use]
    pub fn includes(&self, group: CheckGroup) -> bool {
        !self.skipped.contains(&group)
    }
}

/// Everything a run needs besides the transport.
#[derive(Debug, Clone)]
pub struct SuiteOptions {
    /// Base URL, recorded in the report.
    pub target: String,
    /// Endpoint paths.
    pub paths: ResourcePaths,
    /// Admin login.
    pub credentials: LoginCredentials,
    /// Payload key convention.
    pub dialect: FieldDialect,
    /// Marker appended to the name on update.
    pub update_marker: String,
    /// Burst settings; `None` disables the rate-limit group.
    pub rate_limit: Option<RateLimitOptions>,
    /// Deadline applied to each burst request.
    pub request_timeout: Duration,
    /// Groups to run.
    pub selection: SuiteSelection,
    /// Run-unique suffix for created users, usually a millisecond timestamp.
    pub run_suffix: u128,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure that aborts a run before any check executes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuiteError {
    /// The admin login failed.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthenticationError),
}

// ============================================================================
// SECTION: Suite
// ============================================================================

/// Runs the conformance checks against one API.
pub struct ConformanceSuite {
    /// Remote API access.
    transport: Arc<dyn Transport>,
    /// Run settings.
    options: SuiteOptions,
}

impl ConformanceSuite {
    /// Creates a suite over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, options: SuiteOptions) -> Self {
        Self {
            transport,
            options,
        }
    }

    /// Returns the run settings.
    #[must_use]
    pub const fn options(&self) -> &SuiteOptions {
        &self.options
    }

    /// Authenticates and runs every selected group.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::Authentication`] when the admin login fails; no
    /// check runs in that case.
    pub async fn run(&self) -> Result<SuiteReport, SuiteError> {
        let started = Instant::now();
        let options = &self.options;
        let transport = self.transport.as_ref();
        let session = SessionManager::new(&options.paths.login);
        let credential = session.authenticate(transport, &options.credentials).await?;

        let mut report = SuiteReport::new(&options.target);
        let selection = &options.selection;

        if selection.includes(CheckGroup::Lifecycle) {
            info!("running lifecycle scenario");
            let mut state = ScenarioState::new(UserTemplate::unique(options.run_suffix));
            let orchestrator = LifecycleOrchestrator::new(
                transport,
                &credential,
                &options.paths,
                options.dialect,
                &options.update_marker,
            );
            report.extend(orchestrator.run(&mut state).await);
        }

        if selection.includes(CheckGroup::Validation) {
            info!("running validation matrix");
            let prober = ValidationProber::new(
                transport,
                &credential,
                &options.paths,
                options.dialect,
                options.run_suffix,
            );
            report.extend(prober.run().await);
        }

        if selection.includes(CheckGroup::AuthEnforcement) {
            info!("running auth-enforcement cases");
            let prober = AuthEnforcementProber::new(
                transport,
                &credential,
                &options.paths,
                options.dialect,
                options.run_suffix,
            );
            report.extend(prober.run().await);
        }

        let rate_limit = options.rate_limit.filter(|_| selection.includes(CheckGroup::RateLimit));
        if let Some(rate_limit) = rate_limit {
            let prober = RateLimitProber::new(Arc::clone(&self.transport), options.request_timeout);
            let probe = prober
                .probe(
                    &options.paths.users,
                    &credential.authorization_header(),
                    rate_limit.burst_size(),
                )
                .await;
            report.extend([rate_limit.expectation().evaluate(&probe)]);
            report.rate_limit = Some(probe);
        }

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let totals = report.totals();
        if report.passed() {
            info!(passed = totals.passed, skipped = totals.skipped, "conformance run passed");
        } else {
            warn!(
                passed = totals.passed,
                failed = totals.failed,
                skipped = totals.skipped,
                "conformance run failed"
            );
        }
        Ok(report)
    }
}
