// crates/users-conformance-core/src/report.rs
// ============================================================================
// Module: Suite Report
// Description: Per-check outcomes and the aggregate run report.
// Purpose: Make every failure diagnosable: step, expected, observed, histogram.
// Dependencies: serde, serde_jcs, thiserror
// ============================================================================

//! ## Overview
//! Every check produces one [`CheckOutcome`]. Failures are recorded rather
//! than propagated, so a failing check never hides the checks after it. The
//! [`SuiteReport`] aggregates outcomes, carries the rate-limit histogram, and
//! decides whether the run passed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use serde::Serialize;
use thiserror::Error;

use crate::rate_limit::ProbeResult;

// ============================================================================
// SECTION: Outcome Types
// ============================================================================

/// Group a check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckGroup {
    /// Create / list / read / update / delete scenario.
    Lifecycle,
    /// Missing-field rejection matrix.
    Validation,
    /// Requests without a valid credential.
    AuthEnforcement,
    /// Concurrent burst throttling probe.
    RateLimit,
}

impl CheckGroup {
    /// Returns the stable label for the group.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lifecycle => "lifecycle",
            Self::Validation => "validation",
            Self::AuthEnforcement => "auth_enforcement",
            Self::RateLimit => "rate_limit",
        }
    }
}

/// Result of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The check's assertion held.
    Passed,
    /// The check's assertion broke.
    Failed,
    /// The check could not run because a prerequisite failed.
    Skipped,
}

/// Outcome of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    /// Group the check belongs to.
    pub group: CheckGroup,
    /// Step or case name.
    pub name: String,
    /// Check result.
    pub status: CheckStatus,
    /// Expected value, usually a status set.
    pub expected: Option<String>,
    /// Observed value.
    pub observed: Option<String>,
    /// Free-form failure or skip reason.
    pub detail: Option<String>,
}

impl CheckOutcome {
    /// Records a passing check.
    #[must_use]
    pub fn passed(group: CheckGroup, name: impl Into<String>) -> Self {
        Self {
            group,
            name: name.into(),
            status: CheckStatus::Passed,
            expected: None,
            observed: None,
            detail: None,
        }
    }

    /// Records a failing check.
    #[must_use]
    pub fn failed(
        group: CheckGroup,
        name: impl Into<String>,
        expected: Option<String>,
        observed: Option<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            group,
            name: name.into(),
            status: CheckStatus::Failed,
            expected,
            observed,
            detail: Some(detail.into()),
        }
    }

    /// Records a check that did not run.
    #[must_use]
    pub fn skipped(group: CheckGroup, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            group,
            name: name.into(),
            status: CheckStatus::Skipped,
            expected: None,
            observed: None,
            detail: Some(reason.into()),
        }
    }

    /// Returns true when the check failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == CheckStatus::Failed
    }
}

/// Formats a status set such as `200|201`.
#[must_use]
pub fn status_set(statuses: &[u16]) -> String {
    statuses.iter().map(u16::to_string).collect::<Vec<_>>().join("|")
}

// ============================================================================
// SECTION: Suite Report
// ============================================================================

/// Report serialization failure.
#[derive(Debug, Error)]
#[error("report serialization failed: {0}")]
pub struct ReportError(String);

/// Outcome tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    /// Passing checks.
    pub passed: usize,
    /// Failing checks.
    pub failed: usize,
    /// Skipped checks.
    pub skipped: usize,
}

/// Aggregate report for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    /// Base URL the run targeted.
    pub target: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Check outcomes in execution order.
    pub checks: Vec<CheckOutcome>,
    /// Rate-limit histogram, when the probe ran.
    pub rate_limit: Option<ProbeResult>,
}

impl SuiteReport {
    /// Creates an empty report for `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Appends outcomes in order.
    pub fn extend(&mut self, outcomes: impl IntoIterator<Item = CheckOutcome>) {
        self.checks.extend(outcomes);
    }

    /// Returns the outcome tallies.
    #[must_use]
    pub fn totals(&self) -> ReportTotals {
        self.checks.iter().fold(ReportTotals::default(), |mut totals, check| {
            match check.status {
                CheckStatus::Passed => totals.passed += 1,
                CheckStatus::Failed => totals.failed += 1,
                CheckStatus::Skipped => totals.skipped += 1,
            }
            totals
        })
    }

    /// Returns true when no check failed.
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.checks.iter().any(CheckOutcome::is_failure)
    }

    /// Returns the failing checks.
    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|check| check.is_failure())
    }

    /// Renders a human-readable report.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "users conformance report for {}", self.target);
        for check in &self.checks {
            let label = match check.status {
                CheckStatus::Passed => "PASS",
                CheckStatus::Failed => "FAIL",
                CheckStatus::Skipped => "SKIP",
            };
            let _ = write!(out, "  [{label}] {}/{}", check.group.as_str(), check.name);
            if let Some(expected) = &check.expected {
                let _ = write!(out, " expected {expected}");
            }
            if let Some(observed) = &check.observed {
                let _ = write!(out, " observed {observed}");
            }
            if let Some(detail) = &check.detail {
                let _ = write!(out, ": {detail}");
            }
            out.push('\n');
        }
        if let Some(probe) = &self.rate_limit {
            let _ = writeln!(
                out,
                "rate limit burst of {}: {}",
                probe.burst_size,
                probe.histogram_summary()
            );
        }
        let totals = self.totals();
        let _ = writeln!(
            out,
            "summary: {} passed, {} failed, {} skipped in {} ms",
            totals.passed, totals.failed, totals.skipped, self.duration_ms
        );
        out
    }

    /// Serializes the report as canonical JSON (RFC 8785).
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when serialization fails.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, ReportError> {
        #[derive(Serialize)]
        struct Envelope<'a> {
            report: &'a SuiteReport,
            totals: ReportTotals,
            passed: bool,
        }
        serde_jcs::to_vec(&Envelope {
            report: self,
            totals: self.totals(),
            passed: self.passed(),
        })
        .map_err(|err| ReportError(err.to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
