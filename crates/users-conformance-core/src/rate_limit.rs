// crates/users-conformance-core/src/rate_limit.rs
// ============================================================================
// Module: Rate-Limit Prober
// Description: Concurrent burst against one endpoint with a status histogram.
// Purpose: Detect whether the API throttles a burst that exceeds its threshold.
// Dependencies: serde, tokio, tracing
// ============================================================================

//! ## Overview
//! [`RateLimitProber::probe`] dispatches every request of a burst at once on
//! a [`JoinSet`] and waits for all of them. Each request resolves to a bucket
//! label: its status code, or [`ERR_BUCKET`] for a transport failure, a
//! per-request timeout, or a task that did not complete. One request's
//! failure never aborts the others.
//!
//! The probe is single-shot. [`RateLimitExpectation`] turns the histogram
//! into a check: a burst above the threshold must see at least one `429`,
//! and a burst at the threshold must see none.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::report::CheckGroup;
use crate::report::CheckOutcome;
use crate::transport::ApiRequest;
use crate::transport::AuthorizationHeader;
use crate::transport::Transport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Status code signalling throttling.
pub const THROTTLING_STATUS: u16 = 429;
/// Histogram bucket for requests that produced no status.
pub const ERR_BUCKET: &str = "ERR";
/// Default number of requests the API tolerates per window.
pub const DEFAULT_THRESHOLD: usize = 100;
/// Default number of requests sent beyond the threshold.
pub const DEFAULT_MARGIN: usize = 1;

// ============================================================================
// SECTION: Probe Result
// ============================================================================

/// Status histogram of one burst.
///
/// # Invariants
/// - Bucket counts sum to `burst_size`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    /// Number of requests dispatched.
    pub burst_size: usize,
    /// Occurrences per status code (as a string) or [`ERR_BUCKET`].
    pub histogram: BTreeMap<String, usize>,
}

impl ProbeResult {
    /// Creates an empty result for a burst of `burst_size`.
    #[must_use]
    pub const fn new(burst_size: usize) -> Self {
        Self {
            burst_size,
            histogram: BTreeMap::new(),
        }
    }

    /// Adds one occurrence to `bucket`.
    pub fn record(&mut self, bucket: impl Into<String>) {
        *self.histogram.entry(bucket.into()).or_insert(0) += 1;
    }

    /// Returns the occurrences of `bucket`.
    #[must_use]
    pub fn count(&self, bucket: &str) -> usize {
        self.histogram.get(bucket).copied().unwrap_or(0)
    }

    /// Returns the number of throttled responses.
    #[must_use]
    pub fn throttled(&self) -> usize {
        self.count(&THROTTLING_STATUS.to_string())
    }

    /// Returns true when at least one response was throttled.
    #[must_use]
    pub fn throttling_observed(&self) -> bool {
        self.throttled() > 0
    }

    /// Renders the histogram as `200=100, 429=1`.
    #[must_use]
    pub fn histogram_summary(&self) -> String {
        if self.histogram.is_empty() {
            return "no responses".to_string();
        }
        self.histogram
            .iter()
            .map(|(bucket, count)| format!("{bucket}={count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================================
// SECTION: Prober
// ============================================================================

/// Fires concurrent bursts at one endpoint.
#[derive(Clone)]
pub struct RateLimitProber {
    /// Remote API access shared by every in-flight request.
    transport: Arc<dyn Transport>,
    /// Deadline applied to each request individually.
    request_timeout: Duration,
}

impl RateLimitProber {
    /// Creates a prober with a per-request deadline.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, request_timeout: Duration) -> Self {
        Self {
            transport,
            request_timeout,
        }
    }

    /// Sends `burst_size` concurrent `GET`s to `endpoint` and tallies the
    /// outcomes once every request has resolved.
    pub async fn probe(
        &self,
        endpoint: &str,
        authorization: &AuthorizationHeader,
        burst_size: usize,
    ) -> ProbeResult {
        info!(endpoint, burst_size, "dispatching rate-limit burst");
        let mut joins = JoinSet::new();
        for _ in 0 .. burst_size {
            let transport = Arc::clone(&self.transport);
            let request = ApiRequest::get(endpoint).authorized(authorization);
            let deadline = self.request_timeout;
            joins.spawn(async move {
                match timeout(deadline, transport.send(request)).await {
                    Ok(Ok(response)) => response.status.to_string(),
                    Ok(Err(err)) => {
                        debug!(error = %err, "burst request failed");
                        ERR_BUCKET.to_string()
                    }
                    Err(_) => {
                        debug!("burst request timed out");
                        ERR_BUCKET.to_string()
                    }
                }
            });
        }

        let mut result = ProbeResult::new(burst_size);
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok(bucket) => result.record(bucket),
                Err(err) => {
                    warn!(error = %err, "burst task did not complete");
                    result.record(ERR_BUCKET);
                }
            }
        }
        info!(histogram = %result.histogram_summary(), "rate-limit burst completed");
        result
    }
}

// ============================================================================
// SECTION: Expectations
// ============================================================================

/// Burst sizing and the property it asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOptions {
    /// Requests the API is assumed to tolerate per window.
    pub threshold: usize,
    /// Requests sent beyond the threshold when throttling is expected.
    pub margin: usize,
    /// Whether the burst should be throttled.
    pub expect_throttling: bool,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            margin: DEFAULT_MARGIN,
            expect_throttling: true,
        }
    }
}

impl RateLimitOptions {
    /// Returns the burst size: `threshold + margin` when throttling is
    /// expected, otherwise `threshold`.
    #[must_use]
    pub const fn burst_size(&self) -> usize {
        if self.expect_throttling {
            self.threshold.saturating_add(self.margin)
        } else {
            self.threshold
        }
    }

    /// Returns the property the burst asserts.
    #[must_use]
    pub const fn expectation(&self) -> RateLimitExpectation {
        if self.expect_throttling {
            RateLimitExpectation::Throttled
        } else {
            RateLimitExpectation::Unthrottled
        }
    }
}

/// Property a burst is expected to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitExpectation {
    /// At least one `429` must appear.
    Throttled,
    /// No `429` may appear.
    Unthrottled,
}

impl RateLimitExpectation {
    /// Returns the report name for the check.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Throttled => "burst_above_threshold",
            Self::Unthrottled => "burst_within_threshold",
        }
    }

    /// Evaluates `probe` against the expectation.
    #[must_use]
    pub fn evaluate(self, probe: &ProbeResult) -> CheckOutcome {
        let holds = match self {
            Self::Throttled => probe.throttling_observed(),
            Self::Unthrottled => !probe.throttling_observed(),
        };
        if holds {
            return CheckOutcome::passed(CheckGroup::RateLimit, self.as_str());
        }
        let (expected, detail) = match self {
            Self::Throttled => ("429 >= 1", "no request was throttled"),
            Self::Unthrottled => ("429 = 0", "a burst within the threshold was throttled"),
        };
        CheckOutcome::failed(
            CheckGroup::RateLimit,
            self.as_str(),
            Some(expected.to_string()),
            Some(probe.histogram_summary()),
            detail,
        )
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
