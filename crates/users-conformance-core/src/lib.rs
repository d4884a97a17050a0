// crates/users-conformance-core/src/lib.rs
// ============================================================================
// Module: Users Conformance Core Library
// Description: Public API surface for the users API conformance harness.
// Purpose: Expose the normalizer, transport seam, probers, and suite runner.
// Dependencies: crate::{normalize, transport, session, lifecycle, validation, auth_probe, rate_limit, suite, report}
// ============================================================================

//! ## Overview
//! `users-conformance-core` verifies that a remote users REST API honours its
//! contract: the full create/read/update/delete lifecycle, rejection of
//! incomplete payloads, refusal of unauthenticated access, and throttling of
//! request bursts. Every remote call goes through the [`Transport`] seam, so
//! the checks run unchanged against a live API or an in-process stub.
//!
//! Security posture: response bodies are untrusted and size-limited; the
//! admin password and bearer token never appear in logs or debug output.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth_probe;
pub mod lifecycle;
pub mod normalize;
pub mod rate_limit;
pub mod record;
pub mod report;
pub mod session;
pub mod suite;
pub mod transport;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth_probe::AuthCase;
pub use auth_probe::AuthEnforcementProber;
pub use lifecycle::LifecycleError;
pub use lifecycle::LifecycleFailure;
pub use lifecycle::LifecycleOrchestrator;
pub use lifecycle::LifecycleStep;
pub use lifecycle::ScenarioPhase;
pub use lifecycle::ScenarioState;
pub use normalize::NormalizationError;
pub use normalize::NormalizedField;
pub use normalize::count_email;
pub use normalize::list_entries;
pub use normalize::normalize_list;
pub use normalize::normalize_user;
pub use rate_limit::ProbeResult;
pub use rate_limit::RateLimitExpectation;
pub use rate_limit::RateLimitOptions;
pub use rate_limit::RateLimitProber;
pub use record::FieldDialect;
pub use record::UserField;
pub use record::UserRecord;
pub use record::UserTemplate;
pub use report::CheckGroup;
pub use report::CheckOutcome;
pub use report::CheckStatus;
pub use report::ReportError;
pub use report::SuiteReport;
pub use session::AuthenticationError;
pub use session::Credential;
pub use session::LoginCredentials;
pub use session::SessionManager;
pub use suite::ConformanceSuite;
pub use suite::SuiteError;
pub use suite::SuiteOptions;
pub use suite::SuiteSelection;
pub use transport::ApiRequest;
pub use transport::AuthorizationHeader;
pub use transport::HttpTransport;
pub use transport::HttpTransportConfig;
pub use transport::RawResponse;
pub use transport::ResourcePaths;
pub use transport::Transport;
pub use transport::TransportError;
pub use validation::ValidationCase;
pub use validation::ValidationExpectationError;
pub use validation::ValidationProber;
