// crates/users-conformance-core/tests/common/mod.rs
// ============================================================================
// Module: Integration Test Helpers
// Description: Shared fixtures for users-conformance-core integration tests.
// Purpose: Provide an in-process users API stub and a scripted transport.
// Dependencies: axum, tokio, users-conformance-core
// ============================================================================

//! ## Overview
//! [`users_stub`] serves a small but faithful users API over HTTP so the real
//! [`users_conformance_core::HttpTransport`] is exercised end to end.
//! [`scripted`] replays canned responses for cases the stub cannot produce,
//! such as transport failures at a precise step.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod scripted;
pub mod users_stub;

use std::sync::Arc;
use std::time::Duration;

use users_conformance_core::FieldDialect;
use users_conformance_core::HttpTransport;
use users_conformance_core::HttpTransportConfig;
use users_conformance_core::LoginCredentials;
use users_conformance_core::ResourcePaths;
use users_conformance_core::SuiteOptions;
use users_conformance_core::SuiteSelection;
use users_conformance_core::Transport;
use users_conformance_core::suite::DEFAULT_UPDATE_MARKER;

/// Admin email accepted by the stub.
pub const ADMIN_EMAIL: &str = "fulano@qa.com";
/// Admin password accepted by the stub.
pub const ADMIN_PASSWORD: &str = "teste";

/// Builds an HTTP transport pointed at `base_url`.
pub fn http_transport(base_url: &str) -> Result<Arc<dyn Transport>, String> {
    let transport = HttpTransport::new(&HttpTransportConfig {
        base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
    })
    .map_err(|err| format!("transport build failed: {err}"))?;
    Ok(Arc::new(transport))
}

/// Returns the admin credentials the stub accepts.
pub fn admin_credentials() -> LoginCredentials {
    LoginCredentials {
        email: ADMIN_EMAIL.to_string(),
        password: ADMIN_PASSWORD.to_string(),
    }
}

/// Returns suite options for a stub serving `users_path`, rate limit disabled.
pub fn suite_options(base_url: &str, users_path: &str, dialect: FieldDialect) -> SuiteOptions {
    SuiteOptions {
        target: base_url.to_string(),
        paths: ResourcePaths {
            login: "/login".to_string(),
            users: users_path.to_string(),
        },
        credentials: admin_credentials(),
        dialect,
        update_marker: DEFAULT_UPDATE_MARKER.to_string(),
        rate_limit: None,
        request_timeout: Duration::from_secs(5),
        selection: SuiteSelection::all(),
        run_suffix: 1_700_000_000_000,
    }
}
