// crates/users-conformance-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic starting point for `users-conformance.toml`.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The example documents every key with its default value. Credentials are
//! left commented out so they can come from `ADMIN_EMAIL` and
//! `ADMIN_PASSWORD` instead of the file.

/// Returns a canonical example `users-conformance.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[api]
base_url = "https://serverest.dev"
login_path = "/login"
users_path = "/usuarios"
request_timeout_ms = 30000

[auth]
# Prefer ADMIN_EMAIL / ADMIN_PASSWORD in the environment.
# admin_email = "fulano@qa.com"
# admin_password = "teste"

[scenario]
# "portuguese" writes nome/administrador, "english" writes name/isAdmin.
field_dialect = "portuguese"
update_marker = "Atualizado"

[rate_limit]
enabled = true
threshold = 100
margin = 1
# false sends `threshold` requests and asserts that none is throttled.
expect_throttling = true
"#,
    )
}
