// crates/users-conformance-config/src/lib.rs
// ============================================================================
// Module: Users Conformance Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for users-conformance.toml semantics.
// Dependencies: users-conformance-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `users-conformance-config` defines the configuration of a conformance run:
//! the target API, the admin login, scenario conventions, and the rate-limit
//! burst. A TOML file supplies the base values and environment variables
//! override them. Validation is strict and fails closed.
//!
//! Security posture: config inputs are untrusted; the admin password is
//! redacted from debug output.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
