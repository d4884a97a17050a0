// crates/users-conformance-config/src/config.rs
// ============================================================================
// Module: Users Conformance Configuration
// Description: Configuration loading, environment overrides, and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: users-conformance-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is resolved in three layers: built-in defaults, an optional
//! TOML file, then environment overrides (`API_BASE_URL`, `ADMIN_EMAIL`,
//! `ADMIN_PASSWORD`, `REQUEST_TIMEOUT_MS`). The default file may be absent;
//! a file named explicitly, by flag or by `USERS_CONFORMANCE_CONFIG`, must
//! exist. Environment values are read strictly: non-UTF-8 or blank values
//! fail closed.
//!
//! Security posture: config inputs are untrusted; the admin password never
//! appears in debug output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;
use users_conformance_core::FieldDialect;
use users_conformance_core::HttpTransportConfig;
use users_conformance_core::LoginCredentials;
use users_conformance_core::RateLimitOptions;
use users_conformance_core::ResourcePaths;
use users_conformance_core::SuiteOptions;
use users_conformance_core::SuiteSelection;
use users_conformance_core::rate_limit::DEFAULT_MARGIN;
use users_conformance_core::rate_limit::DEFAULT_THRESHOLD;
use users_conformance_core::suite::DEFAULT_UPDATE_MARKER;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "users-conformance.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "USERS_CONFORMANCE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 64 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default base URL of the API under test.
pub const DEFAULT_BASE_URL: &str = "https://serverest.dev";
/// Default login endpoint.
pub const DEFAULT_LOGIN_PATH: &str = "/login";
/// Default users collection.
pub const DEFAULT_USERS_PATH: &str = "/usuarios";
/// Default per-request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Minimum per-request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
/// Maximum per-request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;
/// Maximum number of requests in one burst.
pub(crate) const MAX_BURST_SIZE: usize = 10_000;
/// Maximum length of an endpoint path or the update marker.
pub(crate) const MAX_FIELD_LENGTH: usize = 256;

// ============================================================================
// SECTION: Environment Overrides
// ============================================================================

/// Environment variables that override file values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEnv {
    /// Base URL of the API under test.
    BaseUrl,
    /// Admin login email.
    AdminEmail,
    /// Admin login password.
    AdminPassword,
    /// Per-request timeout in milliseconds.
    RequestTimeoutMs,
}

impl ConfigEnv {
    /// Every override, in application order.
    pub const ALL: [Self; 4] =
        [Self::BaseUrl, Self::AdminEmail, Self::AdminPassword, Self::RequestTimeoutMs];

    /// Returns the environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BaseUrl => "API_BASE_URL",
            Self::AdminEmail => "ADMIN_EMAIL",
            Self::AdminPassword => "ADMIN_PASSWORD",
            Self::RequestTimeoutMs => "REQUEST_TIMEOUT_MS",
        }
    }
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Complete configuration of a conformance run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConformanceConfig {
    /// Target API settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Admin login.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Scenario conventions.
    #[serde(default)]
    pub scenario: ScenarioConfig,
    /// Rate-limit burst settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Target API settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL every path is appended to.
    pub base_url: String,
    /// Login endpoint path.
    pub login_path: String,
    /// Users collection path.
    pub users_path: String,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            users_path: DEFAULT_USERS_PATH.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl ApiConfig {
    /// Validates URL syntax, paths, and timeout bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|err| ConfigError::Invalid(format!("api.base_url is not a valid url: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid("api.base_url must use http or https".to_string()));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::Invalid("api.base_url must include a host".to_string()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::Invalid(
                "api.base_url must not include a query or fragment".to_string(),
            ));
        }
        validate_endpoint_path("api.login_path", &self.login_path)?;
        validate_endpoint_path("api.users_path", &self.users_path)?;
        if !(MIN_REQUEST_TIMEOUT_MS ..= MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "api.request_timeout_ms must be between {MIN_REQUEST_TIMEOUT_MS} and \
                 {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Admin login; both fields are required once overrides are applied.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Admin email.
    pub admin_email: Option<String>,
    /// Admin password.
    pub admin_password: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("admin_email", &self.admin_email)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthConfig {
    /// Validates that both credentials are present.
    fn validate(&self) -> Result<(), ConfigError> {
        let email = required("auth.admin_email", self.admin_email.as_deref(), ConfigEnv::AdminEmail)?;
        if !email.contains('@') {
            return Err(ConfigError::Invalid("auth.admin_email must be an email address".to_string()));
        }
        required("auth.admin_password", self.admin_password.as_deref(), ConfigEnv::AdminPassword)?;
        Ok(())
    }

    /// Returns the login credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when either credential is missing.
    pub fn credentials(&self) -> Result<LoginCredentials, ConfigError> {
        let email = required("auth.admin_email", self.admin_email.as_deref(), ConfigEnv::AdminEmail)?;
        let password =
            required("auth.admin_password", self.admin_password.as_deref(), ConfigEnv::AdminPassword)?;
        Ok(LoginCredentials {
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}

/// Scenario conventions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Payload key convention.
    pub field_dialect: FieldDialect,
    /// Marker appended to the name on update.
    pub update_marker: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            field_dialect: FieldDialect::default(),
            update_marker: DEFAULT_UPDATE_MARKER.to_string(),
        }
    }
}

impl ScenarioConfig {
    /// Validates the update marker.
    fn validate(&self) -> Result<(), ConfigError> {
        let marker = self.update_marker.trim();
        if marker.is_empty() {
            return Err(ConfigError::Invalid("scenario.update_marker must be non-empty".to_string()));
        }
        if marker.len() > MAX_FIELD_LENGTH {
            return Err(ConfigError::Invalid("scenario.update_marker exceeds max length".to_string()));
        }
        Ok(())
    }
}

/// Rate-limit burst settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether the burst runs at all.
    pub enabled: bool,
    /// Requests the API is assumed to tolerate per window.
    pub threshold: usize,
    /// Requests sent beyond the threshold.
    pub margin: usize,
    /// Whether the burst must be throttled (`true`) or must not be (`false`).
    pub expect_throttling: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_THRESHOLD,
            margin: DEFAULT_MARGIN,
            expect_throttling: true,
        }
    }
}

impl RateLimitConfig {
    /// Validates burst bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::Invalid("rate_limit.threshold must be greater than zero".to_string()));
        }
        if self.expect_throttling && self.margin == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.margin must be greater than zero when expect_throttling is set"
                    .to_string(),
            ));
        }
        if self.options().burst_size() > MAX_BURST_SIZE {
            return Err(ConfigError::Invalid(format!(
                "rate_limit burst exceeds {MAX_BURST_SIZE} requests"
            )));
        }
        Ok(())
    }

    /// Returns the prober options.
    #[must_use]
    pub const fn options(&self) -> RateLimitOptions {
        RateLimitOptions {
            threshold: self.threshold,
            margin: self.margin,
            expect_throttling: self.expect_throttling,
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl ConformanceConfig {
    /// Loads configuration from disk and the environment, then validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading, overriding, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match resolve_path(path)? {
            ResolvedPath::Required(path) => Self::read_file(&path)?,
            ResolvedPath::Default(path) if path.is_file() => Self::read_file(&path)?,
            ResolvedPath::Default(_) => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document without applying overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document is malformed or has
    /// unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Reads and parses one config file.
    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is not UTF-8, is
    /// blank, or does not parse.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(read_env_nonempty)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `lookup` fails or a value does
    /// not parse.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Result<Option<String>, ConfigError>,
    ) -> Result<(), ConfigError> {
        for var in ConfigEnv::ALL {
            let Some(value) = lookup(var.as_str())? else {
                continue;
            };
            let value = value.trim().to_string();
            match var {
                ConfigEnv::BaseUrl => self.api.base_url = value,
                ConfigEnv::AdminEmail => self.auth.admin_email = Some(value),
                ConfigEnv::AdminPassword => self.auth.admin_password = Some(value),
                ConfigEnv::RequestTimeoutMs => {
                    self.api.request_timeout_ms = parse_timeout_ms(var.as_str(), &value)?;
                }
            }
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;
        self.auth.validate()?;
        self.scenario.validate()?;
        self.rate_limit.validate()
    }

    /// Returns the HTTP transport settings.
    #[must_use]
    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            base_url: self.api.base_url.trim().to_string(),
            request_timeout: self.api.request_timeout(),
        }
    }

    /// Builds suite options for one run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the admin credentials are
    /// missing.
    pub fn suite_options(
        &self,
        selection: SuiteSelection,
        run_suffix: u128,
    ) -> Result<SuiteOptions, ConfigError> {
        Ok(SuiteOptions {
            target: self.api.base_url.trim().to_string(),
            paths: ResourcePaths {
                login: self.api.login_path.clone(),
                users: self.api.users_path.clone(),
            },
            credentials: self.auth.credentials()?,
            dialect: self.scenario.field_dialect,
            update_marker: self.scenario.update_marker.trim().to_string(),
            rate_limit: self.rate_limit.enabled.then(|| self.rate_limit.options()),
            request_timeout: self.api.request_timeout(),
            selection,
            run_suffix,
        })
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Config path and whether it must exist.
enum ResolvedPath {
    /// Named explicitly; missing is an error.
    Required(PathBuf),
    /// Default location; missing means defaults.
    Default(PathBuf),
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<ResolvedPath, ConfigError> {
    if let Some(path) = path {
        return Ok(ResolvedPath::Required(path.to_path_buf()));
    }
    if let Some(env_path) = read_env_nonempty(CONFIG_ENV_VAR)? {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(ResolvedPath::Required(PathBuf::from(env_path)));
    }
    Ok(ResolvedPath::Default(PathBuf::from(DEFAULT_CONFIG_NAME)))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates an endpoint path such as `/usuarios`.
fn validate_endpoint_path(field: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') {
        return Err(ConfigError::Invalid(format!("{field} must start with '/'")));
    }
    if value.len() > MAX_FIELD_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if value.chars().any(|ch| ch.is_whitespace() || ch == '?' || ch == '#') {
        return Err(ConfigError::Invalid(format!(
            "{field} must not contain whitespace, queries, or fragments"
        )));
    }
    Ok(())
}

/// Returns a required, non-blank credential field.
fn required<'a>(field: &str, value: Option<&'a str>, env: ConfigEnv) -> Result<&'a str, ConfigError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Invalid(format!("{field} is required (or set {})", env.as_str()))),
    }
}

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, ConfigError> {
    env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{name} must be valid UTF-8")))
    })
}

/// Reads an environment variable and rejects empty values.
fn read_env_nonempty(name: &str) -> Result<Option<String>, ConfigError> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => {
            Err(ConfigError::Invalid(format!("{name} must not be empty")))
        }
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive millisecond timeout.
fn parse_timeout_ms(name: &str, raw: &str) -> Result<u64, ConfigError> {
    let millis: u64 = raw.trim().parse().map_err(|_| {
        ConfigError::Invalid(format!("{name} must be a positive integer number of milliseconds"))
    })?;
    if millis == 0 {
        return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
    }
    Ok(millis)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
