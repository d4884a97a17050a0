// crates/users-conformance-core/src/transport.rs
// ============================================================================
// Module: Transport
// Description: Black-box request/response seam to the remote users API.
// Purpose: Return status and body for every HTTP outcome, faulting only on transport failure.
// Dependencies: async-trait, reqwest, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! Every remote call goes through the [`Transport`] trait. An HTTP error
//! status is a normal [`RawResponse`], never an error: checks that expect a
//! rejection simply inspect the status. [`TransportError`] is reserved for
//! connection failures, timeouts, and unreadable bodies.
//!
//! [`HttpTransport`] is the production implementation backed by `reqwest`;
//! tests substitute scripted transports or point it at an in-process stub.
//!
//! Security posture: response bodies are untrusted and size-limited; the
//! authorization header is redacted from debug output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Method;
use reqwest::header::ACCEPT;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum response body size accepted from the remote API.
pub const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;
/// User agent sent with every request.
const USER_AGENT: &str = concat!("users-conformance/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transport-level failure: no HTTP status was obtained.
///
/// # Invariants
/// - Variants are stable for report labelling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The per-request deadline elapsed.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The request failed for another transport reason.
    #[error("request failed: {0}")]
    Request(String),
    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
    /// The response body exceeds [`MAX_RESPONSE_BYTES`].
    #[error("response exceeds size limit ({actual} > {limit})")]
    ResponseTooLarge {
        /// Actual size in bytes.
        actual: usize,
        /// Maximum size in bytes.
        limit: usize,
    },
    /// The HTTP client could not be built.
    #[error("invalid transport configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

// ============================================================================
// SECTION: Request and Response
// ============================================================================

/// Value of an `Authorization` request header.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationHeader(String);

impl AuthorizationHeader {
    /// Builds a `Bearer <token>` header value.
    #[must_use]
    pub fn bearer(token: &str) -> Self {
        Self(format!("Bearer {token}"))
    }

    /// Returns the raw header value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthorizationHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthorizationHeader(<redacted>)")
    }
}

/// One request to the remote API, addressed relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path beginning with `/`.
    pub path: String,
    /// Optional JSON body.
    pub body: Option<Value>,
    /// Optional `Authorization` header.
    pub authorization: Option<AuthorizationHeader>,
}

impl ApiRequest {
    /// Builds a request with no body and no credential.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            authorization: None,
        }
    }

    /// Builds a `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Builds a `POST` request with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    /// Builds a `PUT` request with a JSON body.
    #[must_use]
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    /// Builds a `DELETE` request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attaches a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches an `Authorization` header.
    #[must_use]
    pub fn authorized(mut self, header: &AuthorizationHeader) -> Self {
        self.authorization = Some(header.clone());
        self
    }
}

/// Status and decoded body of one completed HTTP exchange.
///
/// # Invariants
/// - `body` is `None` when the response was empty or not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded JSON body.
    pub body: Option<Value>,
}

impl RawResponse {
    /// Builds a response from a status and raw body bytes.
    #[must_use]
    pub fn from_bytes(status: u16, bytes: &[u8]) -> Self {
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            serde_json::from_slice(bytes).ok()
        };
        Self {
            status,
            body,
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns the JSON body, or `Value::Null` when there is none.
    #[must_use]
    pub fn json(&self) -> &Value {
        static NULL: Value = Value::Null;
        self.body.as_ref().unwrap_or(&NULL)
    }
}

// ============================================================================
// SECTION: Resource Paths
// ============================================================================

/// Endpoint paths of the remote API, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    /// Login endpoint, e.g. `/login`.
    pub login: String,
    /// Users collection, e.g. `/usuarios` or `/users`.
    pub users: String,
}

impl ResourcePaths {
    /// Returns the path of a single user.
    #[must_use]
    pub fn user(&self, id: &str) -> String {
        format!("{}/{id}", self.users.trim_end_matches('/'))
    }
}

impl Default for ResourcePaths {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            users: "/usuarios".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Transport Trait
// ============================================================================

/// Black-box access to the remote API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the status and body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only when no HTTP status was obtained.
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,
    /// Deadline applied to each request individually.
    pub request_timeout: Duration,
}

/// `reqwest`-backed [`Transport`].
///
/// # Invariants
/// - Redirects are not followed.
/// - Bodies larger than [`MAX_RESPONSE_BYTES`] fail closed.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Shared connection pool.
    client: Client,
    /// Base URL without a trailing slash.
    base_url: String,
}

impl HttpTransport {
    /// Builds a transport with JSON default headers and a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] when the client cannot be built.
    pub fn new(config: &HttpTransportConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .redirect(Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| TransportError::Config(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), &url);
        if let Some(header) = &request.authorization {
            let value = HeaderValue::from_str(header.value())
                .map_err(|err| TransportError::Request(format!("invalid authorization header: {err}")))?;
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(TransportError::ResponseTooLarge {
                actual: bytes.len(),
                limit: MAX_RESPONSE_BYTES,
            });
        }
        debug!(
            method = %request.method,
            path = %request.path,
            status,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "remote call completed"
        );
        Ok(RawResponse::from_bytes(status, &bytes))
    }
}
