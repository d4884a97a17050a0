// crates/users-conformance-core/tests/rate_limit.rs
// ============================================================================
// Module: Rate-Limit Integration Tests
// Description: Concurrent bursts against a fixed-window limiter.
// Purpose: Confirm throttling detection, the negative case, and ERR buckets.
// Dependencies: users-conformance-core, tokio
// ============================================================================

//! Rate-limit prober tests against the users stub's fixed-window limiter.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::scripted::ScriptedTransport;
use common::scripted::empty;
use common::users_stub::RateWindow;
use common::users_stub::StubConfig;
use common::users_stub::spawn_users_stub;
use users_conformance_core::AuthorizationHeader;
use users_conformance_core::CheckStatus;
use users_conformance_core::RateLimitExpectation;
use users_conformance_core::RateLimitOptions;
use users_conformance_core::RateLimitProber;
use users_conformance_core::TransportError;
use users_conformance_core::rate_limit::ERR_BUCKET;

const LIMIT: usize = 20;

fn limited_stub() -> StubConfig {
    StubConfig {
        rate_limit: Some(RateWindow {
            limit: LIMIT,
            window: Duration::from_secs(60),
        }),
        ..StubConfig::default()
    }
}

fn authorization(config: &StubConfig) -> AuthorizationHeader {
    AuthorizationHeader::bearer(&config.token)
}

#[tokio::test(flavor = "multi_thread")]
async fn burst_above_threshold_is_throttled() {
    let config = limited_stub();
    let header = authorization(&config);
    let stub = spawn_users_stub(config).unwrap();
    let transport = common::http_transport(stub.base_url()).unwrap();
    let options = RateLimitOptions {
        threshold: LIMIT,
        margin: 1,
        expect_throttling: true,
    };
    let prober = RateLimitProber::new(transport, Duration::from_secs(5));
    let probe = prober.probe("/usuarios", &header, options.burst_size()).await;

    assert_eq!(probe.burst_size, LIMIT + 1);
    assert_eq!(probe.count("200"), LIMIT);
    assert_eq!(probe.throttled(), 1);
    assert_eq!(probe.histogram.values().sum::<usize>(), LIMIT + 1);
    assert_eq!(options.expectation().evaluate(&probe).status, CheckStatus::Passed);
    assert_eq!(stub.throttled(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn burst_at_threshold_is_not_throttled() {
    let config = limited_stub();
    let header = authorization(&config);
    let stub = spawn_users_stub(config).unwrap();
    let transport = common::http_transport(stub.base_url()).unwrap();
    let options = RateLimitOptions {
        threshold: LIMIT,
        margin: 1,
        expect_throttling: false,
    };
    let prober = RateLimitProber::new(transport, Duration::from_secs(5));
    let probe = prober.probe("/usuarios", &header, options.burst_size()).await;

    assert_eq!(probe.burst_size, LIMIT);
    assert!(!probe.throttling_observed());
    assert_eq!(RateLimitExpectation::Unthrottled.evaluate(&probe).status, CheckStatus::Passed);
}

#[tokio::test(flavor = "multi_thread")]
async fn api_without_limiter_fails_the_throttling_expectation() {
    let config = StubConfig::default();
    let header = authorization(&config);
    let stub = spawn_users_stub(config).unwrap();
    let transport = common::http_transport(stub.base_url()).unwrap();
    let prober = RateLimitProber::new(transport, Duration::from_secs(5));
    let probe = prober.probe("/usuarios", &header, 30).await;

    let outcome = RateLimitExpectation::Throttled.evaluate(&probe);
    assert_eq!(outcome.status, CheckStatus::Failed);
    assert_eq!(outcome.observed.as_deref(), Some("200=30"));
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_failures_land_in_the_err_bucket() {
    let transport = Arc::new(ScriptedTransport::new([
        empty(200),
        Err(TransportError::Connect("reset".to_string())),
        empty(429),
        Err(TransportError::Timeout("slow".to_string())),
    ]));
    let prober = RateLimitProber::new(transport.clone(), Duration::from_secs(5));
    let probe = prober.probe("/usuarios", &AuthorizationHeader::bearer("t"), 4).await;

    assert_eq!(probe.count(ERR_BUCKET), 2);
    assert_eq!(probe.count("200"), 1);
    assert_eq!(probe.throttled(), 1);
    assert_eq!(transport.sent().len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_requests_time_out_into_the_err_bucket() {
    let config = StubConfig {
        list_delay: Duration::from_secs(2),
        ..StubConfig::default()
    };
    let header = authorization(&config);
    let stub = spawn_users_stub(config).unwrap();
    let transport = common::http_transport(stub.base_url()).unwrap();
    let prober = RateLimitProber::new(transport, Duration::from_millis(100));
    let probe = prober.probe("/usuarios", &header, 5).await;

    assert_eq!(probe.histogram.len(), 1);
    assert_eq!(probe.count(ERR_BUCKET), 5);
}
