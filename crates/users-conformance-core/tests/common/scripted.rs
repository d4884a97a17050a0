// crates/users-conformance-core/tests/common/scripted.rs
// ============================================================================
// Module: Scripted Transport
// Description: Transport that replays canned responses in order.
// Purpose: Drive checks through failure paths the HTTP stub cannot produce.
// Dependencies: async-trait, users-conformance-core
// ============================================================================

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use serde_json::Value;
use users_conformance_core::ApiRequest;
use users_conformance_core::RawResponse;
use users_conformance_core::Transport;
use users_conformance_core::TransportError;

/// Replays one scripted outcome per request and records what was sent.
#[derive(Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    sent: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport that replays `outcomes`.
    pub fn new(outcomes: impl IntoIterator<Item = Result<RawResponse, TransportError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Returns the requests sent so far.
    pub fn sent(&self) -> Vec<ApiRequest> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns how many scripted outcomes were not consumed.
    pub fn remaining(&self) -> usize {
        self.outcomes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(request);
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("script exhausted".to_string())))
    }
}

/// Builds a response with a JSON body.
pub fn reply(status: u16, body: Value) -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status,
        body: Some(body),
    })
}

/// Builds a response without a body.
pub fn empty(status: u16) -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status,
        body: None,
    })
}
