//! Scripted `Forward` implementation for unit tests.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::load_balancer::Upstream;
use crate::resilience::forwarder::{Forward, ForwardError, ProxyRequest, UpstreamResponse};

pub(crate) type Outcome = Result<(u16, &'static str), ForwardError>;

/// Replays queued outcomes per upstream address; falls back to `default`.
pub(crate) struct ScriptedForwarder {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    default: Outcome,
    calls: Mutex<Vec<(String, ProxyRequest)>>,
}

impl ScriptedForwarder {
    pub(crate) fn new(default: Outcome) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn script(self, address: &str, outcomes: Vec<Outcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(address.to_string(), outcomes.into());
        self
    }

    /// Addresses called, in order.
    pub(crate) fn called(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(a, _)| a.clone()).collect()
    }

    pub(crate) fn requests(&self) -> Vec<ProxyRequest> {
        self.calls.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl Forward for ScriptedForwarder {
    async fn send(
        &self,
        upstream: &Upstream,
        request: &ProxyRequest,
    ) -> Result<UpstreamResponse, ForwardError> {
        self.calls
            .lock()
            .unwrap()
            .push((upstream.address().to_string(), request.clone()));

        let outcome = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(upstream.address())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.clone());

        outcome.map(|(status, body)| {
            let mut headers = HeaderMap::new();
            headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
            headers.insert("x-served-by", HeaderValue::from_static("mock"));
            UpstreamResponse {
                status: StatusCode::from_u16(status).unwrap(),
                headers,
                body: Bytes::from_static(body.as_bytes()),
            }
        })
    }
}
