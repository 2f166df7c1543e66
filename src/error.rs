//! Failures surfaced to the caller by the proxy path.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// The only failures a client ever sees from the balancer.
///
/// Per-attempt upstream errors are absorbed by the retry loop; they reach the
/// client only as the `last_error` of [`ProxyError::RetriesExhausted`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// Every upstream is in cooldown. Not retried.
    #[error("no healthy upstreams")]
    NoEligibleUpstream,

    /// All attempts failed with a network error or a 5xx.
    #[error("upstream failure: {last_error}")]
    RetriesExhausted { last_error: String },

    /// The inbound body exceeded the configured limit.
    #[error("request body too large")]
    PayloadTooLarge,

    /// The inbound body could not be read (client reset, malformed chunking).
    #[error("invalid request body")]
    InvalidRequestBody,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoEligibleUpstream | ProxyError::RetriesExhausted { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::InvalidRequestBody => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_bodies() {
        assert_eq!(ProxyError::NoEligibleUpstream.to_string(), "no healthy upstreams");
        let exhausted = ProxyError::RetriesExhausted {
            last_error: "upstream http://a returned 500".into(),
        };
        assert_eq!(exhausted.to_string(), "upstream failure: upstream http://a returned 500");
        assert_eq!(exhausted.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ProxyError::NoEligibleUpstream.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
