//! Hop-by-hop header handling.
//!
//! Applied to both legs of the proxy: inbound request headers before they are
//! sent upstream, and upstream response headers before they reach the client.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};

/// Header identifying the upstream that served a proxied response.
pub const X_LB_UPSTREAM: &str = "x-lb-upstream";

/// Headers meaningful only to a single transport leg.
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// True if `name` is hop-by-hop. `HeaderName` is always lowercase.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Copy of `headers` without hop-by-hop entries. Order and repeated values are kept.
pub fn sanitize(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if !is_hop_by_hop(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Attach the serving upstream's address. Addresses that are not valid header
/// values are skipped.
pub fn insert_upstream_identity(headers: &mut HeaderMap, address: &str) {
    match HeaderValue::from_str(address) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(X_LB_UPSTREAM), value);
        }
        Err(_) => tracing::debug!(address, "Upstream address is not a valid header value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_hop_by_hop_case_insensitively() {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("Connection", "keep-alive"),
            ("Keep-Alive", "timeout=5"),
            ("TE", "trailers"),
            ("Transfer-Encoding", "chunked"),
            ("Upgrade", "websocket"),
            ("Proxy-Authorization", "Basic x"),
            ("Proxy-Authenticate", "Basic"),
            ("Trailers", "x"),
            ("Content-Type", "application/json"),
        ] {
            // from_bytes lowercases mixed-case wire names.
            headers.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_static(value),
            );
        }

        let out = sanitize(&headers);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_preserves_values_and_order() {
        let mut headers = HeaderMap::new();
        headers.append("x-b", HeaderValue::from_static("1"));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("connection", HeaderValue::from_static("close"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        headers.append("x-a", HeaderValue::from_bytes(b"\xffraw").unwrap());

        let out = sanitize(&headers);
        let pairs: Vec<_> = out
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.as_bytes().to_vec()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("x-b".to_string(), b"1".to_vec()),
                ("set-cookie".to_string(), b"a=1".to_vec()),
                ("set-cookie".to_string(), b"b=2".to_vec()),
                ("x-a".to_string(), b"\xffraw".to_vec()),
            ]
        );
    }

    #[test]
    fn test_upstream_identity() {
        let mut headers = HeaderMap::new();
        insert_upstream_identity(&mut headers, "http://app2:8000");
        assert_eq!(headers.get(X_LB_UPSTREAM).unwrap(), "http://app2:8000");
    }
}
