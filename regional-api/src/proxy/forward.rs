//! # Transparent Forwarding
//!
//! One HTTP hop to the peer region that owns a request. The contract:
//!
//! - The client sees status, headers, and body exactly as the owner
//!   produced them.
//! - The buffered body is replayed byte-identical; the Authorization
//!   header travels verbatim.
//! - The only additions are standard `X-Forwarded-For` /
//!   `X-Forwarded-Proto`.
//! - No retries. Unreachable peer → 502; hop timeout → 504. Terminal in
//!   both cases.

use actix_web::http::header::HeaderMap;
use actix_web::web::Bytes;
use shared::ApiError;
use std::time::Duration;
use tracing::warn;

/// Hop-by-hop headers that must not cross the proxy in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    // Recomputed from the replayed body / the response bytes.
    "content-length",
    // The peer sees its own authority.
    "host",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str())
}

/// What came back from the owner, ready to replay to the client.
#[derive(Debug)]
pub struct ProxiedResponse {
    pub status: u16,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Bytes,
}

/// Executes the hop.
///
/// `base` is the peer's internal endpoint (`http://api-usa1.internal:8080`),
/// `path_and_query` the original request target, `headers` the original
/// request headers, `body` the buffered request body.
#[allow(clippy::too_many_arguments)]
pub async fn forward(
    client: &reqwest::Client,
    base: &str,
    method: &actix_web::http::Method,
    path_and_query: &str,
    headers: &HeaderMap,
    body: Bytes,
    peer_ip: Option<&str>,
    timeout: Duration,
) -> Result<ProxiedResponse, ApiError> {
    let url = format!("{}{}", base.trim_end_matches('/'), path_and_query);

    let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|_| ApiError::internal("unforwardable method"))?;

    let mut out_headers = reqwest::header::HeaderMap::new();
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        let name = match reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()) {
            Ok(n) => n,
            Err(_) => continue,
        };
        if let Ok(value) = reqwest::header::HeaderValue::from_bytes(value.as_bytes()) {
            out_headers.append(name, value);
        }
    }

    if let Some(ip) = peer_ip {
        if let Ok(value) = reqwest::header::HeaderValue::from_str(ip) {
            out_headers.append(reqwest::header::HeaderName::from_static("x-forwarded-for"), value);
        }
    }
    out_headers.insert(
        reqwest::header::HeaderName::from_static("x-forwarded-proto"),
        reqwest::header::HeaderValue::from_static("http"),
    );

    let response = client
        .request(method, &url)
        .headers(out_headers)
        .body(body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                warn!(peer = base, "Proxy hop timed out");
                ApiError::GatewayTimeout
            } else {
                warn!(peer = base, error = %e, "Proxy hop failed");
                ApiError::BadGateway
            }
        })?;

    let status = response.status().as_u16();
    let resp_headers: Vec<(String, Vec<u8>)> = response
        .headers()
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .map(|(name, value)| (name.to_string(), value.as_bytes().to_vec()))
        .collect();

    let body = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ApiError::GatewayTimeout
        } else {
            warn!(peer = base, error = %e, "Proxy hop body read failed");
            ApiError::BadGateway
        }
    })?;

    Ok(ProxiedResponse {
        status,
        headers: resp_headers,
        body,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};
    use actix_web::http::Method;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[actix_web::test]
    async fn test_forward_replays_body_and_headers_transparently() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hub/tfa"))
            .and(body_string(r#"{"tfa_token":"usa1-aa","code":"123456"}"#))
            .and(header("authorization", "Bearer usa1-aa"))
            .respond_with(
                ResponseTemplate::new(401)
                    .insert_header("content-type", "application/json")
                    .set_body_string(r#"{"code":"UNAUTHORIZED","message":"Unauthorized"}"#),
            )
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer usa1-aa"),
        );
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );

        let out = forward(
            &client(),
            &server.uri(),
            &Method::POST,
            "/hub/tfa",
            &headers,
            Bytes::from_static(br#"{"tfa_token":"usa1-aa","code":"123456"}"#),
            Some("10.0.0.9"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        // Status and body pass through untouched.
        assert_eq!(out.status, 401);
        assert_eq!(
            out.body.as_ref(),
            br#"{"code":"UNAUTHORIZED","message":"Unauthorized"}"#
        );
        assert!(out
            .headers
            .iter()
            .any(|(name, value)| name == "content-type" && value == b"application/json"));
    }

    #[actix_web::test]
    async fn test_forward_adds_x_forwarded_for() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hub/logout"))
            .and(header("x-forwarded-for", "10.0.0.9"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let out = forward(
            &client(),
            &server.uri(),
            &Method::POST,
            "/hub/logout",
            &HeaderMap::new(),
            Bytes::new(),
            Some("10.0.0.9"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(out.status, 200);
    }

    #[actix_web::test]
    async fn test_unreachable_peer_is_terminal_502() {
        // Nothing listens on this port.
        let err = forward(
            &client(),
            "http://127.0.0.1:1",
            &Method::POST,
            "/hub/tfa",
            &HeaderMap::new(),
            Bytes::new(),
            None,
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::BadGateway));
    }

    #[actix_web::test]
    async fn test_slow_peer_is_terminal_504() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hub/tfa"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let err = forward(
            &client(),
            &server.uri(),
            &Method::POST,
            "/hub/tfa",
            &HeaderMap::new(),
            Bytes::new(),
            None,
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::GatewayTimeout));
    }

    #[test]
    fn test_hop_by_hop_set() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("content-length"));
        assert!(is_hop_by_hop("Host"));
        assert!(!is_hop_by_hop("authorization"));
        assert!(!is_hop_by_hop("content-type"));
    }
}
