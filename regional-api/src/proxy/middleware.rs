//! # Region Router Middleware
//!
//! The actix middleware that applies [`router`](super::router) to every
//! request before any handler runs.
//!
//! For any path that can belong to a peer region, the body is read **once**
//! into a bounded replay buffer (413 beyond the limit). If the request is
//! local the buffer is reattached and the inner service sees an untouched
//! request; if it is remote the buffer is replayed verbatim on the
//! outbound hop and the peer's response is returned as-is.

use crate::proxy::forward::{self, ProxiedResponse};
use crate::proxy::router::{classify, Decision, RouteClass, RouterState};
use actix_http::h1;
use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{web, Error, HttpMessage, HttpResponse, ResponseError};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use futures_util::StreamExt;
use shared::ApiError;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// =============================================================================
// TRANSFORM
// =============================================================================

/// Middleware factory. Construct once at startup and `wrap` the app.
pub struct RegionRouter {
    state: Arc<RouterState>,
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl RegionRouter {
    pub fn new(
        state: Arc<RouterState>,
        client: reqwest::Client,
        timeout: Duration,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            state,
            client,
            timeout,
            max_body_bytes,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RegionRouter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RegionRouterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RegionRouterMiddleware {
            service: Rc::new(service),
            state: Arc::clone(&self.state),
            client: self.client.clone(),
            timeout: self.timeout,
            max_body_bytes: self.max_body_bytes,
        })
    }
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct RegionRouterMiddleware<S> {
    service: Rc<S>,
    state: Arc<RouterState>,
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl<S, B> Service<ServiceRequest> for RegionRouterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let state = Arc::clone(&self.state);
        let client = self.client.clone();
        let timeout = self.timeout;
        let max_body_bytes = self.max_body_bytes;

        Box::pin(async move {
            let class = classify(req.path());

            // Never-proxied paths skip buffering entirely.
            if class == RouteClass::Local {
                return service.call(req).await.map(|r| r.map_into_left_body());
            }

            // Read-once replay buffer. Any proxied request must be
            // replayable, so every potentially-remote class buffers.
            let body = match buffer_body(&mut req, max_body_bytes).await {
                Ok(bytes) => bytes,
                Err(e) => return Ok(respond(req, &e)),
            };

            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            let decision = match state
                .resolve(class, req.path(), auth_header.as_deref(), &body)
                .await
            {
                Ok(d) => d,
                Err(e) => return Ok(respond(req, &e)),
            };

            match decision {
                Decision::Local => {
                    reattach_body(&mut req, body);
                    service.call(req).await.map(|r| r.map_into_left_body())
                }

                Decision::Unauthorized => Ok(respond(req, &ApiError::Unauthorized)),

                Decision::Forward(region) => {
                    let base = match state.topology.peer_endpoint(region) {
                        Some(base) => base.to_string(),
                        None => {
                            // Region exists in the catalog but no endpoint
                            // was configured for it.
                            return Ok(respond(req, &ApiError::BadGateway));
                        }
                    };

                    debug!(region = %region, path = req.path(), "Forwarding to owner region");

                    let peer_ip = req.connection_info().peer_addr().map(String::from);
                    let path_and_query = req
                        .uri()
                        .path_and_query()
                        .map(|pq| pq.as_str().to_string())
                        .unwrap_or_else(|| req.path().to_string());
                    let method = req.method().clone();
                    let headers = req.headers().clone();

                    let outcome = forward::forward(
                        &client,
                        &base,
                        &method,
                        &path_and_query,
                        &headers,
                        body,
                        peer_ip.as_deref(),
                        timeout,
                    )
                    .await;

                    match outcome {
                        Ok(proxied) => Ok(req
                            .into_response(to_http_response(proxied))
                            .map_into_right_body()),
                        Err(e) => Ok(respond(req, &e)),
                    }
                }
            }
        })
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Collects the payload into a bounded buffer.
async fn buffer_body(req: &mut ServiceRequest, limit: usize) -> Result<web::Bytes, ApiError> {
    let mut payload = req.take_payload();
    let mut body = web::BytesMut::new();

    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|_| ApiError::BadRequest {
            message: "malformed request body".to_string(),
        })?;
        if body.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body.freeze())
}

/// Puts a buffered body back so extractors downstream see the original
/// request.
fn reattach_body(req: &mut ServiceRequest, body: web::Bytes) {
    let (_, mut payload) = h1::Payload::create(true);
    payload.unread_data(body);
    req.set_payload(Payload::from(payload));
}

/// Terminal middleware response from an `ApiError`.
fn respond<B>(req: ServiceRequest, error: &ApiError) -> ServiceResponse<EitherBody<B>>
where
    B: MessageBody + 'static,
{
    req.into_response(error.error_response()).map_into_right_body()
}

/// Replays the owner's response to the client.
fn to_http_response(proxied: ProxiedResponse) -> HttpResponse {
    let status = StatusCode::from_u16(proxied.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);

    for (name, value) in &proxied.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value),
        ) {
            builder.append_header((name, value));
        }
    }

    builder.body(proxied.body)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxied_response_replay_preserves_status_and_headers() {
        let proxied = ProxiedResponse {
            status: 409,
            headers: vec![(
                "content-type".to_string(),
                b"application/json".to_vec(),
            )],
            body: web::Bytes::from_static(b"{\"code\":\"CONFLICT\"}"),
        };

        let response = to_http_response(proxied);
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn test_unknown_status_degrades_to_502() {
        let proxied = ProxiedResponse {
            status: 0,
            headers: vec![],
            body: web::Bytes::new(),
        };
        assert_eq!(to_http_response(proxied).status(), StatusCode::BAD_GATEWAY);
    }
}
