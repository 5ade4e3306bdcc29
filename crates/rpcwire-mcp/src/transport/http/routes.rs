//! HTTP routes for one worker: `/mcp` (POST + SSE) and `/health`.

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json as AxumJson, Response,
    },
    routing::{get, post},
    Router,
};
use futures::{stream, FutureExt, Stream, StreamExt};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::protocol::handler::panic_message;
use crate::types::{mcp_error_codes, RequestId};

use super::runtime::WorkerRuntime;
use super::session::SESSION_HEADER;
use super::sse::SseFrame;

/// Build the axum router serving one worker.
pub fn router(runtime: Arc<WorkerRuntime>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_HEADER)]);

    Router::new()
        .route("/mcp", post(handle_post).get(handle_sse))
        .route_layer(middleware::from_fn_with_state(runtime.clone(), auth_layer))
        .route_layer(middleware::from_fn_with_state(runtime.clone(), count_requests))
        .route("/health", get(handle_health))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_guard))
                .layer(cors),
        )
        .with_state(runtime)
}

/// Request-boundary guard: a panic while serving one request is logged
/// with its method and path and answered with a plain 500.
async fn request_guard(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            tracing::error!(
                %method,
                %path,
                "request handler panicked: {}",
                panic_message(panic.as_ref())
            );
            internal_failure()
        }
    }
}

fn internal_failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        AxumJson(json!({ "error": "internal server error" })),
    )
        .into_response()
}

async fn count_requests(
    State(runtime): State<Arc<WorkerRuntime>>,
    request: Request,
    next: Next,
) -> Response {
    let total = runtime.counters().record_request();
    tracing::trace!(
        worker = runtime.index(),
        method = %request.method(),
        total,
        "mcp request"
    );
    next.run(request).await
}

/// Auth middleware - checks Bearer token if configured.
/// /health is handled by a separate route that bypasses this layer.
async fn auth_layer(
    State(runtime): State<Arc<WorkerRuntime>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &runtime.config().token {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                AxumJson(json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {
                        "code": mcp_error_codes::UNAUTHORIZED,
                        "message": "Unauthorized"
                    }
                })),
            )
                .into_response();
        }
    }

    next.run(request).await
}

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

fn with_session(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

/// Handle one JSON-RPC message posted to `/mcp`.
async fn handle_post(
    State(runtime): State<Arc<WorkerRuntime>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session_id = runtime.touch_session(session_header(&headers));

    let payload = match rpcwire::parse_json(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(session_id = %session_id, "Parse error: {e}");
            let reply = e.to_message(RequestId::empty());
            return with_session(
                (StatusCode::BAD_REQUEST, AxumJson(reply)).into_response(),
                &session_id,
            );
        }
    };

    let message = match rpcwire::classify_value(&payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(session_id = %session_id, "Rejected message: {e}");
            let id = rpcwire::recover_id(&payload).unwrap_or_default();
            return with_session(
                (StatusCode::BAD_REQUEST, AxumJson(e.to_message(id))).into_response(),
                &session_id,
            );
        }
    };

    tracing::debug!(
        session_id = %session_id,
        kind = message.kind(),
        method = message.method().unwrap_or("-"),
        "dispatching"
    );

    let response = match runtime.handler().handle_message(message).await {
        Some(reply) => (StatusCode::OK, AxumJson(reply)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    with_session(response, &session_id)
}

/// Open the SSE push channel for the caller's session.
async fn handle_sse(State(runtime): State<Arc<WorkerRuntime>>, headers: HeaderMap) -> Response {
    if !runtime.sse_enabled() {
        return (
            StatusCode::NOT_FOUND,
            AxumJson(json!({ "error": "SSE is disabled" })),
        )
            .into_response();
    }

    let session_id = runtime.touch_session(session_header(&headers));
    let Some(events) = runtime.open_stream(&session_id) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            AxumJson(json!({ "error": "too many SSE connections" })),
        )
            .into_response();
    };

    tracing::info!(
        worker = runtime.index(),
        session_id = %session_id,
        handle = %events.handle(),
        "SSE client connected"
    );

    let endpoint = SseFrame::named(
        "endpoint",
        json!({ "endpoint": "/mcp", "session_id": session_id }).to_string(),
    );
    let stream = stream::once(futures::future::ready(endpoint))
        .chain(events)
        .map(|frame| Ok::<_, Infallible>(to_event(frame)));

    with_session(sse_response(stream), &session_id)
}

fn sse_response<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).into_response()
}

fn single_line(value: &str) -> bool {
    !value.contains(&['\n', '\r', '\0'][..])
}

/// Convert a hub frame into an SSE event. Carriage returns are folded into
/// newlines, and names or ids that cannot travel on one line are dropped.
fn to_event(frame: SseFrame) -> Event {
    match frame {
        SseFrame::KeepAlive => Event::default().comment("keep-alive"),
        SseFrame::Event { event, id, data } => {
            let mut out = Event::default().data(data.replace("\r\n", "\n").replace('\r', "\n"));
            if let Some(name) = event.filter(|n| single_line(n)) {
                out = out.event(name);
            }
            if let Some(id) = id.filter(|i| single_line(i)) {
                out = out.id(id);
            }
            out
        }
    }
}

/// Health check endpoint - no auth required.
async fn handle_health(State(runtime): State<Arc<WorkerRuntime>>) -> AxumJson<serde_json::Value> {
    AxumJson(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "worker": runtime.index(),
        "primary": runtime.is_primary(),
        "state": runtime.state().to_string(),
        "sessions": runtime.sessions().len(),
        "stats": runtime.get_stats(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_guard_turns_panic_into_500() {
        let app = Router::new()
            .route(
                "/boom",
                get(|| async {
                    if true {
                        panic!("handler blew up");
                    }
                    "unreachable"
                }),
            )
            .layer(middleware::from_fn(request_guard));

        let request = axum::http::Request::builder()
            .uri("/boom")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("jsonrpc").is_none());
    }

    #[test]
    fn test_event_conversion_sanitizes() {
        let frame = SseFrame::Event {
            event: Some("bad\nname".to_string()),
            id: Some("ok".to_string()),
            data: "a\r\nb".to_string(),
        };
        // Would panic inside axum if the name or carriage return slipped through.
        let _ = to_event(frame);
        let _ = to_event(SseFrame::KeepAlive);
    }
}
