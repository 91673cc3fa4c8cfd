//! HTTP API: inbound webhook from the messaging gateway and a health check.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use parley_core::{config::ApiConfig, message::InboundMessage, traits::ChatStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::gateway::Supervisor;

type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    tx: Option<mpsc::Sender<InboundMessage>>,
    api_key: Option<String>,
    uptime: Instant,
    store: Option<Arc<dyn ChatStore>>,
    supervisor: Supervisor,
}

impl ApiState {
    pub fn new(
        config: &ApiConfig,
        tx: mpsc::Sender<InboundMessage>,
        store: Option<Arc<dyn ChatStore>>,
        supervisor: Supervisor,
    ) -> Self {
        let api_key = if config.api_key.is_empty() {
            None
        } else {
            Some(config.api_key.clone())
        };
        Self {
            tx: Some(tx),
            api_key,
            uptime: Instant::now(),
            store,
            supervisor,
        }
    }
}

/// Constant-time string comparison for the bearer token.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn unauthorized(msg: &str) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg })))
}

/// `Ok` when no key is configured or the bearer token matches.
fn check_auth(headers: &HeaderMap, api_key: Option<&str>) -> Result<(), ApiError> {
    let Some(key) = api_key else {
        return Ok(());
    };
    let value = headers
        .get("authorization")
        .ok_or_else(|| unauthorized("missing Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("invalid Authorization header"))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => Ok(()),
        _ => Err(unauthorized("invalid token")),
    }
}

fn bad_request(msg: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg })))
}

fn unavailable() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "gateway unavailable" })),
    )
}

/// `GET /api/health`
async fn health(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, state.api_key.as_deref())?;

    let store = match &state.store {
        None => "disabled",
        Some(store) => match store.ping().await {
            Ok(()) => "ok",
            Err(e) => {
                warn!("health: store ping failed: {e}");
                "unavailable"
            }
        },
    };

    Ok(Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "store": store,
        "tasks": state.supervisor.stats(),
    })))
}

/// `POST /api/webhook`: validate and queue one inbound message.
async fn webhook(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<InboundMessage>, axum::extract::rejection::JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    check_auth(&headers, state.api_key.as_deref())?;

    let Json(msg) = body.map_err(|e| bad_request(format!("invalid request: {e}")))?;

    for (field, value) in [
        ("thread_id", &msg.thread_id),
        ("message_id", &msg.message_id),
        ("sender_number", &msg.sender_number),
        ("service", &msg.service),
    ] {
        if value.trim().is_empty() {
            return Err(bad_request(format!("{field} must not be empty")));
        }
    }

    let tx = state.tx.as_ref().ok_or_else(unavailable)?;
    let message_id = msg.message_id.clone();
    let thread_id = msg.thread_id.clone();
    tx.send(msg).await.map_err(|_| {
        error!("webhook: gateway receiver dropped");
        unavailable()
    })?;

    info!("webhook queued {message_id} for thread {thread_id}");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "queued",
            "message_id": message_id,
        })),
    ))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/webhook", post(webhook))
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

/// Run the API server until `cancel` fires.
pub async fn serve(config: ApiConfig, state: ApiState, cancel: CancellationToken) {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("API server failed to bind to {addr}: {e}");
            cancel.cancel();
            return;
        }
    };

    info!("API server listening on {addr}");

    let app = build_router(state);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
    {
        error!("API server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::FailingStore;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use parley_memory::SqliteStore;
    use tower::ServiceExt;

    fn router(
        api_key: Option<&str>,
        tx: Option<mpsc::Sender<InboundMessage>>,
        store: Option<Arc<dyn ChatStore>>,
    ) -> Router {
        build_router(ApiState {
            tx,
            api_key: api_key.map(str::to_string),
            uptime: Instant::now(),
            store,
            supervisor: Supervisor::new(),
        })
    }

    fn webhook_request(body: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::post("/api/webhook").header("Content-Type", "application/json");
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(resp: axum::http::Response<Body>) -> Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn payload() -> Value {
        json!({
            "thread_id": "t-1",
            "message_id": "m-1",
            "message_content": {"text": "hello"},
            "message_type": "text",
            "sender_number": "+15550100000",
            "sender_name": "Ana",
            "thread_type": "individual",
            "timestamp": "2026-03-01T10:00:00Z",
            "service": "imessage",
            "account_id": "+15550109999"
        })
    }

    #[tokio::test]
    async fn test_health_reports_store_and_tasks() {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let app = router(None, None, Some(store));
        let req = Request::get("/api/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["store"], "ok");
        assert_eq!(json["tasks"]["spawned"], 0);
        assert!(json["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn test_health_store_states() {
        let resp = router(None, None, None)
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["store"], "disabled");

        let resp = router(None, None, Some(Arc::new(FailingStore)))
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["store"], "unavailable");
    }

    #[tokio::test]
    async fn test_health_bad_auth() {
        let app = router(Some("secret"), None, None);
        let req = Request::get("/api/health")
            .header("Authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_queues_message() {
        let (tx, mut rx) = mpsc::channel(4);
        let app = router(Some("secret"), Some(tx), None);

        let resp = app
            .oneshot(webhook_request(&payload().to_string(), Some("secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "queued");
        assert_eq!(json["message_id"], "m-1");

        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.thread_id, "t-1");
        assert_eq!(queued.text(), "hello");
        assert_eq!(queued.account_id.as_deref(), Some("+15550109999"));
    }

    #[tokio::test]
    async fn test_webhook_missing_token() {
        let (tx, _rx) = mpsc::channel(1);
        let app = router(Some("secret"), Some(tx), None);
        let resp = app
            .oneshot(webhook_request(&payload().to_string(), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_invalid_json() {
        let (tx, _rx) = mpsc::channel(1);
        let app = router(None, Some(tx), None);
        let resp = app
            .oneshot(webhook_request("{not json", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_rejects_empty_thread_id() {
        let (tx, _rx) = mpsc::channel(1);
        let app = router(None, Some(tx), None);
        let mut body = payload();
        body["thread_id"] = json!("  ");
        let resp = app
            .oneshot(webhook_request(&body.to_string(), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("thread_id"));
    }

    #[tokio::test]
    async fn test_webhook_unknown_thread_type_is_rejected() {
        let (tx, _rx) = mpsc::channel(1);
        let app = router(None, Some(tx), None);
        let mut body = payload();
        body["thread_type"] = json!("broadcast");
        let resp = app
            .oneshot(webhook_request(&body.to_string(), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_gateway_gone() {
        let app = router(None, None, None);
        let resp = app
            .oneshot(webhook_request(&payload().to_string(), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let app = router(None, Some(tx), None);
        let resp = app
            .oneshot(webhook_request(&payload().to_string(), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
