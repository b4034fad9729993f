use crate::error::BridgeError;
use crate::server::signal::{RawSignal, TradeSignal};
use crate::server::state::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

const SECRET_HEADER: &str = "x-tv-secret";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/webhook", post(webhook))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut body = json!({
        "ok": true,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "host": state.broker.host(),
    });

    if !state.risk.is_empty() {
        let caps: BTreeMap<&String, &u32> = state.risk.caps().iter().collect();
        body["risk"] = json!({
            "account_size": state.risk_config.account_size,
            "max_drawdown": state.risk_config.max_drawdown,
            "max_notional_usd": state.risk_config.max_notional_usd,
            "max_qty": caps,
        });
        body["roots_supported"] = json!(state.risk.roots());
    }

    Json(body)
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SecretQuery {
    secret: Option<String>,
}

/// Error response enriched with whatever the caller sent.
struct WebhookFailure {
    error: BridgeError,
    action: Option<String>,
    instrument: Option<String>,
}

impl WebhookFailure {
    fn bare(error: BridgeError) -> Self {
        Self {
            error,
            action: None,
            instrument: None,
        }
    }
}

impl IntoResponse for WebhookFailure {
    fn into_response(self) -> Response {
        let mut body = json!({"ok": false, "error": self.error.to_string()});
        if let Some(action) = self.action {
            body["action"] = json!(action);
        }
        if let Some(instrument) = self.instrument {
            body["instrument"] = json!(instrument);
        }
        if let BridgeError::Broker {
            status,
            body: broker_body,
            text,
        } = &self.error
        {
            body["status"] = json!(status);
            body["body"] = broker_body.clone().unwrap_or_else(|| json!(text));
        }

        (self.error.status_code(), Json(body)).into_response()
    }
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SecretQuery>,
    body: Bytes,
) -> Response {
    match handle_webhook(&state, &headers, query.secret.as_deref(), &body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(failure) => {
            warn!(
                action = failure.action.as_deref().unwrap_or("-"),
                instrument = failure.instrument.as_deref().unwrap_or("-"),
                error = %failure.error,
                "Webhook failed"
            );
            failure.into_response()
        }
    }
}

async fn handle_webhook(
    state: &AppState,
    headers: &HeaderMap,
    query_secret: Option<&str>,
    body: &[u8],
) -> Result<Value, WebhookFailure> {
    authorize(state.webhook_secret.as_deref(), headers, query_secret)
        .map_err(WebhookFailure::bare)?;

    let raw = RawSignal::from_slice(body).map_err(WebhookFailure::bare)?;
    let action = raw.action_label();
    let instrument = raw.instrument_label();
    let fail = |error| WebhookFailure {
        error,
        action: action.clone(),
        instrument: instrument.clone(),
    };

    let signal = TradeSignal::try_from(raw).map_err(fail)?;
    info!(?signal, "Webhook received");
    dispatch(state, signal).await.map_err(fail)
}

/// Shared-secret check. Passes when no secret is configured.
fn authorize(
    expected: Option<&str>,
    headers: &HeaderMap,
    query_secret: Option<&str>,
) -> Result<(), BridgeError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let header_secret = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    let matches = [header_secret, query_secret]
        .into_iter()
        .flatten()
        .any(|provided| bool::from(provided.as_bytes().ct_eq(expected.as_bytes())));

    if matches {
        Ok(())
    } else {
        Err(BridgeError::Unauthorized)
    }
}

async fn dispatch(state: &AppState, signal: TradeSignal) -> Result<Value, BridgeError> {
    match signal {
        TradeSignal::Entry {
            action,
            instrument,
            qty,
        } => {
            state.risk.enforce_risk(&instrument, qty)?;
            let placement = state.broker.place_market(&instrument, qty, action).await?;

            info!(%instrument, %action, qty, contract_id = placement.contract_id, "Order routed");
            Ok(json!({
                "ok": true,
                "action": action.to_string().to_lowercase(),
                "instrument": instrument,
                "qty": qty,
                "contractId": placement.contract_id,
                "order": placement.response,
            }))
        }
        TradeSignal::Close { side, instrument } => {
            let outcome = state.broker.flatten_side(side, instrument.as_deref()).await?;

            Ok(json!({
                "ok": true,
                "action": "close",
                "side": side,
                "instrument": instrument,
                "count": outcome.count,
                "results": outcome.results,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TradovateConfig};
    use crate::server::build_router;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use tower::ServiceExt;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(host: &str, secret: Option<&str>) -> Config {
        let mut config = Config::default();
        config.tradovate = TradovateConfig {
            host: host.to_string(),
            username: Some("trader".to_string()),
            password: Some("secret".to_string()),
            ..TradovateConfig::default()
        };
        config.server.webhook_secret = secret.map(str::to_string);
        config.risk.max_qty = [("MES".to_string(), 10), ("ES".to_string(), 1)]
            .into_iter()
            .collect();
        config
    }

    fn app(config: &Config) -> Router {
        build_router(Arc::new(AppState::new(config).unwrap()))
    }

    async fn send(
        app: Router,
        uri: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = app
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn mount_session(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/accesstokenrequest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "tok-1",
                "expirationTime": (Utc::now() + Duration::minutes(90)).to_rfc3339(),
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/account/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 101}])))
            .mount(server)
            .await;
    }

    async fn mount_suggest(server: &MockServer, root: &str, contracts: Value) {
        Mock::given(method("GET"))
            .and(path("/contract/suggest"))
            .and(query_param("t", root))
            .respond_with(ResponseTemplate::new(200).set_body_json(contracts))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_health() {
        let config = test_config("https://demo.tradovateapi.com/v1", None);
        let response = app(&config)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["service"], "tradovate-bridge");
        assert_eq!(body["host"], "https://demo.tradovateapi.com/v1");
        assert_eq!(body["roots_supported"], json!(["ES", "MES"]));
        assert_eq!(body["risk"]["max_qty"]["MES"], 10);
    }

    #[tokio::test]
    async fn test_buy_routes_front_month_order() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        let now = Utc::now();
        mount_suggest(
            &server,
            "MES",
            json!([
                {"id": 500, "name": "MESU5", "expirationDate": (now - Duration::days(30)).to_rfc3339()},
                {"id": 501, "name": "MESZ5", "expirationDate": (now + Duration::days(45)).to_rfc3339()},
                {"id": 502, "name": "MESH6", "expirationDate": (now + Duration::days(135)).to_rfc3339()},
            ]),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/order/placeorder"))
            .and(body_partial_json(json!({
                "accountId": 101,
                "contractId": 501,
                "action": "Buy",
                "orderType": "Market",
                "orderQty": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orderId": 77})))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), None);
        let (status, body) = send(
            app(&config),
            "/webhook",
            &[],
            r#"{"action":"buy","instrument":"MES","units":3}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["action"], "buy");
        assert_eq!(body["qty"], 3);
        assert_eq!(body["contractId"], 501);
        assert_eq!(body["order"]["orderId"], 77);
    }

    #[tokio::test]
    async fn test_risk_rejection_makes_no_broker_call() {
        let server = MockServer::start().await;
        let config = test_config(&server.uri(), None);

        let (status, body) = send(
            app(&config),
            "/webhook",
            &[],
            r#"{"action":"buy","instrument":"ES","units":5}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["instrument"], "ES");
        assert!(body["error"].as_str().unwrap().contains("risk guard"));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_close_long_flattens_matching_position() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        mount_suggest(
            &server,
            "GC",
            json!([{"id": 900, "name": "GCZ5",
                    "expirationDate": (Utc::now() + Duration::days(40)).to_rfc3339()}]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/position/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"accountId": 101, "contractId": 900, "netPos": 2},
                {"accountId": 101, "contractId": 901, "netPos": 4},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/order/placeorder"))
            .and(body_partial_json(json!({
                "contractId": 900,
                "action": "Sell",
                "orderQty": 2
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orderId": 5})))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), None);
        let (status, body) = send(
            app(&config),
            "/webhook",
            &[],
            r#"{"action":"close","side":"long","instrument":"GC"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["side"], "long");
        assert_eq!(body["results"][0]["orderId"], 5);
    }

    #[tokio::test]
    async fn test_secret_is_enforced() {
        let config = test_config("http://127.0.0.1:9", Some("s3cret"));
        let payload = r#"{"action":"noop"}"#;

        let (status, body) = send(app(&config), "/webhook", &[], payload).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["ok"], false);

        let (status, _) =
            send(app(&config), "/webhook", &[("X-TV-Secret", "wrong")], payload).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Authorized requests get past the check and fail on the unknown action
        let (status, _) =
            send(app(&config), "/webhook", &[("X-TV-Secret", "s3cret")], payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(app(&config), "/webhook?secret=s3cret", &[], payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let config = test_config("http://127.0.0.1:9", None);
        let (status, body) = send(app(&config), "/webhook", &[], "{oops").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().starts_with("invalid JSON payload"));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let config = test_config("http://127.0.0.1:9", None);
        let (status, body) = send(
            app(&config),
            "/webhook",
            &[],
            r#"{"action":"reverse","instrument":"ES"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["action"], "reverse");
        assert_eq!(body["error"], "unrecognized action: reverse");
    }

    #[tokio::test]
    async fn test_broker_failure_is_bad_gateway() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(path("/contract/find"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 12, "name": "MESZ5"})),
            )
            .mount(&server)
            .await;
        Mock::given(path("/order/placeorder"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"errorText": "Market closed"})),
            )
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), None);
        let (status, body) = send(
            app(&config),
            "/webhook",
            &[],
            r#"{"action":"sell","instrument":"MESZ5","units":"2"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["ok"], false);
        assert_eq!(body["status"], 500);
        assert_eq!(body["body"]["errorText"], "Market closed");
        assert_eq!(body["instrument"], "MESZ5");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_server_error() {
        let mut config = test_config("http://127.0.0.1:9", None);
        config.tradovate.username = None;

        let (status, body) = send(
            app(&config),
            "/webhook",
            &[],
            r#"{"action":"buy","instrument":"MES"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("configuration error"));
    }
}
