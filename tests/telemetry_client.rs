//! UptimeRobotClient against an in-process axum server impersonating
//! the monitor API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::post, Form, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use venue_latency_backend::latency::{
    DiagnosticEvent, LatencyDiagnostics, TelemetryConfig, TelemetryError, TelemetryFailure,
    TelemetrySource, UptimeRobotClient,
};

async fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: String, api_key: Option<&str>) -> (UptimeRobotClient, Arc<LatencyDiagnostics>) {
    let diagnostics = Arc::new(LatencyDiagnostics::new());
    let config = TelemetryConfig {
        api_key: api_key.map(str::to_string),
        base_url,
        response_times_limit: 24,
        request_timeout: Duration::from_millis(500),
    };
    (UptimeRobotClient::new(config, diagnostics.clone()).unwrap(), diagnostics)
}

#[tokio::test]
async fn test_fetch_monitors_ok() {
    let seen: Arc<Mutex<Option<HashMap<String, String>>>> = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let app = Router::new().route(
        "/getMonitors",
        post(move |Form(form): Form<HashMap<String, String>>| {
            let captured = captured.clone();
            async move {
                *captured.lock() = Some(form);
                Json(json!({
                    "stat": "ok",
                    "monitors": [
                        {
                            "id": 1,
                            "friendly_name": "Binance API",
                            "url": "https://api.binance.com",
                            "average_response_time": "87.250",
                            "response_times": [
                                {"datetime": 1700003600, "value": 80},
                                {"datetime": 1700000000, "value": 95}
                            ]
                        },
                        {
                            "id": 2,
                            "friendly_name": "OKX",
                            "url": "https://www.okx.com",
                            "average_response_time": 120
                        }
                    ]
                }))
            }
        }),
    );
    let (client, diagnostics) = client(spawn_server(app).await, Some("secret"));

    let monitors = client.fetch_monitors().await;
    assert_eq!(monitors.len(), 2);
    assert_eq!(monitors[0].friendly_name, "Binance API");
    assert_eq!(monitors[0].average_response_time, 87.25);
    assert_eq!(monitors[0].response_times.as_ref().map(Vec::len), Some(2));
    assert!(monitors[1].response_times.is_none());

    let form = seen.lock().clone().unwrap();
    assert_eq!(form.get("api_key").map(String::as_str), Some("secret"));
    assert_eq!(form.get("format").map(String::as_str), Some("json"));
    assert_eq!(form.get("response_times").map(String::as_str), Some("1"));
    assert_eq!(form.get("response_times_limit").map(String::as_str), Some("24"));

    assert!(diagnostics
        .to_prometheus()
        .contains("latency_telemetry_fetches_total 1"));
}

#[tokio::test]
async fn test_bad_record_does_not_drop_page() {
    let app = Router::new().route(
        "/getMonitors",
        post(|| async {
            Json(json!({
                "stat": "ok",
                "monitors": [
                    {"friendly_name": "Binance", "url": "", "average_response_time": ""},
                    {"friendly_name": "OKX", "url": "", "average_response_time": "120"}
                ]
            }))
        }),
    );
    let (client, diagnostics) = client(spawn_server(app).await, Some("secret"));
    let mut events = diagnostics.subscribe();

    let monitors = client.fetch_monitors().await;
    assert_eq!(monitors.len(), 1);
    assert_eq!(monitors[0].friendly_name, "OKX");

    assert!(matches!(
        events.recv().await.unwrap(),
        DiagnosticEvent::MonitorsSkipped { skipped: 1, .. }
    ));
    assert_eq!(
        events.recv().await.unwrap(),
        DiagnosticEvent::TelemetryFetched { monitors: 1 }
    );
    assert!(diagnostics
        .to_prometheus()
        .contains("latency_skipped_monitors_total 1\n"));
}

#[tokio::test]
async fn test_http_error_is_empty() {
    let app = Router::new().route(
        "/getMonitors",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let (client, diagnostics) = client(spawn_server(app).await, Some("secret"));
    let mut events = diagnostics.subscribe();

    assert!(matches!(
        client.try_fetch_monitors().await,
        Err(TelemetryError::HttpStatus(500))
    ));
    assert!(client.fetch_monitors().await.is_empty());
    assert_eq!(
        events.recv().await.unwrap(),
        DiagnosticEvent::TelemetryUnavailable {
            failure: TelemetryFailure::HttpStatus(500)
        }
    );
}

#[tokio::test]
async fn test_stat_fail_is_empty() {
    let app = Router::new().route(
        "/getMonitors",
        post(|| async {
            Json(json!({
                "stat": "fail",
                "error": {"type": "invalid_parameter", "message": "api_key is invalid."}
            }))
        }),
    );
    let (client, _) = client(spawn_server(app).await, Some("bad"));

    assert!(matches!(
        client.try_fetch_monitors().await,
        Err(TelemetryError::Rejected(_))
    ));
    assert!(client.fetch_monitors().await.is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_empty() {
    let app = Router::new().route("/getMonitors", post(|| async { "<html>maintenance</html>" }));
    let (client, _) = client(spawn_server(app).await, Some("secret"));

    assert!(matches!(
        client.try_fetch_monitors().await,
        Err(TelemetryError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let app = Router::new().route(
        "/getMonitors",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(Value::Null)
        }),
    );
    let (client, _) = client(spawn_server(app).await, Some("secret"));

    assert!(matches!(
        client.try_fetch_monitors().await,
        Err(TelemetryError::Timeout)
    ));
    assert!(client.fetch_monitors().await.is_empty());
}

#[tokio::test]
async fn test_missing_key_skips_request() {
    let (client, _) = client("http://127.0.0.1:9".to_string(), None);

    assert!(!client.is_configured());
    assert!(matches!(
        client.try_fetch_monitors().await,
        Err(TelemetryError::NotConfigured)
    ));
}
