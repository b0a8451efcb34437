use axum::{
    extract::{Form, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(100);

// Connector GUIDs that have been put into isolation during this process.
static ISOLATED: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Canned model behaviour, keyed on the incident text.
struct Scenario {
    severity: &'static str,
    investigate: &'static str,
    threat_level: &'static str,
    response: &'static str,
    actions: &'static str,
}

fn scenario_for(incident: &str) -> Scenario {
    let incident = incident.to_lowercase();
    if incident.contains("exfiltration") {
        Scenario {
            severity: "Critical",
            investigate: "Yes",
            threat_level: "Critical",
            response: "Manual",
            actions: "Engage incident response team",
        }
    } else if incident.contains("login anomaly") {
        Scenario {
            severity: "Low",
            investigate: "No",
            threat_level: "Low",
            response: "Manual",
            actions: "Review login history",
        }
    } else if incident.contains("malware") || incident.contains("c2") {
        Scenario {
            severity: "High",
            investigate: "Yes",
            threat_level: "High",
            response: "Automated",
            actions: "Isolate endpoint, Block C2 address, Open case",
        }
    } else if incident.contains("phishing") {
        Scenario {
            severity: "Medium",
            investigate: "Yes",
            threat_level: "Medium",
            response: "Manual",
            actions: "Open case",
        }
    } else {
        Scenario {
            severity: "Medium",
            investigate: "Yes",
            threat_level: "Low",
            response: "Manual",
            actions: "Monitor",
        }
    }
}

fn incident_line(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|line| line.trim().strip_prefix("Incident:"))
        .unwrap_or(prompt)
}

#[derive(Debug, Deserialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<MessageIn>,
}

#[derive(Debug, Deserialize)]
struct MessageIn {
    content: String,
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn llm_messages(headers: HeaderMap, Json(req): Json<MessagesRequest>) -> impl IntoResponse {
    if headers.get("x-api-key").is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"type": "error", "error": {"type": "authentication_error"}})),
        );
    }

    let prompt = req
        .messages
        .last()
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    let scenario = scenario_for(incident_line(prompt));

    let text = if prompt.contains("THREAT_LEVEL:") {
        format!(
            "THREAT_LEVEL: {}\nRESPONSE: {}\nACTIONS: {}",
            scenario.threat_level, scenario.response, scenario.actions
        )
    } else {
        format!(
            "SEVERITY: {}\nINVESTIGATE: {}\nREASONING: Matched canned scenario",
            scenario.severity, scenario.investigate
        )
    };
    info!(model = %req.model, "Answering LLM request");

    (
        StatusCode::OK,
        Json(json!({
            "id": "msg_mock",
            "type": "message",
            "role": "assistant",
            "model": req.model,
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn"
        })),
    )
}

async fn splunk_export(Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
    let search = form.get("search").cloned().unwrap_or_default();
    info!(%search, "Answering Splunk export");
    let body = [
        json!({"preview": false, "result": {"_time": "2026-01-01T10:00:00Z", "src_ip": "10.0.0.5", "dest_port": "443", "action": "allowed"}}),
        json!({"preview": false, "result": {"_time": "2026-01-01T10:05:00Z", "src_ip": "10.0.0.5", "dest_port": "8443", "action": "allowed"}}),
    ]
    .iter()
    .map(Value::to_string)
    .collect::<Vec<_>>()
    .join("\n");
    (StatusCode::OK, body)
}

async fn start_isolation(Path(guid): Path<String>) -> impl IntoResponse {
    if let Ok(mut isolated) = ISOLATED.lock() {
        isolated.push(guid.clone());
    }
    Json(json!({
        "version": "v1.2.0",
        "data": {"available": true, "status": "pending_start", "unlock_code": "unlockme"}
    }))
}

async fn isolation_status(Path(guid): Path<String>) -> impl IntoResponse {
    let isolated = ISOLATED
        .lock()
        .map(|list| list.contains(&guid))
        .unwrap_or(false);
    Json(json!({
        "version": "v1.2.0",
        "data": {
            "available": !isolated,
            "status": if isolated { "isolated" } else { "not_isolated" },
            "comment": format!("mock status for {}", guid)
        }
    }))
}

async fn block_host(Json(body): Json<Value>) -> impl IntoResponse {
    info!(?body, "Blocking host");
    (
        StatusCode::CREATED,
        Json(json!({"id": format!("rule-{}", body["value"].as_str().unwrap_or("unknown"))})),
    )
}

async fn list_devices(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let filter = params.get("filter").cloned();
    Json(json!({
        "items": [
            {"name": "edge-fw-01", "deviceType": "FTD"},
            {"name": "edge-fw-02", "deviceType": "FTD"}
        ],
        "filter": filter
    }))
}

async fn create_network_object(
    Path(domain): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(json!({"id": "obj-1", "domain": domain, "name": body["name"]})),
    )
}

async fn delete_network_object(Path((_domain, _id)): Path<(String, String)>) -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

async fn create_container(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if headers.get("ph-auth-token").is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"failed": true, "message": "missing token"})),
        );
    }
    let id = NEXT_CONTAINER_ID.fetch_add(1, Ordering::SeqCst);
    info!(id, name = ?body["name"], "Created SOAR container");
    (StatusCode::OK, Json(json!({"success": true, "id": id})))
}

async fn catch_all(method: axum::http::Method, uri: axum::http::Uri) -> impl IntoResponse {
    warn!("Unhandled request: {} {}", method, uri.path());
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "message": format!("No handler for: {} {}", method, uri.path()),
            "available_routes_info": [
                "GET /health",
                "POST /v1/messages",
                "POST /services/search/jobs/export",
                "GET|PUT /v1/computers/:guid/isolation",
                "POST /v1/blocked-hosts",
                "GET /v1/inventory/devices",
                "POST /v1/domain/:domain/object/networks",
                "DELETE /v1/domain/:domain/object/networks/:id",
                "POST /rest/container"
            ]
        })),
    )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting mock security operations backend...");

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/v1/messages", post(llm_messages))
        .route("/services/search/jobs/export", post(splunk_export))
        .route(
            "/v1/computers/:guid/isolation",
            get(isolation_status).put(start_isolation),
        )
        .route("/v1/blocked-hosts", post(block_host))
        .route("/v1/inventory/devices", get(list_devices))
        .route(
            "/v1/domain/:domain/object/networks",
            post(create_network_object),
        )
        .route(
            "/v1/domain/:domain/object/networks/:id",
            axum::routing::delete(delete_network_object),
        )
        .route("/rest/container", post(create_container))
        .fallback(catch_all)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    println!("MOCK_SERVER_PORT={}", port); // Critical for test harness
    info!("Mock server listening on 127.0.0.1:{}", port);

    axum::serve(listener, app).await.unwrap();
}
