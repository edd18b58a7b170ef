//! MCP-compatible HTTP tool server.
//!
//! Exposes the four docdex tools via a JSON HTTP API suitable for
//! integration with Cursor, Claude, and other MCP-compatible AI clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List the tools with parameter schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `service_unavailable` (503), `tool_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients and cross-origin tool calls.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::FunctionDetail;
use crate::modules;
use crate::query::QueryService;
use crate::summary::{self, SUMMARY_FILE};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    service: Arc<QueryService>,
}

/// Start the tool server. Runs until the process is terminated.
pub async fn run_server(config: &Config, service: Arc<QueryService>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    // Expired rows from earlier runs are dead weight; clear them up front.
    let swept = service.sweep_cache().await;
    if swept > 0 {
        eprintln!("cache sweep removed {} expired entries", swept);
    }

    let state = AppState {
        config: Arc::new(config.clone()),
        service,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("docdex tool server listening on http://{}", bind_addr);
    for name in ["search_docs", "get_function", "list_modules", "cache_stats"] {
        println!("  POST /tools/{}", name);
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn service_unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "service_unavailable".to_string(),
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error".to_string(),
        message: message.into(),
    }
}

/// Map tool execution errors to the most appropriate HTTP status. Built-in
/// tools signal client errors through their messages rather than a custom
/// error type.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = err.to_string();

    if msg.contains("unavailable") {
        service_unavailable(format!("{}: {}", tool_name, msg))
    } else if msg.contains("No index summary") {
        not_found(format!("{}: {}", tool_name, msg))
    } else if msg.contains("must not be empty") || msg.contains("invalid") {
        bad_request(format!("{}: {}", tool_name, msg))
    } else {
        tool_error(format!("{}: {}", tool_name, msg))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools() -> Json<ToolListResponse> {
    let tools = vec![
        ToolInfo {
            name: "search_docs".to_string(),
            description: "Semantic search over the indexed API documentation".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Natural language search query"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 20, "default": 5}
                },
                "required": ["query"]
            }),
        },
        ToolInfo {
            name: "get_function".to_string(),
            description: "Full detail for one API element by dotted path".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "function_path": {"type": "string", "description": "Fully-qualified dotted path"}
                },
                "required": ["function_path"]
            }),
        },
        ToolInfo {
            name: "list_modules".to_string(),
            description: "Immediate child modules of an optional parent module".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "parent_module": {"type": "string"}
                }
            }),
        },
        ToolInfo {
            name: "cache_stats".to_string(),
            description: "Local cache hit/miss/entry/evicted counters".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        },
    ];

    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = match name.as_str() {
        "search_docs" => run_search_docs(&state, &params).await?,
        "get_function" => run_get_function(&state, &params).await?,
        "list_modules" => run_list_modules(&state, &params)?,
        "cache_stats" => {
            let stats = state.service.cache_stats().await;
            serde_json::json!(stats)
        }
        other => {
            return Err(not_found(format!("no tool registered with name: {}", other)));
        }
    };

    Ok(Json(serde_json::json!({ "result": result })))
}

async fn run_search_docs(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, AppError> {
    let query = params
        .get("query")
        .and_then(|v| v.as_str())
        .ok_or_else(|| bad_request("search_docs: query must be a string"))?;
    if query.trim().is_empty() {
        return Err(bad_request("search_docs: query must not be empty"));
    }

    let limit = params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize);

    let hits = state
        .service
        .search(query, limit)
        .await
        .map_err(|e| classify_tool_error("search_docs", e))?;

    Ok(serde_json::json!(hits))
}

async fn run_get_function(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, AppError> {
    let path = params
        .get("function_path")
        .and_then(|v| v.as_str())
        .ok_or_else(|| bad_request("get_function: function_path must be a string"))?;

    let detail: Option<FunctionDetail> = state
        .service
        .get_function(path)
        .await
        .map_err(|e| classify_tool_error("get_function", e))?;

    match detail {
        Some(detail) => Ok(serde_json::json!(detail)),
        None => Err(not_found(format!(
            "Function '{}' not found in documentation",
            path.trim()
        ))),
    }
}

fn run_list_modules(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, AppError> {
    let parent = params.get("parent_module").and_then(|v| v.as_str());

    let summary_path = state.config.cache.dir.join(SUMMARY_FILE);
    let index_summary = summary::read_summary(&summary_path)
        .map_err(|e| classify_tool_error("list_modules", e))?;

    let children = modules::list_modules(&index_summary, parent);
    Ok(serde_json::json!(children))
}
