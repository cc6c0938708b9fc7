//! HTTP handlers for the toolgate API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use toolgate_api_types::{
    ApiError, CancelSummary, DetectedTool, DetectionRequest, DetectionResult, ErrorResponse,
    ExecuteRequest, ExecuteResponse, HistoryRecord, ToolId, ToolStatus, ValidationVerdict,
};
use tracing::{info, warn};

use crate::AppState;

/// Wrapper type to implement IntoResponse for ApiError.
#[derive(Debug)]
pub struct ApiErrorResponse(pub ApiError);

impl From<ApiError> for ApiErrorResponse {
    fn from(err: ApiError) -> Self {
        ApiErrorResponse(err)
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match &self.0 {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolsQuery {
    #[serde(default)]
    pub refresh: Option<bool>,
    #[serde(default)]
    pub tools: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    #[serde(default)]
    pub refresh: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

/// Body of `POST /detect`. Tool names arrive as strings so that unknown
/// names can be skipped instead of failing deserialization.
#[derive(Debug, Deserialize)]
pub struct DetectBody {
    #[serde(default)]
    pub tools_to_detect: Option<Vec<String>>,
    #[serde(default)]
    pub force_refresh: bool,
}

/// Body of `POST /validate-command`.
#[derive(Debug, Deserialize)]
pub struct ValidateBody {
    pub command: String,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToolVersionResponse {
    pub tool_type: ToolId,
    pub version: Option<String>,
    pub status: ToolStatus,
    pub timestamp: DateTime<Utc>,
}

/// Health check for the service and its sub-services.
pub async fn health(State(state): State<AppState>) -> ResponseJson<Value> {
    ResponseJson(json!({
        "service_status": "healthy",
        "detection_service": "healthy",
        "execution_service": "healthy",
        "timestamp": Utc::now(),
        "uptime_seconds": state.started_at.elapsed().as_secs_f64(),
    }))
}

/// List detected tools, optionally filtered and refreshed.
pub async fn list_tools(
    State(state): State<AppState>,
    Query(query): Query<ToolsQuery>,
) -> Json<Vec<DetectedTool>> {
    let tools_to_detect = query
        .tools
        .as_deref()
        .map(parse_tool_names)
        .unwrap_or_else(|| ToolId::all().to_vec());

    let request = DetectionRequest {
        tools_to_detect,
        force_refresh: query.refresh.unwrap_or(false),
    };

    let result = state.cache.detect_all(&request).await;
    Json(result.tools)
}

/// Run a detection pass with explicit configuration.
pub async fn detect(
    State(state): State<AppState>,
    Json(body): Json<DetectBody>,
) -> Json<DetectionResult> {
    let tools_to_detect = match body.tools_to_detect {
        Some(names) => map_tool_names(&names),
        None => ToolId::all().to_vec(),
    };

    let request = DetectionRequest {
        tools_to_detect,
        force_refresh: body.force_refresh,
    };

    let result = state.cache.detect_all(&request).await;
    info!(
        tools = result.tools.len(),
        available = result.total_detected,
        errors = result.errors.len(),
        "detection requested"
    );
    Json(result)
}

/// Version of a single tool.
pub async fn tool_version(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<ToolVersionResponse>, ApiErrorResponse> {
    let Some(tool) = ToolId::from_name(&tool) else {
        return Err(ApiError::BadRequest(format!("Unknown tool type: {tool}")).into());
    };

    if query.refresh.unwrap_or(false) {
        let request = DetectionRequest {
            tools_to_detect: vec![tool],
            force_refresh: true,
        };
        state.cache.detect_all(&request).await;
    }

    let found = state.cache.get_status(tool).await;
    let version = found.is_available().then_some(found.version).flatten();

    Ok(Json(ToolVersionResponse {
        tool_type: tool,
        version,
        status: found.status,
        timestamp: Utc::now(),
    }))
}

/// Execute a command with a detected tool. The HTTP status is 200 even for
/// failed executions; the body carries the outcome.
pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Json<ExecuteResponse> {
    let response = state.service.execute(&request).await;
    info!(
        tool = %request.tool_type,
        success = response.success,
        return_code = response.return_code,
        elapsed_ms = response.execution_time_ms,
        "command execution completed"
    );
    Json(response)
}

/// Validate a command without executing it.
pub async fn validate_command(
    State(state): State<AppState>,
    Json(body): Json<ValidateBody>,
) -> Result<Json<ValidationVerdict>, ApiErrorResponse> {
    if let Some(name) = &body.tool {
        let Some(tool) = ToolId::from_name(name) else {
            return Err(ApiError::BadRequest(format!("Unknown tool type: {name}")).into());
        };
        let found = state.cache.get_status(tool).await;
        if !found.is_available() {
            return Err(ApiError::BadRequest(format!("Tool {tool} is not available")).into());
        }
    }

    Ok(Json(
        state
            .service
            .validate(&body.command, body.working_directory.as_deref()),
    ))
}

/// Combined service status.
pub async fn service_status(State(state): State<AppState>) -> ResponseJson<Value> {
    ResponseJson(json!({
        "detection_summary": state.cache.summary().await,
        "execution_summary": {
            "running_processes": state.service.running_count(),
            "history_count": state.service.history_len(),
        },
        "total_available_tools": state.cache.available_count().await,
        "service_version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Clear the detection cache and the execution history.
pub async fn clear_cache(State(state): State<AppState>) -> ResponseJson<Value> {
    state.cache.clear().await;
    state.service.clear_history();
    ResponseJson(json!({ "message": "Caches cleared successfully" }))
}

/// Cancel all running executions.
pub async fn cancel_executions(State(state): State<AppState>) -> Json<CancelSummary> {
    let summary = state.service.cancel_all();
    info!(
        cancelled = summary.cancelled,
        remaining = summary.remaining,
        "executions cancelled"
    );
    Json(summary)
}

/// Paginated execution history, newest-last within the window.
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<HistoryRecord>> {
    let limit = query.limit.unwrap_or(10);
    let offset = query.offset.unwrap_or(0);

    let window = state.service.history(limit + offset);
    let records: Vec<HistoryRecord> = window.into_iter().skip(offset).take(limit).collect();
    Json(records)
}

/// Names of all supported tools.
pub async fn supported_tools() -> Json<Vec<String>> {
    Json(ToolId::all().iter().map(|t| t.name().to_string()).collect())
}

/// Map external tool names onto the closed set. Unknown names are logged and
/// skipped; an empty result falls back to the full set so a typo-ridden
/// request still detects something useful.
fn map_tool_names(names: &[String]) -> Vec<ToolId> {
    let mut tools = Vec::new();
    for name in names {
        match ToolId::from_name(name.trim()) {
            Some(tool) => tools.push(tool),
            None => warn!(tool = %name, "unknown tool type ignored"),
        }
    }
    if tools.is_empty() {
        ToolId::all().to_vec()
    } else {
        tools
    }
}

fn parse_tool_names(csv: &str) -> Vec<ToolId> {
    let names: Vec<String> = csv
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    map_tool_names(&names)
}
