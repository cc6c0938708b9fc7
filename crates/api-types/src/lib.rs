//! Shared request/response models and error types for the toolgate API.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of AI coding CLIs the service knows how to detect and drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    ClaudeCode,
    GeminiCli,
    QwenCode,
}

impl ToolId {
    /// Every supported tool, in a stable order.
    pub fn all() -> [ToolId; 3] {
        [ToolId::ClaudeCode, ToolId::GeminiCli, ToolId::QwenCode]
    }

    /// Name of the executable probed on the host.
    pub fn executable(&self) -> &'static str {
        match self {
            ToolId::ClaudeCode => "claude",
            ToolId::GeminiCli => "gemini",
            ToolId::QwenCode => "qwen-code",
        }
    }

    /// Human-readable tool name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ToolId::ClaudeCode => "Claude Code",
            ToolId::GeminiCli => "Gemini CLI",
            ToolId::QwenCode => "Qwen Code",
        }
    }

    /// Wire name, as used in URLs and request bodies.
    pub fn name(&self) -> &'static str {
        match self {
            ToolId::ClaudeCode => "claude_code",
            ToolId::GeminiCli => "gemini_cli",
            ToolId::QwenCode => "qwen_code",
        }
    }

    /// Parse a wire name. Unknown names return `None`; callers decide whether
    /// that is a warning (batch requests) or a hard error (single-tool paths).
    pub fn from_name(name: &str) -> Option<ToolId> {
        match name {
            "claude_code" => Some(ToolId::ClaudeCode),
            "gemini_cli" => Some(ToolId::GeminiCli),
            "qwen_code" => Some(ToolId::QwenCode),
            _ => None,
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detection status of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Available,
    Missing,
    Error,
    Unknown,
}

/// A detected tool. Produced whole by a detection pass and replaced, never
/// mutated, on re-detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTool {
    pub name: String,
    pub tool_type: ToolId,
    pub status: ToolStatus,
    #[serde(default)]
    pub executable_path: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub last_detected: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl DetectedTool {
    /// Placeholder for a tool that could not be found.
    pub fn missing(tool: ToolId, reason: impl Into<String>) -> Self {
        Self::with_status(tool, ToolStatus::Missing, "reason", reason.into())
    }

    /// Placeholder for a detection pass that itself failed.
    pub fn error(tool: ToolId, error: impl Into<String>) -> Self {
        Self::with_status(tool, ToolStatus::Error, "error", error.into())
    }

    fn with_status(tool: ToolId, status: ToolStatus, key: &str, value: String) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(key.to_string(), value);
        Self {
            name: tool.display_name().to_string(),
            tool_type: tool,
            status,
            executable_path: None,
            version: None,
            last_detected: Utc::now(),
            metadata,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ToolStatus::Available
    }
}

/// Request for a detection pass over a set of tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRequest {
    #[serde(default = "default_tools")]
    pub tools_to_detect: Vec<ToolId>,
    #[serde(default)]
    pub force_refresh: bool,
}

impl Default for DetectionRequest {
    fn default() -> Self {
        Self {
            tools_to_detect: default_tools(),
            force_refresh: false,
        }
    }
}

fn default_tools() -> Vec<ToolId> {
    ToolId::all().to_vec()
}

/// Result of a detection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub tools: Vec<DetectedTool>,
    pub total_detected: usize,
    pub detection_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub execution_time_ms: f64,
}

/// Request to execute a command with a detected tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub tool_type: ToolId,
    pub command: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub working_directory: Option<String>,
}

pub fn default_timeout_seconds() -> u64 {
    30
}

/// Outcome of a command execution. Exactly one terminal outcome per request:
/// success, non-zero exit, timeout, validation failure, or tool-unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    pub return_code: i32,
    pub execution_time_ms: f64,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Structured validation verdict. Warnings never block execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// One completed execution, as kept in the bounded history ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub tool: ToolId,
    pub command: String,
    pub success: bool,
    pub return_code: i32,
    pub execution_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// Result of a cancel-all sweep over running executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSummary {
    pub cancelled: usize,
    pub remaining: usize,
}

#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
pub enum ApiError {
    #[error("bad_request: {0}")]
    BadRequest(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
