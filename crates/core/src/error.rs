//! Execution error taxonomy.
//!
//! These never escape the orchestrator boundary: every variant is converted
//! into a non-throwing [`ExecuteResponse`](toolgate_api_types::ExecuteResponse)
//! before the HTTP layer sees it. Only genuinely unexpected faults surface as
//! 500-style errors there.

use toolgate_api_types::ToolId;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Bad input; nothing was spawned.
    #[error("Command validation failed: {0}")]
    Validation(String),
    /// The requested tool was not detected as available.
    #[error("Tool {0} is not available")]
    Unavailable(ToolId),
    /// The process exceeded its wall-clock bound and was killed.
    #[error("Command timed out after {0} seconds")]
    Timeout(u64),
    /// Spawn failure, or the run was force-cancelled.
    #[error("Command execution failed: {0}")]
    Execution(String),
    /// Unexpected internal fault.
    #[error("Service error: {0}")]
    Service(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(
            ExecError::Timeout(30).to_string(),
            "Command timed out after 30 seconds"
        );
        assert_eq!(
            ExecError::Unavailable(ToolId::ClaudeCode).to_string(),
            "Tool claude_code is not available"
        );
        assert!(ExecError::Validation("Command cannot be empty".into())
            .to_string()
            .starts_with("Command validation failed"));
    }
}
