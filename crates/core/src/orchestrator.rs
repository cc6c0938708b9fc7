//! Execution orchestrator: the composition root over validator, detection
//! cache, and process executor.

use std::sync::Arc;

use tokio::sync::OnceCell;
use toolgate_api_types::{
    CancelSummary, ExecuteRequest, ExecuteResponse, HistoryRecord, ValidationVerdict,
};
use tracing::{info, warn};

use crate::cache::DetectionCache;
use crate::error::ExecError;
use crate::exec::ProcessExecutor;
use crate::validator;

/// Timeout bounds applied to every execution request.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub default_timeout_secs: u64,
    pub max_timeout_secs: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            max_timeout_secs: 300,
        }
    }
}

/// Front door for command execution. One instance lives for the whole
/// process; construction is explicit, there is no module-level singleton.
pub struct ExecutionService {
    executor: ProcessExecutor,
    limits: ExecutionLimits,
    init: OnceCell<()>,
}

impl ExecutionService {
    pub fn new(cache: Arc<DetectionCache>) -> Self {
        Self::with_limits(cache, ExecutionLimits::default())
    }

    pub fn with_limits(cache: Arc<DetectionCache>, limits: ExecutionLimits) -> Self {
        Self {
            executor: ProcessExecutor::new(cache),
            limits,
            init: OnceCell::new(),
        }
    }

    /// One-time lazy initialization: drops any stale history. Safe to call
    /// concurrently; later calls are no-ops.
    async fn ensure_initialized(&self) {
        self.init
            .get_or_init(|| async {
                self.executor.clear_history();
                info!("execution service initialized");
            })
            .await;
    }

    /// Execute a request to a terminal outcome. Internal faults are shaped
    /// into the response; this never panics across the boundary.
    pub async fn execute(&self, request: &ExecuteRequest) -> ExecuteResponse {
        self.ensure_initialized().await;

        let mut request = request.clone();
        request.timeout_seconds = self.clamp_timeout(request.timeout_seconds);

        let executor = self.executor.clone();
        match tokio::spawn(async move { executor.run(&request).await }).await {
            Ok(response) => response,
            Err(e) => ExecuteResponse {
                success: false,
                stdout: None,
                stderr: None,
                return_code: -1,
                execution_time_ms: 0.0,
                error_message: Some(ExecError::Service(e.to_string()).to_string()),
            },
        }
    }

    /// Dry-run validation without spawning anything.
    pub fn validate(&self, command: &str, working_directory: Option<&str>) -> ValidationVerdict {
        validator::validate(command, working_directory)
    }

    pub fn cancel_all(&self) -> CancelSummary {
        self.executor.cancel_all()
    }

    pub fn history(&self, limit: usize) -> Vec<HistoryRecord> {
        self.executor.history(limit)
    }

    pub fn clear_history(&self) {
        self.executor.clear_history()
    }

    pub fn history_len(&self) -> usize {
        self.executor.history_len()
    }

    pub fn running_count(&self) -> usize {
        self.executor.running_count()
    }

    fn clamp_timeout(&self, requested: u64) -> u64 {
        if requested == 0 {
            warn!("timeout of 0s raised to 1s");
            1
        } else if requested > self.limits.max_timeout_secs {
            warn!(
                requested,
                max = self.limits.max_timeout_secs,
                "timeout clamped to configured maximum"
            );
            self.limits.max_timeout_secs
        } else {
            requested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_clamping() {
        let limits = ExecutionLimits::default();
        let service = ExecutionService::with_limits(
            Arc::new(DetectionCache::with_default_ttl(Arc::new(
                crate::detect::SystemProbe::new(),
            ))),
            limits,
        );

        assert_eq!(service.clamp_timeout(0), 1);
        assert_eq!(service.clamp_timeout(30), 30);
        assert_eq!(service.clamp_timeout(10_000), limits.max_timeout_secs);
    }

    #[test]
    fn validate_delegates_to_validator() {
        let service = ExecutionService::new(Arc::new(DetectionCache::with_default_ttl(
            Arc::new(crate::detect::SystemProbe::new()),
        )));

        let verdict = service.validate("", None);
        assert!(!verdict.valid);
        assert_eq!(verdict.errors.len(), 1);

        let verdict = service.validate("review notes.md", None);
        assert!(verdict.valid);
    }
}
