//! Time-boxed subprocess execution with a live-process registry and a
//! bounded history ring.
//!
//! Commands are spawned as argv directly, never through a shell interpreter;
//! chaining operators and substitutions reach the child as literal argument
//! words. Every spawn registers a cancellation handle that is unregistered on
//! all exit paths.

pub mod env;
pub(crate) mod history;

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toolgate_api_types::{
    CancelSummary, DetectedTool, ExecuteRequest, ExecuteResponse, HistoryRecord,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::DetectionCache;
use crate::error::ExecError;
use crate::validator;
use history::HistoryRing;

pub use history::HISTORY_CAPACITY;

type RunningMap = HashMap<String, CancellationToken>;

/// Executes validated commands against detected tools.
#[derive(Clone)]
pub struct ProcessExecutor {
    cache: Arc<DetectionCache>,
    running: Arc<Mutex<RunningMap>>,
    history: Arc<Mutex<HistoryRing>>,
}

impl ProcessExecutor {
    pub fn new(cache: Arc<DetectionCache>) -> Self {
        Self {
            cache,
            running: Arc::new(Mutex::new(HashMap::new())),
            history: Arc::new(Mutex::new(HistoryRing::new())),
        }
    }

    /// Run one request to a terminal outcome. Never returns an error; every
    /// failure mode is shaped into the response.
    pub async fn run(&self, request: &ExecuteRequest) -> ExecuteResponse {
        let started = Instant::now();

        let verdict =
            validator::validate(&request.command, request.working_directory.as_deref());
        if !verdict.valid {
            warn!(
                command = %log_command(&request.command),
                errors = ?verdict.errors,
                "command rejected by validator"
            );
            let mut response = failure(
                ExecError::Validation(verdict.errors.join("; ")).to_string(),
                started,
            );
            response.stderr = Some(verdict.errors.join("\n"));
            return response;
        }
        if !verdict.warnings.is_empty() {
            warn!(warnings = ?verdict.warnings, "command validation warnings");
        }

        let tool = self.cache.get_status(request.tool_type).await;
        if !tool.is_available() {
            return failure(
                ExecError::Unavailable(request.tool_type).to_string(),
                started,
            );
        }

        let argv = match build_argv(&tool, &request.command) {
            Ok(argv) => argv,
            Err(e) => return failure(e.to_string(), started),
        };

        info!(
            tool = %request.tool_type,
            command = %log_command(&request.command),
            timeout_s = request.timeout_seconds,
            "executing command"
        );

        match self.spawn_and_wait(request, &argv, started).await {
            Ok(response) => response,
            Err(e) => failure(e.to_string(), started),
        }
    }

    async fn spawn_and_wait(
        &self,
        request: &ExecuteRequest,
        argv: &[String],
        started: Instant,
    ) -> Result<ExecuteResponse, ExecError> {
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .envs(env::scrubbed_environment())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_directory {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::Execution(format!("failed to spawn {}: {e}", argv[0])))?;

        // Drain pipes concurrently so a chatty child cannot deadlock on a
        // full pipe while we wait on its exit.
        let stdout_reader = tokio::spawn(drain(child.stdout.take()));
        let stderr_reader = tokio::spawn(drain(child.stderr.take()));

        let token = CancellationToken::new();
        let handle_id = format!("{}_{}", request.tool_type, Uuid::now_v7());
        let _guard = RunGuard::register(self.running.clone(), handle_id.clone(), token.clone());

        let deadline = Duration::from_secs(request.timeout_seconds);
        let waited = tokio::select! {
            res = tokio::time::timeout(deadline, child.wait()) => match res {
                Ok(status) => Waited::Finished(status),
                Err(_) => Waited::TimedOut,
            },
            _ = token.cancelled() => Waited::Cancelled,
        };

        match waited {
            Waited::Finished(status) => {
                let status = status
                    .map_err(|e| ExecError::Execution(format!("failed to await process: {e}")))?;
                let stdout = collect(stdout_reader).await;
                let stderr = collect(stderr_reader).await;
                let return_code = status.code().unwrap_or(-1);
                let success = return_code == 0;
                let response = ExecuteResponse {
                    success,
                    error_message: (!success).then(|| stderr.clone()),
                    stdout: Some(stdout),
                    stderr: Some(stderr),
                    return_code,
                    execution_time_ms: elapsed_ms(started),
                };
                self.record(request, &response);
                Ok(response)
            }
            Waited::TimedOut => {
                warn!(handle = %handle_id, "execution exceeded deadline, killing");
                reap(&mut child).await;
                stdout_reader.abort();
                stderr_reader.abort();
                Err(ExecError::Timeout(request.timeout_seconds))
            }
            Waited::Cancelled => {
                info!(handle = %handle_id, "execution cancelled");
                reap(&mut child).await;
                stdout_reader.abort();
                stderr_reader.abort();
                Err(ExecError::Execution("execution was cancelled".to_string()))
            }
        }
    }

    /// Force-cancel every running execution. Failures to signal one handle
    /// never stop the sweep; the registry is always left empty.
    pub fn cancel_all(&self) -> CancelSummary {
        let drained: Vec<(String, CancellationToken)> = match self.running.lock() {
            Ok(mut running) => running.drain().collect(),
            Err(_) => Vec::new(),
        };

        let cancelled = drained.len();
        for (handle_id, token) in drained {
            info!(handle = %handle_id, "cancelling execution");
            token.cancel();
        }

        CancelSummary {
            cancelled,
            remaining: 0,
        }
    }

    /// Most recent `limit` history records, newest-last.
    pub fn history(&self, limit: usize) -> Vec<HistoryRecord> {
        self.history
            .lock()
            .map(|history| history.tail(limit))
            .unwrap_or_default()
    }

    pub fn clear_history(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().map(|history| history.len()).unwrap_or(0)
    }

    /// Number of currently registered (live) executions.
    pub fn running_count(&self) -> usize {
        self.running.lock().map(|running| running.len()).unwrap_or(0)
    }

    fn record(&self, request: &ExecuteRequest, response: &ExecuteResponse) {
        let record = HistoryRecord {
            tool: request.tool_type,
            command: request.command.clone(),
            success: response.success,
            return_code: response.return_code,
            execution_time_ms: response.execution_time_ms,
            timestamp: Utc::now(),
        };
        if let Ok(mut history) = self.history.lock() {
            history.push(record);
        }
    }
}

/// Terminal state of the race between process exit, the wall-clock
/// deadline, and external cancellation.
enum Waited {
    Finished(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Registry entry that unregisters itself on every exit path.
struct RunGuard {
    running: Arc<Mutex<RunningMap>>,
    handle_id: String,
}

impl RunGuard {
    fn register(
        running: Arc<Mutex<RunningMap>>,
        handle_id: String,
        token: CancellationToken,
    ) -> Self {
        if let Ok(mut map) = running.lock() {
            map.insert(handle_id.clone(), token);
        }
        Self { running, handle_id }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut map) = self.running.lock() {
            map.remove(&self.handle_id);
        }
    }
}

/// Base executable from tool metadata plus shell-word-split argument tokens.
/// No shell is ever involved past this point.
fn build_argv(tool: &DetectedTool, command: &str) -> Result<Vec<String>, ExecError> {
    let base = tool
        .metadata
        .get("command")
        .cloned()
        .unwrap_or_else(|| tool.tool_type.executable().to_string());

    let tokens = shell_words::split(command)
        .map_err(|e| ExecError::Validation(format!("failed to parse command: {e}")))?;

    let mut argv = Vec::with_capacity(tokens.len() + 1);
    argv.push(base);
    argv.extend(tokens);
    Ok(argv)
}

async fn reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill process");
    }
    if let Err(e) = child.wait().await {
        warn!(error = %e, "failed to reap process");
    }
}

async fn drain<R>(stream: Option<R>) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf).await;
    }
    buf
}

async fn collect(reader: JoinHandle<Vec<u8>>) -> String {
    match reader.await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
        Err(_) => String::new(),
    }
}

fn failure(message: String, started: Instant) -> ExecuteResponse {
    ExecuteResponse {
        success: false,
        stdout: None,
        stderr: None,
        return_code: -1,
        execution_time_ms: elapsed_ms(started),
        error_message: Some(message),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn log_command(command: &str) -> String {
    if command.chars().count() > 100 {
        let head: String = command.chars().take(100).collect();
        format!("{head}...")
    } else {
        command.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_api_types::{ToolId, ToolStatus};

    fn tool_with_command(base: &str) -> DetectedTool {
        let mut tool = DetectedTool::missing(ToolId::ClaudeCode, "unused");
        tool.status = ToolStatus::Available;
        tool.metadata.clear();
        tool.metadata.insert("command".to_string(), base.to_string());
        tool
    }

    #[test]
    fn argv_splits_quoted_words() {
        let tool = tool_with_command("claude");
        let argv = build_argv(&tool, "review \"two words\" --fast").unwrap();
        assert_eq!(argv, vec!["claude", "review", "two words", "--fast"]);
    }

    #[test]
    fn argv_falls_back_to_tool_executable() {
        let mut tool = tool_with_command("claude");
        tool.metadata.clear();
        let argv = build_argv(&tool, "doctor").unwrap();
        assert_eq!(argv, vec!["claude", "doctor"]);
    }

    #[test]
    fn argv_rejects_unterminated_quotes() {
        let tool = tool_with_command("claude");
        let err = build_argv(&tool, "say \"oops").unwrap_err();
        assert!(matches!(err, ExecError::Validation(_)));
    }

    #[test]
    fn long_commands_are_truncated_in_logs() {
        let long = "x".repeat(160);
        let logged = log_command(&long);
        assert_eq!(logged.chars().count(), 103);
        assert!(logged.ends_with("..."));
        assert_eq!(log_command("short"), "short");
    }
}
