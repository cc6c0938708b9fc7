//! Tool detection: PATH lookup, shell-alias probe, and container probe.

pub mod version;

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use toolgate_api_types::{DetectedTool, ToolId, ToolStatus};
use tracing::{debug, info, warn};

const ALIAS_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const CONTAINER_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Detection seam. The production implementation is [`SystemProbe`]; tests
/// substitute counting or canned probes.
///
/// Implementations never fail: a broken probe reports `status = error` with
/// the cause in metadata, so one bad tool cannot abort a batch pass.
#[async_trait]
pub trait ToolProbe: Send + Sync {
    async fn detect(&self, tool: ToolId) -> DetectedTool;
}

/// Probes the host system for real tool installations.
#[derive(Debug, Default, Clone)]
pub struct SystemProbe;

impl SystemProbe {
    pub fn new() -> Self {
        SystemProbe
    }

    /// Detection chain, first hit wins: PATH executable, shell alias,
    /// container instance, then missing.
    async fn probe(&self, tool: ToolId) -> DetectedTool {
        let executable = tool.executable();

        if let Ok(path) = which::which(executable) {
            let path = path.display().to_string();
            if let Some(version) = version::extract(&path).await {
                info!(tool = %tool, %path, %version, "detected executable");
                return executable_found(tool, path, version);
            }
            debug!(tool = %tool, %path, "executable found but version probe failed");
        }

        if alias_responds(executable).await {
            let version = version::extract_via_shell(executable).await;
            info!(tool = %tool, version = version.as_deref().unwrap_or("unknown"), "detected shell alias");
            let mut found = DetectedTool {
                name: tool.display_name().to_string(),
                tool_type: tool,
                status: ToolStatus::Available,
                executable_path: None,
                version,
                last_detected: Utc::now(),
                metadata: Default::default(),
            };
            found
                .metadata
                .insert("command".to_string(), executable.to_string());
            found.metadata.insert("type".to_string(), "alias".to_string());
            return found;
        }

        if let Some(container) = container_match(executable).await {
            info!(tool = %tool, %container, "detected container instance");
            let mut found = DetectedTool {
                name: tool.display_name().to_string(),
                tool_type: tool,
                status: ToolStatus::Available,
                executable_path: None,
                version: Some("container".to_string()),
                last_detected: Utc::now(),
                metadata: Default::default(),
            };
            found.metadata.insert("type".to_string(), "docker".to_string());
            found.metadata.insert("container".to_string(), container);
            return found;
        }

        debug!(tool = %tool, "not found");
        DetectedTool::missing(tool, "not found")
    }
}

#[async_trait]
impl ToolProbe for SystemProbe {
    async fn detect(&self, tool: ToolId) -> DetectedTool {
        // Isolate panics inside a probe so a batch pass survives them.
        let this = self.clone();
        match tokio::spawn(async move { this.probe(tool).await }).await {
            Ok(found) => found,
            Err(e) => {
                warn!(tool = %tool, error = %e, "detection probe failed");
                DetectedTool::error(tool, e.to_string())
            }
        }
    }
}

fn executable_found(tool: ToolId, path: String, version: String) -> DetectedTool {
    let mut found = DetectedTool {
        name: tool.display_name().to_string(),
        tool_type: tool,
        status: ToolStatus::Available,
        executable_path: Some(path),
        version: Some(version),
        last_detected: Utc::now(),
        metadata: Default::default(),
    };
    found
        .metadata
        .insert("command".to_string(), tool.executable().to_string());
    found
        .metadata
        .insert("type".to_string(), "executable".to_string());
    found
}

/// Probe for a shell alias/function by asking the name for help through the
/// user's shell. Exit codes 0 and 1 both count as presence; plenty of CLIs
/// exit 1 on `--help`.
async fn alias_responds(name: &str) -> bool {
    let output = Command::new("sh")
        .arg("-lc")
        .arg(format!("{name} --help"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(ALIAS_PROBE_TIMEOUT, output).await {
        Ok(Ok(out)) => matches!(out.status.code(), Some(0) | Some(1)),
        _ => false,
    }
}

/// Look for a container running (or an image providing) the tool. A missing
/// docker binary is "no container evidence", not an error.
async fn container_match(name: &str) -> Option<String> {
    for args in [
        ["ps", "--format", "{{.Names}}"],
        ["images", "--format", "{{.Repository}}"],
    ] {
        if let Some(listing) = docker_listing(&args).await {
            if let Some(hit) = listing
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty() && line.contains(name))
            {
                return Some(hit.to_string());
            }
        }
    }
    None
}

async fn docker_listing(args: &[&str]) -> Option<String> {
    let output = Command::new("docker")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(CONTAINER_PROBE_TIMEOUT, output).await {
        Ok(Ok(out)) if out.status.success() => {
            Some(String::from_utf8_lossy(&out.stdout).to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    struct PathGuard {
        previous: Option<std::ffi::OsString>,
    }

    impl PathGuard {
        fn set(value: &str) -> Self {
            let previous = std::env::var_os("PATH");
            std::env::set_var("PATH", value);
            Self { previous }
        }
    }

    impl Drop for PathGuard {
        fn drop(&mut self) {
            match self.previous.take() {
                Some(v) => std::env::set_var("PATH", v),
                None => std::env::remove_var("PATH"),
            }
        }
    }

    #[cfg(unix)]
    fn install_fake_tool(dir: &std::path::Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn detects_executable_with_version() {
        let temp = TempDir::new().unwrap();
        install_fake_tool(
            temp.path(),
            "claude",
            "#!/bin/sh\necho \"claude version 1.2.3\"\n",
        );
        // Keep /bin and /usr/bin so the probe script's shebang still works.
        let _guard = PathGuard::set(&format!("{}:/usr/bin:/bin", temp.path().display()));

        let found = SystemProbe::new().detect(ToolId::ClaudeCode).await;
        assert_eq!(found.status, ToolStatus::Available);
        assert_eq!(found.version.as_deref(), Some("1.2.3"));
        assert_eq!(found.metadata.get("type").map(String::as_str), Some("executable"));
        assert_eq!(found.metadata.get("command").map(String::as_str), Some("claude"));
        assert!(found
            .executable_path
            .as_deref()
            .is_some_and(|p| p.ends_with("claude")));
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn missing_tool_reports_reason() {
        let temp = TempDir::new().unwrap();
        let _guard = PathGuard::set(&temp.path().display().to_string());

        let found = SystemProbe::new().detect(ToolId::QwenCode).await;
        assert_eq!(found.status, ToolStatus::Missing);
        assert_eq!(
            found.metadata.get("reason").map(String::as_str),
            Some("not found")
        );
        assert!(found.version.is_none());
    }
}
