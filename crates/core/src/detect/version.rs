//! Version extraction for detected executables.
//!
//! Probes are short-lived subprocesses with a hard 5s bound; a hung probe is
//! killed, never awaited past the deadline.

use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

/// Flags tried in order until one exits zero and yields a parseable version.
const VERSION_FLAGS: &[&str] = &["--version", "-V", "version", "info"];

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Ordered version patterns; first match wins. Triplets beat pairs.
static VERSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)version\s+([0-9]+\.[0-9]+\.[0-9]+)",
        r"(?i)v([0-9]+\.[0-9]+\.[0-9]+)",
        r"([0-9]+\.[0-9]+\.[0-9]+)",
        r"([0-9]+\.[0-9]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static version pattern"))
    .collect()
});

/// Extract a version string by invoking the executable directly (argv, no
/// shell). Returns `None` when no flag produced parseable output.
pub async fn extract(executable: &str) -> Option<String> {
    for flag in VERSION_FLAGS {
        if let Some(output) = run_probe(executable, flag, false).await {
            if let Some(version) = parse_version(&output) {
                return Some(version);
            }
        }
    }
    None
}

/// Extract a version string through the user's shell, so aliases and shell
/// functions resolve. Only used by the alias detection path; `name` comes
/// from the closed tool set, never from request input.
pub async fn extract_via_shell(name: &str) -> Option<String> {
    for flag in VERSION_FLAGS {
        if let Some(output) = run_probe(name, flag, true).await {
            if let Some(version) = parse_version(&output) {
                return Some(version);
            }
        }
    }
    None
}

async fn run_probe(executable: &str, flag: &str, via_shell: bool) -> Option<String> {
    let mut cmd = if via_shell {
        let mut c = Command::new("sh");
        c.arg("-lc").arg(format!("{executable} {flag}"));
        c
    } else {
        let mut c = Command::new(executable);
        c.arg(flag);
        c
    };

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(PROBE_TIMEOUT, output).await {
        Ok(Ok(out)) if out.status.success() => {
            Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
        }
        _ => None,
    }
}

/// Parse tool output into a version string: the ordered numeric patterns
/// first, then the first short non-error line as a free-form fallback.
pub(crate) fn parse_version(output: &str) -> Option<String> {
    for pattern in VERSION_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(output) {
            return Some(captures[1].to_string());
        }
    }

    let first_line = output.lines().next().unwrap_or("").trim();
    if !first_line.is_empty() && !first_line.starts_with("ERROR") && first_line.len() < 100 {
        return Some(first_line.to_string());
    }

    None
}
