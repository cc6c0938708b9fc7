//! Command validation.
//!
//! Pure verdict function: no I/O side effects beyond resolving the supplied
//! working directory, never panics, never returns an error type. Deny-list
//! hits are hard errors; shell-operator patterns are surfaced as warnings
//! only, because the executor spawns via argv (no shell) and those operators
//! reach the child as literal arguments.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use toolgate_api_types::ValidationVerdict;

/// Maximum accepted command length, in bytes.
pub const MAX_COMMAND_LENGTH: usize = 1000;

/// Command fragments that are always rejected, matched case-insensitively as
/// substrings: destructive filesystem ops, privilege escalation, package
/// managers, network fetchers, container/orchestration tools, remote shells.
const BLOCKED_COMMANDS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "sudo rm -rf",
    "mkfs",
    "dd if=/",
    "wget",
    "curl",
    "apt-get",
    "yum",
    "brew",
    "npm install",
    "chmod 777",
    "chown",
    "useradd",
    "userdel",
    "passwd",
    "docker",
    "kubectl",
    "git clone",
    "scp",
    "ssh",
];

/// Shell metacharacter patterns surfaced as warnings.
static WARNING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"> /dev/null",
        r">&",
        r"2>&1",
        r"\.\./",
        r"~/",
        r"\$\(",
        r"\$\{",
        r"`",
        r"&&",
        r"\|\|",
        r";",
        r"&\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static validator pattern"))
    .collect()
});

static QUOTED_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]([^'"]*)['"]"#).expect("static validator pattern"));

static DOT_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\w+$").expect("static validator pattern"));

/// File extensions considered routine for tool-driven edits. Anything else
/// is surfaced as a warning, not blocked.
const ALLOWED_EXTENSIONS: &[&str] = &[
    ".md", ".txt", ".py", ".js", ".ts", ".json", ".yaml", ".yml", ".html", ".css", ".sql", ".sh",
    ".ps1", ".bat", ".env", ".rs", ".toml",
];

/// Validate a raw command string, optionally against a working directory.
///
/// The verdict is valid iff the error list is empty; warnings never block.
pub fn validate(command: &str, working_directory: Option<&str>) -> ValidationVerdict {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if command.trim().is_empty() {
        return ValidationVerdict {
            valid: false,
            errors: vec!["Command cannot be empty".to_string()],
            warnings,
        };
    }

    if command.len() > MAX_COMMAND_LENGTH {
        errors.push(format!(
            "Command too long (max {MAX_COMMAND_LENGTH} characters)"
        ));
    }

    let normalized = command.to_lowercase();
    for blocked in BLOCKED_COMMANDS {
        if normalized.contains(blocked) {
            errors.push(format!("Blocked command detected: {blocked}"));
        }
    }

    for pattern in WARNING_PATTERNS.iter() {
        if pattern.is_match(&normalized) {
            warnings.push(format!("Potentially dangerous pattern: {}", pattern.as_str()));
        }
    }

    if let Some(dir) = working_directory {
        check_file_paths(command, dir, &mut errors, &mut warnings);
    }

    let quote_count = command.matches('"').count() + command.matches('\'').count();
    if quote_count % 2 != 0 {
        warnings.push("Unmatched quotes detected - may cause parsing issues".to_string());
    }

    ValidationVerdict {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Verify that every path-like token stays underneath the working directory.
/// One escaping (or unresolvable) path fails the whole command; unusual
/// extensions only warn.
fn check_file_paths(command: &str, dir: &str, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let work_dir = match Path::new(dir).canonicalize() {
        Ok(p) => p,
        Err(_) => {
            errors.push("Unsafe file operations detected".to_string());
            return;
        }
    };

    for candidate in extract_path_tokens(command) {
        match normalize_lexical(&work_dir, Path::new(&candidate)) {
            Some(resolved) if resolved.starts_with(&work_dir) => {
                if let Some(ext) = extension_of(&candidate) {
                    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
                        warnings.push(format!("Unusual file extension: {ext}"));
                    }
                }
            }
            _ => {
                errors.push("Unsafe file operations detected".to_string());
                return;
            }
        }
    }
}

/// Candidate file-path tokens: quoted substrings plus bare whitespace-split
/// tokens carrying a dot-extension.
fn extract_path_tokens(command: &str) -> Vec<String> {
    let mut tokens: Vec<String> = QUOTED_TOKEN
        .captures_iter(command)
        .map(|c| c[1].to_string())
        .filter(|t| !t.trim().is_empty())
        .collect();

    tokens.extend(
        command
            .split_whitespace()
            .filter(|t| !t.contains('"') && !t.contains('\'') && DOT_EXTENSION.is_match(t))
            .map(|t| t.to_string()),
    );

    tokens
}

fn extension_of(candidate: &str) -> Option<String> {
    Path::new(candidate)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}

/// Lexical normalization: resolve `.`/`..` components without touching the
/// filesystem, so commands may reference files that do not exist yet.
/// Traversal above the filesystem root yields `None`.
fn normalize_lexical(base: &Path, candidate: &Path) -> Option<PathBuf> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Some(normalized)
}
