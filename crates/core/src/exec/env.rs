//! Scrubbed child environments.

use std::collections::HashMap;

/// Variables stripped before spawning: shell prompts and history, shell
/// startup hooks, field separators, interpreter search paths, and dynamic
/// linker overrides.
const SCRUBBED_VARS: &[&str] = &[
    "PS1",
    "PS2",
    "PS3",
    "PS4",
    "HISTFILE",
    "HISTCONTROL",
    "HISTSIZE",
    "BASH_ENV",
    "ENV",
    "IFS",
    "CDPATH",
    "PYTHONPATH",
    "PERL5LIB",
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
];

/// Build the child environment: a copy of the process environment minus the
/// scrubbed variables, with safe defaults forced for HOME, PATH, and locale.
pub fn scrubbed_environment() -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();

    for var in SCRUBBED_VARS {
        env.remove(*var);
    }

    env.insert("HOME".to_string(), "/tmp".to_string());
    env.insert(
        "PATH".to_string(),
        "/usr/local/bin:/usr/bin:/bin".to_string(),
    );
    env.insert("LANG".to_string(), "C".to_string());
    env.insert("LC_ALL".to_string(), "C".to_string());

    env
}
