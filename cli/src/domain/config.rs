//! Per-application deploy configuration and `--env` parsing.
//!
//! Pure functions only — no I/O, no async, no filesystem access.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::InputError;
use crate::domain::release::validate_source;

static ENV_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex")
});

// ── Config schema ────────────────────────────────────────────────────────────

/// Setup data persisted to `<base>/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Artifact source identity, `owner/repo`.
    pub source: String,
    /// Entry point relative to the release root, e.g. `server.js`.
    pub script: String,
    /// Environment handed to the process on every start.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl DeployConfig {
    /// Check that every required field is present and well-formed.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule as an [`InputError`].
    pub fn validate(&self) -> Result<(), InputError> {
        validate_source(&self.source)?;
        validate_script(&self.script)?;
        for key in self.env.keys() {
            validate_env_key(key)?;
        }
        Ok(())
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// The entry point must stay inside the release tree.
///
/// # Errors
///
/// Returns [`InputError::InvalidScript`] for empty, absolute or escaping paths.
pub fn validate_script(script: &str) -> Result<(), InputError> {
    let escapes = script.split(['/', '\\']).any(|part| part == "..");
    if script.trim().is_empty() || script.starts_with('/') || script.starts_with('\\') || escapes
    {
        return Err(InputError::InvalidScript(script.to_string()));
    }
    Ok(())
}

/// # Errors
///
/// Returns [`InputError::InvalidEnv`] if `key` is not a portable variable name.
pub fn validate_env_key(key: &str) -> Result<(), InputError> {
    if ENV_KEY_RE.is_match(key) {
        Ok(())
    } else {
        Err(InputError::InvalidEnv(key.to_string()))
    }
}

// ── Parsers ──────────────────────────────────────────────────────────────────

/// Split `KEY=VALUE` on the first `=`; the value may itself contain `=`.
///
/// # Errors
///
/// Returns [`InputError::InvalidEnv`] if there is no `=` or the key is invalid.
pub fn parse_env_assignment(entry: &str) -> Result<(String, String), InputError> {
    let (key, value) = entry
        .split_once('=')
        .ok_or_else(|| InputError::InvalidEnv(entry.to_string()))?;
    let key = key.trim();
    validate_env_key(key).map_err(|_| InputError::InvalidEnv(entry.to_string()))?;
    Ok((key.to_string(), value.to_string()))
}

/// Parse a dotenv-style file: `KEY=VALUE` lines, `#` comments, blank lines,
/// an optional leading `export`, and optional matching quotes around values.
///
/// # Errors
///
/// Returns [`InputError::InvalidEnv`] naming the first malformed line.
pub fn parse_env_file(content: &str) -> Result<Vec<(String, String)>, InputError> {
    let mut vars = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map_or(line, str::trim_start);
        let (key, value) = parse_env_assignment(line)?;
        vars.push((key, unquote(value.trim())));
    }
    Ok(vars)
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}
