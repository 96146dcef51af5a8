//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES (`database.url_env`). Binaries call
//! [`resolve_secrets`] once at startup and pass the result to constructors.
//! `Debug` output redacts values, and errors name the variable, never its
//! value.

use anyhow::{bail, Result};

use crate::ServiceConfig;

/// Secrets resolved from the environment. **Values are redacted in `Debug`.**
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub database_url: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("database_url", &"<REDACTED>")
            .finish()
    }
}

/// Resolve a named environment variable.
/// Returns `None` if the variable is unset or its value is blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve every secret the service needs.
///
/// # Errors
/// `SECRETS_MISSING` naming the first required env var that is unset or blank.
pub fn resolve_secrets(cfg: &ServiceConfig) -> Result<ResolvedSecrets> {
    let var = cfg.database.url_env.as_str();
    let Some(database_url) = resolve_env(var) else {
        bail!("SECRETS_MISSING: required env var '{var}' (database url) is not set or empty");
    };
    Ok(ResolvedSecrets { database_url })
}
