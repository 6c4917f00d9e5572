//! Settings loading: `.env` file plus process environment.
//!
//! The file is parsed into a map without touching the process environment.
//! Variables already set in the environment win over file values.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::DeployConfig;

/// Default settings file, resolved relative to the working directory.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Parse `path` as a dotenv file. A missing file yields an empty map.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no env file, using process environment only");
        return Ok(HashMap::new());
    }
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.with_context(|| format!("cannot parse {}", path.display()))?;
        vars.insert(key, value);
    }
    tracing::debug!(path = %path.display(), count = vars.len(), "loaded env file");
    Ok(vars)
}

/// Build the configuration from `env_file` and the process environment.
///
/// # Errors
///
/// Returns an error if the env file is malformed or a required setting is
/// missing or invalid.
pub fn load(env_file: &Path) -> Result<DeployConfig> {
    let file_vars = read_env_file(env_file)?;
    let home = dirs::home_dir();
    resolve(&file_vars, |key| std::env::var(key).ok(), home.as_deref())
}

/// Layer `process` over `file_vars` and validate the result.
///
/// # Errors
///
/// Returns the [`crate::domain::ConfigError`] for missing or invalid settings.
pub fn resolve<F>(
    file_vars: &HashMap<String, String>,
    process: F,
    home: Option<&Path>,
) -> Result<DeployConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config = DeployConfig::from_lookup(
        |key| process(key).or_else(|| file_vars.get(key).cloned()),
        home,
    )?;
    Ok(config)
}
