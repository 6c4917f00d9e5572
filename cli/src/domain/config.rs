//! Domain types and validators for the deploy configuration set.
//!
//! Pure functions only, with no I/O. Values are
//! read through a caller-supplied lookup so the same code serves the process
//! environment, a `.env` file, and tests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::error::ConfigError;
use crate::domain::version::DeployVersion;

// ── Setting names ────────────────────────────────────────────────────────────

pub const SERVER_HOST: &str = "SERVER_HOST";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const SERVER_USER: &str = "SERVER_USER";
pub const SERVER_PASSWORD: &str = "SERVER_PASSWORD";
pub const SSH_KEY_PATH: &str = "SSH_KEY_PATH";
pub const PROJECT_PATH: &str = "INBIZIO_PROJECT_PATH";
pub const REMOTE_PATH: &str = "INBIZIO_REMOTE_PATH";
pub const REMOTE_DEPLOY_PATH: &str = "INBIZIO_REMOTE_DEPLOY_PATH";

/// Optional: extract under `<deploy path>/<subdir>` instead of the deploy path.
pub const REMOTE_DEPLOY_SUBDIR: &str = "INBIZIO_REMOTE_DEPLOY_SUBDIR";
/// Optional: per-command timeout in seconds. Unset means wait indefinitely.
pub const COMMAND_TIMEOUT_SECS: &str = "DEPLOY_COMMAND_TIMEOUT_SECS";
/// Optional: known_hosts file handed to ssh via `UserKnownHostsFile`.
pub const SSH_KNOWN_HOSTS: &str = "SSH_KNOWN_HOSTS";

/// Every setting that must be present, in reporting order.
pub const REQUIRED_KEYS: &[&str] = &[
    SERVER_HOST,
    SERVER_PORT,
    SERVER_USER,
    SERVER_PASSWORD,
    SSH_KEY_PATH,
    PROJECT_PATH,
    REMOTE_PATH,
    REMOTE_DEPLOY_PATH,
];

/// Build output directory inside the project, archived as-is.
pub const DIST_DIR: &str = "dist";

// ── Config schema ────────────────────────────────────────────────────────────

/// Connection settings for the single remote target.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Private key used when password authentication is rejected.
    pub key_path: PathBuf,
    pub known_hosts: Option<PathBuf>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("key_path", &self.key_path)
            .field("known_hosts", &self.known_hosts)
            .finish()
    }
}

/// Local and remote filesystem locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsConfig {
    /// Local project root; the build lives in `<project>/dist`.
    pub project: PathBuf,
    /// Remote artifact storage directory (absolute, no trailing slash).
    pub remote_artifacts: String,
    /// Remote live deploy directory (absolute, no trailing slash).
    pub remote_deploy: String,
    /// Relative subdirectory of `remote_deploy` to extract into.
    pub deploy_subdir: Option<String>,
}

/// Immutable configuration set, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub command_timeout: Option<Duration>,
}

impl DeployConfig {
    /// Build the configuration from a key lookup.
    ///
    /// Empty values count as missing. `~` in local paths is expanded against
    /// `home`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming every absent required key, or
    /// [`ConfigError::InvalidValue`] for the first malformed value.
    pub fn from_lookup<F>(lookup: F, home: Option<&Path>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| get(key).is_none())
            .map(|key| (*key).to_owned())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::Missing(vec![key.into()]));

        let port_raw = required(SERVER_PORT)?;
        let port = port_raw
            .trim()
            .parse::<u16>()
            .map_err(|e| invalid(SERVER_PORT, &port_raw, &format!("expected a TCP port: {e}")))?;

        let server = ServerConfig {
            host: required(SERVER_HOST)?.trim().to_owned(),
            port,
            user: required(SERVER_USER)?.trim().to_owned(),
            password: required(SERVER_PASSWORD)?,
            key_path: expand_tilde(SSH_KEY_PATH, &required(SSH_KEY_PATH)?, home)?,
            known_hosts: get(SSH_KNOWN_HOSTS)
                .map(|raw| expand_tilde(SSH_KNOWN_HOSTS, &raw, home))
                .transpose()?,
        };

        let paths = PathsConfig {
            project: expand_tilde(PROJECT_PATH, &required(PROJECT_PATH)?, home)?,
            remote_artifacts: remote_dir(REMOTE_PATH, &required(REMOTE_PATH)?)?,
            remote_deploy: remote_dir(REMOTE_DEPLOY_PATH, &required(REMOTE_DEPLOY_PATH)?)?,
            deploy_subdir: get(REMOTE_DEPLOY_SUBDIR)
                .map(|raw| subdir(&raw))
                .transpose()?,
        };

        let command_timeout = get(COMMAND_TIMEOUT_SECS)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| {
                        invalid(COMMAND_TIMEOUT_SECS, &raw, "expected a positive number of seconds")
                    })
            })
            .transpose()?;

        Ok(Self {
            server,
            paths,
            command_timeout,
        })
    }

    /// `<project>/dist`, the directory that gets archived.
    #[must_use]
    pub fn local_dist_dir(&self) -> PathBuf {
        self.paths.project.join(DIST_DIR)
    }

    /// `<project>/dist/inbizio<version>.zip`.
    #[must_use]
    pub fn local_archive_path(&self, version: &DeployVersion) -> PathBuf {
        self.local_dist_dir().join(version.archive_name())
    }

    /// `<remote artifacts>/inbizio<version>.zip`.
    #[must_use]
    pub fn remote_archive_path(&self, version: &DeployVersion) -> String {
        format!("{}/{}", self.paths.remote_artifacts, version.archive_name())
    }

    /// Directory the archive is extracted into.
    #[must_use]
    pub fn extract_dir(&self) -> String {
        match &self.paths.deploy_subdir {
            Some(sub) => format!("{}/{sub}", self.paths.remote_deploy),
            None => self.paths.remote_deploy.clone(),
        }
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}

/// Expand a leading `~` or `~/` against `home`.
///
/// # Errors
///
/// Returns an error if the value starts with `~` and no home directory is
/// known, or uses the unsupported `~user` form.
pub fn expand_tilde(key: &str, raw: &str, home: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let raw = raw.trim();
    let Some(rest) = raw.strip_prefix('~') else {
        return Ok(PathBuf::from(raw));
    };
    if !rest.is_empty() && !rest.starts_with('/') {
        return Err(invalid(key, raw, "only '~' and '~/...' are supported"));
    }
    let home = home.ok_or_else(|| invalid(key, raw, "cannot determine home directory"))?;
    let rest = rest.trim_start_matches('/');
    Ok(if rest.is_empty() {
        home.to_path_buf()
    } else {
        home.join(rest)
    })
}

/// Remote directories are wiped with `rm -rf <dir>/*`, so the filesystem
/// root is refused outright.
fn remote_dir(key: &str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('/') {
        return Err(invalid(key, raw, "remote paths must be absolute"));
    }
    let normalized = trimmed.trim_end_matches('/');
    if normalized.is_empty() {
        return Err(invalid(key, raw, "refusing to use the filesystem root"));
    }
    if normalized.split('/').any(|part| part == "..") {
        return Err(invalid(key, raw, "'..' is not allowed in remote paths"));
    }
    Ok(normalized.to_owned())
}

fn subdir(raw: &str) -> Result<String, ConfigError> {
    let normalized = raw.trim().trim_matches('/');
    if normalized.is_empty()
        || normalized
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(invalid(
            REMOTE_DEPLOY_SUBDIR,
            raw,
            "expected a relative path without '.' or '..' segments",
        ));
    }
    Ok(normalized.to_owned())
}
