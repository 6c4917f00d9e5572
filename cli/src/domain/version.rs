//! Deployment version token.
//!
//! The version is interpolated into archive names and remote commands, so it
//! is checked against an allow-list before anything is built from it.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::DeployError;

/// Letters, digits and `._+-`, starting with a letter or digit, max 64 chars.
pub static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Constant pattern.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]{0,63}$").expect("valid regex")
});

/// Prefix shared by every artifact name.
pub const ARCHIVE_PREFIX: &str = "inbizio";

/// Validated version token, e.g. `2.0.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployVersion(String);

impl DeployVersion {
    /// Validate `raw` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidVersion`] if `raw` contains characters
    /// outside the allow-list or a `..` sequence.
    pub fn parse(raw: &str) -> Result<Self, DeployError> {
        if !VERSION_RE.is_match(raw) || raw.contains("..") {
            return Err(DeployError::InvalidVersion(raw.to_owned()));
        }
        Ok(Self(raw.to_owned()))
    }

    /// File name of the artifact for this version: `inbizio<version>.zip`.
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{ARCHIVE_PREFIX}{}.zip", self.0)
    }
}

impl fmt::Display for DeployVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
