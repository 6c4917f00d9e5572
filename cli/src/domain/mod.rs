//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod remote;
pub mod ssh;
pub mod version;

pub use config::{DeployConfig, PathsConfig, ServerConfig};
pub use error::{ConfigError, ConnectError, DeployError};
pub use ssh::{AuthMethod, SshTarget};
pub use version::DeployVersion;
