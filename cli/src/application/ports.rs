//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::Path;
use std::process::{ExitStatus, Output};

use anyhow::Result;

use crate::domain::{AuthMethod, ConnectError, SshTarget};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts local process execution so infrastructure can be swapped or mocked.
///
/// Programs are spawned directly with an argv vector; nothing is passed
/// through a shell.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with `dir` as its working directory.
    async fn run_in_dir(&self, program: &str, args: &[&str], dir: &Path) -> Result<Output>;
    /// Run a program with stdin piped from `input`.
    async fn run_with_stdin(&self, program: &str, args: &[&str], input: &[u8]) -> Result<Output>;
    /// Run a program with all stdio attached to the null device and return
    /// its exit status.
    ///
    /// For programs that leave a background descendant running (which would
    /// otherwise keep captured pipes open forever).
    async fn run_detached(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExitStatus>;
}

// ── Remote Session Ports ──────────────────────────────────────────────────────

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    /// Remote exit status; `None` when the channel closed without one.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// An authenticated channel to the deploy target.
#[allow(async_fn_in_trait)]
pub trait RemoteSession {
    /// Execute `command` with the remote login shell.
    async fn exec(&self, command: &str) -> Result<RemoteOutput>;
    /// Copy a local file to `remote` over the transfer sub-channel.
    ///
    /// The sub-channel is closed before this returns, on success or failure.
    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;
    /// Tear the session down.
    async fn close(self) -> Result<()>;
}

/// Opens [`RemoteSession`]s with one authentication method per attempt.
#[allow(async_fn_in_trait)]
pub trait SessionConnector {
    type Session: RemoteSession;

    /// Attempt a single connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Authentication`] when the server rejected the
    /// credentials, and [`ConnectError::Transport`] for everything else.
    async fn connect(
        &self,
        target: &SshTarget,
        auth: &AuthMethod,
    ) -> std::result::Result<Self::Session, ConnectError>;
}

// ── Filesystem Port ───────────────────────────────────────────────────────────

/// Local filesystem checks the sequencer needs before acting.
pub trait LocalFs {
    /// Returns `true` if `path` exists (file or directory).
    fn exists(&self, path: &Path) -> bool;
    /// Returns `true` if `path` is an existing directory.
    fn is_dir(&self, path: &Path) -> bool;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
