//! Application context: unified state passed to the command handler.
//!
//! `AppContext` bundles the output context, the immutable configuration and
//! the production infrastructure adapters so the handler receives one value.

use crate::domain::DeployConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::fs::StdFs;
use crate::infra::ssh::OpenSshConnector;
use crate::output::{OutputContext, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Unified application context.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Configuration set loaded at startup.
    pub config: DeployConfig,
    /// Local process runner (archiving).
    pub runner: TokioCommandRunner,
    /// OpenSSH session factory.
    pub connector: OpenSshConnector<TokioCommandRunner>,
    /// Local filesystem checks.
    pub fs: StdFs,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags and the loaded config.
    ///
    /// JSON mode implies quiet progress output so stdout carries only JSON.
    #[must_use]
    pub fn new(flags: &AppFlags, config: DeployConfig) -> Self {
        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        let runner = TokioCommandRunner::new(config.command_timeout);

        Self {
            output: OutputContext::new(flags.no_color, flags.quiet || flags.json),
            mode,
            connector: OpenSshConnector::new(runner.clone()),
            runner,
            config,
            fs: StdFs,
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// A progress reporter bound to this context's output.
    #[must_use]
    pub fn terminal_reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }
}
