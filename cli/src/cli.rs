//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};

use crate::app::{AppContext, AppFlags};
use crate::application::services::deploy::DeployMode;
use crate::commands;
use crate::domain::{ConfigError, DeployError, DeployVersion};
use crate::infra::config::DEFAULT_ENV_FILE;
use crate::output::json;

/// Inbizio Deploy Tool
///
/// Zips the local build, uploads it to the server over SSH and unpacks it
/// into the live directory, or rolls back to an archive already uploaded.
#[derive(Parser)]
#[command(
    name = "inbizio-deploy",
    version,
    disable_version_flag = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Version to deploy
    #[arg(long, value_name = "VERSION")]
    pub version: String,

    /// Deploy or Rollback
    #[arg(long, value_enum)]
    pub mode: Mode,

    /// Settings file read before the process environment
    #[arg(long, env = "INBIZIO_ENV_FILE", default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// Output the final report in JSON format
    #[arg(long)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output (also honoured via `NO_COLOR`)
    #[arg(long)]
    pub no_color: bool,

    /// Log executed commands (-v) and SSH details (-vv) to stderr
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print the tool version
    #[arg(short = 'V', long = "tool-version", action = ArgAction::Version)]
    pub tool_version: Option<bool>,
}

/// Action selected with `--mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Deploy,
    Rollback,
}

impl From<Mode> for DeployMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Deploy => Self::Deploy,
            Mode::Rollback => Self::Rollback,
        }
    }
}

impl Cli {
    /// Execute the requested deploy or rollback.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or any deploy stage fails.
    pub async fn run(self) -> Result<()> {
        let json = self.json;
        let result = self.execute().await;
        if json {
            if let Err(e) = &result {
                println!("{}", json::format_error(&format!("{e:#}"), error_code(e))?);
            }
        }
        result
    }

    async fn execute(self) -> Result<()> {
        let Cli {
            version,
            mode,
            env_file,
            json,
            quiet,
            no_color,
            ..
        } = self;

        let version = DeployVersion::parse(&version)?;
        let config = crate::infra::config::load(&env_file)?;
        let app = AppContext::new(
            &AppFlags {
                no_color,
                quiet,
                json,
            },
            config,
        );
        commands::deploy::run(&app, mode.into(), &version).await
    }
}

/// Machine-readable code for `--json` error output.
fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<DeployError>() {
        e.code()
    } else if err.downcast_ref::<ConfigError>().is_some() {
        "CONFIG_INVALID"
    } else {
        "DEPLOY_FAILED"
    }
}
