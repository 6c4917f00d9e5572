//! Application service: the deploy and rollback sequences.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.
//!
//! Deploy: connect → zip `dist/` → clear artifact dir → clear deploy dir →
//! upload → unzip → close. Rollback skips the zip and upload. The first
//! failing stage aborts the run; the session is closed either way.

use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;

use crate::application::ports::{
    CommandRunner, LocalFs, ProgressReporter, RemoteSession, SessionConnector,
};
use crate::application::services::session::{Connected, open_session};
use crate::domain::remote::{self, LocalCommand};
use crate::domain::{DeployConfig, DeployError, DeployVersion};

/// Which sequence to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    Deploy,
    Rollback,
}

/// What a completed run did, for the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub mode: DeployMode,
    pub version: String,
    pub host: String,
    pub auth: &'static str,
    /// Only set for `deploy`; rollback never builds an archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_archive: Option<PathBuf>,
    pub remote_archive: String,
    pub extracted_to: String,
}

/// Ports the sequencer drives, bundled so signatures stay short.
pub struct DeployPorts<'a, C, R, F, P> {
    pub connector: &'a C,
    pub runner: &'a R,
    pub fs: &'a F,
    pub reporter: &'a P,
}

/// Run `mode` for `version`.
///
/// # Errors
///
/// Returns the stage-labelled [`DeployError`] of the first failing stage.
pub async fn run<C, R, F, P>(
    ports: &DeployPorts<'_, C, R, F, P>,
    config: &DeployConfig,
    mode: DeployMode,
    version: &DeployVersion,
) -> Result<DeployReport, DeployError>
where
    C: SessionConnector,
    R: CommandRunner,
    F: LocalFs,
    P: ProgressReporter,
{
    match mode {
        DeployMode::Deploy => deploy(ports, config, version).await,
        DeployMode::Rollback => rollback(ports, config, version).await,
    }
}

/// Ship a freshly zipped build of `version`.
///
/// # Errors
///
/// Returns the stage-labelled [`DeployError`] of the first failing stage.
pub async fn deploy<C, R, F, P>(
    ports: &DeployPorts<'_, C, R, F, P>,
    config: &DeployConfig,
    version: &DeployVersion,
) -> Result<DeployReport, DeployError>
where
    C: SessionConnector,
    R: CommandRunner,
    F: LocalFs,
    P: ProgressReporter,
{
    let Connected { session, auth } =
        open_session(ports.connector, ports.reporter, &config.server).await?;

    let result = async {
        zip_deploy(ports.runner, ports.fs, ports.reporter, config, version).await?;
        remove_old_deploy(&session, ports.reporter, config).await?;
        upload_deploy(&session, ports.fs, ports.reporter, config, version).await?;
        unzip_deploy(&session, ports.reporter, config, version).await
    }
    .await;

    finish(session, ports.reporter, result).await?;
    Ok(report(config, DeployMode::Deploy, version, auth))
}

/// Re-extract an archive of `version` already present on the server.
///
/// # Errors
///
/// Returns the stage-labelled [`DeployError`] of the first failing stage.
pub async fn rollback<C, R, F, P>(
    ports: &DeployPorts<'_, C, R, F, P>,
    config: &DeployConfig,
    version: &DeployVersion,
) -> Result<DeployReport, DeployError>
where
    C: SessionConnector,
    R: CommandRunner,
    F: LocalFs,
    P: ProgressReporter,
{
    let Connected { session, auth } =
        open_session(ports.connector, ports.reporter, &config.server).await?;

    let result = async {
        remove_old_deploy(&session, ports.reporter, config).await?;
        unzip_deploy(&session, ports.reporter, config, version).await
    }
    .await;

    finish(session, ports.reporter, result).await?;
    Ok(report(config, DeployMode::Rollback, version, auth))
}

fn report(
    config: &DeployConfig,
    mode: DeployMode,
    version: &DeployVersion,
    auth: &'static str,
) -> DeployReport {
    DeployReport {
        mode,
        version: version.to_string(),
        host: config.server.host.clone(),
        auth,
        local_archive: (mode == DeployMode::Deploy).then(|| config.local_archive_path(version)),
        remote_archive: config.remote_archive_path(version),
        extracted_to: config.extract_dir(),
    }
}

/// Close the session, then hand back the stage result.
///
/// A close failure is only a warning: by then the remote state is final.
async fn finish<S: RemoteSession>(
    session: S,
    reporter: &impl ProgressReporter,
    result: Result<(), DeployError>,
) -> Result<(), DeployError> {
    if let Err(e) = session.close().await {
        tracing::warn!(error = %format!("{e:#}"), "failed to close the SSH session");
        reporter.warn(&format!("could not close the SSH session cleanly: {e}"));
    }
    result
}

// ── Stages ────────────────────────────────────────────────────────────────────

async fn zip_deploy(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    config: &DeployConfig,
    version: &DeployVersion,
) -> Result<(), DeployError> {
    reporter.step("Zipping the deploy...");
    let dist = config.local_dist_dir();
    if !fs.is_dir(&dist) {
        return Err(DeployError::Archive {
            source: anyhow::anyhow!("build folder {} does not exist", dist.display()),
        });
    }
    let command = remote::archive_build(dist, version);
    run_local(runner, &command)
        .await
        .map_err(|source| DeployError::Archive { source })?;
    reporter.success("Deploy zipped");
    Ok(())
}

async fn remove_old_deploy(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    config: &DeployConfig,
) -> Result<(), DeployError> {
    reporter.step("Removing old deploy...");
    for dir in [&config.paths.remote_artifacts, &config.paths.remote_deploy] {
        run_remote(session, reporter, &remote::clear_directory(dir))
            .await
            .map_err(|source| DeployError::Cleanup {
                dir: dir.clone(),
                source,
            })?;
    }
    reporter.success("Removed old deploy");
    Ok(())
}

async fn upload_deploy(
    session: &impl RemoteSession,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    config: &DeployConfig,
    version: &DeployVersion,
) -> Result<(), DeployError> {
    reporter.step("Uploading the deploy...");
    let local = config.local_archive_path(version);
    if !fs.exists(&local) {
        return Err(DeployError::MissingArchive {
            path: local.display().to_string(),
        });
    }
    let destination = config.remote_archive_path(version);
    tracing::info!(local = %local.display(), remote = %destination, "uploading archive");
    session
        .upload(&local, &destination)
        .await
        .map_err(|source| DeployError::Upload { source })?;
    reporter.success("Deploy uploaded");
    Ok(())
}

async fn unzip_deploy(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    config: &DeployConfig,
    version: &DeployVersion,
) -> Result<(), DeployError> {
    reporter.step("Unzipping the deploy...");
    let command =
        remote::extract_archive(&config.remote_archive_path(version), &config.extract_dir());
    run_remote(session, reporter, &command)
        .await
        .map_err(|source| DeployError::Extract { source })?;
    reporter.success("Deploy unzipped");
    Ok(())
}

// ── Command contracts ─────────────────────────────────────────────────────────

/// Local commands fail on a non-zero exit and on any stderr output.
async fn run_local(runner: &impl CommandRunner, command: &LocalCommand) -> anyhow::Result<()> {
    tracing::info!(%command, "executing local command");
    let output = runner
        .run_in_dir(command.program, &command.arg_refs(), &command.cwd)
        .await
        .with_context(|| format!("running {}", command.program))?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        anyhow::bail!(
            "{} exited with {}: {}",
            command.program,
            output.status,
            stderr.trim()
        );
    }
    if !stderr.trim().is_empty() {
        anyhow::bail!("Error executing the command: {}", stderr.trim());
    }
    Ok(())
}

/// Remote commands fail on a non-zero exit; stderr alone is a warning.
async fn run_remote(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    command: &str,
) -> anyhow::Result<()> {
    tracing::info!(command, "executing remote command");
    let output = session.exec(command).await?;
    let stderr = output.stderr.trim();
    if !output.success() {
        let status = output
            .exit_code
            .map_or_else(|| "no exit status".to_owned(), |code| format!("exit code {code}"));
        anyhow::bail!("`{command}` failed with {status}: {stderr}");
    }
    if !stderr.is_empty() {
        tracing::warn!(command, stderr, "remote command wrote to stderr");
        reporter.warn(&format!("remote stderr: {stderr}"));
    }
    Ok(())
}
