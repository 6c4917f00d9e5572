//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution, with an optional timeout that kills the
//! child when it fires.

use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use crate::application::ports::CommandRunner;

/// Production `CommandRunner`.
///
/// Without a timeout a hung command blocks forever, matching the behaviour
/// operators expect from an interactive deploy.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner {
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    async fn output(
        &self,
        program: &str,
        mut command: Command,
        input: Option<&[u8]>,
    ) -> Result<Output> {
        let mut child = command
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let stdin_task = child.stdin.take().zip(input).map(|(mut stdin, input)| {
            let input = input.to_vec();
            tokio::spawn(async move {
                let _ = stdin.write_all(&input).await;
            })
        });

        let Some(timeout) = self.timeout else {
            return collect(program, child, stdin_task).await;
        };

        match tokio::time::timeout(timeout, collect(program, child, stdin_task)).await {
            Ok(result) => result,
            // `collect` owns the child; dropping it kills the process.
            Err(_) => anyhow::bail!("{program} timed out after {}s", timeout.as_secs()),
        }
    }
}

async fn collect(
    program: &str,
    mut child: Child,
    stdin_task: Option<tokio::task::JoinHandle<()>>,
) -> Result<Output> {
    let mut stdout_handle = child.stdout.take();
    let mut stderr_handle = child.stderr.take();

    let (status, stdout, stderr) = tokio::join!(
        child.wait(),
        async {
            let mut buf = Vec::new();
            if let Some(ref mut h) = stdout_handle {
                let _ = h.read_to_end(&mut buf).await;
            }
            buf
        },
        async {
            let mut buf = Vec::new();
            if let Some(ref mut h) = stderr_handle {
                let _ = h.read_to_end(&mut buf).await;
            }
            buf
        },
    );
    if let Some(task) = stdin_task {
        let _ = task.await;
    }
    Ok(Output {
        status: status.with_context(|| format!("waiting for {program}"))?,
        stdout,
        stderr,
    })
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        let mut command = Command::new(program);
        command.args(args);
        self.output(program, command, None).await
    }

    async fn run_in_dir(&self, program: &str, args: &[&str], dir: &Path) -> Result<Output> {
        let mut command = Command::new(program);
        command.args(args).current_dir(dir);
        self.output(program, command, None).await
    }

    async fn run_with_stdin(&self, program: &str, args: &[&str], input: &[u8]) -> Result<Output> {
        let mut command = Command::new(program);
        command.args(args);
        self.output(program, command, Some(input)).await
    }

    async fn run_detached(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExitStatus> {
        let mut child = Command::new(program)
            .args(args)
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let wait = async {
            child
                .wait()
                .await
                .with_context(|| format!("waiting for {program}"))
        };
        match self.timeout {
            None => wait.await,
            Some(timeout) => match tokio::time::timeout(timeout, wait).await {
                Ok(result) => result,
                Err(_) => anyhow::bail!("{program} timed out after {}s", timeout.as_secs()),
            },
        }
    }
}
