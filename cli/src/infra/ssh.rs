//! OpenSSH-backed implementation of the remote session ports.
//!
//! A session is an OpenSSH ControlMaster connection. `connect` starts the
//! master in the background (under `sshpass` for password auth); `exec` and
//! `upload` reuse its socket with `ssh -S` and `sftp -o ControlPath`; `close`
//! asks the master to exit. The socket and master log live in a private temp
//! directory removed when the session is dropped.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::application::ports::{CommandRunner, RemoteOutput, RemoteSession, SessionConnector};
use crate::domain::{AuthMethod, ConnectError, SshTarget};

const CONTROL_SOCKET: &str = "master.sock";
const MASTER_LOG: &str = "master.log";

/// Idle time after which the master exits on its own, so a master whose
/// `-O exit` failed cannot outlive the run by long.
const MASTER_IDLE_LIMIT: &str = "ControlPersist=10m";

/// `sshpass` exit code for a rejected password.
const SSHPASS_WRONG_PASSWORD: i32 = 5;

/// Lines OpenSSH logs when the server refuses every offered credential.
const AUTH_FAILURE_MARKERS: &[&str] = &[
    "Permission denied",
    "Too many authentication failures",
    "Authentication failed",
];

// ── Connector ─────────────────────────────────────────────────────────────────

/// Opens [`OpenSshSession`]s through a `CommandRunner`.
///
/// Generic over `R: CommandRunner` so that tests can inject a recording
/// runner without spawning real processes.
pub struct OpenSshConnector<R: CommandRunner + Clone> {
    runner: R,
}

impl<R: CommandRunner + Clone> OpenSshConnector<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner + Clone> SessionConnector for OpenSshConnector<R> {
    type Session = OpenSshSession<R>;

    async fn connect(
        &self,
        target: &SshTarget,
        auth: &AuthMethod,
    ) -> std::result::Result<Self::Session, ConnectError> {
        let control_dir = tempfile::Builder::new()
            .prefix("inbizio-ssh-")
            .tempdir()
            .context("creating SSH control directory")?;
        let socket = control_dir.path().join(CONTROL_SOCKET);
        let log = control_dir.path().join(MASTER_LOG);

        let invocation = master_invocation(target, auth, &socket, &log);
        tracing::debug!(
            program = invocation.program,
            args = ?invocation.args,
            auth = auth.label(),
            "starting SSH master connection"
        );

        let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
        let env: Vec<(&str, &str)> = invocation.env.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let status = match self
            .runner
            .run_detached(invocation.program, &args, &env)
            .await
        {
            Ok(status) => status,
            Err(e) if auth_tool_missing(&e, invocation.program) => {
                return Err(ConnectError::Authentication(format!(
                    "{} is required for password authentication but could not be started",
                    invocation.program
                )));
            }
            Err(e) => return Err(ConnectError::Transport(e)),
        };

        if status.success() {
            tracing::debug!(socket = %socket.display(), "SSH master connection established");
            return Ok(OpenSshSession {
                runner: self.runner.clone(),
                target: target.clone(),
                control_dir,
            });
        }

        let log_text = std::fs::read_to_string(&log).unwrap_or_default();
        Err(classify_failure(
            invocation.program,
            status.code(),
            &log_text,
        ))
    }
}

/// Program, argv and environment for starting the master connection.
#[derive(Debug)]
pub(crate) struct MasterInvocation {
    pub program: &'static str,
    pub args: Vec<String>,
    pub env: Vec<(&'static str, String)>,
}

pub(crate) fn master_invocation(
    target: &SshTarget,
    auth: &AuthMethod,
    socket: &Path,
    log: &Path,
) -> MasterInvocation {
    let mut ssh_args: Vec<String> = vec![
        "-M".into(),
        "-N".into(),
        "-f".into(),
        "-S".into(),
        socket.display().to_string(),
        "-E".into(),
        log.display().to_string(),
        "-o".into(),
        MASTER_IDLE_LIMIT.into(),
        "-o".into(),
        "StrictHostKeyChecking=accept-new".into(),
        "-p".into(),
        target.port.to_string(),
    ];
    if let Some(known_hosts) = &target.known_hosts {
        ssh_args.push("-o".into());
        ssh_args.push(format!("UserKnownHostsFile={}", known_hosts.display()));
    }

    match auth {
        AuthMethod::Password(password) => {
            ssh_args.extend(
                [
                    "-o",
                    "PreferredAuthentications=password,keyboard-interactive",
                    "-o",
                    "PubkeyAuthentication=no",
                    "-o",
                    "NumberOfPasswordPrompts=1",
                ]
                .map(String::from),
            );
            ssh_args.push("--".into());
            ssh_args.push(target.destination());

            let mut args = vec!["-e".to_owned(), "ssh".to_owned()];
            args.extend(ssh_args);
            MasterInvocation {
                program: "sshpass",
                args,
                env: vec![("SSHPASS", password.clone())],
            }
        }
        AuthMethod::PrivateKey(key) => {
            ssh_args.push("-i".into());
            ssh_args.push(key.display().to_string());
            ssh_args.extend(
                [
                    "-o",
                    "IdentitiesOnly=yes",
                    "-o",
                    "BatchMode=yes",
                    "-o",
                    "PreferredAuthentications=publickey",
                ]
                .map(String::from),
            );
            ssh_args.push("--".into());
            ssh_args.push(target.destination());
            MasterInvocation {
                program: "ssh",
                args: ssh_args,
                env: Vec::new(),
            }
        }
    }
}

/// Decide whether a failed master start was an authentication rejection.
pub(crate) fn classify_failure(program: &str, code: Option<i32>, log: &str) -> ConnectError {
    let last_line = log
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_owned();

    if program == "sshpass" && code == Some(SSHPASS_WRONG_PASSWORD) {
        return ConnectError::Authentication("incorrect password".to_owned());
    }
    if AUTH_FAILURE_MARKERS.iter().any(|m| log.contains(m)) {
        return ConnectError::Authentication(last_line);
    }

    let status = code.map_or_else(|| "a signal".to_owned(), |c| format!("exit code {c}"));
    let detail = if last_line.is_empty() {
        String::new()
    } else {
        format!(": {last_line}")
    };
    ConnectError::Transport(anyhow::anyhow!("{program} failed with {status}{detail}"))
}

fn auth_tool_missing(err: &anyhow::Error, program: &str) -> bool {
    program == "sshpass"
        && err
            .root_cause()
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

// ── Session ───────────────────────────────────────────────────────────────────

/// One multiplexed OpenSSH connection.
pub struct OpenSshSession<R: CommandRunner> {
    runner: R,
    target: SshTarget,
    control_dir: TempDir,
}

impl<R: CommandRunner> OpenSshSession<R> {
    fn socket(&self) -> PathBuf {
        self.control_dir.path().join(CONTROL_SOCKET)
    }

    pub(crate) fn exec_args(&self, command: &str) -> Vec<String> {
        vec![
            "-S".into(),
            self.socket().display().to_string(),
            "-o".into(),
            "ControlMaster=no".into(),
            "-o".into(),
            "BatchMode=yes".into(),
            "-p".into(),
            self.target.port.to_string(),
            "--".into(),
            self.target.destination(),
            command.to_owned(),
        ]
    }

    pub(crate) fn sftp_args(&self) -> Vec<String> {
        vec![
            "-b".into(),
            "-".into(),
            "-o".into(),
            format!("ControlPath={}", self.socket().display()),
            "-o".into(),
            "ControlMaster=no".into(),
            "-o".into(),
            "BatchMode=yes".into(),
            "-P".into(),
            self.target.port.to_string(),
            self.target.destination(),
        ]
    }
}

/// `put` line for an sftp batch, with both paths double-quoted.
pub(crate) fn sftp_put_batch(local: &Path, remote: &str) -> String {
    fn q(s: &str) -> String {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    }
    format!("put {} {}\n", q(&local.display().to_string()), q(remote))
}

impl<R: CommandRunner> RemoteSession for OpenSshSession<R> {
    async fn exec(&self, command: &str) -> Result<RemoteOutput> {
        let args = self.exec_args(command);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run("ssh", &args)
            .await
            .context("ssh exec")?;
        Ok(RemoteOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let args = self.sftp_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let batch = sftp_put_batch(local, remote);
        let output = self
            .runner
            .run_with_stdin("sftp", &args, batch.as_bytes())
            .await
            .context("sftp put")?;
        anyhow::ensure!(
            output.status.success(),
            "sftp put {} -> {} failed ({}): {}",
            local.display(),
            remote,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(())
    }

    async fn close(self) -> Result<()> {
        let socket = self.socket().display().to_string();
        let destination = self.target.destination();
        let output = self
            .runner
            .run("ssh", &["-S", socket.as_str(), "-O", "exit", destination.as_str()])
            .await
            .context("ssh -O exit")?;
        anyhow::ensure!(
            output.status.success(),
            "stopping the SSH master failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        tracing::debug!(host = %self.target.host, "SSH session closed");
        Ok(())
    }
}
