//! End-to-end deploy and rollback against stand-in `ssh`, `sshpass`,
//! `sftp` and `zip` executables that record how they were called.

#![cfg(unix)]
#![allow(clippy::expect_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

use crate::cli_tests::inbizio_deploy;

const FAKE_SSH: &str = r#"#!/bin/sh
printf '%s\n' "ssh $*" >> "$FAKE_LOG"
case "$*" in
  *unzip*) if [ -n "$FAKE_FAIL_UNZIP" ]; then echo "unzip: cannot find archive" >&2; exit 9; fi ;;
esac
exit 0
"#;

const FAKE_SSHPASS: &str = r#"#!/bin/sh
if [ "$SSHPASS" = "hunter2" ]; then
  printf '%s\n' "sshpass password-from-env $*" >> "$FAKE_LOG"
else
  printf '%s\n' "sshpass $*" >> "$FAKE_LOG"
fi
if [ -n "$FAKE_REJECT_PASSWORD" ]; then exit 5; fi
shift
exec "$@"
"#;

const FAKE_SFTP: &str = r#"#!/bin/sh
printf '%s\n' "sftp $*" >> "$FAKE_LOG"
cat >> "$FAKE_LOG"
exit 0
"#;

const FAKE_ZIP: &str = r#"#!/bin/sh
printf '%s\n' "zip $* in $(pwd)" >> "$FAKE_LOG"
touch "$3"
exit 0
"#;

/// Scratch project, stand-in tools and env file for one run.
struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).expect("bin dir");
        for (name, script) in [
            ("ssh", FAKE_SSH),
            ("sshpass", FAKE_SSHPASS),
            ("sftp", FAKE_SFTP),
            ("zip", FAKE_ZIP),
        ] {
            let path = bin.join(name);
            std::fs::write(&path, script).expect("write fake tool");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod");
        }
        std::fs::create_dir_all(dir.path().join("app").join("dist")).expect("dist dir");

        let env = format!(
            "SERVER_HOST=deploy.example.com\n\
             SERVER_PORT=2222\n\
             SERVER_USER=deployer\n\
             SERVER_PASSWORD=hunter2\n\
             SSH_KEY_PATH=/keys/id_ed25519\n\
             INBIZIO_PROJECT_PATH={}\n\
             INBIZIO_REMOTE_PATH=/srv/artifacts\n\
             INBIZIO_REMOTE_DEPLOY_PATH=/srv/live\n",
            dir.path().join("app").display()
        );
        std::fs::write(dir.path().join("deploy.env"), env).expect("env file");
        Self { dir }
    }

    fn log_path(&self) -> PathBuf {
        self.dir.path().join("calls.log")
    }

    fn command(&self, mode: &str) -> Command {
        let path = std::env::var("PATH").unwrap_or_default();
        let mut cmd = inbizio_deploy();
        cmd.env("PATH", format!("{}:{path}", self.dir.path().join("bin").display()))
            .env("FAKE_LOG", self.log_path())
            .env("HOME", self.dir.path())
            .arg("--env-file")
            .arg(self.dir.path().join("deploy.env"))
            .args(["--version", "2.0.1", "--mode", mode]);
        cmd
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

/// Index of the first call containing every fragment.
fn position(calls: &[String], fragments: &[&str]) -> usize {
    calls
        .iter()
        .position(|c| fragments.iter().all(|f| c.contains(f)))
        .unwrap_or_else(|| panic!("no call matching {fragments:?} in {calls:#?}"))
}

fn report(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is a JSON report")
}

#[test]
fn deploy_runs_the_full_sequence() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .command("deploy")
        .arg("--json")
        .output()
        .expect("binary runs");
    assert!(output.status.success(), "{output:?}");

    let calls = sandbox.calls();
    let master = position(&calls, &["sshpass password-from-env -e ssh -M -N -f"]);
    let zip = position(&calls, &["zip -r -q inbizio2.0.1.zip . in", "/app/dist"]);
    let clear_artifacts = position(&calls, &["ssh -S", "rm -rf -- /srv/artifacts/*"]);
    let clear_live = position(&calls, &["ssh -S", "rm -rf -- /srv/live/*"]);
    let put = position(&calls, &["put \"", "\" \"/srv/artifacts/inbizio2.0.1.zip\""]);
    let unzip = position(&calls, &["unzip -o -q /srv/artifacts/inbizio2.0.1.zip -d /srv/live"]);
    let close = position(&calls, &["-O exit deployer@deploy.example.com"]);
    assert!(
        master < zip
            && zip < clear_artifacts
            && clear_artifacts < clear_live
            && clear_live < put
            && put < unzip
            && unzip < close,
        "{calls:#?}"
    );
    assert!(calls.iter().all(|c| !c.contains("hunter2")), "{calls:#?}");

    let report = report(&output);
    assert_eq!(report["mode"], "deploy");
    assert_eq!(report["version"], "2.0.1");
    assert_eq!(report["auth"], "password");
    assert_eq!(report["remote_archive"], "/srv/artifacts/inbizio2.0.1.zip");
    assert_eq!(report["extracted_to"], "/srv/live");
}

#[test]
fn rejected_password_retries_with_the_key() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .command("deploy")
        .arg("--json")
        .env("FAKE_REJECT_PASSWORD", "1")
        .output()
        .expect("binary runs");
    assert!(output.status.success(), "{output:?}");

    let calls = sandbox.calls();
    let masters: Vec<&String> = calls.iter().filter(|c| c.contains(" -M -N -f ")).collect();
    assert_eq!(masters.len(), 2, "{calls:#?}");
    assert!(masters[0].starts_with("sshpass"));
    assert!(masters[1].starts_with("ssh -M"));
    assert!(masters[1].contains("-i /keys/id_ed25519"));
    assert_eq!(report(&output)["auth"], "SSH key");
}

#[test]
fn rollback_skips_archive_and_upload() {
    let sandbox = Sandbox::new();
    sandbox
        .command("rollback")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled back to inbizio 2.0.1"));

    let calls = sandbox.calls();
    assert!(calls.iter().all(|c| !c.starts_with("zip ")), "{calls:#?}");
    assert!(calls.iter().all(|c| !c.starts_with("sftp ")), "{calls:#?}");
    let clear_live = position(&calls, &["rm -rf -- /srv/live/*"]);
    let unzip = position(&calls, &["unzip -o -q /srv/artifacts/inbizio2.0.1.zip"]);
    assert!(clear_live < unzip);
}

#[test]
fn failed_extraction_exits_one_and_closes_the_session() {
    let sandbox = Sandbox::new();
    sandbox
        .command("rollback")
        .env("FAKE_FAIL_UNZIP", "1")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error unzipping the build folder"))
        .stderr(predicate::str::contains("cannot find archive"));

    let calls = sandbox.calls();
    let unzip = position(&calls, &["unzip -o -q"]);
    let close = position(&calls, &["-O exit"]);
    assert!(unzip < close, "{calls:#?}");
}
