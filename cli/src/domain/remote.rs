//! Construction of the commands issued during a deploy.
//!
//! Remote commands are strings executed by the remote login shell, so every
//! interpolated path goes through [`quote`]. The local archive command is an
//! argv vector and never passes through a shell.

use std::borrow::Cow;
use std::path::PathBuf;

use crate::domain::version::DeployVersion;

/// Quote `value` for a POSIX shell. Safe strings are returned unchanged.
#[must_use]
pub fn quote(value: &str) -> String {
    shell_escape::unix::escape(Cow::Borrowed(value)).into_owned()
}

/// Remove every entry of `dir` without removing `dir` itself.
///
/// The glob stays outside the quotes so the remote shell expands it.
#[must_use]
pub fn clear_directory(dir: &str) -> String {
    format!("rm -rf -- {}/*", quote(dir))
}

/// Extract `archive` into `target`, overwriting without prompting.
#[must_use]
pub fn extract_archive(archive: &str, target: &str) -> String {
    format!("unzip -o -q {} -d {}", quote(archive), quote(target))
}

/// Local program invocation: program, argv and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCommand {
    pub program: &'static str,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl LocalCommand {
    /// Borrowed argv, the shape `CommandRunner` takes.
    #[must_use]
    pub fn arg_refs(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }
}

impl std::fmt::Display for LocalCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cd {} && {}", quote(&self.cwd.to_string_lossy()), self.program)?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// `zip -r -q inbizio<version>.zip .` run inside `dist_dir`.
#[must_use]
pub fn archive_build(dist_dir: PathBuf, version: &DeployVersion) -> LocalCommand {
    LocalCommand {
        program: "zip",
        args: vec![
            "-r".to_owned(),
            "-q".to_owned(),
            version.archive_name(),
            ".".to_owned(),
        ],
        cwd: dist_dir,
    }
}
