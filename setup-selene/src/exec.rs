use anyhow::{anyhow, Context, Result};
use log::debug;
use std::{fmt::Debug, path::PathBuf, process::Command};
use which::which;

/// Runs a command line through the platform's shell.
pub(crate) trait Executor: Debug {
    /// Runs `line`, returning an error if it cannot be started or does not exit successfully.
    ///
    /// # Errors
    ///
    /// Returns an error if the shell cannot be found or started, or if the command exits with a
    /// non-zero status.
    fn exec(&self, line: &str) -> Result<()>;
}

/// An [`Executor`] that uses `sh -c` on Unix and `cmd /C` on Windows. The child inherits this
/// process's environment and stdio, so it sees any directories added to `PATH`.
#[derive(Debug, Default)]
pub(crate) struct ShellExecutor {}

impl ShellExecutor {
    #[must_use]
    pub(crate) fn new() -> Self {
        ShellExecutor::default()
    }

    fn shell() -> Result<(PathBuf, &'static str)> {
        let (name, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        let path = which(name).with_context(|| format!("could not find a `{name}` executable"))?;
        Ok((path, flag))
    }
}

impl Executor for ShellExecutor {
    fn exec(&self, line: &str) -> Result<()> {
        let (shell, flag) = Self::shell()?;
        debug!("running `{line}` with {}", shell.display());

        let status = Command::new(&shell)
            .arg(flag)
            .arg(line)
            .status()
            .with_context(|| format!("failed to run `{line}`"))?;
        if !status.success() {
            return Err(anyhow!("`{line}` failed: {status}"));
        }
        Ok(())
    }
}

/// Quotes `arg` for `sh` so it is passed as a single word.
pub(crate) fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}
