//! Bits of the GitHub Actions runner protocol: adding directories to `PATH` for this and later
//! steps, and marking a step as failed.

use anyhow::{Context, Result};
use log::debug;
use std::{
    env,
    ffi::OsString,
    fmt::Debug,
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

/// Makes an installed tool's directory findable by later commands.
pub(crate) trait PathRegistry: Debug {
    /// Adds `dir` to the front of the search path.
    ///
    /// # Errors
    ///
    /// Returns an error if the search path cannot be updated.
    fn add_path(&self, dir: &Path) -> Result<()>;
}

/// A [`PathRegistry`] that prepends to this process's `PATH` and, when running under Actions,
/// appends to the file named by `GITHUB_PATH` so that later workflow steps see the directory too.
#[derive(Debug, Default)]
pub(crate) struct ActionsPath {}

impl ActionsPath {
    #[must_use]
    pub fn new() -> Self {
        ActionsPath::default()
    }
}

impl PathRegistry for ActionsPath {
    fn add_path(&self, dir: &Path) -> Result<()> {
        if let Some(github_path) = env::var_os("GITHUB_PATH").filter(|p| !p.is_empty()) {
            let github_path = PathBuf::from(github_path);
            debug!("adding {} to {}", dir.display(), github_path.display());
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&github_path)
                .with_context(|| format!("failed to open {}", github_path.display()))?;
            writeln!(file, "{}", dir.display())
                .with_context(|| format!("failed to write to {}", github_path.display()))?;
        }

        let mut paths = vec![dir.to_path_buf()];
        if let Some(current) = env::var_os("PATH") {
            paths.extend(env::split_paths(&current));
        }
        let new_path: OsString = env::join_paths(paths)
            .with_context(|| format!("cannot add {} to PATH", dir.display()))?;
        debug!("PATH is now {}", new_path.to_string_lossy());
        env::set_var("PATH", new_path);

        Ok(())
    }
}

/// Returns true when running as a GitHub Actions step.
#[must_use]
pub fn is_actions() -> bool {
    env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true")
}

/// Returns true when the workflow was re-run with debug logging enabled.
#[must_use]
pub fn is_debug() -> bool {
    env::var("RUNNER_DEBUG").is_ok_and(|v| v == "1")
}

/// Formats the workflow command that marks the current step as failed with `message`.
#[must_use]
pub fn error_command(message: &str) -> String {
    format!("::error::{}", escape_data(message))
}

// Workflow command data must have `%`, CR, and LF escaped.
fn escape_data(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;
    use test_log::test;

    #[test]
    #[serial]
    fn add_path_prepends_and_writes_github_path() -> Result<()> {
        let old_path = env::var_os("PATH");
        let td = tempdir()?;
        let github_path = td.path().join("github_path");
        env::set_var("GITHUB_PATH", &github_path);

        let dir = td.path().join("selene").join("0.20.0");
        let res = ActionsPath::new().add_path(&dir);
        let new_path = env::var_os("PATH");

        env::remove_var("GITHUB_PATH");
        match &old_path {
            Some(p) => env::set_var("PATH", p),
            None => env::remove_var("PATH"),
        }
        res?;

        let first = new_path
            .as_ref()
            .and_then(|p| env::split_paths(p).next())
            .expect("PATH has an entry");
        assert_eq!(first, dir);
        assert_eq!(
            fs::read_to_string(&github_path)?,
            format!("{}\n", dir.display())
        );

        Ok(())
    }

    #[test]
    #[serial]
    fn add_path_without_github_path() -> Result<()> {
        let old_path = env::var_os("PATH");
        env::remove_var("GITHUB_PATH");

        let td = tempdir()?;
        let res = ActionsPath::new().add_path(td.path());
        let new_path = env::var_os("PATH");
        match &old_path {
            Some(p) => env::set_var("PATH", p),
            None => env::remove_var("PATH"),
        }
        res?;

        let count = new_path.as_ref().map_or(0, |p| env::split_paths(p).count());
        let old_count = old_path.as_ref().map_or(0, |p| env::split_paths(p).count());
        assert_eq!(count, old_count + 1);

        Ok(())
    }

    #[test]
    fn error_command_escapes_newlines() {
        assert_eq!(
            error_command("Could not find release\nfor 100% of inputs"),
            "::error::Could not find release%0Afor 100%25 of inputs",
        );
    }
}
