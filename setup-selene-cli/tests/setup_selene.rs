use anyhow::{anyhow, Result};
#[cfg(target_family = "unix")]
use std::os::unix::prelude::*;
use std::{
    env, fs,
    path::{Path, PathBuf},
    process,
};
use tempfile::TempDir;

const SETUP_SELENE: &str = env!("CARGO_BIN_EXE_setup-selene");

// Nothing listens on port 1, so every API request fails right away.
const DEAD_API: &str = "http://127.0.0.1:1";

#[test]
fn prints_own_version() -> Result<()> {
    let td = TempDir::new()?;
    let (stdout, _) = run_command(td.path(), &["-V"], &[])?;
    assert_eq!(
        stdout.unwrap_or_default().trim(),
        format!("setup-selene {}", env!("CARGO_PKG_VERSION")),
    );
    Ok(())
}

#[test]
fn invalid_api_base_url_is_a_config_error() -> Result<()> {
    let td = TempDir::new()?;
    let output = command(td.path(), &["--api-base-url", "api.github.com"], &[]).output()?;
    assert_eq!(output.status.code(), Some(127));
    assert!(
        String::from_utf8_lossy(&output.stdout).contains("Usage:"),
        "help is printed for invalid args",
    );
    Ok(())
}

#[test]
fn failed_install_is_reported_to_actions() -> Result<()> {
    let td = TempDir::new()?;
    let output = command(
        td.path(),
        &["--api-base-url", DEAD_API],
        &[("GITHUB_ACTIONS", "true"), ("INPUT_VERSION", "^0.20")],
    )
    .output()?;

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.lines().any(|l| l.starts_with("::error::")),
        "an error workflow command is printed: {stdout}",
    );
    assert!(
        !cache_root(td.path()).join("selene").exists(),
        "nothing was cached",
    );
    Ok(())
}

#[test]
fn failed_install_outside_actions() -> Result<()> {
    let td = TempDir::new()?;
    let output = command(td.path(), &["--api-base-url", DEAD_API], &[]).output()?;

    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("::error::"));
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
    Ok(())
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
#[test]
fn cached_version_is_used_without_the_api() -> Result<()> {
    let td = TempDir::new()?;
    let arch = if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x64"
    };
    let version_dir = cache_root(td.path()).join("selene").join("0.20.0");
    let tool_dir = version_dir.join(arch);
    fs::create_dir_all(&tool_dir)?;
    fs::write(version_dir.join(format!("{arch}.complete")), "")?;
    let fake_selene = write_fake_selene(&tool_dir)?;

    let github_path = td.path().join("github_path");
    let github_path_str = github_path.to_string_lossy().to_string();
    let (_, stderr) = run_command(
        td.path(),
        &["--api-base-url", DEAD_API, "--verbose"],
        &[
            ("INPUT_VERSION", "v0.20.0"),
            ("INPUT_ARGS", "--version"),
            ("GITHUB_PATH", github_path_str.as_str()),
        ],
    )?;

    let stderr = stderr.unwrap_or_default();
    assert!(
        stderr.contains("from the cache"),
        "the cached selene is used: {stderr}",
    );
    assert_eq!(
        fs::read_to_string(&github_path)?.trim(),
        tool_dir.to_string_lossy(),
    );
    assert!(fake_selene.exists());
    Ok(())
}

// This needs the GitHub API and downloads a real release, so it is only run on request.
#[cfg(any(
    all(target_os = "linux", target_arch = "x86_64"),
    target_os = "macos",
    target_os = "windows"
))]
#[test]
#[ignore = "downloads selene from GitHub"]
fn installs_and_runs_real_selene() -> Result<()> {
    let mut td = TempDir::new()?;
    if let Ok(p) = env::var("SETUP_SELENE_TESTS_PRESERVE_TEMPDIR") {
        if !(p.is_empty() || p == "0") {
            println!("Preserving tempdir: {}", td.path().display());
            td.disable_cleanup(true);
        }
    }

    let (stdout, _) = run_command(
        td.path(),
        &[],
        &[("INPUT_VERSION", "0.20.0"), ("INPUT_ARGS", "--version")],
    )?;
    assert!(
        stdout.unwrap_or_default().contains("selene 0.20.0"),
        "selene 0.20.0 was installed and run",
    );

    let selene = if cfg!(windows) { "selene.exe" } else { "selene" };
    let installed = fs::read_dir(cache_root(td.path()).join("selene").join("0.20.0"))?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path().join(selene))
        .find(|p| p.is_file())
        .ok_or_else(|| anyhow!("selene was not stored in the tool cache"))?;
    assert!(installed.starts_with(cache_root(td.path())));
    #[cfg(target_family = "unix")]
    assert!(
        fs::metadata(&installed)?.permissions().mode() & 0o111 != 0,
        "cached selene is executable",
    );

    Ok(())
}

fn cache_root(td: &Path) -> PathBuf {
    td.join("tool-cache")
}

#[cfg(target_family = "unix")]
fn write_fake_selene(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("selene");
    fs::write(&path, "#!/bin/sh\necho \"selene 0.20.0\"\n")?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

#[cfg(target_family = "windows")]
fn write_fake_selene(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("selene.bat");
    fs::write(&path, "@echo selene 0.20.0\r\n")?;
    Ok(path)
}

fn command(td: &Path, args: &[&str], vars: &[(&str, &str)]) -> process::Command {
    let mut c = process::Command::new(SETUP_SELENE);
    c.args(args);
    for v in [
        "GITHUB_ACTIONS",
        "GITHUB_PATH",
        "INPUT_ARGS",
        "INPUT_TOKEN",
        "INPUT_VERSION",
        "RUNNER_DEBUG",
    ] {
        c.env_remove(v);
    }
    c.env("RUNNER_TOOL_CACHE", cache_root(td));
    c.env("RUNNER_TEMP", td);
    c.env(
        "GITHUB_TOKEN",
        env::var("GITHUB_TOKEN").as_deref().unwrap_or(""),
    );
    for (k, v) in vars {
        c.env(k, v);
    }
    c
}

fn run_command(
    td: &Path,
    args: &[&str],
    vars: &[(&str, &str)],
) -> Result<(Option<String>, Option<String>)> {
    let cstr = command_string(args);
    println!("running {cstr}");

    let output = command(td, args, vars).output()?;
    match output.status.code() {
        Some(0) => Ok((
            to_option_string(&output.stdout),
            to_option_string(&output.stderr),
        )),
        Some(code) => {
            let mut msg = format!("ran {cstr} and got non-zero exit code: {code}");
            if !output.stdout.is_empty() {
                msg.push_str("\nStdout:\n");
                msg.push_str(&String::from_utf8_lossy(&output.stdout));
            }
            if !output.stderr.is_empty() {
                msg.push_str("\nStderr:\n");
                msg.push_str(&String::from_utf8_lossy(&output.stderr));
            }
            Err(anyhow!(msg))
        }
        None => {
            if output.status.success() {
                return Err(anyhow!("ran {} successfully but it had no exit code", cstr));
            }
            let signal = signal_from_status(output.status);
            Err(anyhow!(
                "ran {} successfully but was killed by signal {}",
                cstr,
                signal,
            ))
        }
    }
}

fn command_string(args: &[&str]) -> String {
    let mut cstr = SETUP_SELENE.to_string();
    if !args.is_empty() {
        cstr.push(' ');
        cstr.push_str(args.join(" ").as_str());
    }
    cstr
}

fn to_option_string(v: &[u8]) -> Option<String> {
    if v.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(v).to_string())
    }
}

#[cfg(target_family = "unix")]
fn signal_from_status(status: process::ExitStatus) -> i32 {
    status.signal().unwrap_or(0)
}

#[cfg(target_family = "windows")]
fn signal_from_status(_: process::ExitStatus) -> i32 {
    0
}
