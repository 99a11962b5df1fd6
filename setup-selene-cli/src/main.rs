use anyhow::{Error, Result};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use log::{debug, error};
use setup_selene::{error_command, is_actions, is_debug, Setup, SetupBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
enum SetupCliError {
    #[error("{0:}")]
    InvalidArgsError(String),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cmd = cmd();
    let matches = cmd.get_matches();
    let res = init_logger_from_matches(&matches);
    if let Err(e) = res {
        eprintln!("Error creating logger: {e}");
        std::process::exit(126);
    }

    let status = match make_setup(&matches) {
        Ok(setup) => match install_and_run(&setup, &matches).await {
            Ok(()) => 0,
            Err(e) => {
                print_err(&e);
                1
            }
        },
        Err(e) => {
            print_err(&e);
            127
        }
    };
    std::process::exit(status);
}

const MAX_TERM_WIDTH: usize = 100;

fn cmd() -> Command {
    Command::new("setup-selene")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Installs the selene Lua linter from its GitHub releases and runs it")
        // `--version` is the version of selene to install.
        .disable_version_flag(true)
        .arg(
            Arg::new("print-version")
                .short('V')
                .action(ArgAction::Version)
                .help("Print the version of this tool and exit."),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .env("INPUT_TOKEN")
                .hide_env_values(true)
                .help(concat!(
                    "A token for GitHub API requests. If this is empty, the GITHUB_TOKEN env var",
                    " is used when it is set. Without a token you may hit the API's rate limits.",
                )),
        )
        .arg(
            Arg::new("args")
                .long("args")
                .env("INPUT_ARGS")
                .allow_hyphen_values(true)
                .help(concat!(
                    "The arguments to pass to selene. These are interpreted by the shell, so",
                    " quoting and globs work the way they would on a command line.",
                )),
        )
        .arg(Arg::new("version").long("version").env("INPUT_VERSION").help(concat!(
            "The version of selene to install, like `0.20.0`, `v0.20.0`, or a range like",
            " `^0.20`. If this is empty or is not a version or a range, the newest release is",
            " installed.",
        )))
        .arg(
            Arg::new("tool-cache")
                .long("tool-cache")
                .env("RUNNER_TOOL_CACHE")
                .help(concat!(
                    "The root of the tool cache. Defaults to a `setup-selene` directory in the",
                    " user's cache directory.",
                )),
        )
        .arg(
            Arg::new("temp-dir")
                .long("temp-dir")
                .env("RUNNER_TEMP")
                .help("The directory to download and unpack releases in."),
        )
        .arg(
            Arg::new("api-base-url")
                .long("api-base-url")
                .help(concat!(
                    "The base URL for the GitHub API. This is useful for testing or for GitHub",
                    " Enterprise Server. This should be something like",
                    " `https://github.my-corp.example.com/api/v3`.",
                )),
        )
        .arg(
            Arg::new("install-only")
                .long("install-only")
                .action(ArgAction::SetTrue)
                .help("Install selene and add it to PATH without running it."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output."),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Enable debugging output. This is also enabled when RUNNER_DEBUG is 1."),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppresses most output."),
        )
        .group(ArgGroup::new("log-level").args(["verbose", "debug", "quiet"]))
        .max_term_width(MAX_TERM_WIDTH)
}

fn level_from_matches(matches: &ArgMatches) -> log::LevelFilter {
    if matches.get_flag("debug") || is_debug() {
        log::LevelFilter::Debug
    } else if matches.get_flag("verbose") {
        log::LevelFilter::Info
    } else if matches.get_flag("quiet") {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Warn
    }
}

pub(crate) fn init_logger_from_matches(matches: &ArgMatches) -> Result<(), log::SetLoggerError> {
    setup_selene::init_logger(level_from_matches(matches))
}

fn make_setup(matches: &ArgMatches) -> Result<Setup> {
    validate_args(matches)?;

    let mut builder = SetupBuilder::new();
    if let Some(v) = matches.get_one::<String>("version") {
        builder = builder.version(v);
    }
    if let Some(t) = matches.get_one::<String>("token") {
        builder = builder.token(t);
    }
    if let Some(dir) = non_empty(matches, "tool-cache") {
        builder = builder.tool_cache_dir(dir);
    }
    if let Some(dir) = non_empty(matches, "temp-dir") {
        builder = builder.temp_dir(dir);
    }
    if let Some(url) = matches.get_one::<String>("api-base-url") {
        builder = builder.api_base_url(url);
    }

    builder.build()
}

fn validate_args(matches: &ArgMatches) -> Result<()> {
    if let Some(url) = matches.get_one::<String>("api-base-url") {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SetupCliError::InvalidArgsError(format!(
                "The --api-base-url must be an http or https URL, not `{url}`"
            ))
            .into());
        }
    }

    if matches.get_flag("install-only") && !args(matches).is_empty() {
        return Err(SetupCliError::InvalidArgsError(
            "You cannot combine the --install-only and --args options".to_string(),
        )
        .into());
    }

    Ok(())
}

// Actions sets every RUNNER_* var, but some may be empty on self-hosted runners.
fn non_empty<'a>(matches: &'a ArgMatches, id: &str) -> Option<&'a String> {
    matches.get_one::<String>(id).filter(|v| !v.is_empty())
}

fn args(matches: &ArgMatches) -> &str {
    matches
        .get_one::<String>("args")
        .map_or("", |a| a.trim())
}

async fn install_and_run(setup: &Setup, matches: &ArgMatches) -> Result<()> {
    let installation = setup.install().await?;
    if matches.get_flag("install-only") {
        debug!(
            "Skipping the selene run, it is installed in {}",
            installation.dir.display(),
        );
        return Ok(());
    }
    setup.run(args(matches))
}

fn print_err(e: &Error) {
    error!("{e:#}");
    if is_actions() {
        println!("{}", error_command(&format!("{e:#}")));
    }
    if let Some(se) = e.downcast_ref::<SetupCliError>() {
        match se {
            SetupCliError::InvalidArgsError(_) => {
                println!();
                let _ = cmd().print_help();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serial_test::serial;
    use std::env;

    #[test]
    fn command_is_valid() {
        cmd().debug_assert();
    }

    #[rstest]
    #[case::default(&[], log::LevelFilter::Warn)]
    #[case::verbose(&["-v"], log::LevelFilter::Info)]
    #[case::debug(&["--debug"], log::LevelFilter::Debug)]
    #[case::quiet(&["-q"], log::LevelFilter::Error)]
    #[serial]
    fn log_level(#[case] flags: &[&str], #[case] expect: log::LevelFilter) -> Result<()> {
        env::remove_var("RUNNER_DEBUG");
        let matches = cmd().try_get_matches_from(argv(flags))?;
        assert_eq!(level_from_matches(&matches), expect);
        Ok(())
    }

    #[test]
    #[serial]
    fn runner_debug_enables_debug_logging() -> Result<()> {
        env::set_var("RUNNER_DEBUG", "1");
        let matches = cmd().try_get_matches_from(argv(&["-q"]));
        env::remove_var("RUNNER_DEBUG");
        assert_eq!(level_from_matches(&matches?), log::LevelFilter::Debug);
        Ok(())
    }

    #[test]
    fn log_level_flags_conflict() {
        assert!(cmd().try_get_matches_from(argv(&["-v", "-q"])).is_err());
    }

    #[test]
    #[serial]
    fn inputs_come_from_env() -> Result<()> {
        env::set_var("INPUT_VERSION", "^0.20");
        env::set_var("INPUT_ARGS", "--display-style quiet .");
        env::set_var("INPUT_TOKEN", "sekrit");
        let matches = cmd().try_get_matches_from(argv(&[]));
        for v in ["INPUT_VERSION", "INPUT_ARGS", "INPUT_TOKEN"] {
            env::remove_var(v);
        }
        let matches = matches?;

        assert_eq!(
            matches.get_one::<String>("version").map(String::as_str),
            Some("^0.20"),
        );
        assert_eq!(args(&matches), "--display-style quiet .");
        assert_eq!(
            matches.get_one::<String>("token").map(String::as_str),
            Some("sekrit"),
        );
        Ok(())
    }

    #[test]
    #[serial]
    fn flags_override_env() -> Result<()> {
        env::set_var("INPUT_VERSION", "0.19.0");
        let matches = cmd().try_get_matches_from(argv(&["--version", "0.20.0"]));
        env::remove_var("INPUT_VERSION");

        assert_eq!(
            matches?.get_one::<String>("version").map(String::as_str),
            Some("0.20.0"),
        );
        Ok(())
    }

    #[test]
    #[serial]
    fn args_may_start_with_a_hyphen() -> Result<()> {
        env::remove_var("INPUT_ARGS");
        let matches = cmd().try_get_matches_from(argv(&["--args", "--display-style=quiet"]))?;
        assert_eq!(args(&matches), "--display-style=quiet");
        Ok(())
    }

    #[rstest]
    #[case::not_a_url(&["--api-base-url", "api.github.com"])]
    #[case::ftp(&["--api-base-url", "ftp://api.github.com"])]
    #[case::install_only_with_args(&["--install-only", "--args", "."])]
    #[serial]
    fn invalid_args(#[case] flags: &[&str]) -> Result<()> {
        env::remove_var("INPUT_ARGS");
        let matches = cmd().try_get_matches_from(argv(flags))?;
        let err = validate_args(&matches).unwrap_err();
        assert!(err.downcast_ref::<SetupCliError>().is_some());
        Ok(())
    }

    #[test]
    #[serial]
    fn empty_runner_dirs_are_ignored() -> Result<()> {
        env::set_var("RUNNER_TEMP", "");
        let matches = cmd().try_get_matches_from(argv(&["--tool-cache", ""]));
        env::remove_var("RUNNER_TEMP");
        let matches = matches?;

        assert_eq!(non_empty(&matches, "tool-cache"), None);
        assert_eq!(non_empty(&matches, "temp-dir"), None);
        Ok(())
    }

    fn argv<'a>(flags: &[&'a str]) -> Vec<&'a str> {
        let mut argv = vec!["setup-selene"];
        argv.extend_from_slice(flags);
        argv
    }
}
