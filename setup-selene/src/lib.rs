//! A library for installing the [selene](https://github.com/Kampfkarren/selene) Lua linter in CI
//! and running it.
//!
//! It looks up selene's GitHub releases, picks the asset built for the current platform, and keeps
//! the unpacked binary in a tool cache so later runs on the same machine do not download it
//! again. The directory holding the binary is added to `PATH`, both for this process and, on a
//! GitHub Actions runner, for later steps of the job.
//!
//! This project also ships a CLI tool named `setup-selene`, which reads its inputs from the
//! `INPUT_*` env vars that GitHub Actions sets for a step.
//!
//! The main entry point for programmatic use is the [`SetupBuilder`] struct. Here is an example of
//! its usage:
//!
//! ```ignore
//! use setup_selene::SetupBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let setup = SetupBuilder::new()
//!         .version("^0.20")
//!         .tool_cache_dir("/opt/hostedtoolcache")
//!         .build()?;
//!
//!     setup.install().await?;
//!     setup.run("--display-style quiet .")?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## How the Version Is Chosen
//!
//! The requested version is cleaned first: whitespace, a leading `v` or `=`, and build metadata are
//! removed. What happens next depends on what is left.
//!
//! - Nothing, or something that is not a version or a range: the newest release is used. "Newest"
//!   means the highest version among the release tags, not the most recently published release.
//! - An exact version like `0.20.0`: the tool cache is checked before GitHub is contacted at all.
//! - A range like `^0.20`, `0.19.x`, or `>=0.18 <0.21 || 0.15.0`: the highest cached version in the
//!   range is used if there is one. Otherwise the highest release in the range is installed.
//!
//! ## How the Asset Is Chosen
//!
//! selene publishes one zip file per OS. The first asset whose name contains `linux`, `macos`, or
//! `windows` (matching the current OS) is used. Other operating systems are not supported.
//!
//! ## Features
//!
//! This crate offers several features to control the TLS dependency used by `reqwest`:
//!
#![doc = document_features::document_features!()]

mod actions;
mod builder;
mod cache;
mod download;
mod error;
mod exec;
mod extension;
mod github;
mod installer;
mod picker;
mod release;
mod runner;
mod setup;
mod version;

pub use crate::{
    actions::{error_command, is_actions, is_debug},
    builder::SetupBuilder,
    error::SetupError,
    github::PROJECT_NAME,
    installer::{InstallSource, Installation, TOOL_NAME},
    picker::select_asset,
    release::{find_release, latest_release, Asset, Release},
    setup::Setup,
    version::{clean, rcompare, satisfies, VersionError, VersionRange, VersionRequest},
};

// The version of the `setup-selene` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(feature = "logging")]
use fern::{
    colors::{Color, ColoredLevelConfig},
    Dispatch,
};

/// This function initializes logging for the application. It's public for the sake of the
/// `setup-selene` binary, but it lives in the library crate so that test code can also enable
/// logging.
///
/// # Errors
///
/// This can return a `log::SetLoggerError` error.
#[cfg(feature = "logging")]
pub fn init_logger(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    let line_colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::BrightBlack)
        .debug(Color::BrightBlack)
        .trace(Color::BrightBlack);
    let level_colors = line_colors.info(Color::Green).debug(Color::Black);

    Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{color_line}[{target}][{level}{color_line}] {message}\x1B[0m",
                color_line = format_args!(
                    "\x1B[{}m",
                    line_colors.get_color(&record.level()).to_fg_str()
                ),
                target = record.target(),
                level = level_colors.color(record.level()),
                message = message,
            ));
        })
        .level(level)
        // These are very noisy.
        .level_for("hyper", log::LevelFilter::Error)
        .level_for("reqwest", log::LevelFilter::Error)
        .chain(std::io::stderr())
        .apply()
}
