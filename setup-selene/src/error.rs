use platforms::OS;
use std::path::PathBuf;
use thiserror::Error;

/// The ways an install can fail that are not simply a network, filesystem, or process error.
/// Those other errors are returned as-is, wrapped in an [`anyhow::Error`] with some context.
#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum SetupError {
    #[error("Could not find latest release version. Please specify an explicit version")]
    NoLatestRelease,
    #[error("Could not find release for version {version}")]
    NoRelease { version: String },
    #[error("Could not find asset for {tag} on platform {os}")]
    NoAsset { tag: String, os: OS },
    #[error("Current platform ({os}) is not supported")]
    UnsupportedPlatform { os: OS },
    #[error("{} is not an archive that can be extracted", path.display())]
    UnknownArchive { path: PathBuf },
}
