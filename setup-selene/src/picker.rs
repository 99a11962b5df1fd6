use crate::{
    error::SetupError,
    release::{Asset, Release},
};
use itertools::Itertools;
use log::debug;
use platforms::OS;

/// The platforms selene publishes binaries for. The serialized form of each variant is the token
/// that appears in the asset file names, like `selene-0.20.0-linux.zip`.
#[derive(strum::AsRefStr, Clone, Copy, Debug, strum::Display, PartialEq, Eq)]
pub(crate) enum SupportedOs {
    #[strum(serialize = "linux")]
    Linux,
    #[strum(serialize = "macos")]
    MacOs,
    #[strum(serialize = "windows")]
    Windows,
}

impl SupportedOs {
    // `OS` is non-exhaustive, so there is no way to list every unsupported variant.
    #[allow(clippy::wildcard_enum_match_arm)]
    pub(crate) fn from_os(os: OS) -> Result<Self, SetupError> {
        match os {
            OS::Linux => Ok(SupportedOs::Linux),
            OS::MacOS => Ok(SupportedOs::MacOs),
            OS::Windows => Ok(SupportedOs::Windows),
            _ => Err(SetupError::UnsupportedPlatform { os }),
        }
    }

    /// Linux and macOS need the executable bit set on the unpacked binary.
    pub(crate) fn is_unix(self) -> bool {
        match self {
            SupportedOs::Linux | SupportedOs::MacOs => true,
            SupportedOs::Windows => false,
        }
    }
}

/// Picks the asset in `release` that was built for `os`. This is the first asset, in the order
/// the release lists them, whose name contains the platform's token.
///
/// # Errors
///
/// Returns [`SetupError::UnsupportedPlatform`] if `os` is not Linux, macOS, or Windows, whatever
/// the release contains.
pub fn select_asset(release: &Release, os: OS) -> Result<Option<&Asset>, SetupError> {
    let token = SupportedOs::from_os(os)?;
    debug!(
        "looking for an asset containing `{token}` among {}",
        release.assets.iter().map(|a| a.name.as_str()).join(", "),
    );

    let asset = release
        .assets
        .iter()
        .find(|a| a.name.contains(token.as_ref()));
    match asset {
        Some(a) => debug!("picked asset named {}", a.name),
        None => debug!("no asset name contains `{token}`"),
    }
    Ok(asset)
}
