use crate::error::SetupError;
use itertools::Itertools;
use std::path::Path;
use strum::{EnumIter, IntoEnumIterator};

/// The archive formats a release asset can be unpacked from.
#[derive(Clone, Copy, Debug, EnumIter, PartialEq, Eq)]
pub(crate) enum Extension {
    Tar,
    TarGz,
    Tgz,
    Zip,
}

impl Extension {
    pub(crate) fn extension(self) -> &'static str {
        match self {
            Extension::Tar => ".tar",
            Extension::TarGz => ".tar.gz",
            Extension::Tgz => ".tgz",
            Extension::Zip => ".zip",
        }
    }

    pub(crate) fn is_gzipped(self) -> bool {
        match self {
            Extension::TarGz | Extension::Tgz => true,
            Extension::Tar | Extension::Zip => false,
        }
    }

    pub(crate) fn from_path(path: &Path) -> Result<Extension, SetupError> {
        let path_str = path.to_string_lossy();

        // We need to try the longest extensions first so that ".tar.gz" matches before ".gz".
        // This is intentionally using a string comparison instead of looking at
        // path.extension(), which returns `"gz"` for "foo.tar.gz".
        Extension::iter()
            .sorted_by(|a, b| Ord::cmp(&a.extension().len(), &b.extension().len()))
            .rev()
            .find(|e| path_str.ends_with(e.extension()))
            .ok_or_else(|| SetupError::UnknownArchive {
                path: path.to_path_buf(),
            })
    }
}
