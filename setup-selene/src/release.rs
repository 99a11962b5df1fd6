use crate::version::{self, VersionRange};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tempfile::TempDir;
use url::Url;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Release {
    pub tag_name: String,
    pub assets: Vec<Asset>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub url: Url,
}

#[derive(Debug)]
pub(crate) struct Download {
    // We need to keep the temp dir around so that it's not deleted before
    // we're done with it.
    pub(crate) _temp_dir: TempDir,
    pub(crate) archive_path: PathBuf,
}

/// Returns the cleaned version of the first release, which is the newest one when `releases` came
/// from the GitHub release listing.
#[must_use]
pub fn latest_release(releases: &[Release]) -> Option<Version> {
    releases.first().and_then(|r| version::clean(&r.tag_name))
}

/// Returns the first release whose tag satisfies `range`. Since releases are sorted newest first,
/// a range that matches several tags picks the newest of them.
#[must_use]
pub fn find_release<'a>(range: &VersionRange, releases: &'a [Release]) -> Option<&'a Release> {
    releases
        .iter()
        .find(|r| version::satisfies(&r.tag_name, range))
}
