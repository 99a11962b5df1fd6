use crate::{
    actions::PathRegistry,
    cache::ToolCache,
    download::Downloader,
    error::SetupError,
    exec::{shell_quote, Executor},
    github::ReleaseDirectory,
    picker::{select_asset, SupportedOs},
    release::{find_release, latest_release, Release},
    version::{self, VersionRange, VersionRequest},
};
use anyhow::Result;
use log::{debug, info};
use platforms::OS;
use semver::Version;
use std::{fmt, path::Path, path::PathBuf};

/// The name selene is cached under, and the name of its executable.
pub const TOOL_NAME: &str = "selene";

/// Where an installed selene came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum InstallSource {
    #[strum(serialize = "cache")]
    Cache,
    #[strum(serialize = "download")]
    Download,
}

/// The result of a successful install. `dir` is the directory that was added to `PATH`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Installation {
    pub version: Version,
    pub dir: PathBuf,
    pub source: InstallSource,
}

/// Makes sure a selene matching the request is in the tool cache and on `PATH`.
#[derive(Debug)]
pub(crate) struct Installer<'a> {
    directory: &'a dyn ReleaseDirectory,
    cache: &'a dyn ToolCache,
    downloader: &'a dyn Downloader,
    executor: &'a dyn Executor,
    path_registry: &'a dyn PathRegistry,
    os: OS,
}

// The version we are looking for once the request has been resolved as far as it can be without
// a cache lookup.
#[derive(Debug)]
enum Wanted {
    Version(Version),
    Range(VersionRange),
}

impl Wanted {
    fn range(&self) -> VersionRange {
        match self {
            Wanted::Version(v) => VersionRange::exact(v),
            Wanted::Range(r) => r.clone(),
        }
    }
}

impl fmt::Display for Wanted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wanted::Version(v) => write!(f, "{v}"),
            Wanted::Range(r) => write!(f, "{r}"),
        }
    }
}

// Fetches the release list the first time it is needed and reuses it after that.
#[derive(Debug)]
struct LazyReleases<'a> {
    directory: &'a dyn ReleaseDirectory,
    releases: Option<Vec<Release>>,
}

impl<'a> LazyReleases<'a> {
    fn new(directory: &'a dyn ReleaseDirectory) -> Self {
        LazyReleases {
            directory,
            releases: None,
        }
    }

    async fn get(&mut self) -> Result<&[Release]> {
        let releases = match self.releases.take() {
            Some(r) => r,
            None => self.directory.list_releases().await?,
        };
        let releases: &[Release] = self.releases.insert(releases);
        Ok(releases)
    }
}

impl<'a> Installer<'a> {
    pub(crate) fn new(
        directory: &'a dyn ReleaseDirectory,
        cache: &'a dyn ToolCache,
        downloader: &'a dyn Downloader,
        executor: &'a dyn Executor,
        path_registry: &'a dyn PathRegistry,
        os: OS,
    ) -> Self {
        Installer {
            directory,
            cache,
            downloader,
            executor,
            path_registry,
            os,
        }
    }

    pub(crate) async fn install(&self, request: &VersionRequest) -> Result<Installation> {
        let mut releases = LazyReleases::new(self.directory);

        let wanted = match request {
            VersionRequest::Latest => {
                debug!("Looking up the latest release ...");
                let latest =
                    latest_release(releases.get().await?).ok_or(SetupError::NoLatestRelease)?;
                Wanted::Version(latest)
            }
            VersionRequest::Exact(v) => Wanted::Version(v.clone()),
            VersionRequest::Range(r) => Wanted::Range(r.clone()),
        };

        debug!("Looking for cached version of {TOOL_NAME} {wanted} ...");
        if let Some((version, dir)) = self.find_cached(&wanted) {
            debug!("Found cached version of {TOOL_NAME} at {}", dir.display());
            self.path_registry.add_path(&dir)?;
            return Ok(Installation {
                version,
                dir,
                source: InstallSource::Cache,
            });
        }

        debug!("No cached version found, downloading {TOOL_NAME} ...");
        let release = find_release(&wanted.range(), releases.get().await?).ok_or_else(|| {
            SetupError::NoRelease {
                version: wanted.to_string(),
            }
        })?;
        debug!("Chose release {}", release.tag_name);
        let version = match wanted {
            Wanted::Version(v) => v,
            // A release only matches a range if its tag cleans to a version.
            Wanted::Range(_) => {
                version::clean(&release.tag_name).ok_or_else(|| SetupError::NoRelease {
                    version: release.tag_name.clone(),
                })?
            }
        };

        let dir = self.download_and_cache(release, &version).await?;
        info!("Installed {TOOL_NAME} {version} into {}", dir.display());

        Ok(Installation {
            version,
            dir,
            source: InstallSource::Download,
        })
    }

    fn find_cached(&self, wanted: &Wanted) -> Option<(Version, PathBuf)> {
        match wanted {
            Wanted::Version(v) => self.cache.find(TOOL_NAME, v).map(|dir| (v.clone(), dir)),
            Wanted::Range(r) => self.cache.find_matching(TOOL_NAME, r),
        }
    }

    async fn download_and_cache(&self, release: &Release, version: &Version) -> Result<PathBuf> {
        let asset = select_asset(release, self.os)?.ok_or_else(|| SetupError::NoAsset {
            tag: release.tag_name.clone(),
            os: self.os,
        })?;
        debug!("Downloading asset {}", asset.url);

        let download = self.downloader.download(asset).await?;
        let extracted = self.downloader.extract(&download)?;

        if SupportedOs::from_os(self.os)?.is_unix() {
            self.make_executable(&extracted)?;
        }

        self.cache.store(&extracted, TOOL_NAME, version)?;
        self.path_registry.add_path(&extracted)?;

        Ok(extracted)
    }

    // Zip files do not always record the executable bit, so this is set explicitly. It happens
    // before the directory is cached so the cached copy is executable too.
    fn make_executable(&self, dir: &Path) -> Result<()> {
        let exe = dir.join(TOOL_NAME);
        self.executor
            .exec(&format!("chmod +x {}", shell_quote(&exe.to_string_lossy())))
    }
}
