use crate::{
    extension::Extension,
    release::{Asset, Download},
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use binstall_tar::Archive;
use flate2::read::GzDecoder;
use log::{debug, info};
use reqwest::{
    header::{HeaderValue, ACCEPT},
    Client, StatusCode,
};
use std::{
    fmt::Debug,
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use zip::ZipArchive;

#[cfg(target_family = "unix")]
use std::os::unix::fs::PermissionsExt;

/// Fetches release assets and unpacks them.
#[async_trait]
pub(crate) trait Downloader: Debug + Send + Sync {
    /// Downloads the asset into a temporary directory which lives as long as the returned
    /// [`Download`].
    async fn download(&self, asset: &Asset) -> Result<Download>;

    /// Unpacks a downloaded archive into a new directory and returns that directory. The
    /// directory is not removed when this process exits.
    fn extract(&self, download: &Download) -> Result<PathBuf>;
}

#[derive(Debug)]
pub(crate) struct HttpDownloader {
    client: Client,
    temp_root: Option<PathBuf>,
}

impl HttpDownloader {
    /// Archives are extracted under `temp_root`, or under the system temp directory if this is
    /// `None`.
    pub(crate) fn new(client: Client, temp_root: Option<PathBuf>) -> Self {
        HttpDownloader { client, temp_root }
    }

    fn temp_dir(&self, prefix: &str) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        match &self.temp_root {
            Some(root) => {
                fs::create_dir_all(root)
                    .with_context(|| format!("failed to create {}", root.display()))?;
                Ok(builder.tempdir_in(root)?)
            }
            None => Ok(builder.tempdir()?),
        }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, asset: &Asset) -> Result<Download> {
        debug!("downloading asset from {}", asset.url);

        let req = self
            .client
            .get(asset.url.clone())
            .header(
                ACCEPT,
                HeaderValue::from_str("application/octet-stream")
                    .context("failed to create header value for Accept header")?,
            )
            .build()
            .with_context(|| format!("failed to build HTTP request for {}", asset.url))?;

        let mut resp = self.client.execute(req).await.with_context(|| {
            format!(
                "failed to execute HTTP request to download asset from {}",
                asset.url
            )
        })?;
        if resp.status() != StatusCode::OK {
            let mut msg = format!("error requesting {}: {}", asset.url, resp.status());
            if let Ok(t) = resp.text().await {
                msg.push('\n');
                msg.push_str(&t);
            }
            return Err(anyhow!(msg));
        }

        let td = self
            .temp_dir("selene-download-")
            .context("failed to create temporary directory for download")?;
        let mut archive_path = td.path().to_path_buf();
        archive_path.push(&asset.name);
        debug!("archive path is {}", archive_path.display());

        {
            let mut downloaded_file = File::create(&archive_path).with_context(|| {
                format!(
                    "failed to create file at {} for downloaded asset",
                    archive_path.display()
                )
            })?;
            while let Some(c) = resp.chunk().await.with_context(|| {
                format!(
                    "failed to read chunk while downloading asset from {}",
                    asset.url
                )
            })? {
                downloaded_file.write_all(c.as_ref()).with_context(|| {
                    format!("failed to write chunk to {}", archive_path.display())
                })?;
            }
        }

        Ok(Download {
            _temp_dir: td,
            archive_path,
        })
    }

    fn extract(&self, download: &Download) -> Result<PathBuf> {
        let ext = Extension::from_path(&download.archive_path)?;
        let dest = self
            .temp_dir("selene-")
            .context("failed to create a directory to extract the download into")?
            .keep();
        match ext {
            Extension::Zip => extract_zip(&download.archive_path, &dest)?,
            Extension::Tar | Extension::TarGz | Extension::Tgz => {
                extract_tarball(&download.archive_path, &dest, ext)?;
            }
        }
        info!(
            "Extracted {} into {}",
            download.archive_path.display(),
            dest.display()
        );
        Ok(dest)
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    debug!("extracting zip file {}", archive_path.display());

    let mut zip = ZipArchive::new(open_file(archive_path)?)
        .with_context(|| format!("{} is not a valid zip file", archive_path.display()))?;
    for i in 0..zip.len() {
        let mut zf = zip.by_index(i)?;
        let Some(rel) = zf.enclosed_name() else {
            return Err(anyhow!(
                "the zip file entry named {} would be written outside of {}",
                zf.name(),
                dest.display(),
            ));
        };
        let target = dest.join(rel);
        if zf.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        debug!("extracting zip entry to {}", target.display());
        let mut file = File::create(&target)
            .with_context(|| format!("Cannot write to {}", target.display()))?;
        io::copy(&mut zf, &mut file)?;

        #[cfg(target_family = "unix")]
        if let Some(mode) = zf.unix_mode() {
            fs::set_permissions(&target, fs::Permissions::from_mode(file_mode(mode)))?;
        }
    }

    Ok(())
}

// Keeps only the permission bits of an archived mode.
#[cfg(target_family = "unix")]
fn file_mode(mode: u32) -> u32 {
    mode & 0o777
}

fn extract_tarball(archive_path: &Path, dest: &Path, ext: Extension) -> Result<()> {
    debug!("extracting tarball {}", archive_path.display());

    let file = open_file(archive_path)?;
    let reader: Box<dyn Read> = if ext.is_gzipped() {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    // Entries with absolute paths or `..` components are skipped by `unpack`.
    Archive::new(reader)
        .unpack(dest)
        .with_context(|| format!("failed to unpack {}", archive_path.display()))
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open file at {}", path.display()))
}
