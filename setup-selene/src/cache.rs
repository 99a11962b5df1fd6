use crate::version::{self, VersionRange};
use anyhow::{Context, Result};
use log::debug;
use platforms::Arch;
use semver::Version;
use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Stores unpacked tool directories across runs, keyed by tool name and version.
pub(crate) trait ToolCache: Debug {
    /// Returns the directory for a completely stored entry, if there is one.
    fn find(&self, tool: &str, version: &Version) -> Option<PathBuf>;

    /// Returns the highest cached version that `range` accepts, along with its directory.
    fn find_matching(&self, tool: &str, range: &VersionRange) -> Option<(Version, PathBuf)>;

    /// Copies `source` into the cache and returns the new entry's directory. An existing entry
    /// for the same key is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or the cache cannot be written.
    fn store(&self, source: &Path, tool: &str, version: &Version) -> Result<PathBuf>;
}

/// A [`ToolCache`] laid out like the GitHub Actions runner tool cache:
/// `<root>/<tool>/<version>/<arch>/`, with an `<arch>.complete` marker file next to the entry
/// once it has been fully written.
#[derive(Debug)]
pub(crate) struct DirCache {
    root: PathBuf,
    arch: String,
}

impl DirCache {
    #[must_use]
    pub(crate) fn new(root: PathBuf, arch: Arch) -> Self {
        DirCache {
            root,
            arch: cache_arch(arch).to_string(),
        }
    }

    fn entry_dir(&self, tool: &str, version: &Version) -> PathBuf {
        let mut dir = self.version_dir(tool, version);
        dir.push(&self.arch);
        dir
    }

    fn marker_path(&self, tool: &str, version: &Version) -> PathBuf {
        let mut path = self.version_dir(tool, version);
        path.push(format!("{}.complete", self.arch));
        path
    }

    fn version_dir(&self, tool: &str, version: &Version) -> PathBuf {
        let mut dir = self.root.clone();
        dir.push(tool);
        dir.push(version.to_string());
        dir
    }
}

// The runner tool cache names architectures the way Node's `os.arch()` does.
#[allow(clippy::wildcard_enum_match_arm)]
fn cache_arch(arch: Arch) -> &'static str {
    match arch {
        Arch::X86_64 => "x64",
        Arch::AArch64 => "arm64",
        Arch::X86 => "ia32",
        Arch::Arm => "arm",
        other => other.as_str(),
    }
}

impl ToolCache for DirCache {
    fn find(&self, tool: &str, version: &Version) -> Option<PathBuf> {
        let dir = self.entry_dir(tool, version);
        if dir.is_dir() && self.marker_path(tool, version).is_file() {
            debug!("found cached {tool} {version} at {}", dir.display());
            Some(dir)
        } else {
            debug!("{tool} {version} is not in the cache at {}", self.root.display());
            None
        }
    }

    fn find_matching(&self, tool: &str, range: &VersionRange) -> Option<(Version, PathBuf)> {
        let mut tool_dir = self.root.clone();
        tool_dir.push(tool);
        let Ok(entries) = fs::read_dir(&tool_dir) else {
            debug!("nothing is cached for {tool} in {}", tool_dir.display());
            return None;
        };

        entries
            .filter_map(std::result::Result::ok)
            .filter_map(|e| version::clean(&e.file_name().to_string_lossy()))
            .filter(|v| range.matches(v))
            .filter_map(|v| self.find(tool, &v).map(|dir| (v, dir)))
            .max_by(|(a, _), (b, _)| a.cmp(b))
    }

    fn store(&self, source: &Path, tool: &str, version: &Version) -> Result<PathBuf> {
        let dest = self.entry_dir(tool, version);
        let marker = self.marker_path(tool, version);
        debug!(
            "caching {} as {tool} {version} in {}",
            source.display(),
            dest.display(),
        );

        if marker.exists() {
            fs::remove_file(&marker)
                .with_context(|| format!("failed to remove {}", marker.display()))?;
        }
        if dest.exists() {
            fs::remove_dir_all(&dest)
                .with_context(|| format!("failed to remove stale cache entry {}", dest.display()))?;
        }

        copy_tree(source, &dest)?;
        fs::write(&marker, "")
            .with_context(|| format!("failed to write cache marker {}", marker.display()))?;

        Ok(dest)
    }
}

fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.with_context(|| format!("failed to walk {}", source.display()))?;
        let rel = entry.path().strip_prefix(source)?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else {
            // `fs::copy` carries the permission bits over, so an executable stays executable.
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}
