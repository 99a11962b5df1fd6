use crate::{
    actions::PathRegistry,
    cache::ToolCache,
    download::Downloader,
    exec::Executor,
    github::ReleaseDirectory,
    installer::{Installation, Installer},
    runner::Runner,
    version::VersionRequest,
};
use anyhow::Result;
use log::info;
use platforms::Platform;

/// `Setup` installs selene and runs it. Use the [`SetupBuilder`](crate::SetupBuilder) struct to
/// create a new `Setup` instance.
#[derive(Debug)]
pub struct Setup {
    request: VersionRequest,
    platform: Platform,
    directory: Box<dyn ReleaseDirectory>,
    cache: Box<dyn ToolCache>,
    downloader: Box<dyn Downloader>,
    executor: Box<dyn Executor>,
    path_registry: Box<dyn PathRegistry>,
}

impl Setup {
    pub(crate) fn new(
        request: VersionRequest,
        platform: Platform,
        directory: Box<dyn ReleaseDirectory>,
        cache: Box<dyn ToolCache>,
        downloader: Box<dyn Downloader>,
        executor: Box<dyn Executor>,
        path_registry: Box<dyn PathRegistry>,
    ) -> Setup {
        Setup {
            request,
            platform,
            directory,
            cache,
            downloader,
            executor,
            path_registry,
        }
    }

    /// The version that was asked for, after classifying the caller's input.
    #[must_use]
    pub fn request(&self) -> &VersionRequest {
        &self.request
    }

    /// Makes sure a matching selene is in the tool cache and adds its directory to `PATH`. The
    /// release list is fetched at most once, and not at all when an explicitly requested version
    /// is already cached.
    ///
    /// # Errors
    ///
    /// There are a number of cases where an error can be returned:
    ///
    /// * Network errors on requests to GitHub, or hitting its API rate limits (try passing a
    ///   token).
    /// * No version was requested and the newest release's tag is not a version.
    /// * No release matches the requested version.
    /// * The current platform is not Linux, macOS, or Windows, or the release has no asset for it.
    /// * The downloaded asset cannot be unpacked, cached, or made executable.
    pub async fn install(&self) -> Result<Installation> {
        let installer = Installer::new(
            self.directory.as_ref(),
            self.cache.as_ref(),
            self.downloader.as_ref(),
            self.executor.as_ref(),
            self.path_registry.as_ref(),
            self.platform.target_os,
        );
        let installation = installer.install(&self.request).await?;
        info!(
            "Using {} {} from the {} at {}",
            crate::installer::TOOL_NAME,
            installation.version,
            installation.source,
            installation.dir.display(),
        );
        Ok(installation)
    }

    /// Runs the installed selene with `args`, which are interpreted by the shell.
    ///
    /// # Errors
    ///
    /// Returns an error if selene cannot be started or exits with a non-zero status.
    pub fn run(&self, args: &str) -> Result<()> {
        Runner::new(self.executor.as_ref()).run(args)
    }

    /// Calls [`Setup::install`] and then [`Setup::run`].
    ///
    /// # Errors
    ///
    /// Returns any error from either step.
    pub async fn install_and_run(&self, args: &str) -> Result<Installation> {
        let installation = self.install().await?;
        self.run(args)?;
        Ok(installation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        installer::InstallSource,
        release::tests::release,
        test::{FakeCache, FakeDirectory, FakeDownloader, FakeExecutor, FakePathRegistry},
    };
    use semver::Version;
    use test_log::test;

    #[test(tokio::test)]
    async fn install_and_run_with_fakes() -> Result<()> {
        let setup = Setup::new(
            VersionRequest::parse(Some("v0.20.0")),
            Platform::find("x86_64-pc-windows-msvc").unwrap().clone(),
            Box::new(FakeDirectory::new(vec![release(
                "0.20.0",
                &["selene-0.20.0-linux.zip", "selene-0.20.0-windows.zip"],
            )])),
            Box::new(FakeCache::default()),
            Box::new(FakeDownloader::default()),
            Box::new(FakeExecutor::default()),
            Box::new(FakePathRegistry::default()),
        );

        let installation = setup.install_and_run("--version").await?;
        assert_eq!(installation.version, Version::new(0, 20, 0));
        assert_eq!(installation.source, InstallSource::Download);

        Ok(())
    }
}
