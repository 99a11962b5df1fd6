/// The `builder` module contains the `SetupBuilder` struct which is used to create a `Setup`
/// instance.
use crate::{
    actions::ActionsPath,
    cache::DirCache,
    download::HttpDownloader,
    exec::ShellExecutor,
    github::GitHub,
    setup::Setup,
    version::VersionRequest,
};
use anyhow::{anyhow, Result};
use log::debug;
use platforms::{Platform, PlatformReq};
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client,
};
use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
};
use url::Url;

/// `SetupBuilder` is used to create a [`Setup`] instance.
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct SetupBuilder<'a> {
    version: Option<&'a str>,
    token: Option<&'a str>,
    api_base_url: Option<&'a str>,
    tool_cache_dir: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
    platform: Option<&'a Platform>,
}

impl<'a> SetupBuilder<'a> {
    /// Returns a new empty `SetupBuilder`.
    #[must_use]
    pub fn new() -> Self {
        SetupBuilder::default()
    }

    /// Set the version of selene to install. This can be an exact version like `0.20.0` or
    /// `v0.20.0`, or a range like `^0.20` or `>=0.19 <0.21`. If this is not set, or it is empty,
    /// the newest release is installed.
    #[must_use]
    pub fn version(mut self, version: &'a str) -> Self {
        self.version = Some(version);
        self
    }

    /// Set a token to use for GitHub API requests. An empty string is treated as no token. If this
    /// is not set, then the `GITHUB_TOKEN` env var is used if it is set.
    #[must_use]
    pub fn token(mut self, token: &'a str) -> Self {
        self.token = Some(token);
        self
    }

    /// Set the base URL for the GitHub API. This is useful for testing or for GitHub Enterprise
    /// Server. This should be something like `https://github.my-corp.example.com/api/v3`.
    #[must_use]
    pub fn api_base_url(mut self, api_base_url: &'a str) -> Self {
        self.api_base_url = Some(api_base_url);
        self
    }

    /// Set the root of the tool cache. On an Actions runner this is `RUNNER_TOOL_CACHE`. If not
    /// set, a `setup-selene` directory under the user's cache directory is used.
    #[must_use]
    pub fn tool_cache_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.tool_cache_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the directory that downloads and extractions are written to. On an Actions runner this
    /// is `RUNNER_TEMP`. If not set, the system temp directory is used.
    #[must_use]
    pub fn temp_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.temp_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the platform to install for. If not set it will be determined based on the platform
    /// this crate was compiled for.
    #[must_use]
    pub fn platform(mut self, platform: &'a Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    const TARGET: &'static str = env!("TARGET");

    /// Builds a new [`Setup`] instance and returns it.
    ///
    /// # Errors
    ///
    /// This returns an error if the API base URL cannot be parsed, the current platform cannot be
    /// determined, or the HTTP client cannot be created.
    pub fn build(self) -> Result<Setup> {
        let platform = self.determine_platform()?;
        let api_base_url = self.api_base_url.map(Url::parse).transpose()?;
        let tool_cache_dir = self.tool_cache_dir.clone().unwrap_or_else(default_tool_cache_dir);
        debug!("tool cache = {}", tool_cache_dir.display());

        let client = reqwest_client()?;
        Ok(Setup::new(
            VersionRequest::parse(self.version),
            platform.clone(),
            Box::new(GitHub::new(
                api_base_url,
                self.token.map(String::from),
                client.clone(),
            )),
            Box::new(DirCache::new(tool_cache_dir, platform.target_arch)),
            Box::new(HttpDownloader::new(client, self.temp_dir)),
            Box::new(ShellExecutor::new()),
            Box::new(ActionsPath::new()),
        ))
    }

    fn determine_platform(&self) -> Result<Platform> {
        if let Some(p) = self.platform {
            Ok(p.clone())
        } else {
            let req = PlatformReq::from_str(Self::TARGET)?;
            Platform::ALL
                .iter()
                .find(|p| req.matches(p))
                .cloned()
                .ok_or(anyhow!(
                    "Could not find any platform matching {}",
                    Self::TARGET
                ))
        }
    }
}

fn default_tool_cache_dir() -> PathBuf {
    let mut dir = dirs::cache_dir().unwrap_or_else(env::temp_dir);
    dir.push("setup-selene");
    dir
}

fn reqwest_client() -> Result<Client> {
    let builder = Client::builder().gzip(true);

    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("setup-selene version {}", super::VERSION))?,
    );
    Ok(builder.default_headers(headers).build()?)
}
