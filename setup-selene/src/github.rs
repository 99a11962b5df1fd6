use crate::{release::Release, version};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{
    header::{HeaderValue, ACCEPT, AUTHORIZATION},
    Client, RequestBuilder,
};
use std::{env, fmt::Debug, sync::LazyLock};
use url::Url;

/// The project whose releases are installed. This is not configurable.
pub const PROJECT_NAME: &str = "Kampfkarren/selene";

pub(crate) static DEFAULT_API_BASE_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse("https://api.github.com").unwrap());

// The maximum page size the releases API allows.
const PER_PAGE: usize = 100;

/// A source of releases for the selene project.
#[async_trait]
pub(crate) trait ReleaseDirectory: Debug + Send + Sync {
    /// Returns every release, sorted newest first by the semantic version of its tag. A project
    /// without releases is an empty list, not an error.
    async fn list_releases(&self) -> Result<Vec<Release>>;
}

#[derive(Debug)]
pub(crate) struct GitHub {
    api_base_url: Url,
    token: Option<String>,
    client: Client,
}

#[async_trait]
impl ReleaseDirectory for GitHub {
    async fn list_releases(&self) -> Result<Vec<Release>> {
        debug!("Fetching releases for project `{PROJECT_NAME}`");

        let mut releases = vec![];
        for page in 1.. {
            let batch = self.fetch_page(page).await?;
            let is_last_page = batch.len() < PER_PAGE;
            releases.extend(batch);
            if is_last_page {
                break;
            }
        }
        debug!("Found {} releases", releases.len());

        releases.sort_by(|a, b| version::rcompare(&a.tag_name, &b.tag_name));
        Ok(releases)
    }
}

impl GitHub {
    /// An empty token is the same as no token. If no token is given, the `GITHUB_TOKEN` env var
    /// is used when it is set.
    pub(crate) fn new(api_base_url: Option<Url>, token: Option<String>, client: Client) -> Self {
        let mut token = token.filter(|t| !t.is_empty());
        if token.is_none() {
            token = env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
            if token.is_some() {
                debug!("Using GitHub token from the GITHUB_TOKEN environment variable.");
            }
        }

        Self {
            api_base_url: api_base_url.unwrap_or_else(|| DEFAULT_API_BASE_URL.clone()),
            token,
            client,
        }
    }

    async fn fetch_page(&self, page: usize) -> Result<Vec<Release>> {
        let url = self.releases_url(page)?;
        debug!("Getting release list from `{url}`");

        let mut req_builder = self
            .client
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_str("application/vnd.github+json")?);
        req_builder = self.maybe_add_token_header(req_builder)?;
        let resp = self
            .client
            .execute(req_builder.build()?)
            .await
            .with_context(|| format!("failed to execute HTTP request to {url}"))?;

        if let Err(e) = resp.error_for_status_ref() {
            return Err(anyhow::Error::new(e));
        }

        let body = resp
            .text()
            .await
            .with_context(|| format!("failed to read the response body from {url}"))?;
        serde_json::from_str(&body)
            .with_context(|| format!("could not parse the release list returned by {url}"))
    }

    fn releases_url(&self, page: usize) -> Result<Url> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("the API base URL {} cannot be a base", self.api_base_url))?
            .pop_if_empty()
            .extend(["repos"])
            .extend(PROJECT_NAME.split('/'))
            .push("releases");
        url.query_pairs_mut()
            .append_pair("per_page", &PER_PAGE.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    fn maybe_add_token_header(&self, mut req_builder: RequestBuilder) -> Result<RequestBuilder> {
        if let Some(token) = self.token.as_deref() {
            debug!("Adding token to GitHub request.");
            let bearer = format!("Bearer {token}");
            let mut auth_val = HeaderValue::from_str(&bearer)?;
            auth_val.set_sensitive(true);
            req_builder = req_builder.header(AUTHORIZATION, auth_val);
        } else {
            debug!("No token given.");
        }
        Ok(req_builder)
    }
}
