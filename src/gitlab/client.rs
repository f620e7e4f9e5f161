use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::config::GitLabConfig;
use crate::error::{GlFetchError, Result};

/// Shared HTTP client plus the REST endpoints of one GitLab instance.
pub struct GitLabClient {
    client: Client,
    api_url: Url,
}

impl GitLabClient {
    pub fn new(config: &GitLabConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(concat!("glfetch/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(config.max_connections);
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let api_url = api_url(&config.base_url)?;

        Ok(Self { client, api_url })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// `{base}/api/v4/`
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// `{base}/api/v4/projects/{id}`
    pub fn project_url(&self, project_id: i64) -> Result<Url> {
        self.api_url
            .join(&format!("projects/{project_id}"))
            .map_err(|e| GlFetchError::Config(format!("Invalid project URL: {e}")))
    }

    /// `{base}/api/v4/projects/{id}/pipelines`
    pub fn pipelines_url(&self, project_id: i64) -> Result<Url> {
        self.api_url
            .join(&format!("projects/{project_id}/pipelines"))
            .map_err(|e| GlFetchError::Config(format!("Invalid pipelines URL: {e}")))
    }
}

fn api_url(base_url: &str) -> Result<Url> {
    let mut base =
        Url::parse(base_url).map_err(|e| GlFetchError::Config(format!("Invalid base URL: {e}")))?;

    // Keep any path prefix of self-hosted instances (https://host/gitlab).
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join("api/v4/")
        .map_err(|e| GlFetchError::Config(format!("Invalid API base URL: {e}")))
}
