use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use url::Url;

use crate::config::GitLabConfig;
use crate::error::Result;
use crate::output::PhaseProgress;
use crate::report::{BatchReport, FailureReport, ProjectReport};
use crate::tokens::TokenBuffer;

use super::client::GitLabClient;
use super::extract::{extract_pipelines, extract_project};
use super::orchestrator::{Completion, Orchestrator};
use super::store::{Handle, ProjectStore};
use super::transport::{HttpTransport, Transport};
use super::types::Project;

/// One issue-until-drained pass over every project of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Metadata,
    Pipelines,
}

impl Phase {
    fn url(self, project: &Project) -> &Url {
        match self {
            Self::Metadata => &project.metadata_url,
            Self::Pipelines => &project.pipelines_url,
        }
    }

    fn extract(self, project: &mut Project, tokens: &mut TokenBuffer) -> Result<()> {
        match self {
            Self::Metadata => extract_project(project, tokens),
            Self::Pipelines => {
                let count = extract_pipelines(project, tokens)?;
                debug!("Parsed {count} pipelines for project {}", project.id());
                Ok(())
            }
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => f.write_str("metadata"),
            Self::Pipelines => f.write_str("pipelines"),
        }
    }
}

/// Everything one batch mutates: the projects and the shared token buffer.
pub struct Batch {
    pub store: ProjectStore,
    pub tokens: TokenBuffer,
}

impl Batch {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            store: ProjectStore::new(),
            tokens: TokenBuffer::with_capacity(max_tokens),
        }
    }
}

/// Fetches project metadata and pipeline lists for a batch of project ids.
pub struct GitLabFetcher<T: Transport = HttpTransport> {
    client: GitLabClient,
    orchestrator: Orchestrator<T>,
}

impl GitLabFetcher<HttpTransport> {
    /// Creates a fetcher that talks HTTP to the configured GitLab instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the base URL is
    /// invalid.
    pub fn new(config: &GitLabConfig) -> Result<Self> {
        let client = GitLabClient::new(config)?;
        let transport = HttpTransport::new(client.client().clone(), config.max_connections);
        Ok(Self::from_parts(client, transport, config))
    }
}

impl<T: Transport> GitLabFetcher<T> {
    pub fn from_parts(client: GitLabClient, transport: T, config: &GitLabConfig) -> Self {
        Self {
            client,
            orchestrator: Orchestrator::new(
                transport,
                Duration::from_millis(config.poll_interval_ms),
            ),
        }
    }

    /// Fetches every project's metadata, then every project's pipeline list.
    ///
    /// `batch` is reset first, so handles from an earlier run stop resolving.
    /// Per-project failures (transfer errors, HTTP errors, malformed JSON) are
    /// logged and collected in the report; they never stop the batch.
    ///
    /// # Errors
    ///
    /// Returns an error only if a project URL cannot be built.
    pub async fn fetch(&self, batch: &mut Batch, project_ids: &[i64]) -> Result<BatchReport> {
        batch.store.reset();
        for &id in project_ids {
            let metadata_url = self.client.project_url(id)?;
            let pipelines_url = self.client.pipelines_url(id)?;
            batch.store.create(id, metadata_url, pipelines_url)?;
        }
        if batch.store.is_empty() {
            warn!("No project ids to fetch");
        }
        debug!(
            "Accepting up to {} JSON tokens per response",
            batch.tokens.capacity()
        );

        let mut failures = Vec::new();

        let progress = PhaseProgress::start_phase_1(batch.store.len());
        let parsed = self
            .run_phase(batch, Phase::Metadata, &mut failures)
            .await;

        let progress = progress.finish_phase_1_start_phase_2(parsed.len());
        let listed = self
            .run_phase(batch, Phase::Pipelines, &mut failures)
            .await;

        // A project whose metadata failed still reports the pipelines it listed.
        let projects: Vec<ProjectReport> = parsed
            .union(&listed)
            .filter_map(|handle| {
                let project = batch.store.get(*handle)?;
                Some(ProjectReport::new(project, parsed.contains(handle)))
            })
            .collect();

        if !failures.is_empty() {
            warn!(
                "{} of {} requests did not produce data",
                failures.len(),
                batch.store.len() * 2
            );
        }

        let report = BatchReport {
            api_url: self.client.api_url().to_string(),
            collected_at: Utc::now(),
            total_projects: batch.store.len(),
            projects,
            failures,
        };
        progress.finish_phase_2(listed.len(), report.total_pipelines());
        Ok(report)
    }

    /// Runs one phase and returns the handles whose responses were extracted.
    async fn run_phase(
        &self,
        batch: &mut Batch,
        phase: Phase,
        failures: &mut Vec<FailureReport>,
    ) -> BTreeSet<Handle> {
        let handles: Vec<Handle> = batch.store.handles().collect();
        let targets: Vec<(Handle, Url)> = handles
            .into_iter()
            .filter_map(|handle| {
                let project = batch.store.get_mut(handle)?;
                // Leftover bytes from the previous phase would corrupt tokenization.
                project.buffer.clear();
                Some((handle, phase.url(project).clone()))
            })
            .collect();

        info!("Phase {phase}: issuing {} requests", targets.len());
        let mut completions = self.orchestrator.run_batch(&mut batch.store, targets).await;
        completions.sort_by_key(|c| c.handle);

        let mut extracted = BTreeSet::new();
        for Completion { handle, result } in completions {
            let Some(project) = batch.store.get_mut(handle) else {
                continue;
            };

            if let Err(err) = result {
                failures.push(FailureReport::new(project.id(), phase, &err));
                continue;
            }

            match phase.extract(project, &mut batch.tokens) {
                Ok(()) => {
                    extracted.insert(handle);
                }
                Err(err) => {
                    error!("{err}");
                    failures.push(FailureReport::new(project.id(), phase, &err));
                }
            }
        }

        info!(
            "Phase {phase}: extracted {} of {} responses",
            extracted.len(),
            batch.store.len()
        );
        extracted
    }
}
