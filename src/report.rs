use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::GlFetchError;
use crate::gitlab::{Phase, Pipeline, Project};

#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub api_url: String,
    pub collected_at: DateTime<Utc>,
    pub total_projects: usize,
    pub projects: Vec<ProjectReport>,
    pub failures: Vec<FailureReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub id: i64,
    /// False when only the pipeline list could be read
    pub metadata_parsed: bool,
    pub name: String,
    pub path_with_namespace: String,
    pub pipelines: Vec<Pipeline>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub project_id: i64,
    pub phase: Phase,
    pub error: String,
}

impl BatchReport {
    pub fn total_pipelines(&self) -> usize {
        self.projects.iter().map(|p| p.pipelines.len()).sum()
    }
}

impl ProjectReport {
    pub fn new(project: &Project, metadata_parsed: bool) -> Self {
        Self {
            id: project.id(),
            metadata_parsed,
            name: project.name.clone(),
            path_with_namespace: project.path_with_namespace.clone(),
            pipelines: project.pipelines.clone(),
        }
    }
}

impl FailureReport {
    pub fn new(project_id: i64, phase: Phase, error: &GlFetchError) -> Self {
        Self {
            project_id,
            phase,
            error: error.to_string(),
        }
    }
}
