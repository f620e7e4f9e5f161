use serde::Serialize;
use url::Url;

/// A GitLab project tracked for the duration of one batch.
///
/// The id is assigned by the caller and never changes; everything else is
/// filled in from API responses.
#[derive(Debug)]
pub struct Project {
    id: i64,
    /// Display name, empty until the metadata response is parsed
    pub name: String,
    /// Full path (e.g., "group/project"), empty until parsed
    pub path_with_namespace: String,
    /// `{base}/api/v4/projects/{id}`
    pub metadata_url: Url,
    /// `{base}/api/v4/projects/{id}/pipelines`
    pub pipelines_url: Url,
    /// Raw bytes of the response currently being received
    pub buffer: Vec<u8>,
    /// Pipelines in the order the API listed them
    pub pipelines: Vec<Pipeline>,
}

impl Project {
    pub fn new(id: i64, metadata_url: Url, pipelines_url: Url) -> Self {
        Self {
            id,
            name: String::new(),
            path_with_namespace: String::new(),
            metadata_url,
            pipelines_url,
            buffer: Vec::new(),
            pipelines: Vec::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

/// A CI/CD pipeline as listed by `GET /projects/{id}/pipelines`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    pub id: i64,
    /// Git reference that triggered the pipeline (e.g., "main")
    #[serde(rename = "ref")]
    pub ref_: String,
    pub web_url: String,
    pub created_at: String,
    pub updated_at: String,
    /// Pipeline status as reported by GitLab (e.g., "success", "failed")
    pub status: String,
}
