mod client;
mod extract;
mod fetcher;
mod orchestrator;
mod store;
mod transport;
mod types;

pub use fetcher::{Batch, GitLabFetcher, Phase};
pub use types::{Pipeline, Project};
