use async_trait::async_trait;
use dci_common::{Job, RemoteFile, Topic};

use crate::error::ClientResult;

/// Read-only view of the CI control plane used by the sync orchestrator
#[async_trait]
pub trait CiApi: Send + Sync {
    /// Resolve a team name to its id
    async fn resolve_team(&self, name: &str) -> ClientResult<String>;

    /// Resolve a topic name to its id
    async fn resolve_topic(&self, name: &str) -> ClientResult<String>;

    /// Resolve a product name to its id
    async fn resolve_product(&self, name: &str) -> ClientResult<String>;

    /// Jobs of a team on a topic, with their components embedded
    async fn list_jobs(&self, team_id: &str, topic_id: &str) -> ClientResult<Vec<Job>>;

    async fn list_topics_of_product(&self, product_id: &str) -> ClientResult<Vec<Topic>>;

    async fn list_files_of_job(&self, job_id: &str) -> ClientResult<Vec<RemoteFile>>;

    /// Raw content of a file
    async fn fetch_file_content(&self, file_id: &str) -> ClientResult<String>;
}
