//! Sync of a team's jobs from the CI API into topic directories

use dci_client::{CiApi, ClientError};
use dci_common::{component_relevance_name, AnalysisConfig, AnalysisError, Job, JobFileName};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::junit::{self, MissingDuration};
use crate::store::JobStore;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("CI API error: {0}")]
    Client(#[from] ClientError),

    #[error("Store error: {0}")]
    Store(#[from] AnalysisError),

    #[error("Topic {0} not found")]
    TopicNotFound(String),

    #[error("Job {job_id}: {reason}")]
    InvalidJob { job_id: String, reason: String },

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// What happened to one job during a sync
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// A new Job File was written
    Written { file_name: String, tags: Vec<String> },
    /// The Job File already existed; nothing was fetched
    AlreadySynced,
    /// Decoded test count below the completeness threshold
    Incomplete { tests: usize },
    /// The job carries no file named after the test
    NoMatchingFile,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job_id: String,
    pub outcome: JobOutcome,
}

/// Counts of job outcomes for one topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub topic: String,
    pub jobs: usize,
    pub relevant: usize,
    pub written: usize,
    pub already_synced: usize,
    pub incomplete: usize,
    pub no_matching_file: usize,
    pub failed: usize,
}

impl SyncReport {
    fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Written { .. } => self.written += 1,
            JobOutcome::AlreadySynced => self.already_synced += 1,
            JobOutcome::Incomplete { .. } => self.incomplete += 1,
            JobOutcome::NoMatchingFile => self.no_matching_file += 1,
            JobOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Keep the jobs from the first one whose components mention `name`
/// (case-insensitive) onward, in list order.
pub fn select_relevant_jobs(jobs: Vec<Job>, name: &str) -> Vec<Job> {
    let needle = name.to_lowercase();
    let mut relevant = false;
    jobs.into_iter()
        .filter(|job| {
            if !relevant {
                relevant = job
                    .components
                    .iter()
                    .any(|c| c.name.to_lowercase().contains(&needle));
            }
            relevant
        })
        .collect()
}

/// Drives job syncs against a [`CiApi`]
pub struct Syncer<C> {
    api: Arc<C>,
    config: AnalysisConfig,
}

impl<C: CiApi + 'static> Syncer<C> {
    pub fn new(api: Arc<C>, config: AnalysisConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Sync every relevant job of `topic` for `team`.
    ///
    /// Per-job failures are counted in the report, never returned.
    pub async fn sync_topic(&self, team: &str, topic: &str, test_name: &str) -> Result<SyncReport, SyncError> {
        let team_id = self.api.resolve_team(team).await?;
        info!("{} team id {}", team, team_id);
        let topic_id = match self.api.resolve_topic(topic).await {
            Ok(id) => id,
            Err(e) if e.is_not_found() => return Err(SyncError::TopicNotFound(topic.to_string())),
            Err(e) => return Err(e.into()),
        };
        info!("{} topic id {}", topic, topic_id);

        info!("getting jobs...");
        let jobs = self.api.list_jobs(&team_id, &topic_id).await?;
        let mut report = SyncReport {
            topic: topic.to_string(),
            jobs: jobs.len(),
            ..Default::default()
        };
        let jobs = select_relevant_jobs(jobs, component_relevance_name(topic));
        report.relevant = jobs.len();

        let store = Arc::new(JobStore::open(&self.config.working_dir, topic)?);
        info!("convert jobs {} tests to csv files...", test_name);
        let results = self.run_jobs(jobs, &store, test_name).await;

        let mut tags = BTreeMap::new();
        for result in &results {
            report.record(&result.outcome);
            if let JobOutcome::Written { file_name, tags: job_tags } = &result.outcome {
                tags.insert(file_name.clone(), job_tags.clone());
            }
        }
        if !tags.is_empty() {
            let store = Arc::clone(&store);
            let index = tokio::task::spawn_blocking(move || store.merge_tags(tags)).await??;
            debug!("tag index of {} holds {} files", topic, index.len());
        }

        info!(
            "topic {}: {} written, {} already synced, {} incomplete, {} failed",
            topic, report.written, report.already_synced, report.incomplete, report.failed
        );
        Ok(report)
    }

    /// One task per job, at most `sync.concurrency` in flight
    async fn run_jobs(&self, jobs: Vec<Job>, store: &Arc<JobStore>, test_name: &str) -> Vec<JobResult> {
        let min_tests = self.config.sync.min_tests;
        stream::iter(jobs)
            .map(|job| {
                let api = Arc::clone(&self.api);
                let store = Arc::clone(store);
                let test_name = test_name.to_string();
                async move {
                    let job_id = job.id.clone();
                    let outcome = match tokio::spawn(sync_job(api, store, job, test_name, min_tests)).await {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(e)) => {
                            error!("job {} failed: {}", job_id, e);
                            JobOutcome::Failed(e.to_string())
                        }
                        Err(e) => {
                            error!("job {} task aborted: {}", job_id, e);
                            JobOutcome::Failed(e.to_string())
                        }
                    };
                    JobResult { job_id, outcome }
                }
            })
            .buffer_unordered(self.config.sync.concurrency.max(1))
            .collect()
            .await
    }

    /// Sync every topic of `product` except the excluded ones.
    ///
    /// A failing topic is logged and reported; the others still run.
    pub async fn sync_product(
        &self,
        team: &str,
        product: &str,
        test_name: &str,
    ) -> Result<Vec<(String, Result<SyncReport, SyncError>)>, SyncError> {
        let product_id = self.api.resolve_product(product).await?;
        let topics = self.api.list_topics_of_product(&product_id).await?;

        let mut reports = Vec::new();
        for topic in topics {
            if self.config.is_excluded_topic(&topic.name) {
                debug!("skipping excluded topic {}", topic.name);
                continue;
            }
            info!("sync topic {}", topic.name);
            let result = self.sync_topic(team, &topic.name, test_name).await;
            if let Err(e) = &result {
                error!("sync of topic {} failed: {}", topic.name, e);
            }
            reports.push((topic.name, result));
        }
        Ok(reports)
    }
}

async fn sync_job<C: CiApi + ?Sized>(
    api: Arc<C>,
    store: Arc<JobStore>,
    job: Job,
    test_name: String,
    min_tests: usize,
) -> Result<JobOutcome, SyncError> {
    let date = job.creation_date().ok_or_else(|| SyncError::InvalidJob {
        job_id: job.id.clone(),
        reason: format!("unparsable created_at '{}'", job.created_at),
    })?;
    let name = JobFileName::new(date, job.id.as_str(), test_name.as_str());
    if store.contains(&name) {
        debug!("{} test of job {} already exist", test_name, job.id);
        return Ok(JobOutcome::AlreadySynced);
    }

    let files = api.list_files_of_job(&job.id).await?;
    let mut outcome = JobOutcome::NoMatchingFile;
    for file in files.iter().filter(|f| f.name == test_name) {
        info!("convert junit job {} to csv", job.id);
        let content = api.fetch_file_content(&file.id).await?;
        let durations = junit::decode(&content, MissingDuration::Empty);
        if durations.len() < min_tests {
            warn!(
                "job {}: {} tests decoded, below {}; not stored",
                job.id,
                durations.len(),
                min_tests
            );
            outcome = JobOutcome::Incomplete { tests: durations.len() };
            continue;
        }
        let path = {
            let (store, name) = (Arc::clone(&store), name.clone());
            tokio::task::spawn_blocking(move || store.write_job_file(&name, &durations)).await??
        };
        debug!("job {} written to {}", job.id, path.display());
        return Ok(JobOutcome::Written {
            file_name: name.file_name(),
            tags: job.tags.clone(),
        });
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dci_client::ClientResult;
    use dci_common::{Component, RemoteFile, Topic};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(id: &str, components: &[&str]) -> Job {
        Job {
            id: id.to_string(),
            created_at: "2020-03-0".to_string() + &id[id.len() - 1..] + "T10:00:00.000",
            components: components
                .iter()
                .map(|name| Component {
                    id: None,
                    name: name.to_string(),
                })
                .collect(),
            tags: vec!["x86_64".to_string()],
            files: Vec::new(),
        }
    }

    fn junit(tests: usize) -> String {
        let cases: String = (0..tests)
            .map(|i| format!(r#"<testcase classname="c" name="t{i}" time="1.5"/>"#))
            .collect();
        format!("<testsuites><testsuite>{cases}</testsuite></testsuites>")
    }

    struct FakeApi {
        jobs: Vec<Job>,
        contents: HashMap<String, String>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl CiApi for FakeApi {
        async fn resolve_team(&self, _name: &str) -> ClientResult<String> {
            Ok("team-1".to_string())
        }

        async fn resolve_topic(&self, name: &str) -> ClientResult<String> {
            if name == "RHEL-8.2" {
                Ok("topic-1".to_string())
            } else {
                Err(ClientError::NotFound {
                    kind: "topic",
                    name: name.to_string(),
                })
            }
        }

        async fn resolve_product(&self, _name: &str) -> ClientResult<String> {
            Ok("product-1".to_string())
        }

        async fn list_jobs(&self, _team_id: &str, _topic_id: &str) -> ClientResult<Vec<Job>> {
            Ok(self.jobs.clone())
        }

        async fn list_topics_of_product(&self, _product_id: &str) -> ClientResult<Vec<Topic>> {
            Ok(vec![
                Topic { id: "topic-1".to_string(), name: "RHEL-8.2".to_string() },
                Topic { id: "topic-0".to_string(), name: "RHEL-8-nightly".to_string() },
            ])
        }

        async fn list_files_of_job(&self, job_id: &str) -> ClientResult<Vec<RemoteFile>> {
            Ok(vec![RemoteFile {
                id: format!("file-{job_id}"),
                name: "perf".to_string(),
            }])
        }

        async fn fetch_file_content(&self, file_id: &str) -> ClientResult<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.contents
                .get(file_id)
                .cloned()
                .ok_or_else(|| ClientError::NoData(file_id.to_string()))
        }
    }

    fn syncer(dir: &std::path::Path, jobs: Vec<Job>, contents: &[(&str, String)]) -> Syncer<FakeApi> {
        let api = FakeApi {
            jobs,
            contents: contents.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            fetches: AtomicUsize::new(0),
        };
        let mut config = AnalysisConfig::default();
        config.working_dir = dir.to_path_buf();
        config.sync.min_tests = 3;
        config.sync.concurrency = 2;
        Syncer::new(Arc::new(api), config)
    }

    #[test]
    fn test_relevance_sticks_across_jobs() {
        let jobs = vec![
            job("j1", &["OpenStack-16"]),
            job("j2", &["openstack", "rhel-8.2.0-20200301.n.0"]),
            job("j3", &["OpenStack-16"]),
            job("j4", &[]),
        ];
        let kept: Vec<String> = select_relevant_jobs(jobs, "RHEL-8.2").into_iter().map(|j| j.id).collect();
        assert_eq!(kept, vec!["j2", "j3", "j4"]);
    }

    #[tokio::test]
    async fn test_sync_topic_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![
            job("j1", &["RHEL-8.2.0"]),
            job("j2", &["RHEL-8.2.0"]),
            job("j3", &["RHEL-8.2.0"]),
        ];
        let syncer = syncer(
            dir.path(),
            jobs,
            &[("file-j1", junit(4)), ("file-j2", junit(2))],
        );

        let report = syncer.sync_topic("qa", "RHEL-8.2", "perf").await.unwrap();
        assert_eq!(report.relevant, 3);
        assert_eq!(report.written, 1);
        assert_eq!(report.incomplete, 1);
        assert_eq!(report.failed, 1);

        let store = JobStore::open(dir.path(), "RHEL-8.2").unwrap();
        let index = store.load_tag_index().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.tags_of("2020-03-01_j1_perf.csv"),
            Some(&["x86_64".to_string()][..])
        );

        let again = syncer.sync_topic("qa", "RHEL-8.2", "perf").await.unwrap();
        assert_eq!(again.already_synced, 1);
        assert_eq!(again.written, 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_writes_complete_on_single_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let jobs: Vec<Job> = (1..=4).map(|i| job(&format!("j{i}"), &["RHEL-8.2.0"])).collect();
        let contents: Vec<(String, String)> = (1..=4).map(|i| (format!("file-j{i}"), junit(3))).collect();
        let contents: Vec<(&str, String)> = contents.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let syncer = syncer(dir.path(), jobs, &contents);

        let report = syncer.sync_topic("qa", "RHEL-8.2", "perf").await.unwrap();
        assert_eq!(report.written, 4);

        let store = JobStore::open(dir.path(), "RHEL-8.2").unwrap();
        assert_eq!(store.load_tag_index().unwrap().len(), 4);
        let table = crate::store::read_job_file(&dir.path().join("RHEL-8.2/2020-03-04_j4_perf.csv")).unwrap();
        assert_eq!(table.job_id, "j4");
    }

    #[tokio::test]
    async fn test_unknown_topic_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let syncer = syncer(dir.path(), Vec::new(), &[]);
        let err = syncer.sync_topic("qa", "RHEL-9.9", "perf").await.unwrap_err();
        assert!(matches!(err, SyncError::TopicNotFound(t) if t == "RHEL-9.9"));
    }

    #[tokio::test]
    async fn test_sync_product_skips_excluded_topics() {
        let dir = tempfile::tempdir().unwrap();
        let syncer = syncer(dir.path(), vec![job("j1", &["RHEL-8.2.0"])], &[("file-j1", junit(5))]);
        let reports = syncer.sync_product("qa", "RHEL", "perf").await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "RHEL-8.2");
        assert_eq!(reports[0].1.as_ref().unwrap().written, 1);
        assert!(!dir.path().join("RHEL-8-nightly").exists());
    }
}
