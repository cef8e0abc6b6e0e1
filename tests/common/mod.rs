//! In-process CI API and job file fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dci_analysis::prelude::*;
use dci_common::{Component, RemoteFile, Topic};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TEAM: &str = "perf-team";
pub const TEST_NAME: &str = "Tests results";

/// JUnit report with `tests` test cases of increasing duration
pub fn junit_report(tests: usize) -> String {
    let cases: String = (0..tests)
        .map(|i| {
            format!(
                r#"<testcase classname="bench.suite" name="case {i}, run" time="{}"/>"#,
                i as f64 * 0.5 + 1.0
            )
        })
        .collect();
    format!(r#"<?xml version="1.0"?><testsuites><testsuite name="s">{cases}</testsuite></testsuites>"#)
}

pub fn job(id: &str, created_at: &str, component: &str, tags: &[&str]) -> Job {
    Job {
        id: id.to_string(),
        created_at: created_at.to_string(),
        components: vec![Component {
            id: Some(format!("c-{id}")),
            name: component.to_string(),
        }],
        tags: tags.iter().map(|t| t.to_string()).collect(),
        files: Vec::new(),
    }
}

/// Serves fixed topics, jobs and file contents; counts content fetches
#[derive(Default)]
pub struct FakeCi {
    pub topics: HashMap<String, String>,
    pub jobs: HashMap<String, Vec<Job>>,
    pub contents: HashMap<String, String>,
    pub product_topics: Vec<Topic>,
    pub fetches: AtomicUsize,
}

impl FakeCi {
    pub fn with_topic(mut self, name: &str, jobs: Vec<Job>) -> Self {
        let id = format!("topic-{name}");
        self.product_topics.push(Topic {
            id: id.clone(),
            name: name.to_string(),
        });
        self.topics.insert(name.to_string(), id.clone());
        self.jobs.insert(id, jobs);
        self
    }

    pub fn with_content(mut self, job_id: &str, content: String) -> Self {
        self.contents.insert(format!("file-{job_id}"), content);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CiApi for FakeCi {
    async fn resolve_team(&self, name: &str) -> ClientResult<String> {
        if name == TEAM {
            Ok("team-1".to_string())
        } else {
            Err(ClientError::NotFound { kind: "team", name: name.to_string() })
        }
    }

    async fn resolve_topic(&self, name: &str) -> ClientResult<String> {
        self.topics
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::NotFound { kind: "topic", name: name.to_string() })
    }

    async fn resolve_product(&self, name: &str) -> ClientResult<String> {
        Ok(format!("product-{name}"))
    }

    async fn list_jobs(&self, _team_id: &str, topic_id: &str) -> ClientResult<Vec<Job>> {
        Ok(self.jobs.get(topic_id).cloned().unwrap_or_default())
    }

    async fn list_topics_of_product(&self, _product_id: &str) -> ClientResult<Vec<Topic>> {
        Ok(self.product_topics.clone())
    }

    async fn list_files_of_job(&self, job_id: &str) -> ClientResult<Vec<RemoteFile>> {
        Ok(vec![
            RemoteFile { id: format!("log-{job_id}"), name: "logs".to_string() },
            RemoteFile { id: format!("file-{job_id}"), name: TEST_NAME.to_string() },
        ])
    }

    async fn fetch_file_content(&self, file_id: &str) -> ClientResult<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.contents
            .get(file_id)
            .cloned()
            .ok_or_else(|| ClientError::NoData(file_id.to_string()))
    }
}

pub fn config(working_dir: &Path) -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.working_dir = working_dir.to_path_buf();
    config.sync.concurrency = 4;
    config
}

pub fn syncer(api: FakeCi, working_dir: &Path) -> (Arc<FakeCi>, Syncer<FakeCi>) {
    let api = Arc::new(api);
    (Arc::clone(&api), Syncer::new(api, config(working_dir)))
}

/// Write a job file by hand: `rows` are `(test, value)` pairs
pub fn write_job_file(working_dir: &Path, topic: &str, date: &str, job_id: &str, rows: &[(&str, Option<f64>)]) {
    let dir = working_dir.join(topic);
    std::fs::create_dir_all(&dir).unwrap();
    let mut content = format!("testname,{job_id}\n");
    for (test, value) in rows {
        let value = value.map(|v| v.to_string()).unwrap_or_default();
        content.push_str(&format!("{test},{value}\n"));
    }
    std::fs::write(dir.join(format!("{date}_{job_id}_{TEST_NAME}.csv")), content).unwrap();
}
