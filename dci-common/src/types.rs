use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum number of decoded tests for a job to be persisted
pub const MIN_TESTS_PER_JOB: usize = 697;

/// Per-topic tag index file name
pub const TAG_INDEX_FILE: &str = "index_tags.json";

/// Extension of persisted job files
pub const JOB_FILE_EXTENSION: &str = "csv";

/// Header of the test identifier column in job files
pub const TEST_NAME_COLUMN: &str = "testname";

/// Suffix stripped from topic names to derive the component relevance name
pub const MILESTONE_SUFFIX: &str = "-milestone";

/// Decoded test durations of one job, keyed by test identifier.
///
/// `None` is an explicit empty value (zero or missing `time` attribute).
pub type TestDurations = IndexMap<String, Option<f64>>;

/// A named product/version lineage on the CI control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// A file attached to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
}

/// One CI run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub created_at: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

impl Job {
    /// Calendar date the job was created, parsed from `created_at`
    pub fn creation_date(&self) -> Option<NaiveDate> {
        parse_date(&self.created_at)
    }
}

/// Parse `YYYY-MM-DD`, ignoring any `THH:MM:SS...` time part.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let date = value.split('T').next().unwrap_or(value).trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Canonical test identifier: `{classname}/{name}`, trimmed, commas replaced.
///
/// Commas are the job file delimiter and must never appear in an identifier.
pub fn test_identifier(classname: &str, name: &str) -> String {
    format!("{}/{}", classname, name).trim().replace(',', ";")
}

/// Identity of a persisted job file: `{date}_{job_id}_{test_name}.csv`.
///
/// The date prefix doubles as the chronological sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobFileName {
    pub date: NaiveDate,
    pub job_id: String,
    pub test_name: String,
}

impl JobFileName {
    pub fn new(date: NaiveDate, job_id: impl Into<String>, test_name: impl Into<String>) -> Self {
        Self {
            date,
            job_id: job_id.into(),
            test_name: test_name.into(),
        }
    }

    /// Parse a job file basename. Returns `None` for anything that is not a job file.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", JOB_FILE_EXTENSION))?;
        let (date, rest) = stem.split_once('_')?;
        let (job_id, test_name) = rest.split_once('_')?;
        if job_id.is_empty() {
            return None;
        }
        Some(Self {
            date: parse_date(date)?,
            job_id: job_id.to_string(),
            test_name: test_name.to_string(),
        })
    }

    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for JobFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}.{}",
            self.date.format("%Y-%m-%d"),
            self.job_id,
            self.test_name,
            JOB_FILE_EXTENSION
        )
    }
}

/// Name used to decide whether a job's components are relevant to a topic
pub fn component_relevance_name(topic_name: &str) -> &str {
    topic_name.strip_suffix(MILESTONE_SUFFIX).unwrap_or(topic_name)
}
