//! Loading a topic's job files into one aligned table

use chrono::NaiveDate;
use dci_common::{AnalysisError, JobFileName, Result, JOB_FILE_EXTENSION, TAG_INDEX_FILE};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::stats;
use crate::store::{read_job_file, TagIndex};

/// Selection of job files to load for one topic
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetQuery {
    pub topic: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Every listed tag must be present on a file for it to be kept
    pub tags: Vec<String>,
    /// Keep only the most recent file of the window
    pub latest_only: bool,
    pub excluded_tests: Vec<String>,
}

impl DatasetQuery {
    pub fn new(topic: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            topic: topic.into(),
            start,
            end,
            tags: Vec::new(),
            latest_only: false,
            excluded_tests: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn latest_only(mut self, latest_only: bool) -> Self {
        self.latest_only = latest_only;
        self
    }

    pub fn excluding(mut self, tests: Vec<String>) -> Self {
        self.excluded_tests = tests;
        self
    }
}

/// A job file found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct JobFileEntry {
    pub name: JobFileName,
    pub path: PathBuf,
}

/// Collapse of a multi-job row to a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Median,
}

impl Reduction {
    pub fn apply(&self, values: &[Option<f64>]) -> Option<f64> {
        match self {
            Reduction::Mean => stats::mean(values),
            Reduction::Median => stats::median(values),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::Mean => "mean",
            Reduction::Median => "median",
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reduction {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Reduction::Mean),
            "median" => Ok(Reduction::Median),
            other => Err(AnalysisError::InvalidArgument(format!(
                "unknown reduction '{other}', expected mean or median"
            ))),
        }
    }
}

/// Test identifier -> value
pub type Series = IndexMap<String, Option<f64>>;

/// Tests x jobs table; columns are job ids in chronological order.
///
/// Rows follow the order of the first (anchor) job file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: IndexMap<String, Vec<Option<f64>>>,
}

impl Dataset {
    /// Single-column dataset
    pub fn from_column(column: impl Into<String>, values: Series) -> Self {
        Self {
            columns: vec![column.into()],
            rows: values.into_iter().map(|(test, v)| (test, vec![v])).collect(),
        }
    }

    /// Inner join on test identifier: tests absent from `values` are dropped
    pub fn inner_merge(&mut self, column: impl Into<String>, values: &Series) {
        self.rows.retain(|test, _| values.contains_key(test));
        for (test, row) in self.rows.iter_mut() {
            row.push(values[test]);
        }
        self.columns.push(column.into());
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, test: &str) -> bool {
        self.rows.contains_key(test)
    }

    pub fn row(&self, test: &str) -> Option<&[Option<f64>]> {
        self.rows.get(test).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.rows.iter().map(|(test, row)| (test.as_str(), row.as_slice()))
    }

    pub fn tests(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn remove_tests(&mut self, tests: &[String]) {
        for test in tests {
            self.rows.shift_remove(test);
        }
    }

    /// One value per test
    pub fn reduce(&self, reduction: Reduction) -> Series {
        self.rows
            .iter()
            .map(|(test, row)| (test.clone(), reduction.apply(row)))
            .collect()
    }

    /// One test's values in job order
    pub fn series(&self, test: &str) -> Option<Vec<(&str, Option<f64>)>> {
        let row = self.rows.get(test)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(row.iter().copied())
                .collect(),
        )
    }
}

/// Every job file of a topic, sorted by date prefix (ties keep name order)
pub fn list_job_files(working_dir: &Path, topic: &str) -> Result<Vec<JobFileEntry>> {
    let dir = working_dir.join(topic);
    let pattern = format!("{}/*.{}", glob::Pattern::escape(&dir.to_string_lossy()), JOB_FILE_EXTENSION);
    let paths = glob::glob(&pattern).map_err(|e| AnalysisError::InvalidArgument(e.to_string()))?;

    let mut entries = Vec::new();
    for path in paths {
        let path = path.map_err(|e| AnalysisError::Io(e.into()))?;
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match JobFileName::parse(file_name) {
            Some(name) => entries.push(JobFileEntry { name, path }),
            None => warn!("ignoring {}: not a job file name", path.display()),
        }
    }
    entries.sort_by_key(|e| e.name.date);
    Ok(entries)
}

/// Keep files whose tag index entry holds every requested tag
pub fn filter_by_tags(entries: Vec<JobFileEntry>, index: &TagIndex, tags: &[String]) -> Vec<JobFileEntry> {
    if tags.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .filter(|e| {
            e.path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| index.has_all_tags(n, tags))
        })
        .collect()
}

/// Files of the query, in chronological order
pub fn select_job_files(working_dir: &Path, query: &DatasetQuery) -> Result<Vec<JobFileEntry>> {
    let mut entries = list_job_files(working_dir, &query.topic)?;
    if !query.tags.is_empty() {
        let index = TagIndex::load(&working_dir.join(&query.topic).join(TAG_INDEX_FILE))?;
        entries = filter_by_tags(entries, &index, &query.tags);
    }
    entries.retain(|e| e.name.date >= query.start && e.name.date <= query.end);
    if query.latest_only {
        entries = entries.pop().into_iter().collect();
    }
    Ok(entries)
}

/// Load and inner-merge the query's job files.
///
/// Fails with `NotFound` when no file matches.
pub fn load_dataset(working_dir: &Path, query: &DatasetQuery) -> Result<Dataset> {
    info!("get files from {}/{}", working_dir.display(), query.topic);
    let entries = select_job_files(working_dir, query)?;
    let (anchor, rest) = entries.split_first().ok_or_else(|| {
        AnalysisError::NotFound(format!(
            "no job file for topic {} between {} and {}",
            query.topic, query.start, query.end
        ))
    })?;

    let table = read_job_file(&anchor.path)?;
    let mut dataset = Dataset::from_column(table.job_id, table.values);
    for entry in rest {
        let table = read_job_file(&entry.path)?;
        dataset.inner_merge(table.job_id, &table.values);
    }
    if !query.excluded_tests.is_empty() {
        dataset.remove_tests(&query.excluded_tests);
    }
    debug!(
        "dataset {}: {} tests x {} jobs",
        query.topic,
        dataset.len(),
        dataset.columns().len()
    );
    Ok(dataset)
}

/// First and last job dates of a topic, the last one pushed by a day so an
/// inclusive date picker covers it
pub fn topic_date_range(working_dir: &Path, topic: &str) -> Result<Option<(NaiveDate, NaiveDate)>> {
    let entries = list_job_files(working_dir, topic)?;
    Ok(match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => last
            .name
            .date
            .succ_opt()
            .map(|end| (first.name.date, end)),
        _ => None,
    })
}
