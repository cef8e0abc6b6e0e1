//! On-disk job files and the per-topic tag index

use dci_common::{AnalysisError, JobFileName, Result, TestDurations, TAG_INDEX_FILE, TEST_NAME_COLUMN};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Contents of one job file: its value column name and per-test values
#[derive(Debug, Clone, PartialEq)]
pub struct JobTable {
    pub job_id: String,
    pub values: IndexMap<String, Option<f64>>,
}

/// Directory of one topic: job files plus `index_tags.json`
#[derive(Debug, Clone)]
pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    /// Open the topic directory, creating it when absent
    pub fn open(working_dir: &Path, topic: &str) -> Result<Self> {
        let dir = working_dir.join(topic);
        if !dir.is_dir() {
            info!("create {} directory", dir.display());
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &JobFileName) -> PathBuf {
        self.dir.join(name.file_name())
    }

    /// A job file's presence means the job is already synced
    pub fn contains(&self, name: &JobFileName) -> bool {
        self.path_of(name).exists()
    }

    /// Persist decoded durations as `testname,{job_id}` rows.
    ///
    /// Written to a temporary file first and renamed into place.
    pub fn write_job_file(&self, name: &JobFileName, durations: &TestDurations) -> Result<PathBuf> {
        let path = self.path_of(name);
        let tmp = path.with_extension("csv.part");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record([TEST_NAME_COLUMN, name.job_id.as_str()])?;
            for (test, duration) in durations {
                let value = duration.map(|d| d.to_string()).unwrap_or_default();
                writer.write_record([test.as_str(), value.as_str()])?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;
        debug!("wrote {} tests to {}", durations.len(), path.display());
        Ok(path)
    }

    pub fn tag_index_path(&self) -> PathBuf {
        self.dir.join(TAG_INDEX_FILE)
    }

    pub fn load_tag_index(&self) -> Result<TagIndex> {
        TagIndex::load(&self.tag_index_path())
    }

    /// Read-merge-write of the tag index. Entries not in `entries` are kept.
    pub fn merge_tags(&self, entries: BTreeMap<String, Vec<String>>) -> Result<TagIndex> {
        let mut index = self.load_tag_index()?;
        index.merge(entries);
        index.save(&self.tag_index_path())?;
        Ok(index)
    }
}

/// Read a job file written by [`JobStore::write_job_file`].
///
/// Duplicate test identifiers keep the last value.
pub fn read_job_file(path: &Path) -> Result<JobTable> {
    let invalid = |reason: String| AnalysisError::InvalidJobFile {
        path: path.display().to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let job_id = reader
        .headers()?
        .get(1)
        .map(str::to_string)
        .ok_or_else(|| invalid("missing value column".to_string()))?;

    let mut values = IndexMap::new();
    for record in reader.records() {
        let record = record?;
        let test = record.get(0).unwrap_or_default().to_string();
        let raw = record.get(1).unwrap_or_default().trim();
        let value = if raw.is_empty() {
            None
        } else {
            Some(raw.parse::<f64>().map_err(|e| invalid(format!("{test}: {e}")))?)
        };
        values.insert(test, value);
    }
    Ok(JobTable { job_id, values })
}

/// Job file basename -> tags, one per topic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    entries: BTreeMap<String, Vec<String>>,
}

impl TagIndex {
    /// A missing index file is an empty index
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let entries = serde_json::from_str(&content)?;
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.part");
        fs::write(&tmp, serde_json::to_string_pretty(&self.entries)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn merge(&mut self, entries: BTreeMap<String, Vec<String>>) {
        self.entries.extend(entries);
    }

    pub fn tags_of(&self, file_name: &str) -> Option<&[String]> {
        self.entries.get(file_name).map(Vec::as_slice)
    }

    /// True when the file is indexed with every one of `tags`
    pub fn has_all_tags(&self, file_name: &str, tags: &[String]) -> bool {
        match self.tags_of(file_name) {
            Some(file_tags) => tags.iter().all(|t| file_tags.contains(t)),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
