//! Percentage deltas of a target topic against a baseline topic

use dci_common::{AnalysisError, Result};
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::dataset::{load_dataset, Dataset, DatasetQuery, Reduction};

/// What happens to the target dataset before comparing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetReduction {
    /// Keep every job column
    #[default]
    None,
    /// Only the most recent job
    Latest,
    Mean,
    Median,
}

impl FromStr for TargetReduction {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(TargetReduction::None),
            "latest" => Ok(TargetReduction::Latest),
            "mean" => Ok(TargetReduction::Mean),
            "median" => Ok(TargetReduction::Median),
            other => Err(AnalysisError::InvalidArgument(format!(
                "unknown target reduction '{other}', expected none, latest, mean or median"
            ))),
        }
    }
}

/// One cell of a comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delta {
    /// Percentage change; may be non-finite when the baseline is zero
    Value(f64),
    /// Test absent from the baseline, or no value on either side
    NotApplicable,
}

impl Delta {
    pub fn value(&self) -> Option<f64> {
        match self {
            Delta::Value(v) => Some(*v),
            Delta::NotApplicable => None,
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::Value(v) => write!(f, "{v}"),
            Delta::NotApplicable => f.write_str("N/A"),
        }
    }
}

/// Deltas indexed by test, columns in the target's job order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComparisonResult {
    columns: Vec<String>,
    rows: IndexMap<String, Vec<Delta>>,
}

impl ComparisonResult {
    pub fn new(columns: Vec<String>, rows: IndexMap<String, Vec<Delta>>) -> Self {
        Self { columns, rows }
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

    pub fn row(&self, test: &str) -> Option<&[Delta]> {
        self.rows.get(test).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Delta])> {
        self.rows.iter().map(|(test, row)| (test.as_str(), row.as_slice()))
    }

    /// Numeric cells of one column, row order
    pub fn column(&self, idx: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.values().filter_map(move |row| row.get(idx).and_then(Delta::value))
    }

    /// Every numeric cell
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.values().flatten().filter_map(Delta::value)
    }
}

/// Inputs of [`compare`]: the baseline and target selections
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRequest {
    pub mode: Reduction,
    pub baseline: DatasetQuery,
    pub target: DatasetQuery,
    pub target_reduction: TargetReduction,
}

impl ComparisonRequest {
    pub fn new(mode: Reduction, baseline: DatasetQuery, target: DatasetQuery) -> Self {
        Self {
            mode,
            baseline,
            target,
            target_reduction: TargetReduction::None,
        }
    }

    pub fn with_target_reduction(mut self, reduction: TargetReduction) -> Self {
        self.target_reduction = reduction;
        self
    }

    /// Drop the same tests from both sides
    pub fn excluding(mut self, tests: Vec<String>) -> Self {
        self.baseline.excluded_tests = tests.clone();
        self.target.excluded_tests = tests;
        self
    }
}

/// Load both sides from the working directory and compare them
pub fn compare(working_dir: &Path, request: &ComparisonRequest) -> Result<ComparisonResult> {
    info!(
        "compare the {} of topic {} with jobs of topic {}",
        request.mode, request.baseline.topic, request.target.topic
    );
    let baseline = load_dataset(working_dir, &request.baseline)?;

    let target_query = request
        .target
        .clone()
        .latest_only(request.target_reduction == TargetReduction::Latest);
    let target = load_dataset(working_dir, &target_query)?;

    let target = match request.target_reduction {
        TargetReduction::None | TargetReduction::Latest => target,
        TargetReduction::Mean => reduce_to_column(&target, Reduction::Mean),
        TargetReduction::Median => reduce_to_column(&target, Reduction::Median),
    };
    Ok(compare_datasets(&baseline, &target, request.mode))
}

fn reduce_to_column(dataset: &Dataset, reduction: Reduction) -> Dataset {
    Dataset::from_column(reduction.as_str(), dataset.reduce(reduction))
}

/// `(value - baseline) * 100 / baseline` for every cell of `target`.
///
/// A zero baseline is not guarded: the result is infinite or NaN.
pub fn compare_datasets(baseline: &Dataset, target: &Dataset, mode: Reduction) -> ComparisonResult {
    let reference = baseline.reduce(mode);
    let rows = target
        .rows()
        .map(|(test, values)| {
            let base = reference.get(test).copied().flatten();
            let deltas = values
                .iter()
                .map(|value| match (base, value) {
                    (Some(base), Some(value)) => Delta::Value((value - base) * 100.0 / base),
                    _ => Delta::NotApplicable,
                })
                .collect();
            (test.to_string(), deltas)
        })
        .collect();
    ComparisonResult::new(target.columns().to_vec(), rows)
}
