//! Summary statistics over datasets and comparison results

use std::cmp::Ordering;

use crate::compare::ComparisonResult;
use crate::dataset::Dataset;

/// Number of histogram buckets
pub const HISTOGRAM_BUCKETS: usize = 25;

/// Default percentile of the trend line
pub const DEFAULT_PERCENTILE: f64 = 0.95;

fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

/// Mean of the present values; `None` when there are none
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let values = present(values);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of the present values; even counts average the two middle values
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut values = present(values);
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Population standard deviation of the present values
pub fn std_dev(values: &[Option<f64>]) -> Option<f64> {
    let mean = mean(values)?;
    let values = present(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// One histogram bar: `[lower, upper)` and how many values fell in it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

impl Bucket {
    pub fn label(&self) -> String {
        format!("({},{})", self.lower, self.upper)
    }
}

/// Bucket the finite values between `floor(min) - 1` and `ceil(max) + 1`.
///
/// Bucket width is the integer part of the span over the bucket count (at
/// least 1), so the last bucket is cut short at the upper bound. Values past
/// the last bucket, which happens once the bounds exceed `f64` precision,
/// are counted in it.
pub fn histogram<I>(values: I) -> Vec<Bucket>
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };

    let lo = min.floor() - 1.0;
    let hi = max.ceil() + 1.0;
    let width = ((hi - lo) / HISTOGRAM_BUCKETS as f64).floor().max(1.0);
    let count = (((hi - lo) / width).ceil() as usize).max(1);

    let mut buckets: Vec<Bucket> = (0..count)
        .map(|i| Bucket {
            lower: lo + i as f64 * width,
            upper: (lo + (i + 1) as f64 * width).min(hi),
            count: 0,
        })
        .collect();

    let last = buckets.len() - 1;
    for value in values {
        let idx = ((value - lo) / width).floor().max(0.0) as usize;
        buckets[idx.min(last)].count += 1;
    }
    buckets
}

/// Histogram of every numeric cell of a comparison
pub fn comparison_histogram(result: &ComparisonResult) -> Vec<Bucket> {
    histogram(result.values())
}

/// Element at index `floor(n * p)` of the ascending values
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let idx = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// Per-column percentile of a comparison, in column order.
///
/// Not-applicable cells are left out; a column with no values yields `None`.
pub fn percentile_trend(result: &ComparisonResult, p: f64) -> Vec<(String, Option<f64>)> {
    result
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let values: Vec<f64> = result.column(idx).collect();
            (column.clone(), percentile(&values, p))
        })
        .collect()
}

/// Descending order with NaN at the end
fn descending(a: &f64, b: &f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(a),
    }
}

fn rank_rows<F>(dataset: &Dataset, stat: F) -> Vec<(String, f64)>
where
    F: Fn(&[Option<f64>]) -> Option<f64>,
{
    let mut ranked: Vec<(String, f64)> = dataset
        .rows()
        .filter_map(|(test, row)| stat(row).map(|v| (test.to_string(), v)))
        .collect();
    ranked.sort_by(|a, b| descending(&a.1, &b.1));
    ranked
}

/// `std_dev / mean` per test, most variable first
pub fn coefficient_of_variation(dataset: &Dataset) -> Vec<(String, f64)> {
    rank_rows(dataset, |row| Some(std_dev(row)? / mean(row)?))
}

/// Population standard deviation per test, largest first
pub fn standard_deviation(dataset: &Dataset) -> Vec<(String, f64)> {
    rank_rows(dataset, std_dev)
}
