//! CSV reports under `{working_dir}/csv`

use dci_common::{Result, TEST_NAME_COLUMN};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::compare::ComparisonResult;
use crate::dataset::{Dataset, Reduction};

const REPORTS_DIR: &str = "csv";

fn report_path(working_dir: &Path, file_name: &str) -> Result<PathBuf> {
    let dir = working_dir.join(REPORTS_DIR);
    create_dir_all(&dir)?;
    Ok(dir.join(file_name))
}

fn write_table<'a, R, I>(path: &Path, header: I, rows: R) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
    R: IntoIterator<Item = Vec<String>>,
{
    info!("write file to {}", path.display());
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(std::iter::once(TEST_NAME_COLUMN).chain(header))?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// `{topic_1}_{mode}_vs_{topic_2}.csv`, not-applicable cells as `N/A`
pub fn write_comparison_csv(
    working_dir: &Path,
    baseline_topic: &str,
    mode: Reduction,
    target_topic: &str,
    result: &ComparisonResult,
) -> Result<PathBuf> {
    let path = report_path(
        working_dir,
        &format!("{baseline_topic}_{mode}_vs_{target_topic}.csv"),
    )?;
    let rows = result.rows().map(|(test, deltas)| {
        std::iter::once(test.to_string())
            .chain(deltas.iter().map(ToString::to_string))
            .collect::<Vec<String>>()
    });
    write_table(&path, result.columns().iter().map(String::as_str), rows)?;
    Ok(path)
}

/// Raw dataset as `{topic}_evolution.csv`; missing values are empty cells
pub fn write_dataset_csv(working_dir: &Path, topic: &str, dataset: &Dataset) -> Result<PathBuf> {
    let path = report_path(working_dir, &format!("{topic}_evolution.csv"))?;
    let rows = dataset.rows().map(|(test, values)| {
        std::iter::once(test.to_string())
            .chain(values.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()))
            .collect::<Vec<String>>()
    });
    write_table(&path, dataset.columns().iter().map(String::as_str), rows)?;
    Ok(path)
}

/// Per-test statistic such as the standard deviation ranking
pub fn write_row_statistics_csv(
    working_dir: &Path,
    file_name: &str,
    column: &str,
    stats: &[(String, f64)],
) -> Result<PathBuf> {
    let path = report_path(working_dir, file_name)?;
    let rows = stats.iter().map(|(test, value)| vec![test.clone(), value.to_string()]);
    write_table(&path, [column], rows)?;
    Ok(path)
}

/// `{topic}_standard_deviation.csv`
pub fn write_standard_deviation_csv(
    working_dir: &Path,
    topic: &str,
    stats: &[(String, f64)],
) -> Result<PathBuf> {
    write_row_statistics_csv(
        working_dir,
        &format!("{topic}_standard_deviation.csv"),
        "std_dev",
        stats,
    )
}
