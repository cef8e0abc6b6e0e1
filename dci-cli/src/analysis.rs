use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use dci_common::AnalysisConfig;
use dci_engine::report::{write_comparison_csv, write_dataset_csv, write_standard_deviation_csv};
use dci_engine::stats::{self, Bucket};
use dci_engine::{compare as run_compare, load_dataset, topic_date_range, ComparisonRequest, DatasetQuery, Reduction, TargetReduction};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::info;

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Baseline topic
    pub baseline: String,

    /// Topic compared against the baseline
    pub topic: String,

    /// Baseline reduction: mean or median
    #[arg(short, long, default_value = "mean")]
    pub mode: Reduction,

    #[arg(long)]
    pub baseline_start: Option<NaiveDate>,

    #[arg(long)]
    pub baseline_end: Option<NaiveDate>,

    /// Tags every baseline job must carry (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub baseline_tags: Vec<String>,

    #[arg(long)]
    pub start: Option<NaiveDate>,

    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Tags every compared job must carry (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Reduction of the compared topic: none, latest, mean or median
    #[arg(short, long, default_value = "none")]
    pub reduction: TargetReduction,

    /// Tests left out of both sides (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Percentile of the per-job trend line
    #[arg(short, long, default_value_t = stats::DEFAULT_PERCENTILE)]
    pub percentile: f64,

    /// Do not write the comparison CSV report
    #[arg(long)]
    pub no_report: bool,
}

#[derive(Args, Debug)]
pub struct VariationArgs {
    pub topic: String,

    #[arg(long)]
    pub start: Option<NaiveDate>,

    #[arg(long)]
    pub end: Option<NaiveDate>,

    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Rank by standard deviation instead
    #[arg(long)]
    pub std_dev: bool,

    /// Number of tests shown
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,

    /// Also write the evolution and standard deviation CSV reports
    #[arg(long)]
    pub write_reports: bool,
}

#[derive(Args, Debug)]
pub struct SeriesArgs {
    pub topic: String,

    /// Test identifier, `{classname}/{name}`
    pub test: String,

    #[arg(long)]
    pub start: Option<NaiveDate>,

    #[arg(long)]
    pub end: Option<NaiveDate>,

    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
}

#[derive(Args, Debug)]
pub struct RangeArgs {
    pub topic: String,
}

/// Unbounded ends of a window cover every job
fn query(topic: &str, start: Option<NaiveDate>, end: Option<NaiveDate>, tags: Vec<String>) -> DatasetQuery {
    DatasetQuery::new(topic, start.unwrap_or(NaiveDate::MIN), end.unwrap_or(NaiveDate::MAX)).with_tags(tags)
}

fn table<R, I>(header: &[&str], rows: R) -> String
where
    R: IntoIterator<Item = I>,
    I: IntoIterator<Item = String>,
{
    let mut builder = Builder::default();
    builder.push_record(header.iter().map(|h| h.to_string()));
    for row in rows {
        builder.push_record(row);
    }
    builder.build().with(Style::modern()).to_string()
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.3}")).unwrap_or_else(|| "N/A".to_string())
}

fn histogram_rows(buckets: &[Bucket]) -> Vec<Vec<String>> {
    buckets
        .iter()
        .map(|b| vec![b.label(), b.count.to_string()])
        .collect()
}

pub fn compare(args: CompareArgs, config: &AnalysisConfig) -> Result<()> {
    let baseline = query(&args.baseline, args.baseline_start, args.baseline_end, args.baseline_tags);
    let target = query(&args.topic, args.start, args.end, args.tags);
    let request = ComparisonRequest::new(args.mode, baseline, target)
        .with_target_reduction(args.reduction)
        .excluding(args.exclude);

    let result = run_compare(&config.working_dir, &request)
        .with_context(|| format!("Failed to compare {} with {}", args.baseline, args.topic))?;

    if !args.no_report {
        let path = write_comparison_csv(&config.working_dir, &args.baseline, args.mode, &args.topic, &result)?;
        info!("write file to {}", path.display());
    }

    println!(
        "Baseline {}/{} vs {}: {} tests x {} jobs",
        args.baseline,
        args.mode,
        args.topic,
        result.len(),
        result.columns().len()
    );
    println!("Intervals of deltas (percentage), lower is better");
    println!(
        "{}",
        table(&["interval", "tests"], histogram_rows(&stats::comparison_histogram(&result)))
    );

    let trend = stats::percentile_trend(&result, args.percentile);
    println!("{}th percentile per job", (args.percentile * 100.0).round());
    println!(
        "{}",
        table(
            &["job", "delta"],
            trend.into_iter().map(|(job, v)| vec![job, format_value(v)])
        )
    );
    Ok(())
}

pub fn variation(args: VariationArgs, config: &AnalysisConfig) -> Result<()> {
    let dataset = load_dataset(&config.working_dir, &query(&args.topic, args.start, args.end, args.tags))
        .with_context(|| format!("Failed to load topic {}", args.topic))?;

    let std_devs = stats::standard_deviation(&dataset);
    if args.write_reports {
        write_dataset_csv(&config.working_dir, &args.topic, &dataset)?;
        write_standard_deviation_csv(&config.working_dir, &args.topic, &std_devs)?;
    }

    let (label, ranked) = if args.std_dev {
        ("std dev", std_devs)
    } else {
        ("coef. of variation", stats::coefficient_of_variation(&dataset))
    };
    println!("{}: {} tests x {} jobs", args.topic, dataset.len(), dataset.columns().len());
    println!(
        "{}",
        table(
            &["test", label],
            ranked
                .into_iter()
                .take(args.limit)
                .map(|(test, v)| vec![test, format_value(Some(v))])
        )
    );
    Ok(())
}

pub fn series(args: SeriesArgs, config: &AnalysisConfig) -> Result<()> {
    let dataset = load_dataset(&config.working_dir, &query(&args.topic, args.start, args.end, args.tags))
        .with_context(|| format!("Failed to load topic {}", args.topic))?;
    let series = dataset
        .series(&args.test)
        .with_context(|| format!("Test {} is not in every job of {}", args.test, args.topic))?;

    println!(
        "{}",
        table(
            &["job", "time (s)"],
            series.into_iter().map(|(job, v)| vec![job.to_string(), format_value(v)])
        )
    );
    Ok(())
}

pub fn range(args: RangeArgs, config: &AnalysisConfig) -> Result<()> {
    match topic_date_range(&config.working_dir, &args.topic)? {
        Some((first, end)) => println!("{}: {} .. {}", args.topic, first, end),
        None => println!("{}: no job file", args.topic),
    }
    Ok(())
}
