use anyhow::{bail, Context, Result};
use clap::Args;
use dci_client::DciClient;
use dci_common::{AnalysisConfig, Credentials};
use dci_engine::{SyncError, SyncReport, Syncer};
use std::sync::Arc;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{error, info};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Team owning the jobs
    pub team: String,

    /// Name of the JUnit file attached to each job
    pub testname: String,

    /// Sync every topic of this product
    #[arg(long)]
    pub product: Option<String>,

    /// Sync a single topic
    #[arg(long)]
    pub topic: Option<String>,
}

enum Target {
    Product(String),
    Topic(String),
}

impl SyncArgs {
    fn target(&self) -> Result<Target> {
        match (&self.product, &self.topic) {
            (Some(product), None) => Ok(Target::Product(product.clone())),
            (None, Some(topic)) => Ok(Target::Topic(topic.clone())),
            (Some(_), Some(_)) => bail!("--product and --topic are mutually exclusive"),
            (None, None) => bail!("one of --product or --topic is required"),
        }
    }
}

/// Runs a sync to completion. Only bad arguments, missing credentials and an
/// unknown topic are errors; everything else is logged.
pub async fn handle_command(args: SyncArgs, config: AnalysisConfig, json: bool) -> Result<()> {
    let target = args.target()?;
    let credentials = Credentials::from_env().context("DCI credentials are not set")?;
    let client = DciClient::new(&credentials, config.http.clone()).context("Failed to build the CI client")?;
    info!("working directory {}", config.working_dir.display());
    let syncer = Syncer::new(Arc::new(client), config);

    let mut reports = Vec::new();
    match target {
        Target::Topic(topic) => match syncer.sync_topic(&args.team, &topic, &args.testname).await {
            Ok(report) => reports.push(report),
            Err(SyncError::TopicNotFound(topic)) => bail!("topic {} not found", topic),
            Err(e) => error!("sync of topic {} failed: {}", topic, e),
        },
        Target::Product(product) => match syncer.sync_product(&args.team, &product, &args.testname).await {
            Ok(results) => reports.extend(results.into_iter().filter_map(|(_, r)| r.ok())),
            Err(e) => error!("sync of product {} failed: {}", product, e),
        },
    }

    if json {
        println!("{}", render_json(&reports)?);
    } else if !reports.is_empty() {
        println!("{}", render(&reports));
    }
    info!("done");
    Ok(())
}

fn render(reports: &[SyncReport]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["topic", "jobs", "relevant", "written", "synced", "incomplete", "no file", "failed"]);
    for r in reports {
        builder.push_record([
            r.topic.clone(),
            r.jobs.to_string(),
            r.relevant.to_string(),
            r.written.to_string(),
            r.already_synced.to_string(),
            r.incomplete.to_string(),
            r.no_matching_file.to_string(),
            r.failed.to_string(),
        ]);
    }
    builder.build().with(Style::modern()).to_string()
}

fn render_json(reports: &[SyncReport]) -> Result<String> {
    serde_json::to_string_pretty(reports).context("Failed to serialize the sync reports")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(product: Option<&str>, topic: Option<&str>) -> SyncArgs {
        SyncArgs {
            team: "qa".to_string(),
            testname: "perf".to_string(),
            product: product.map(str::to_string),
            topic: topic.map(str::to_string),
        }
    }

    #[test]
    fn test_exactly_one_target() {
        assert!(matches!(args(Some("RHEL"), None).target(), Ok(Target::Product(p)) if p == "RHEL"));
        assert!(matches!(args(None, Some("RHEL-8.2")).target(), Ok(Target::Topic(t)) if t == "RHEL-8.2"));
        assert!(args(None, None).target().is_err());
        assert!(args(Some("RHEL"), Some("RHEL-8.2")).target().is_err());
    }

    #[test]
    fn test_render_report() {
        let report = SyncReport {
            topic: "RHEL-8.2".to_string(),
            jobs: 4,
            written: 2,
            ..Default::default()
        };
        let table = render(&[report]);
        assert!(table.contains("RHEL-8.2"));
        assert!(table.contains("incomplete"));
    }

    #[test]
    fn test_render_report_json() {
        let report = SyncReport {
            topic: "RHEL-8.2".to_string(),
            jobs: 4,
            written: 2,
            ..Default::default()
        };
        let value: serde_json::Value = serde_json::from_str(&render_json(&[report]).unwrap()).unwrap();
        assert_eq!(value[0]["topic"], "RHEL-8.2");
        assert_eq!(value[0]["written"], 2);
        assert_eq!(render_json(&[]).unwrap(), "[]");
    }
}
