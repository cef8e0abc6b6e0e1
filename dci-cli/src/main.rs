use clap::{Parser, Subcommand};
use dci_common::AnalysisConfig;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

mod analysis;
mod sync;

#[derive(Parser)]
#[command(name = "dci-analysis")]
#[command(about = "Sync DCI test results and compare them across topics")]
#[command(version)]
struct Cli {
    /// Directory holding one sub-directory per topic
    #[arg(short, long, global = true, env = "DCI_ANALYSIS_WORKING_DIR")]
    working_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines and print sync reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new jobs of a topic or of every topic of a product
    Sync(sync::SyncArgs),
    /// Percentage deltas of a topic against a baseline topic
    Compare(analysis::CompareArgs),
    /// Rank tests of a topic by coefficient of variation
    Variation(analysis::VariationArgs),
    /// Values of one test across the jobs of a topic
    Series(analysis::SeriesArgs),
    /// First and last job dates of a topic
    Range(analysis::RangeArgs),
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AnalysisConfig> {
    let mut config = AnalysisConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.working_dir {
        config.working_dir = dir.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Sync(args) => sync::handle_command(args, config, cli.json).await,
        Commands::Compare(args) => analysis::compare(args, &config),
        Commands::Variation(args) => analysis::variation(args, &config),
        Commands::Series(args) => analysis::series(args, &config),
        Commands::Range(args) => analysis::range(args, &config),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
