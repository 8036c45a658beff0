use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

use flowtally::config::FlowConfig;
use flowtally::output::OutputFormat;
use flowtally::RunOptions;

#[derive(Debug, Parser)]
#[command(name = "flowtally", version, about = "Per-flow statistics from a packet capture")]
struct Cli {
    /// Capture file to replay (pcap)
    input: PathBuf,

    /// Write records here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Omit the CSV header row
    #[arg(long)]
    no_header: bool,

    /// JSON file with flow thresholds; replaces the threshold flags
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds between progress log lines
    #[arg(long, default_value_t = 5, value_name = "SECS")]
    progress: u64,

    #[command(flatten)]
    flow: FlowConfig,
}

fn main() -> ExitCode {
    // Logs go to stderr, stdout may carry the records
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    match try_main(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => FlowConfig::load(path)?,
        None => cli.flow,
    };

    let opts = RunOptions {
        input: cli.input,
        output: cli.output,
        format: cli.format,
        header: !cli.no_header,
        config,
        progress_every: Duration::from_secs(cli.progress.max(1)),
    };
    flowtally::run(&opts)?;
    Ok(())
}
