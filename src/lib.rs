pub mod capture;
pub mod config;
pub mod error;
pub mod output;
pub mod processor;
pub mod types;

use anyhow::{anyhow, Result};
use crossbeam_channel::unbounded;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use capture::PcapReader;
use config::FlowConfig;
use output::{OutputFormat, RecordWriter};
use processor::FeatureProcessor;
use types::RunSummary;

/// Everything one replay run needs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    /// stdout when `None`
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub header: bool,
    pub config: FlowConfig,
    pub progress_every: Duration,
}

/// Replays a capture file through the flow engine and writes one record per
/// finished flow. Blocks until the whole capture is consumed.
pub fn run(opts: &RunOptions) -> Result<RunSummary> {
    opts.config.validate()?;

    let mut reader = PcapReader::open(&opts.input)?;
    let mut writer = RecordWriter::create(opts.output.as_deref(), opts.format, opts.header)?;

    let (record_tx, record_rx) = unbounded();
    let mut processor = FeatureProcessor::new(opts.config.clone(), opts.progress_every);
    processor.start_processor(record_tx)?;

    let packet_tx = processor
        .get_sender()
        .ok_or_else(|| anyhow!("processor input already closed"))?;
    reader.start(packet_tx)?;
    processor.close_input();

    // Ends once the engine has flushed and dropped its record sender
    for finished in record_rx.iter() {
        writer.write(&finished)?;
    }
    writer.flush()?;

    let reader_stats = reader.join()?;
    let mut summary = processor.wait()?;
    summary.merge_reader(&reader_stats);

    info!(
        packets = summary.packets_seen,
        skipped = summary.packets_skipped,
        reordered = summary.packets_reordered,
        flows = summary.flows_exported,
        discarded = summary.flows_discarded,
        defects = summary.defects,
        "capture processed"
    );
    Ok(summary)
}
