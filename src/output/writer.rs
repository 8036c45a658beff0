use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::processor::{ExpiryReason, FeatureVector, FinishedFlow, SCHEMA_VERSION};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One row per flow, feature columns only
    #[default]
    Csv,
    /// One JSON object per line, with expiry reason and validity
    Jsonl,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    schema_version: u32,
    #[serde(flatten)]
    features: &'a FeatureVector,
    reason: ExpiryReason,
    valid: bool,
}

/// Formats finished flows onto a byte stream.
pub enum RecordWriter {
    Csv(csv::Writer<Box<dyn Write>>),
    Jsonl(BufWriter<Box<dyn Write>>),
}

impl RecordWriter {
    /// Writes to `path`, or stdout when there is none.
    pub fn create(path: Option<&Path>, format: OutputFormat, header: bool) -> Result<Self> {
        let out: Box<dyn Write> = match path {
            Some(p) => Box::new(File::create(p).with_context(|| format!("create output {}", p.display()))?),
            None => Box::new(io::stdout().lock()),
        };
        Self::new(out, format, header)
    }

    pub fn new(out: Box<dyn Write>, format: OutputFormat, header: bool) -> Result<Self> {
        match format {
            OutputFormat::Csv => {
                let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(out);
                if header {
                    w.write_record(FeatureVector::HEADER).context("write csv header")?;
                }
                Ok(RecordWriter::Csv(w))
            }
            // No header line in JSON lines, every record names its fields
            OutputFormat::Jsonl => Ok(RecordWriter::Jsonl(BufWriter::new(out))),
        }
    }

    pub fn write(&mut self, flow: &FinishedFlow) -> Result<()> {
        match self {
            RecordWriter::Csv(w) => w.serialize(&flow.features).context("write csv record"),
            RecordWriter::Jsonl(w) => {
                let record = JsonRecord {
                    schema_version: SCHEMA_VERSION,
                    features: &flow.features,
                    reason: flow.reason,
                    valid: flow.valid,
                };
                serde_json::to_writer(&mut *w, &record).context("write json record")?;
                w.write_all(b"\n").context("write json record")
            }
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            RecordWriter::Csv(w) => w.flush(),
            RecordWriter::Jsonl(w) => w.flush(),
        }
        .context("flush output")
    }
}
