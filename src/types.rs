use serde::Serialize;

/// Run-wide counters for the diagnostic channel. Never part of the record stream.
#[derive(Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub packets_seen: u64,
    pub packets_decoded: u64,
    pub packets_skipped: u64,                   // undecodable frames
    pub packets_reordered: u64,
    pub flows_created: u64,
    pub flows_exported: u64,
    pub flows_discarded: u64,                   // invalid, with valid_only
    pub flows_live: u64,
    pub defects: u64,
}

impl RunSummary {
    /// Folds reader-side counters into the engine's view.
    pub fn merge_reader(&mut self, reader: &ReaderStats) {
        self.packets_decoded += reader.decoded;
        self.packets_skipped += reader.skipped;
    }
}

#[derive(Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub frames: u64,
    pub decoded: u64,
    pub skipped: u64,
}
