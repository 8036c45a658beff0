mod writer;

pub use writer::{OutputFormat, RecordWriter};

use crossbeam_channel::Sender;
use tracing::warn;

use crate::processor::FinishedFlow;

/// Where finalized flows go. Each flow is handed over exactly once.
pub trait FlowSink {
    fn export(&mut self, flow: FinishedFlow);
}

impl FlowSink for Sender<FinishedFlow> {
    fn export(&mut self, flow: FinishedFlow) {
        if self.send(flow).is_err() {
            warn!("record receiver is gone, flow dropped");
        }
    }
}

/// Collects in memory.
impl FlowSink for Vec<FinishedFlow> {
    fn export(&mut self, flow: FinishedFlow) {
        self.push(flow);
    }
}
