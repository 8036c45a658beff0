use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

use crate::capture::PacketInfo;
use crate::config::FlowConfig;
use crate::types::RunSummary;
use super::{engine, publisher, FinishedFlow, FlowEngine};

/// Packets buffered between the reader and the engine. Bounded so a fast
/// reader waits for the engine instead of growing without limit.
const PACKET_QUEUE: usize = 16_384;

/// Runs the flow engine and the progress publisher on their own threads.
pub struct FeatureProcessor {
    config: FlowConfig,
    progress_every: Duration,
    running: Arc<AtomicBool>,
    processing_thread: Option<JoinHandle<RunSummary>>,
    publisher_thread: Option<JoinHandle<()>>,
    packet_tx: Option<Sender<PacketInfo>>,
    packet_rx: Receiver<PacketInfo>,
    stats_tx: Sender<RunSummary>,
    stats_rx: Receiver<RunSummary>,
}

impl FeatureProcessor {
    pub fn new(config: FlowConfig, progress_every: Duration) -> Self {
        let (packet_tx, packet_rx) = bounded(PACKET_QUEUE);
        let (stats_tx, stats_rx) = unbounded();
        Self {
            config,
            progress_every,
            running: Arc::new(AtomicBool::new(false)),
            processing_thread: None,
            publisher_thread: None,
            packet_tx: Some(packet_tx),
            packet_rx,
            stats_tx,
            stats_rx,
        }
    }

    /// A handle for the packet producer. `None` once input was closed.
    pub fn get_sender(&self) -> Option<Sender<PacketInfo>> { self.packet_tx.clone() }

    /// Drops the processor's own packet handle so the engine finishes as soon
    /// as every producer has hung up.
    pub fn close_input(&mut self) { self.packet_tx = None; }

    pub fn start_processor(&mut self, record_tx: Sender<FinishedFlow>) -> Result<()> {
        if self.running.load(Ordering::Relaxed) {
            bail!("processor is already running");
        }
        self.running.store(true, Ordering::Relaxed);

        let processing = {
            let running = self.running.clone();
            let rx = self.packet_rx.clone();
            let stats_tx = self.stats_tx.clone();
            let flow_engine = FlowEngine::new(&self.config, record_tx);
            let every = self.progress_every;
            thread::Builder::new()
                .name("flow-engine".into())
                .spawn(move || engine::processing_loop(running, rx, stats_tx, flow_engine, every))?
        };

        let publisher = {
            let running = self.running.clone();
            let stats_rx = self.stats_rx.clone();
            let every = self.progress_every;
            thread::Builder::new()
                .name("progress".into())
                .spawn(move || publisher::publisher_loop(running, stats_rx, every))?
        };

        self.processing_thread = Some(processing);
        self.publisher_thread = Some(publisher);
        debug!("processor started");
        Ok(())
    }

    /// Waits for the engine to drain its input and returns the final counters.
    pub fn wait(&mut self) -> Result<RunSummary> {
        self.close_input();
        let handle = self
            .processing_thread
            .take()
            .ok_or_else(|| anyhow!("processor isn't running"))?;
        let summary = handle.join().map_err(|_| anyhow!("flow engine thread panicked"))?;

        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.publisher_thread.take() { let _ = h.join(); }
        debug!("processor stopped");
        Ok(summary)
    }
}
