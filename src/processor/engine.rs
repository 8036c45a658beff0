use crossbeam_channel::{select, tick, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use crate::capture::PacketInfo;
use crate::config::FlowConfig;
use crate::error::{FlowError, FlowResult};
use crate::output::FlowSink;
use crate::types::RunSummary;

use super::expiry::{ExpiryPolicy, ExpiryReason};
use super::features::FinishedFlow;
use super::flow::UpdateOutcome;
use super::flow_table::FlowTable;
use super::key::FlowKey;

/// Aggregation service: owns the flow table, applies expiry and hands
/// finalized flows to its sink. Not shared between threads.
pub struct FlowEngine<S: FlowSink> {
    table: FlowTable,
    policy: ExpiryPolicy,
    valid_only: bool,
    sink: S,
    clock: u64,                                 // latest capture timestamp
    last_sweep: Option<u64>,
    summary: RunSummary,
}

impl<S: FlowSink> FlowEngine<S> {
    pub fn new(config: &FlowConfig, sink: S) -> Self {
        Self {
            table: FlowTable::new(config.activity_threshold_us()),
            policy: ExpiryPolicy::new(config),
            valid_only: config.valid_only,
            sink,
            clock: 0,
            last_sweep: None,
            summary: RunSummary::default(),
        }
    }

    pub fn process(&mut self, pkt: &PacketInfo) -> FlowResult<()> {
        self.summary.packets_seen += 1;

        if pkt.timestamp < self.clock {
            self.summary.packets_reordered += 1;
            warn!(ts = pkt.timestamp, clock = self.clock, "packet out of capture order");
        } else {
            self.clock = pkt.timestamp;
        }

        let now = self.clock;
        if self.policy.sweep_due(self.last_sweep, now) {
            self.sweep(now)?;
        }

        let key = FlowKey::from_packet(pkt);

        // A stale flow under this key ends here; the packet opens a new one
        let stale = self.table.get(&key).and_then(|flow| self.policy.check(flow, pkt.timestamp));
        if let Some(reason) = stale {
            self.expire(&key, reason)?;
        }

        let (flow, created) = self.table.lookup_or_create(key, pkt);
        if created {
            self.summary.flows_created += 1;
        }

        match flow.update(pkt) {
            Ok(UpdateOutcome::Continue) => Ok(()),
            Ok(UpdateOutcome::Terminate(reason)) => {
                trace!(%key, flags = %pkt.tcp_flags, %reason, "flow closed by packet");
                self.expire(&key, reason)
            }
            Err(e) => {
                self.table.remove(&key);
                Err(self.defect(e))
            }
        }
    }

    /// Finalizes every live flow that is over at `now`. Returns how many.
    pub fn sweep(&mut self, now: u64) -> FlowResult<usize> {
        self.last_sweep = Some(now);

        let expired: Vec<(FlowKey, ExpiryReason)> = self
            .table
            .iter()
            .filter_map(|flow| self.policy.check(flow, now).map(|reason| (*flow.key(), reason)))
            .collect();

        for (key, reason) in &expired {
            self.expire(key, *reason)?;
        }
        if !expired.is_empty() {
            debug!(now, expired = expired.len(), live = self.table.len(), "sweep");
        }
        Ok(expired.len())
    }

    /// Finalizes everything still open, as at end of input.
    pub fn flush(&mut self) -> FlowResult<usize> {
        let flows: Vec<_> = self.table.drain().collect();
        let count = flows.len();
        let mut first_err = None;

        for mut flow in flows {
            match flow.finalize(ExpiryReason::EndOfInput) {
                Ok(finished) => self.export(finished),
                Err(e) => {
                    let e = self.defect(e);
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }

    fn expire(&mut self, key: &FlowKey, reason: ExpiryReason) -> FlowResult<()> {
        let Some(mut flow) = self.table.remove(key) else {
            return Ok(());
        };
        match flow.finalize(reason) {
            Ok(finished) => {
                self.export(finished);
                Ok(())
            }
            Err(e) => Err(self.defect(e)),
        }
    }

    fn export(&mut self, finished: FinishedFlow) {
        if self.valid_only && !finished.valid {
            self.summary.flows_discarded += 1;
            debug!(key = %finished.key, reason = %finished.reason, "discarding invalid flow");
            return;
        }
        self.summary.flows_exported += 1;
        self.sink.export(finished);
    }

    fn defect(&mut self, e: FlowError) -> FlowError {
        self.summary.defects += 1;
        error!(error = %e, "flow table defect");
        e
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary { flows_live: self.table.len() as u64, ..self.summary }
    }

    pub fn table(&self) -> &FlowTable { &self.table }

    pub fn sink(&self) -> &S { &self.sink }

    pub fn into_sink(self) -> S { self.sink }
}

/// Engine thread body: drains decoded packets until the reader hangs up,
/// then flushes every open flow.
pub fn processing_loop<S: FlowSink>(
    running: Arc<AtomicBool>,
    packet_rx: Receiver<PacketInfo>,
    stats_tx: Sender<RunSummary>,
    mut engine: FlowEngine<S>,
    progress_every: Duration,
) -> RunSummary {
    // Wall-clock tick only paces diagnostics, expiry runs on capture time
    let stats_tick = tick(progress_every);

    loop {
        select! {
            recv(packet_rx) -> msg => match msg {
                // Defects are counted and logged by the engine
                Ok(pkt) => { let _ = engine.process(&pkt); }
                Err(_) => break,
            },
            recv(stats_tick) -> _ => {
                let _ = stats_tx.send(engine.summary());
            },
        }
    }

    let _ = engine.flush();
    let summary = engine.summary();
    let _ = stats_tx.send(summary);
    running.store(false, Ordering::Relaxed);
    summary
}
