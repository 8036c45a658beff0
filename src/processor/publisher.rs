use crossbeam_channel::{select, tick, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::types::RunSummary;

/// Logs the latest engine counters at a fixed wall-clock rate until the
/// engine stops.
pub fn publisher_loop(
    running: Arc<AtomicBool>,
    stats_rx: Receiver<RunSummary>,
    emit_every: Duration,
) {
    let emit_tick = tick(emit_every);
    let mut latest: Option<RunSummary> = None;
    let mut last_emitted: Option<RunSummary> = None;

    loop {
        if !running.load(Ordering::Relaxed) { break; }

        select! {
            recv(stats_rx) -> msg => match msg {
                Ok(s) => latest = Some(s),
                Err(_) => break,
            },
            recv(emit_tick) -> _ => {
                // Quiet while nothing moves
                if let Some(s) = latest.filter(|s| last_emitted.as_ref() != Some(s)) {
                    info!(
                        packets = s.packets_seen,
                        flows_live = s.flows_live,
                        flows_exported = s.flows_exported,
                        flows_discarded = s.flows_discarded,
                        "progress"
                    );
                    last_emitted = Some(s);
                }
            }
        }
    }
}
