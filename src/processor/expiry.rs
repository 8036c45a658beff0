use serde::Serialize;
use std::fmt;

use crate::config::FlowConfig;

use super::flow::{Flow, FlowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    /// Both endpoints sent FIN and saw it acknowledged
    TcpClose,
    Reset,
    /// Closing and quiet for longer than the closing grace
    ClosingGrace,
    IdleTimeout,
    MaxDuration,
    EndOfInput,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpiryReason::TcpClose => "tcp_close",
            ExpiryReason::Reset => "reset",
            ExpiryReason::ClosingGrace => "closing_grace",
            ExpiryReason::IdleTimeout => "idle_timeout",
            ExpiryReason::MaxDuration => "max_duration",
            ExpiryReason::EndOfInput => "end_of_input",
        };
        f.write_str(s)
    }
}

/// Time-based expiry rules, evaluated against capture timestamps.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    idle_timeout_us: u64,
    max_duration_us: u64,
    closing_grace_us: u64,
    sweep_interval_us: u64,
}

impl ExpiryPolicy {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            idle_timeout_us: config.idle_timeout_us(),
            max_duration_us: config.max_flow_duration_us(),
            closing_grace_us: config.closing_grace_us(),
            sweep_interval_us: config.sweep_interval_us(),
        }
    }

    /// Whether `flow` is already over at `now`.
    ///
    /// Used both before a packet is applied to its flow (a stale flow is
    /// finalized and the packet opens a fresh one) and by the periodic sweep.
    pub fn check(&self, flow: &Flow, now: u64) -> Option<ExpiryReason> {
        // Grace counts from the last packet, a peer may keep sending after a FIN
        if let FlowState::Closing { since } = flow.state() {
            if now.saturating_sub(since.max(flow.last_seen())) > self.closing_grace_us {
                return Some(ExpiryReason::ClosingGrace);
            }
        }
        if flow.idle_for(now) > self.idle_timeout_us {
            return Some(ExpiryReason::IdleTimeout);
        }
        if flow.age(now) > self.max_duration_us {
            return Some(ExpiryReason::MaxDuration);
        }
        None
    }

    /// Whether a sweep is due at `now` given the previous sweep time.
    pub fn sweep_due(&self, last_sweep: Option<u64>, now: u64) -> bool {
        match last_sweep {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.sweep_interval_us,
        }
    }
}
