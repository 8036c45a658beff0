use anyhow::{bail, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const MICROS_PER_SEC: f64 = 1_000_000.0;

/// Thresholds that drive flow aggregation. All values are seconds of capture
/// time, never wall-clock time.
#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FlowConfig {
    /// Gap that separates two active periods of the same flow
    #[arg(long = "activity-threshold", default_value_t = 1.0, value_name = "SECS")]
    pub activity_threshold_secs: f64,

    /// Inactivity after which a flow is expired
    #[arg(long = "idle-timeout", default_value_t = 600.0, value_name = "SECS")]
    pub idle_timeout_secs: f64,

    /// Hard cap on a flow's lifetime
    #[arg(long = "max-duration", default_value_t = 3600.0, value_name = "SECS")]
    pub max_flow_duration_secs: f64,

    /// How long a half-closed TCP flow waits for the peer's FIN
    #[arg(long = "closing-grace", default_value_t = 2.0, value_name = "SECS")]
    pub closing_grace_secs: f64,

    /// Capture-time spacing of expiry sweeps over the flow table
    #[arg(long = "sweep-interval", default_value_t = 1.0, value_name = "SECS")]
    pub sweep_interval_secs: f64,

    /// Drop flows that never became a valid connection
    #[arg(long = "valid-only")]
    pub valid_only: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            activity_threshold_secs: 1.0,
            idle_timeout_secs: 600.0,
            max_flow_duration_secs: 3600.0,
            closing_grace_secs: 2.0,
            sweep_interval_secs: 1.0,
            valid_only: false,
        }
    }
}

#[inline]
fn to_micros(secs: f64) -> u64 {
    (secs * MICROS_PER_SEC).round() as u64
}

impl FlowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: FlowConfig = serde_json::from_str(&s)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("activity_threshold_secs", self.activity_threshold_secs),
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("max_flow_duration_secs", self.max_flow_duration_secs),
            ("closing_grace_secs", self.closing_grace_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                bail!("{name} must be a finite, non-negative number of seconds (got {value})");
            }
        }
        if self.idle_timeout_secs == 0.0 {
            bail!("idle_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn activity_threshold_us(&self) -> u64 { to_micros(self.activity_threshold_secs) }

    pub fn idle_timeout_us(&self) -> u64 { to_micros(self.idle_timeout_secs) }

    pub fn max_flow_duration_us(&self) -> u64 { to_micros(self.max_flow_duration_secs) }

    pub fn closing_grace_us(&self) -> u64 { to_micros(self.closing_grace_secs) }

    pub fn sweep_interval_us(&self) -> u64 { to_micros(self.sweep_interval_secs) }
}
