pub mod feature_processor;
mod engine;
mod publisher;
mod activity;
mod expiry;
mod features;
mod flow;
mod flow_table;
mod key;
mod stats;
mod tcp_state;

pub use feature_processor::FeatureProcessor;
pub use engine::{processing_loop, FlowEngine};
pub use activity::ActivityTracker;
pub use expiry::{ExpiryPolicy, ExpiryReason};
pub use features::{FeatureVector, FinishedFlow, SCHEMA_VERSION};
pub use flow::{Flow, FlowState, UpdateOutcome};
pub use flow_table::FlowTable;
pub use key::{resolve, Endpoint, FlowDirection, FlowKey};
pub use stats::{RunningStats, StatsSnapshot};
pub use tcp_state::{ConnState, TcpTracker};
