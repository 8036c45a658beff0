use serde::Serialize;

use super::expiry::ExpiryReason;
use super::key::FlowKey;

/// Bumped whenever a column is added, removed or reordered.
pub const SCHEMA_VERSION: u32 = 1;

/// One exported flow. Field order is the column order of the output.
///
/// Packet lengths are bytes, every timing column is seconds. Statistics of
/// a direction (or period kind) that saw no observations are all zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub srcip: String,
    pub srcport: u16,
    pub dstip: String,
    pub dstport: u16,
    pub proto: u8,

    pub total_fpackets: u64,
    pub total_fvolume: u64,
    pub total_bpackets: u64,
    pub total_bvolume: u64,

    pub min_fpktl: f64,
    pub mean_fpktl: f64,
    pub max_fpktl: f64,
    pub std_fpktl: f64,
    pub min_bpktl: f64,
    pub mean_bpktl: f64,
    pub max_bpktl: f64,
    pub std_bpktl: f64,

    pub min_fiat: f64,
    pub mean_fiat: f64,
    pub max_fiat: f64,
    pub std_fiat: f64,
    pub min_biat: f64,
    pub mean_biat: f64,
    pub max_biat: f64,
    pub std_biat: f64,

    pub duration: f64,

    pub min_active: f64,
    pub mean_active: f64,
    pub max_active: f64,
    pub std_active: f64,
    pub min_idle: f64,
    pub mean_idle: f64,
    pub max_idle: f64,
    pub std_idle: f64,

    // Mean packets/bytes per active period
    pub sflow_fpackets: f64,
    pub sflow_fbytes: f64,
    pub sflow_bpackets: f64,
    pub sflow_bbytes: f64,

    pub fpsh_cnt: u64,
    pub bpsh_cnt: u64,
    pub furg_cnt: u64,
    pub burg_cnt: u64,

    pub total_fhlen: u64,
    pub total_bhlen: u64,

    pub dscp: u8,
}

impl FeatureVector {
    pub const HEADER: [&'static str; 45] = [
        "srcip", "srcport", "dstip", "dstport", "proto",
        "total_fpackets", "total_fvolume", "total_bpackets", "total_bvolume",
        "min_fpktl", "mean_fpktl", "max_fpktl", "std_fpktl",
        "min_bpktl", "mean_bpktl", "max_bpktl", "std_bpktl",
        "min_fiat", "mean_fiat", "max_fiat", "std_fiat",
        "min_biat", "mean_biat", "max_biat", "std_biat",
        "duration",
        "min_active", "mean_active", "max_active", "std_active",
        "min_idle", "mean_idle", "max_idle", "std_idle",
        "sflow_fpackets", "sflow_fbytes", "sflow_bpackets", "sflow_bbytes",
        "fpsh_cnt", "bpsh_cnt", "furg_cnt", "burg_cnt",
        "total_fhlen", "total_bhlen",
        "dscp",
    ];
}

/// A finalized flow on its way to the export boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedFlow {
    pub key: FlowKey,
    pub features: FeatureVector,
    pub reason: ExpiryReason,
    pub valid: bool,
}
