use std::collections::hash_map::{Entry, Values};
use std::collections::HashMap;

use crate::capture::PacketInfo;

use super::flow::Flow;
use super::key::FlowKey;

/// Live flows by canonical key. Owned by exactly one engine.
#[derive(Debug, Default)]
pub struct FlowTable {
    flows: HashMap<FlowKey, Flow>,
    activity_threshold_us: u64,
}

impl FlowTable {
    pub fn new(activity_threshold_us: u64) -> Self {
        Self { flows: HashMap::new(), activity_threshold_us }
    }

    /// Returns the live flow for `key`, creating it from `pkt` if there is
    /// none. The flag is `true` when the flow was just created.
    pub fn lookup_or_create(&mut self, key: FlowKey, pkt: &PacketInfo) -> (&mut Flow, bool) {
        match self.flows.entry(key) {
            Entry::Occupied(e) => (e.into_mut(), false),
            Entry::Vacant(e) => (e.insert(Flow::new(pkt, self.activity_threshold_us)), true),
        }
    }

    pub fn get(&self, key: &FlowKey) -> Option<&Flow> {
        self.flows.get(key)
    }

    /// Removing an absent key is a no-op.
    pub fn remove(&mut self, key: &FlowKey) -> Option<Flow> {
        self.flows.remove(key)
    }

    /// Live flows in no particular order. Each call starts a fresh pass.
    pub fn iter(&self) -> Values<'_, FlowKey, Flow> {
        self.flows.values()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Flow> + '_ {
        self.flows.drain().map(|(_, flow)| flow)
    }

    pub fn len(&self) -> usize { self.flows.len() }

    pub fn is_empty(&self) -> bool { self.flows.is_empty() }
}
