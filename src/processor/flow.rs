use crate::capture::{PacketInfo, PROTO_TCP, PROTO_UDP};
use crate::error::{FlowError, FlowResult};

use super::activity::ActivityTracker;
use super::expiry::ExpiryReason;
use super::features::{FeatureVector, FinishedFlow};
use super::key::{self, Endpoint, FlowDirection, FlowKey};
use super::stats::RunningStats;
use super::tcp_state::TcpTracker;

const MICROS_PER_SEC: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Open,
    /// FIN seen from one endpoint at `since`
    Closing { since: u64 },
    Terminated,
}

/// What the caller has to do after feeding a packet to a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Continue,
    Terminate(ExpiryReason),
}

#[derive(Debug, Clone, Default)]
struct DirectionStats {
    packets: u64,
    bytes: u64,
    header_bytes: u64,
    psh: u64,
    urg: u64,
    packet_len: RunningStats,
    iat: RunningStats,                          // microseconds
    last_seen: Option<u64>,
}

impl DirectionStats {
    fn observe(&mut self, pkt: &PacketInfo) {
        self.packets += 1;
        self.bytes += pkt.total_len as u64;
        self.header_bytes += pkt.header_len as u64;
        self.packet_len.observe(pkt.total_len as f64);

        if let Some(prev) = self.last_seen {
            self.iat.observe(pkt.timestamp.saturating_sub(prev) as f64);
        }
        self.last_seen = Some(self.last_seen.map_or(pkt.timestamp, |prev| prev.max(pkt.timestamp)));
    }
}

/// Per-protocol state. Flag bits only count for TCP flows.
#[derive(Debug, Clone)]
enum ProtocolState {
    Tcp(TcpTracker),
    Udp { has_data: bool },
    Other,
}

impl ProtocolState {
    fn for_protocol(protocol: u8) -> Self {
        match protocol {
            PROTO_TCP => ProtocolState::Tcp(TcpTracker::new()),
            PROTO_UDP => ProtocolState::Udp { has_data: false },
            _ => ProtocolState::Other,
        }
    }
}

/// One bidirectional conversation from its first packet to finalization.
#[derive(Debug, Clone)]
pub struct Flow {
    key: FlowKey,
    origin: Endpoint,
    responder: Endpoint,
    state: FlowState,

    first_seen: u64,
    last_seen: u64,
    dscp: u8,

    fwd: DirectionStats,
    bwd: DirectionStats,
    activity: ActivityTracker,
    proto: ProtocolState,
}

impl Flow {
    /// Empty flow owned by the sender of `first`. The packet itself still has
    /// to be applied with [`Flow::update`].
    pub fn new(first: &PacketInfo, activity_threshold_us: u64) -> Self {
        Self {
            key: FlowKey::from_packet(first),
            origin: key::source(first),
            responder: key::destination(first),
            state: FlowState::Open,
            first_seen: first.timestamp,
            last_seen: first.timestamp,
            dscp: first.dscp,
            fwd: DirectionStats::default(),
            bwd: DirectionStats::default(),
            activity: ActivityTracker::new(activity_threshold_us),
            proto: ProtocolState::for_protocol(first.protocol),
        }
    }

    #[inline]
    pub fn key(&self) -> &FlowKey { &self.key }

    #[inline]
    pub fn state(&self) -> FlowState { self.state }

    #[inline]
    pub fn first_seen(&self) -> u64 { self.first_seen }

    #[inline]
    pub fn last_seen(&self) -> u64 { self.last_seen }

    pub fn packet_count(&self) -> u64 { self.fwd.packets + self.bwd.packets }

    pub fn idle_for(&self, now: u64) -> u64 { now.saturating_sub(self.last_seen) }

    pub fn age(&self, now: u64) -> u64 { now.saturating_sub(self.first_seen) }

    pub fn direction(&self, pkt: &PacketInfo) -> FlowDirection {
        key::direction_of(pkt, &self.origin)
    }

    fn side_mut(&mut self, dir: FlowDirection) -> &mut DirectionStats {
        match dir {
            FlowDirection::Forward => &mut self.fwd,
            FlowDirection::Backward => &mut self.bwd,
        }
    }

    pub fn update(&mut self, pkt: &PacketInfo) -> FlowResult<UpdateOutcome> {
        if self.state == FlowState::Terminated {
            return Err(FlowError::UpdateAfterTerminate { key: self.key });
        }

        let dir = self.direction(pkt);
        if self.packet_count() == 0 {
            self.first_seen = pkt.timestamp;
            self.last_seen = pkt.timestamp;
            self.dscp = pkt.dscp;
        }

        self.side_mut(dir).observe(pkt);
        self.activity.observe(pkt.timestamp);
        self.last_seen = self.last_seen.max(pkt.timestamp);

        let flags = pkt.tcp_flags;
        let has_payload = pkt.has_payload();
        let closed = match &mut self.proto {
            ProtocolState::Tcp(tracker) => {
                tracker.update(flags, dir, has_payload);
                tracker.both_closed()
            }
            ProtocolState::Udp { has_data } => {
                *has_data |= has_payload;
                return Ok(UpdateOutcome::Continue);
            }
            ProtocolState::Other => return Ok(UpdateOutcome::Continue),
        };

        // TCP only from here on
        let side = self.side_mut(dir);
        if flags.psh() { side.psh += 1; }
        if flags.urg() { side.urg += 1; }

        if flags.rst() {
            return Ok(UpdateOutcome::Terminate(ExpiryReason::Reset));
        }
        // Both ends sent FIN and had it acknowledged; the last ACK belongs here
        if closed {
            return Ok(UpdateOutcome::Terminate(ExpiryReason::TcpClose));
        }
        if flags.fin() && self.state == FlowState::Open {
            self.state = FlowState::Closing { since: pkt.timestamp };
        }
        Ok(UpdateOutcome::Continue)
    }

    /// Whether this flow looks like a real conversation rather than a scan
    /// or a one-sided stub.
    pub fn is_valid(&self) -> bool {
        match &self.proto {
            ProtocolState::Tcp(tracker) => tracker.is_valid(),
            ProtocolState::Udp { has_data } => *has_data && self.bwd.packets > 0,
            ProtocolState::Other => self.bwd.packets > 0,
        }
    }

    /// Closes the flow and computes its feature vector. A flow can only be
    /// finalized once.
    pub fn finalize(&mut self, reason: ExpiryReason) -> FlowResult<FinishedFlow> {
        if self.state == FlowState::Terminated {
            return Err(FlowError::AlreadyFinalized { key: self.key });
        }
        self.activity.finalize(self.last_seen);
        self.state = FlowState::Terminated;

        Ok(FinishedFlow {
            key: self.key,
            features: self.features(),
            reason,
            valid: self.is_valid(),
        })
    }

    fn features(&self) -> FeatureVector {
        let fpktl = self.fwd.packet_len.snapshot();
        let bpktl = self.bwd.packet_len.snapshot();
        let fiat = self.fwd.iat.snapshot().in_units(MICROS_PER_SEC);
        let biat = self.bwd.iat.snapshot().in_units(MICROS_PER_SEC);
        let active = self.activity.active().snapshot().in_units(MICROS_PER_SEC);
        let idle = self.activity.idle().snapshot().in_units(MICROS_PER_SEC);

        let periods = self.activity.active().count().max(1) as f64;

        FeatureVector {
            srcip: self.origin.ip.to_string(),
            srcport: self.origin.port,
            dstip: self.responder.ip.to_string(),
            dstport: self.responder.port,
            proto: self.key.protocol,

            total_fpackets: self.fwd.packets,
            total_fvolume: self.fwd.bytes,
            total_bpackets: self.bwd.packets,
            total_bvolume: self.bwd.bytes,

            min_fpktl: fpktl.min,
            mean_fpktl: fpktl.mean,
            max_fpktl: fpktl.max,
            std_fpktl: fpktl.std,
            min_bpktl: bpktl.min,
            mean_bpktl: bpktl.mean,
            max_bpktl: bpktl.max,
            std_bpktl: bpktl.std,

            min_fiat: fiat.min,
            mean_fiat: fiat.mean,
            max_fiat: fiat.max,
            std_fiat: fiat.std,
            min_biat: biat.min,
            mean_biat: biat.mean,
            max_biat: biat.max,
            std_biat: biat.std,

            duration: (self.last_seen - self.first_seen) as f64 / MICROS_PER_SEC,

            min_active: active.min,
            mean_active: active.mean,
            max_active: active.max,
            std_active: active.std,
            min_idle: idle.min,
            mean_idle: idle.mean,
            max_idle: idle.max,
            std_idle: idle.std,

            sflow_fpackets: self.fwd.packets as f64 / periods,
            sflow_fbytes: self.fwd.bytes as f64 / periods,
            sflow_bpackets: self.bwd.packets as f64 / periods,
            sflow_bbytes: self.bwd.bytes as f64 / periods,

            fpsh_cnt: self.fwd.psh,
            bpsh_cnt: self.bwd.psh,
            furg_cnt: self.fwd.urg,
            burg_cnt: self.bwd.urg,

            total_fhlen: self.fwd.header_bytes,
            total_bhlen: self.bwd.header_bytes,

            dscp: self.dscp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{TcpFlags, PROTO_ICMP};
    use std::net::{IpAddr, Ipv4Addr};

    const SEC: u64 = 1_000_000;
    const A: [u8; 4] = [10, 0, 0, 1];
    const B: [u8; 4] = [10, 0, 0, 2];

    fn packet(ts: u64, from_a: bool, proto: u8, len: u32, flags: u8) -> PacketInfo {
        let (src, dst, sport, dport) = if from_a { (A, B, 40000, 80) } else { (B, A, 80, 40000) };
        PacketInfo {
            timestamp: ts,
            protocol: proto,
            src_ip: IpAddr::V4(Ipv4Addr::from(src)),
            dst_ip: IpAddr::V4(Ipv4Addr::from(dst)),
            src_port: sport,
            dst_port: dport,
            total_len: len,
            header_len: 40,
            tcp_flags: TcpFlags(flags),
            dscp: if from_a { 46 } else { 10 },
        }
    }

    fn feed(packets: &[PacketInfo]) -> (Flow, Vec<UpdateOutcome>) {
        let mut flow = Flow::new(&packets[0], SEC);
        let outcomes = packets.iter().map(|p| flow.update(p).unwrap()).collect();
        (flow, outcomes)
    }

    #[test]
    fn counts_split_by_direction() {
        let (mut flow, _) = feed(&[
            packet(0, true, PROTO_TCP, 100, TcpFlags::ACK),
            packet(10, false, PROTO_TCP, 300, TcpFlags::ACK | TcpFlags::PSH),
            packet(20, true, PROTO_TCP, 200, TcpFlags::ACK | TcpFlags::URG),
        ]);
        let f = flow.finalize(ExpiryReason::EndOfInput).unwrap().features;
        assert_eq!((f.total_fpackets, f.total_bpackets), (2, 1));
        assert_eq!((f.total_fvolume, f.total_bvolume), (300, 300));
        assert_eq!((f.min_fpktl, f.max_fpktl, f.mean_fpktl), (100.0, 200.0, 150.0));
        assert_eq!(f.std_fpktl, 50.0);
        assert_eq!((f.fpsh_cnt, f.bpsh_cnt, f.furg_cnt, f.burg_cnt), (0, 1, 1, 0));
        assert_eq!((f.total_fhlen, f.total_bhlen), (80, 40));
    }

    #[test]
    fn inter_arrival_is_per_direction() {
        let (mut flow, _) = feed(&[
            packet(0, true, PROTO_UDP, 60, 0),
            packet(SEC / 2, false, PROTO_UDP, 60, 0),
            packet(SEC, true, PROTO_UDP, 60, 0),
            packet(3 * SEC / 2, true, PROTO_UDP, 60, 0),
        ]);
        let f = flow.finalize(ExpiryReason::EndOfInput).unwrap().features;
        assert_eq!(f.min_fiat, 0.5);
        assert_eq!(f.max_fiat, 1.0);
        assert_eq!(f.mean_fiat, 0.75);
        // Only one backward packet, no backward gap
        assert_eq!((f.min_biat, f.mean_biat, f.max_biat, f.std_biat), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn unidirectional_flow_has_zero_backward_stats() {
        let (mut flow, _) = feed(&[
            packet(0, true, PROTO_UDP, 80, 0),
            packet(SEC, true, PROTO_UDP, 120, 0),
        ]);
        let finished = flow.finalize(ExpiryReason::IdleTimeout).unwrap();
        let f = finished.features;
        assert_eq!(f.total_bpackets, 0);
        assert_eq!((f.min_bpktl, f.mean_bpktl, f.max_bpktl, f.std_bpktl), (0.0, 0.0, 0.0, 0.0));
        assert_eq!(f.total_bhlen, 0);
        assert!(!finished.valid);
    }

    #[test]
    fn dscp_comes_from_first_packet() {
        let (mut flow, _) = feed(&[
            packet(0, true, PROTO_UDP, 80, 0),
            packet(5, false, PROTO_UDP, 80, 0),
        ]);
        assert_eq!(flow.finalize(ExpiryReason::EndOfInput).unwrap().features.dscp, 46);
    }

    #[test]
    fn flags_ignored_outside_tcp() {
        let (mut flow, outcomes) = feed(&[
            packet(0, true, PROTO_UDP, 80, TcpFlags::PSH | TcpFlags::FIN),
            packet(5, false, PROTO_UDP, 80, TcpFlags::RST | TcpFlags::URG),
        ]);
        assert!(outcomes.iter().all(|o| *o == UpdateOutcome::Continue));
        assert_eq!(flow.state(), FlowState::Open);
        let f = flow.finalize(ExpiryReason::EndOfInput).unwrap().features;
        assert_eq!((f.fpsh_cnt, f.bpsh_cnt, f.furg_cnt, f.burg_cnt), (0, 0, 0, 0));
    }

    #[test]
    fn close_waits_for_last_ack() {
        let (flow, outcomes) = feed(&[
            packet(0, true, PROTO_TCP, 40, TcpFlags::ACK),
            packet(1, true, PROTO_TCP, 40, TcpFlags::FIN | TcpFlags::ACK),
            packet(2, false, PROTO_TCP, 40, TcpFlags::FIN | TcpFlags::ACK),
            packet(3, true, PROTO_TCP, 40, TcpFlags::ACK),
        ]);
        assert_eq!(outcomes[1], UpdateOutcome::Continue);
        // FIN both ways, but the server's FIN is not acknowledged yet
        assert_eq!(outcomes[2], UpdateOutcome::Continue);
        assert_eq!(outcomes[3], UpdateOutcome::Terminate(ExpiryReason::TcpClose));
        assert_eq!(flow.state(), FlowState::Closing { since: 1 });
        assert_eq!(flow.packet_count(), 4);
    }

    #[test]
    fn repeated_fin_from_one_side_stays_closing() {
        let (flow, outcomes) = feed(&[
            packet(0, true, PROTO_TCP, 40, TcpFlags::FIN),
            packet(7, true, PROTO_TCP, 40, TcpFlags::FIN),
        ]);
        assert!(outcomes.iter().all(|o| *o == UpdateOutcome::Continue));
        assert_eq!(flow.state(), FlowState::Closing { since: 0 });
    }

    #[test]
    fn reset_terminates_from_open() {
        let (_, outcomes) = feed(&[
            packet(0, true, PROTO_TCP, 40, TcpFlags::SYN),
            packet(1, false, PROTO_TCP, 40, TcpFlags::RST | TcpFlags::ACK),
        ]);
        assert_eq!(outcomes[1], UpdateOutcome::Terminate(ExpiryReason::Reset));
    }

    #[test]
    fn finalize_twice_is_a_defect() {
        let (mut flow, _) = feed(&[packet(0, true, PROTO_ICMP, 84, 0)]);
        assert!(flow.finalize(ExpiryReason::EndOfInput).is_ok());
        assert_eq!(
            flow.finalize(ExpiryReason::EndOfInput),
            Err(FlowError::AlreadyFinalized { key: *flow.key() })
        );
        let late = packet(1, true, PROTO_ICMP, 84, 0);
        assert_eq!(
            flow.update(&late),
            Err(FlowError::UpdateAfterTerminate { key: *flow.key() })
        );
    }

    #[test]
    fn subflow_means_use_active_periods() {
        let (mut flow, _) = feed(&[
            packet(0, true, PROTO_UDP, 100, 0),
            packet(100, false, PROTO_UDP, 50, 0),
            packet(10 * SEC, true, PROTO_UDP, 100, 0),
            packet(10 * SEC + 100, false, PROTO_UDP, 50, 0),
        ]);
        let f = flow.finalize(ExpiryReason::EndOfInput).unwrap().features;
        assert_eq!(f.mean_active, 0.0001);
        assert_eq!((f.sflow_fpackets, f.sflow_fbytes), (1.0, 100.0));
        assert_eq!((f.sflow_bpackets, f.sflow_bbytes), (1.0, 50.0));
        assert_eq!(f.min_idle, 9.9999);
    }

    #[test]
    fn handshake_and_payload_mark_tcp_valid() {
        let (flow, _) = feed(&[
            packet(0, true, PROTO_TCP, 40, TcpFlags::SYN),
            packet(1, false, PROTO_TCP, 40, TcpFlags::SYN | TcpFlags::ACK),
            packet(2, true, PROTO_TCP, 40, TcpFlags::ACK),
            packet(3, true, PROTO_TCP, 540, TcpFlags::ACK | TcpFlags::PSH),
        ]);
        assert!(flow.is_valid());
    }
}
