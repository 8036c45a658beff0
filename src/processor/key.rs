use std::fmt;
use std::net::IpAddr;

use crate::capture::PacketInfo;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{ip}:{}", self.port),
            IpAddr::V6(ip) => write!(f, "[{ip}]:{}", self.port),
        }
    }
}

/// Direction-agnostic identity of a conversation.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FlowKey {
    pub lo: Endpoint,
    pub hi: Endpoint,
    pub protocol: u8,
}

impl FlowKey {
    pub fn new(src: Endpoint, dst: Endpoint, protocol: u8) -> Self {
        // Normalize flow key so both directions map to the same entry
        if src <= dst {
            Self { lo: src, hi: dst, protocol }
        } else {
            Self { lo: dst, hi: src, protocol }
        }
    }

    pub fn from_packet(pkt: &PacketInfo) -> Self {
        Self::new(source(pkt), destination(pkt), pkt.protocol)
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {} proto {}", self.lo, self.hi, self.protocol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowDirection { Forward, Backward }

#[inline]
pub fn source(pkt: &PacketInfo) -> Endpoint {
    Endpoint::new(pkt.src_ip, pkt.src_port)
}

#[inline]
pub fn destination(pkt: &PacketInfo) -> Endpoint {
    Endpoint::new(pkt.dst_ip, pkt.dst_port)
}

/// Direction of `pkt` relative to a flow whose first packet was sent by `origin`.
pub fn direction_of(pkt: &PacketInfo, origin: &Endpoint) -> FlowDirection {
    if source(pkt) == *origin {
        FlowDirection::Forward
    } else {
        FlowDirection::Backward
    }
}

/// Resolves the canonical key for `pkt` and whether it travels forward.
///
/// `origin` is the source endpoint of the existing flow's first packet, or
/// `None` for a packet that will open a new flow (always forward).
pub fn resolve(pkt: &PacketInfo, origin: Option<&Endpoint>) -> (FlowKey, bool) {
    let key = FlowKey::from_packet(pkt);
    let is_forward = match origin {
        Some(origin) => direction_of(pkt, origin) == FlowDirection::Forward,
        None => true,
    };
    (key, is_forward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TcpFlags;
    use std::net::Ipv4Addr;

    fn pkt(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16) -> PacketInfo {
        PacketInfo {
            timestamp: 0,
            protocol: 17,
            src_ip: IpAddr::V4(Ipv4Addr::from(src)),
            dst_ip: IpAddr::V4(Ipv4Addr::from(dst)),
            src_port: sport,
            dst_port: dport,
            total_len: 60,
            header_len: 28,
            tcp_flags: TcpFlags::NONE,
            dscp: 0,
        }
    }

    #[test]
    fn swapped_endpoints_share_a_key() {
        let a = pkt([10, 0, 0, 2], 5000, [10, 0, 0, 1], 53);
        let b = pkt([10, 0, 0, 1], 53, [10, 0, 0, 2], 5000);
        assert_eq!(FlowKey::from_packet(&a), FlowKey::from_packet(&b));
    }

    #[test]
    fn protocol_separates_keys() {
        let a = pkt([10, 0, 0, 2], 5000, [10, 0, 0, 1], 53);
        let mut b = a.clone();
        b.protocol = 6;
        assert_ne!(FlowKey::from_packet(&a), FlowKey::from_packet(&b));
    }

    #[test]
    fn same_host_different_ports_are_ordered_by_port() {
        let a = pkt([10, 0, 0, 1], 9000, [10, 0, 0, 1], 80);
        let key = FlowKey::from_packet(&a);
        assert_eq!(key.lo.port, 80);
        assert_eq!(key.hi.port, 9000);
    }

    #[test]
    fn first_packet_is_forward_and_reply_is_backward() {
        let first = pkt([192, 168, 1, 9], 40000, [1, 1, 1, 1], 443);
        let (key, fwd) = resolve(&first, None);
        assert!(fwd);

        let origin = source(&first);
        let reply = pkt([1, 1, 1, 1], 443, [192, 168, 1, 9], 40000);
        let (reply_key, reply_fwd) = resolve(&reply, Some(&origin));
        assert_eq!(key, reply_key);
        assert!(!reply_fwd);

        // Origin decides, not address ordering
        let (_, again) = resolve(&first, Some(&origin));
        assert!(again);
    }
}
