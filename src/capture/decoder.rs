use etherparse::{NetHeaders, PacketHeaders, TransportHeader};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::DecodeError;
use super::packet::{PacketInfo, TcpFlags, PROTO_TCP, PROTO_UDP};

const IPV6_FIXED_HEADER: u32 = 40;
const UDP_HEADER: u32 = 8;

/// Framing of the captured bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Ethernet,
    /// Bare IPv4/IPv6 datagrams, no link header
    RawIp,
}

impl LinkKind {
    /// Maps a pcap `DLT_*`/`LINKTYPE_*` value.
    pub fn from_linktype(linktype: i32) -> Result<Self, DecodeError> {
        match linktype {
            1 => Ok(LinkKind::Ethernet),
            12 | 14 | 101 | 228 | 229 => Ok(LinkKind::RawIp),
            other => Err(DecodeError::UnsupportedLink(other)),
        }
    }
}

/// Extracts the packet record of one captured frame. `timestamp` is capture
/// time in microseconds.
pub fn decode_frame(timestamp: u64, link: LinkKind, data: &[u8]) -> Result<PacketInfo, DecodeError> {
    let parsed = match link {
        LinkKind::Ethernet => PacketHeaders::from_ethernet_slice(data),
        LinkKind::RawIp => PacketHeaders::from_ip_slice(data),
    }
    .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let (src_ip, dst_ip, ip_protocol, total_len, ip_header_len, dscp) = match &parsed.net {
        Some(NetHeaders::Ipv4(ipv4, _)) => (
            IpAddr::V4(Ipv4Addr::from(ipv4.source)),
            IpAddr::V4(Ipv4Addr::from(ipv4.destination)),
            ipv4.protocol.0,
            ipv4.total_len as u32,
            ipv4.header_len() as u32,
            ipv4.dscp.value(),
        ),
        Some(NetHeaders::Ipv6(ipv6, exts)) => (
            IpAddr::V6(Ipv6Addr::from(ipv6.source)),
            IpAddr::V6(Ipv6Addr::from(ipv6.destination)),
            ipv6.next_header.0,
            ipv6.payload_length as u32 + IPV6_FIXED_HEADER,
            IPV6_FIXED_HEADER + exts.header_len() as u32,
            ipv6.traffic_class >> 2,
        ),
        _ => return Err(DecodeError::NotIp),
    };

    let (protocol, src_port, dst_port, transport_header_len, tcp_flags) = match &parsed.transport {
        Some(TransportHeader::Tcp(tcp)) => {
            let flags = (tcp.cwr as u8) << 7
                | (tcp.ece as u8) << 6
                | (tcp.urg as u8) << 5
                | (tcp.ack as u8) << 4
                | (tcp.psh as u8) << 3
                | (tcp.rst as u8) << 2
                | (tcp.syn as u8) << 1
                | (tcp.fin as u8);
            (
                PROTO_TCP,
                tcp.source_port,
                tcp.destination_port,
                tcp.data_offset() as u32 * 4,
                TcpFlags(flags),
            )
        }
        Some(TransportHeader::Udp(udp)) => {
            (PROTO_UDP, udp.source_port, udp.destination_port, UDP_HEADER, TcpFlags::NONE)
        }
        // ICMP and anything else: no ports, the header counts as payload
        _ => (ip_protocol, 0, 0, 0, TcpFlags::NONE),
    };

    Ok(PacketInfo {
        timestamp,
        protocol,
        src_ip,
        dst_ip,
        src_port,
        dst_port,
        total_len,
        header_len: ip_header_len + transport_header_len,
        tcp_flags,
        dscp,
    })
}
