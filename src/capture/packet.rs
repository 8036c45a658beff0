use std::fmt;
use std::net::IpAddr;

pub const PROTO_ICMP: u8 = 1;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// TCP control bits in wire order (FIN is the low bit).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TcpFlags(pub u8);

impl TcpFlags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
    pub const ECE: u8 = 0x40;
    pub const CWR: u8 = 0x80;

    pub const NONE: TcpFlags = TcpFlags(0);

    #[inline]
    pub fn has(self, mask: u8) -> bool { self.0 & mask == mask }

    pub fn fin(self) -> bool { self.has(Self::FIN) }
    pub fn syn(self) -> bool { self.has(Self::SYN) }
    pub fn rst(self) -> bool { self.has(Self::RST) }
    pub fn psh(self) -> bool { self.has(Self::PSH) }
    pub fn ack(self) -> bool { self.has(Self::ACK) }
    pub fn urg(self) -> bool { self.has(Self::URG) }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u8, char); 8] = [
            (TcpFlags::FIN, 'F'), (TcpFlags::SYN, 'S'), (TcpFlags::RST, 'R'), (TcpFlags::PSH, 'P'),
            (TcpFlags::ACK, 'A'), (TcpFlags::URG, 'U'), (TcpFlags::ECE, 'E'), (TcpFlags::CWR, 'C'),
        ];
        for (mask, c) in NAMES {
            if self.has(mask) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// One decoded packet, as handed from the reader to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketInfo {
    pub timestamp: u64,                         // microseconds, capture time
    pub protocol: u8,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub total_len: u32,                         // IP total length
    pub header_len: u32,                        // IP + transport header
    pub tcp_flags: TcpFlags,
    pub dscp: u8,
}

impl PacketInfo {
    #[inline]
    pub fn has_payload(&self) -> bool {
        self.total_len > self.header_len
    }
}
