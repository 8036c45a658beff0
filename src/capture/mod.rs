mod decoder;
mod packet;
mod reader;

pub use decoder::{decode_frame, LinkKind};
pub use packet::{PacketInfo, TcpFlags, PROTO_ICMP, PROTO_TCP, PROTO_UDP};
pub use reader::PcapReader;
