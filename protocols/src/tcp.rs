use std::net::{Ipv4Addr, SocketAddrV4};

use pnet::packet::Packet;
use pnet::packet::tcp::{self, MutableTcpPacket, TcpFlags, TcpPacket};

use crate::{PacketError, TCP_HDR_LEN};

const WINDOW_SIZE: u16 = 1024;
const EPHEMERAL_PORTS: std::ops::Range<u16> = 40000..60000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Syn,
    Rst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    SynAck,
    Reset,
    Other,
}

/// A segment received from a probed host, keyed by the remote end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReply {
    pub remote: SocketAddrV4,
    pub local_port: u16,
    pub kind: ReplyKind,
    pub sequence: u32,
    pub acknowledgement: u32,
}

impl ProbeReply {
    /// True when the reply acknowledges a SYN sent with `sequence`.
    pub fn acknowledges(&self, sequence: u32) -> bool {
        self.acknowledgement == sequence.wrapping_add(1)
    }
}

pub fn random_source_port() -> u16 {
    rand::random_range(EPHEMERAL_PORTS)
}

pub fn random_sequence() -> u32 {
    rand::random()
}

/// Builds a bare TCP header (no options, no payload) with a valid checksum.
pub fn build_segment(
    kind: SegmentKind,
    src: SocketAddrV4,
    dst: SocketAddrV4,
    sequence: u32,
) -> Result<Vec<u8>, PacketError> {
    let mut buffer = vec![0u8; TCP_HDR_LEN];
    let mut segment = MutableTcpPacket::new(&mut buffer).ok_or(PacketError::TcpBuffer)?;

    segment.set_source(src.port());
    segment.set_destination(dst.port());
    segment.set_sequence(sequence);
    segment.set_acknowledgement(0);
    segment.set_data_offset((TCP_HDR_LEN / 4) as u8);
    segment.set_window(WINDOW_SIZE);
    segment.set_urgent_ptr(0);
    match kind {
        SegmentKind::Syn => segment.set_flags(TcpFlags::SYN),
        SegmentKind::Rst => {
            segment.set_flags(TcpFlags::RST);
            segment.set_window(0);
        }
    }

    let checksum = tcp::ipv4_checksum(&segment.to_immutable(), src.ip(), dst.ip());
    segment.set_checksum(checksum);

    Ok(buffer)
}

pub fn classify_reply(segment: &TcpPacket) -> ReplyKind {
    let flags = segment.get_flags();
    if flags & TcpFlags::RST != 0 {
        ReplyKind::Reset
    } else if flags & TcpFlags::SYN != 0 && flags & TcpFlags::ACK != 0 {
        ReplyKind::SynAck
    } else {
        ReplyKind::Other
    }
}

/// Parses a TCP segment captured from `source`.
pub fn parse_reply(bytes: &[u8], source: Ipv4Addr) -> Option<ProbeReply> {
    let segment = TcpPacket::new(bytes)?;
    if segment.packet().len() < TCP_HDR_LEN {
        return None;
    }
    Some(ProbeReply {
        remote: SocketAddrV4::new(source, segment.get_source()),
        local_port: segment.get_destination(),
        kind: classify_reply(&segment),
        sequence: segment.get_sequence(),
        acknowledgement: segment.get_acknowledgement(),
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
