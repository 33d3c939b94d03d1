use std::net::Ipv4Addr;

use pnet::packet::Packet;
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::util::MacAddr;

use crate::{ARP_LEN, ETH_HDR_LEN, MIN_ETH_FRAME_NO_FCS, PacketError, ethernet};

/// Sender of an ARP reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpReply {
    pub sender_mac: MacAddr,
    pub sender_addr: Ipv4Addr,
}

/// Builds a broadcast "who-has `target_addr`" frame, padded to the minimum ethernet size.
pub fn create_request(src_mac: MacAddr, src_addr: Ipv4Addr, target_addr: Ipv4Addr) -> Result<Vec<u8>, PacketError> {
    let mut frame = vec![0u8; MIN_ETH_FRAME_NO_FCS];
    ethernet::make_header(&mut frame, src_mac, MacAddr::broadcast(), EtherTypes::Arp)?;
    request_payload(&mut frame, src_mac, src_addr, target_addr)?;
    Ok(frame)
}

pub fn request_payload(
    buffer: &mut [u8],
    src_mac: MacAddr,
    src_addr: Ipv4Addr,
    target_addr: Ipv4Addr,
) -> Result<(), PacketError> {
    if ETH_HDR_LEN + ARP_LEN > buffer.len() {
        return Err(PacketError::ArpBuffer);
    }
    let mut arp = MutableArpPacket::new(&mut buffer[ETH_HDR_LEN..ETH_HDR_LEN + ARP_LEN]).ok_or(PacketError::ArpBuffer)?;
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Request);
    arp.set_sender_hw_addr(src_mac);
    arp.set_target_hw_addr(MacAddr::zero());
    arp.set_sender_proto_addr(src_addr);
    arp.set_target_proto_addr(target_addr);
    Ok(())
}

/// Extracts the sender of an ARP reply frame; anything else yields `None`.
pub fn parse_reply(frame: &[u8]) -> Option<ArpReply> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Arp {
        return None;
    }
    let arp = ArpPacket::new(eth.payload())?;
    if arp.get_operation() != ArpOperations::Reply {
        return None;
    }
    Some(ArpReply {
        sender_mac: arp.get_sender_hw_addr(),
        sender_addr: arp.get_sender_proto_addr(),
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
