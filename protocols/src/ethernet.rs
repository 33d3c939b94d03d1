use pnet::packet::ethernet::{EtherType, MutableEthernetPacket};
use pnet::util::MacAddr;

use crate::PacketError;

pub fn make_header(buffer: &mut [u8], src_mac: MacAddr, dst_mac: MacAddr, et: EtherType) -> Result<(), PacketError> {
    let mut eth = MutableEthernetPacket::new(buffer).ok_or(PacketError::EthernetBuffer)?;
    eth.set_source(src_mac);
    eth.set_destination(dst_mac);
    eth.set_ethertype(et);
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
