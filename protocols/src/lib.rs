//! Packet crafting and parsing for the raw probing paths.
//!
//! Builders write into caller-independent `Vec<u8>` buffers and parsers take
//! plain byte slices, so nothing here needs a socket to be tested.

pub mod arp;
pub mod ethernet;
pub mod tcp;

use thiserror::Error;

pub const ETH_HDR_LEN: usize = 14;
pub const ARP_LEN: usize = 28;
pub const TCP_HDR_LEN: usize = 20;
pub const MIN_ETH_FRAME_NO_FCS: usize = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("buffer too small for an ethernet header")]
    EthernetBuffer,
    #[error("buffer too small for an ARP payload")]
    ArpBuffer,
    #[error("buffer too small for a TCP header")]
    TcpBuffer,
}
