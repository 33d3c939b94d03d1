//! # Target Address Expressions
//!
//! Turns user supplied address text into an [`AddressSet`].
//!
//! Supported forms, freely mixed in a comma separated list:
//! * A single address (`192.168.1.5`).
//! * A dash range with a full or partial end (`192.168.1.1-50`, `10.0.0.1-10.0.0.3`, `10.0.0.1-1.5`).
//! * A CIDR block (`192.168.1.0/24`), network and broadcast addresses included.

use std::net::Ipv4Addr;

use crate::error::ScanError;
use crate::network::range::{self, AddressSet, Ipv4Range};

/// Parses an address expression into an ordered, duplicate free set.
pub fn parse_address_range(text: &str) -> Result<AddressSet, ScanError> {
    let mut ranges: Vec<Ipv4Range> = Vec::new();

    for part in text.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid(format!("empty address token in '{text}'")));
        }
        ranges.push(parse_token(part)?);
    }

    Ok(ranges.iter().flat_map(Ipv4Range::iter).collect())
}

fn parse_token(s: &str) -> Result<Ipv4Range, ScanError> {
    if let Some(range) = parse_cidr_range(s)? {
        return Ok(range);
    }
    if let Some(range) = parse_ip_range(s)? {
        return Ok(range);
    }

    let addr = s
        .parse::<Ipv4Addr>()
        .map_err(|e| invalid(format!("invalid address '{s}': {e}")))?;
    Ipv4Range::new(addr, addr)
}

/// Parses a range string like "1.1.1.1-2.2.2.2" or "1.1.1.1-50".
fn parse_ip_range(s: &str) -> Result<Option<Ipv4Range>, ScanError> {
    let Some((start_str, end_str)) = s.split_once('-') else {
        return Ok(None);
    };

    let start_addr = start_str
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| invalid(format!("invalid start address in range '{start_str}': {e}")))?;

    let end_addr = parse_range_end_addr(end_str.trim(), &start_addr, s)?;

    Ipv4Range::new(start_addr, end_addr).map(Some)
}

/// Parses the end of a dash range.
///
/// "50" after "192.168.1.1" means 192.168.1.50; missing leading octets are
/// taken from the start address.
fn parse_range_end_addr(end_str: &str, start_addr: &Ipv4Addr, original_s: &str) -> Result<Ipv4Addr, ScanError> {
    if let Ok(full_addr) = end_str.parse::<Ipv4Addr>() {
        return Ok(full_addr);
    }

    if end_str.is_empty() {
        return Err(invalid(format!("range end cannot be empty: {original_s}")));
    }

    let partial_octets: Vec<u8> = end_str
        .split('.')
        .map(|octet| octet.parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| invalid(format!("invalid range end '{end_str}': {e}")))?;

    if partial_octets.len() > 4 {
        return Err(invalid(format!("range end has too many octets: {end_str}")));
    }

    let mut end_octets = start_addr.octets();
    let start_index = 4 - partial_octets.len();
    end_octets[start_index..].copy_from_slice(&partial_octets);

    Ok(Ipv4Addr::from(end_octets))
}

/// Parses CIDR notation like "192.168.1.0/24".
fn parse_cidr_range(s: &str) -> Result<Option<Ipv4Range>, ScanError> {
    let Some((ip_str, prefix_str)) = s.split_once('/') else {
        return Ok(None);
    };

    let ipv4_addr = ip_str
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| invalid(format!("invalid address in CIDR '{ip_str}': {e}")))?;

    let prefix = prefix_str
        .trim()
        .parse::<u8>()
        .map_err(|e| invalid(format!("invalid prefix in CIDR '{prefix_str}': {e}")))?;

    range::cidr_range(ipv4_addr, prefix).map(Some)
}

fn invalid(msg: String) -> ScanError {
    ScanError::InvalidRange(msg)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
