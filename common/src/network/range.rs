use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;

use crate::error::ScanError;

/// Inclusive range of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Result<Self, ScanError> {
        if u32::from(end_addr) < u32::from(start_addr) {
            return Err(ScanError::InvalidRange(format!(
                "range end {end_addr} is lower than start {start_addr}"
            )));
        }
        Ok(Self { start_addr, end_addr })
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Ipv4Addr> + Clone {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(Ipv4Addr::from)
    }

    pub fn len(&self) -> usize {
        (u32::from(self.end_addr) - u32::from(self.start_addr)) as usize + 1
    }
}

/// Range covering a whole CIDR block, network and broadcast addresses included.
pub fn cidr_range(ip: Ipv4Addr, prefix: u8) -> Result<Ipv4Range, ScanError> {
    let network = Ipv4Network::new(ip, prefix)
        .map_err(|e| ScanError::InvalidRange(format!("{ip}/{prefix}: {e}")))?;
    Ipv4Range::new(network.network(), network.broadcast())
}

/// Ascending, duplicate free sequence of target addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSet {
    addrs: Vec<Ipv4Addr>,
}

impl AddressSet {
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn first(&self) -> Option<Ipv4Addr> {
        self.addrs.first().copied()
    }

    pub fn contains(&self, addr: &Ipv4Addr) -> bool {
        self.addrs.binary_search(addr).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ipv4Addr> {
        self.addrs.iter()
    }

    pub fn as_slice(&self) -> &[Ipv4Addr] {
        &self.addrs
    }

    /// Keeps the addresses matching `keep`, preserving order.
    pub fn filter(&self, mut keep: impl FnMut(&Ipv4Addr) -> bool) -> AddressSet {
        Self {
            addrs: self.addrs.iter().copied().filter(|addr| keep(addr)).collect(),
        }
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.addrs.iter().map(Ipv4Addr::to_string).collect()
    }
}

impl FromIterator<Ipv4Addr> for AddressSet {
    fn from_iter<T: IntoIterator<Item = Ipv4Addr>>(iter: T) -> Self {
        let unique: BTreeSet<Ipv4Addr> = iter.into_iter().collect();
        Self {
            addrs: unique.into_iter().collect(),
        }
    }
}

impl IntoIterator for AddressSet {
    type Item = Ipv4Addr;
    type IntoIter = std::vec::IntoIter<Ipv4Addr>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.into_iter()
    }
}

impl<'a> IntoIterator for &'a AddressSet {
    type Item = &'a Ipv4Addr;
    type IntoIter = std::slice::Iter<'a, Ipv4Addr>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.iter()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_range_basic_24() {
        let range = cidr_range(Ipv4Addr::new(192, 168, 1, 42), 24).unwrap();
        assert_eq!(range.start_addr, Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(range.end_addr, Ipv4Addr::new(192, 168, 1, 255));
        assert_eq!(range.len(), 256);
    }

    #[test]
    fn cidr_range_prefix_32_single_host() {
        let ip = Ipv4Addr::new(203, 0, 113, 7);
        let range = cidr_range(ip, 32).unwrap();
        assert_eq!(range.start_addr, ip);
        assert_eq!(range.end_addr, ip);
    }

    #[test]
    fn cidr_range_rejects_prefix_33() {
        assert!(matches!(
            cidr_range(Ipv4Addr::new(10, 0, 0, 0), 33),
            Err(ScanError::InvalidRange(_))
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let start = Ipv4Addr::new(10, 0, 0, 9);
        let end = Ipv4Addr::new(10, 0, 0, 1);
        assert!(Ipv4Range::new(start, end).is_err());
    }

    #[test]
    fn address_set_sorts_and_dedups() {
        let set: AddressSet = [
            Ipv4Addr::new(10, 0, 0, 3),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 3),
            Ipv4Addr::new(9, 255, 255, 255),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.to_strings(), vec!["9.255.255.255", "10.0.0.1", "10.0.0.3"]);
        assert!(set.contains(&Ipv4Addr::new(10, 0, 0, 1)));
        assert!(!set.contains(&Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn filter_keeps_order() {
        let set: AddressSet = Ipv4Range::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 6))
            .unwrap()
            .iter()
            .collect();
        let even = set.filter(|addr| addr.octets()[3] % 2 == 0);
        assert_eq!(even.to_strings(), vec!["10.0.0.2", "10.0.0.4", "10.0.0.6"]);
    }
}
