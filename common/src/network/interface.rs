//! Local interface lookups used by the raw packet code paths.
//!
//! Link-layer discovery needs to know which broadcast domain a target lives in,
//! and half-open probing needs the source address the kernel would route from.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use pnet::datalink::NetworkInterface;
use pnet::ipnetwork::{IpNetwork, Ipv4Network};
use rayon::prelude::*;

use crate::network::range::AddressSet;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ViabilityError {
    /// The interface is operationally down.
    IsDown,
    IsLoopback,
    /// The interface does not have a MAC address.
    NoMacAddress,
    /// The interface does not support broadcast (required for ARP).
    NotBroadcast,
    /// The interface is a point-to-point link (e.g., a VPN).
    IsPointToPoint,
    NoIpv4Network,
}

pub trait NetworkInterfaceExtension {
    fn get_ipv4_nets(&self) -> Vec<Ipv4Network>;
    fn get_ipv4_addr(&self) -> Option<Ipv4Addr>;
    fn owns(&self, addr: Ipv4Addr) -> bool;
}

impl NetworkInterfaceExtension for NetworkInterface {
    fn get_ipv4_nets(&self) -> Vec<Ipv4Network> {
        self.ips
            .iter()
            .filter_map(|ip| match ip {
                IpNetwork::V4(ipv4) => Some(*ipv4),
                IpNetwork::V6(_) => None,
            })
            .collect()
    }

    fn get_ipv4_addr(&self) -> Option<Ipv4Addr> {
        self.get_ipv4_nets()
            .into_iter()
            .map(|net| net.ip())
            .find(|ip| !ip.is_loopback())
    }

    fn owns(&self, addr: Ipv4Addr) -> bool {
        self.get_ipv4_nets().iter().any(|net| net.contains(addr))
    }
}

/// Checks whether ARP requests can be broadcast from `interface`.
pub fn is_viable_lan_interface(interface: &NetworkInterface) -> Result<(), ViabilityError> {
    if !interface.is_up() {
        return Err(ViabilityError::IsDown);
    }
    if interface.is_loopback() {
        return Err(ViabilityError::IsLoopback);
    }
    if interface.mac.is_none() {
        return Err(ViabilityError::NoMacAddress);
    }
    if !interface.is_broadcast() {
        return Err(ViabilityError::NotBroadcast);
    }
    if interface.is_point_to_point() {
        return Err(ViabilityError::IsPointToPoint);
    }
    if interface.get_ipv4_nets().is_empty() {
        return Err(ViabilityError::NoIpv4Network);
    }
    Ok(())
}

/// Targets that share a broadcast domain with one local interface.
#[derive(Debug, Clone)]
pub struct InterfaceTargets {
    pub interface: NetworkInterface,
    pub targets: Vec<Ipv4Addr>,
}

/// Assigns every address to the viable interface whose network contains it.
///
/// Returns the per-interface groups (targets in input order) and the addresses
/// no interface owns.
pub fn group_by_interface(
    addresses: &AddressSet,
    interfaces: &[NetworkInterface],
) -> (Vec<InterfaceTargets>, Vec<Ipv4Addr>) {
    let viable: Vec<&NetworkInterface> = interfaces
        .iter()
        .filter(|intf| is_viable_lan_interface(intf).is_ok())
        .collect();

    let owners: Vec<(Ipv4Addr, Option<usize>)> = addresses
        .as_slice()
        .par_iter()
        .map(|&addr| (addr, find_local_index(&viable, addr)))
        .collect();

    let mut groups: Vec<InterfaceTargets> = Vec::new();
    let mut unowned: Vec<Ipv4Addr> = Vec::new();

    for (addr, owner) in owners {
        let Some(idx) = owner else {
            unowned.push(addr);
            continue;
        };
        let interface = viable[idx];
        match groups.iter_mut().find(|group| group.interface.index == interface.index) {
            Some(group) => group.targets.push(addr),
            None => groups.push(InterfaceTargets {
                interface: interface.clone(),
                targets: vec![addr],
            }),
        }
    }

    (groups, unowned)
}

fn find_local_index(interfaces: &[&NetworkInterface], target: Ipv4Addr) -> Option<usize> {
    interfaces.iter().position(|intf| intf.owns(target))
}

/// Asks the kernel which local address it would use to reach `target`.
///
/// Connecting a UDP socket sends nothing; it only binds a route.
pub fn route_source_v4(target: Ipv4Addr) -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((target, 53)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(source) => Some(source),
        IpAddr::V6(_) => None,
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
