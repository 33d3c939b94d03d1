//! ARP sweep over every local broadcast domain that holds targets.

use std::collections::HashSet;
use std::io;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use netscan_common::ScanError;
use netscan_common::network::interface::{InterfaceTargets, NetworkInterfaceExtension, group_by_interface};
use netscan_common::network::range::AddressSet;
use netscan_protocols::arp;
use pnet::datalink::{self, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use pnet::util::MacAddr;
use tracing::{debug, warn};

use crate::context::CancelHandle;
use crate::network::channel::{self, EthernetChannel};

/// One interface's share of the sweep, with its channel already open.
pub struct ArpLane {
    interface: String,
    src_mac: MacAddr,
    src_addr: Ipv4Addr,
    targets: Vec<Ipv4Addr>,
    tx: Box<dyn DataLinkSender>,
    rx: Box<dyn DataLinkReceiver>,
}

pub struct ArpSweep {
    lanes: Vec<ArpLane>,
}

impl ArpSweep {
    /// Groups targets by local interface and opens one channel per interface.
    pub fn prepare(addresses: &AddressSet) -> Result<Self, ScanError> {
        Self::prepare_with(addresses, &datalink::interfaces(), datalink::channel)
    }

    pub fn prepare_with<F>(
        addresses: &AddressSet,
        interfaces: &[NetworkInterface],
        opener: F,
    ) -> Result<Self, ScanError>
    where
        F: Fn(&NetworkInterface, Config) -> io::Result<datalink::Channel>,
    {
        let (groups, unowned) = group_by_interface(addresses, interfaces);
        if groups.is_empty() {
            return Err(ScanError::Interface(format!(
                "no local broadcast interface shares a network with the {} target address(es)",
                addresses.len()
            )));
        }
        if !unowned.is_empty() {
            warn!("{} address(es) are outside every local network and will be treated as down", unowned.len());
            for addr in &unowned {
                debug!(%addr, "no owning interface");
            }
        }

        let cfg = channel::channel_config();
        let lanes = groups
            .into_iter()
            .map(|group| ArpLane::open(group, &cfg, &opener))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { lanes })
    }

    pub fn target_count(&self) -> usize {
        self.lanes.iter().map(|lane| lane.targets.len()).sum()
    }

    /// Sweeps every lane on its own blocking thread and merges the responders.
    pub async fn run(self, wait: Duration, cancel: CancelHandle) -> HashSet<Ipv4Addr> {
        debug!(lanes = self.lanes.len(), targets = self.target_count(), "ARP sweep");
        let handles: Vec<_> = self
            .lanes
            .into_iter()
            .map(|lane| {
                let cancel = cancel.clone();
                tokio::task::spawn_blocking(move || lane.sweep(wait, &cancel))
            })
            .collect();

        let mut live = HashSet::new();
        for handle in handles {
            match handle.await {
                Ok(found) => live.extend(found),
                Err(e) => warn!("ARP sweep worker failed: {e}"),
            }
        }
        live
    }
}

impl ArpLane {
    fn open<F>(group: InterfaceTargets, cfg: &Config, opener: &F) -> Result<Self, ScanError>
    where
        F: Fn(&NetworkInterface, Config) -> io::Result<datalink::Channel>,
    {
        let InterfaceTargets { interface, targets } = group;
        let src_mac = interface
            .mac
            .ok_or_else(|| ScanError::Interface(format!("{} has no MAC address", interface.name)))?;
        let src_addr = source_address(&interface, &targets)
            .ok_or_else(|| ScanError::Interface(format!("{} has no IPv4 address", interface.name)))?;

        let (tx, rx): EthernetChannel = channel::open_eth_channel(&interface, cfg, opener)
            .map_err(|e| ScanError::Permission(format!("{e:#}")))?;

        Ok(Self {
            interface: interface.name,
            src_mac,
            src_addr,
            targets,
            tx,
            rx,
        })
    }

    fn sweep(mut self, wait: Duration, cancel: &CancelHandle) -> HashSet<Ipv4Addr> {
        debug!(interface = %self.interface, targets = self.targets.len(), "starting ARP sweep");
        sweep_channel(
            self.tx.as_mut(),
            self.rx.as_mut(),
            self.src_mac,
            self.src_addr,
            &self.targets,
            wait,
            cancel,
        )
    }
}

/// The interface address on the same network as the targets.
fn source_address(interface: &NetworkInterface, targets: &[Ipv4Addr]) -> Option<Ipv4Addr> {
    let nets = interface.get_ipv4_nets();
    targets
        .first()
        .and_then(|target| nets.iter().find(|net| net.contains(*target)))
        .map(|net| net.ip())
        .or_else(|| interface.get_ipv4_addr())
}

/// Broadcasts one request per target, then collects replies for `wait`.
///
/// Only replies whose sender is one of `targets` count.
pub fn sweep_channel(
    tx: &mut dyn DataLinkSender,
    rx: &mut dyn DataLinkReceiver,
    src_mac: MacAddr,
    src_addr: Ipv4Addr,
    targets: &[Ipv4Addr],
    wait: Duration,
    cancel: &CancelHandle,
) -> HashSet<Ipv4Addr> {
    let wanted: HashSet<Ipv4Addr> = targets.iter().copied().collect();
    let mut live: HashSet<Ipv4Addr> = HashSet::new();

    for &target in targets {
        if cancel.is_cancelled() {
            break;
        }
        let frame = match arp::create_request(src_mac, src_addr, target) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%target, "could not build ARP request: {e}");
                continue;
            }
        };
        match tx.send_to(&frame, None) {
            Some(Ok(())) => {}
            Some(Err(e)) => debug!(%target, "ARP request not sent: {e}"),
            None => debug!(%target, "ARP request not sent: sender unavailable"),
        }
    }

    let deadline = Instant::now() + wait;
    while Instant::now() < deadline && live.len() < wanted.len() && !cancel.is_cancelled() {
        let Ok(frame) = rx.next() else {
            continue;
        };
        let Some(reply) = arp::parse_reply(frame) else {
            continue;
        };
        if wanted.contains(&reply.sender_addr) && live.insert(reply.sender_addr) {
            debug!(addr = %reply.sender_addr, mac = %reply.sender_mac, "ARP reply");
        }
    }

    live
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
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use netscan_common::network::target::parse_address_range;
    use pnet::datalink::{Channel, dummy};
    use pnet::ipnetwork::{IpNetwork, Ipv4Network};
    use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
    use pnet::packet::ethernet::{EtherTypes, MutableEthernetPacket};

    // IFF_UP | IFF_BROADCAST | IFF_RUNNING | IFF_MULTICAST
    const LAN_FLAGS: u32 = 0x1 | 0x2 | 0x40 | 0x1000;
    const LOCAL_MAC: MacAddr = MacAddr(0x02, 0, 0, 0, 0, 0x01);

    fn lan_interface() -> NetworkInterface {
        NetworkInterface {
            name: "eth0".into(),
            description: "".into(),
            index: 2,
            mac: Some(LOCAL_MAC),
            ips: vec![IpNetwork::V4(Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 100), 24).unwrap())],
            flags: LAN_FLAGS,
        }
    }

    fn reply_from(addr: Ipv4Addr) -> Box<[u8]> {
        let mac = MacAddr(0x02, 0, 0, 0, 0, addr.octets()[3]);
        let mut buf = vec![0u8; 42];
        {
            let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
            eth.set_source(mac);
            eth.set_destination(LOCAL_MAC);
            eth.set_ethertype(EtherTypes::Arp);
        }
        {
            let mut reply = MutableArpPacket::new(&mut buf[14..]).unwrap();
            reply.set_hardware_type(ArpHardwareTypes::Ethernet);
            reply.set_protocol_type(EtherTypes::Ipv4);
            reply.set_hw_addr_len(6);
            reply.set_proto_addr_len(4);
            reply.set_operation(ArpOperations::Reply);
            reply.set_sender_hw_addr(mac);
            reply.set_sender_proto_addr(addr);
            reply.set_target_hw_addr(LOCAL_MAC);
            reply.set_target_proto_addr(Ipv4Addr::new(10, 0, 0, 100));
        }
        buf.into_boxed_slice()
    }

    type Inject = std::sync::mpsc::Sender<io::Result<Box<[u8]>>>;
    type Sent = std::sync::mpsc::Receiver<Box<[u8]>>;

    fn dummy_channel(frames: Vec<Box<[u8]>>) -> (EthernetChannel, Inject, Sent) {
        let mut cfg = dummy::Config::default();
        let inject = cfg.inject_handle().unwrap();
        let sent = cfg.read_handle().unwrap();
        for frame in frames {
            inject.send(Ok(frame)).unwrap();
        }

        match dummy::channel(&dummy::dummy_interface(0), cfg).unwrap() {
            Channel::Ethernet(tx, rx) => ((tx, rx), inject, sent),
            _ => panic!("dummy channel is always ethernet"),
        }
    }

    /// Feeds read timeouts the way a real channel's `read_timeout` does,
    /// until the returned guard is dropped.
    struct IdleNetwork {
        stop: Arc<AtomicBool>,
        thread: Option<std::thread::JoinHandle<()>>,
    }

    impl IdleNetwork {
        fn start(inject: Inject) -> Self {
            let stop = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&stop);
            let thread = std::thread::spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    if inject.send(Err(io::ErrorKind::TimedOut.into())).is_err() {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
            });
            Self { stop, thread: Some(thread) }
        }
    }

    impl Drop for IdleNetwork {
        fn drop(&mut self) {
            self.stop.store(true, Ordering::Relaxed);
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    #[test]
    fn sweep_collects_only_targeted_replies() {
        let targets = [Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 3)];
        let ((mut tx, mut rx), inject, sent) = dummy_channel(vec![
            reply_from(Ipv4Addr::new(10, 0, 0, 3)),
            reply_from(Ipv4Addr::new(10, 0, 0, 99)),
            reply_from(Ipv4Addr::new(10, 0, 0, 1)),
            reply_from(Ipv4Addr::new(10, 0, 0, 1)),
        ]);
        let _idle = IdleNetwork::start(inject);

        let started = Instant::now();
        let live = sweep_channel(
            tx.as_mut(),
            rx.as_mut(),
            LOCAL_MAC,
            Ipv4Addr::new(10, 0, 0, 100),
            &targets,
            Duration::from_millis(200),
            &CancelHandle::new(),
        );

        assert_eq!(live, HashSet::from([Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 3)]));
        // 10.0.0.2 never answers, so only the deadline ends the sweep.
        assert!(started.elapsed() >= Duration::from_millis(200));

        let requests: Vec<Box<[u8]>> = sent.try_iter().collect();
        assert_eq!(requests.len(), targets.len());
        let first = ArpPacket::new(&requests[0][14..42]).unwrap();
        assert_eq!(first.get_operation(), ArpOperations::Request);
        assert_eq!(first.get_target_proto_addr(), Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn sweep_stops_once_every_target_answered() {
        let targets = [Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)];
        let ((mut tx, mut rx), _inject, _sent) = dummy_channel(vec![
            reply_from(Ipv4Addr::new(10, 0, 0, 2)),
            reply_from(Ipv4Addr::new(10, 0, 0, 1)),
        ]);

        let started = Instant::now();
        let live = sweep_channel(
            tx.as_mut(),
            rx.as_mut(),
            LOCAL_MAC,
            Ipv4Addr::new(10, 0, 0, 100),
            &targets,
            Duration::from_secs(30),
            &CancelHandle::new(),
        );

        assert_eq!(live, HashSet::from(targets));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancelled_sweep_sends_nothing() {
        let ((mut tx, mut rx), _inject, sent) = dummy_channel(vec![reply_from(Ipv4Addr::new(10, 0, 0, 1))]);
        let cancel = CancelHandle::new();
        cancel.cancel();

        let live = sweep_channel(
            tx.as_mut(),
            rx.as_mut(),
            LOCAL_MAC,
            Ipv4Addr::new(10, 0, 0, 100),
            &[Ipv4Addr::new(10, 0, 0, 1)],
            Duration::from_millis(100),
            &cancel,
        );

        assert!(live.is_empty());
        assert_eq!(sent.try_iter().count(), 0);
    }

    #[test]
    fn prepare_requires_an_owning_interface() {
        let addresses = parse_address_range("192.168.50.1-3").unwrap();
        let result = ArpSweep::prepare_with(&addresses, &[lan_interface()], |i, _| {
            dummy::channel(i, dummy::Config::default())
        });
        assert!(matches!(result, Err(ScanError::Interface(_))));
    }

    #[test]
    fn prepare_maps_channel_failure_to_permission() {
        let addresses = parse_address_range("10.0.0.1-3").unwrap();
        let result = ArpSweep::prepare_with(&addresses, &[lan_interface()], |_, _| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "Operation not permitted"))
        });
        let Err(ScanError::Permission(msg)) = result else {
            panic!("expected a permission error");
        };
        assert!(msg.contains("opening on eth0"));
    }

    #[test]
    fn prepare_opens_one_lane_per_interface() {
        let addresses = parse_address_range("10.0.0.1-3,8.8.8.8").unwrap();
        let sweep = ArpSweep::prepare_with(&addresses, &[lan_interface()], |i, _| {
            dummy::channel(i, dummy::Config::default())
        })
        .unwrap();
        assert_eq!(sweep.lanes.len(), 1);
        assert_eq!(sweep.target_count(), 3);
        assert_eq!(sweep.lanes[0].src_addr, Ipv4Addr::new(10, 0, 0, 100));
    }
}
