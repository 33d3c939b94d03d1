use std::time::Duration;

use anyhow::{Context, bail};
use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use tracing::debug;

const READ_TIMEOUT: Duration = Duration::from_millis(50);

pub type EthernetChannel = (Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>);

/// Opens a layer 2 channel on `intf` using `channel_opener` (usually [`datalink::channel`]).
pub fn open_eth_channel<F>(intf: &NetworkInterface, cfg: &Config, channel_opener: F) -> anyhow::Result<EthernetChannel>
where
    F: FnOnce(&NetworkInterface, Config) -> std::io::Result<datalink::Channel>,
{
    let ch: Channel = channel_opener(intf, *cfg).with_context(|| format!("opening on {}", intf.name))?;
    match ch {
        Channel::Ethernet(tx, rx) => {
            debug!("ethernet channel open on {}", intf.name);
            Ok((tx, rx))
        }
        _ => bail!("non-ethernet channel for {}", intf.name),
    }
}

/// Short read timeout so receive loops can check deadlines and cancellation.
pub fn channel_config() -> Config {
    Config {
        read_timeout: Some(READ_TIMEOUT),
        ..Default::default()
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
    use pnet::datalink::dummy;

    #[test]
    fn open_eth_channel_should_succeed_on_ethernet_channel() {
        let dummy_intf: NetworkInterface = dummy::dummy_interface(0);
        let mock_opener_success = |i: &NetworkInterface, _cfg: Config| -> std::io::Result<datalink::Channel> {
            dummy::channel(i, dummy::Config::default())
        };
        let result = open_eth_channel(&dummy_intf, &channel_config(), mock_opener_success);
        assert!(result.is_ok());
    }

    #[test]
    fn open_eth_channel_should_fail_on_io_error() {
        let dummy_intf: NetworkInterface = dummy::dummy_interface(0);
        let mock_opener_fail = |_: &NetworkInterface, _: Config| -> std::io::Result<datalink::Channel> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Mock I/O Error"))
        };

        let Err(e) = open_eth_channel(&dummy_intf, &channel_config(), mock_opener_fail) else {
            panic!("expected Err, got Ok");
        };
        assert!(e.to_string().contains("opening on eth0"));
        let cause = e.downcast_ref::<std::io::Error>().expect("io::Error cause");
        assert_eq!(cause.to_string(), "Mock I/O Error");
        assert_eq!(cause.kind(), std::io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn channel_config_uses_short_read_timeout() {
        assert_eq!(channel_config().read_timeout, Some(READ_TIMEOUT));
    }
}
