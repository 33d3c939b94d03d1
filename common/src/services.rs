//! Well-known TCP service names.
//!
//! Lookups are pure: the registry is built once from the system services
//! database (or the built-in table when that file is missing) and never
//! touches the network.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use tracing::debug;

pub const UNKNOWN_SERVICE: &str = "unknown";
const SYSTEM_SERVICES_PATH: &str = "/etc/services";

const BUILTIN_SERVICES: &[(u16, &str)] = &[
    (7, "echo"),
    (20, "ftp-data"),
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "domain"),
    (79, "finger"),
    (80, "http"),
    (88, "kerberos"),
    (110, "pop3"),
    (111, "sunrpc"),
    (119, "nntp"),
    (135, "epmap"),
    (139, "netbios-ssn"),
    (143, "imap2"),
    (389, "ldap"),
    (443, "https"),
    (445, "microsoft-ds"),
    (465, "submissions"),
    (514, "shell"),
    (587, "submission"),
    (631, "ipp"),
    (636, "ldaps"),
    (873, "rsync"),
    (993, "imaps"),
    (995, "pop3s"),
    (1433, "ms-sql-s"),
    (1521, "ncube-lm"),
    (1723, "pptp"),
    (2049, "nfs"),
    (3306, "mysql"),
    (3389, "ms-wbt-server"),
    (5432, "postgresql"),
    (5900, "rfb"),
    (6379, "redis"),
    (8080, "http-alt"),
    (8443, "https-alt"),
    (9200, "wap-wsp"),
    (27017, "mongodb"),
];

#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    tcp: HashMap<u16, String>,
}

impl ServiceRegistry {
    pub fn builtin() -> Self {
        Self {
            tcp: BUILTIN_SERVICES
                .iter()
                .map(|(port, name)| (*port, (*name).to_string()))
                .collect(),
        }
    }

    /// Parses the `name port/proto [aliases...]` format of a services database.
    ///
    /// Only `tcp` entries are kept; the first name listed for a port wins.
    pub fn from_services_file(contents: &str) -> Self {
        let mut tcp: HashMap<u16, String> = HashMap::new();

        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();
            let (Some(name), Some(port_proto)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Some((port, proto)) = port_proto.split_once('/') else {
                continue;
            };
            if !proto.eq_ignore_ascii_case("tcp") {
                continue;
            }
            if let Ok(port) = port.parse::<u16>() {
                tcp.entry(port).or_insert_with(|| name.to_string());
            }
        }

        Self { tcp }
    }

    /// Loads `path`, falling back to the built-in table when it is unreadable or empty.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let registry = Self::from_services_file(&contents);
                if registry.is_empty() {
                    Self::builtin()
                } else {
                    registry
                }
            }
            Err(e) => {
                debug!("services database {} unavailable ({e}), using built-in table", path.display());
                Self::builtin()
            }
        }
    }

    pub fn lookup(&self, port: u16) -> Option<&str> {
        self.tcp.get(&port).map(String::as_str)
    }

    /// Registered name of `port`, or `"unknown"`.
    pub fn name_for(&self, port: u16) -> &str {
        self.lookup(port).unwrap_or(UNKNOWN_SERVICE)
    }

    pub fn len(&self) -> usize {
        self.tcp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tcp.is_empty()
    }
}

/// Process-wide registry, loaded from the system database on first use.
pub fn system_registry() -> &'static ServiceRegistry {
    static REGISTRY: OnceLock<ServiceRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| ServiceRegistry::load(SYSTEM_SERVICES_PATH))
}

pub fn service_name(port: u16) -> &'static str {
    system_registry().name_for(port)
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

    const SAMPLE: &str = "\
# Network services, Internet style
tcpmux\t\t1/tcp\t\t\t\t# TCP port service multiplexer
ssh\t\t22/tcp\t\t\t\t# SSH Remote Login Protocol
domain\t\t53/tcp\t\t\t\t# Domain Name Server
domain\t\t53/udp
bootps\t\t67/udp
http\t\t80/tcp\t\twww\t\t# WorldWideWeb HTTP
www-alt\t\t80/tcp
   
broken-line
bad\t\tabc/tcp
";

    #[test]
    fn parses_tcp_entries_only() {
        let registry = ServiceRegistry::from_services_file(SAMPLE);
        assert_eq!(registry.lookup(22), Some("ssh"));
        assert_eq!(registry.lookup(53), Some("domain"));
        assert_eq!(registry.lookup(67), None);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn first_name_for_a_port_wins() {
        let registry = ServiceRegistry::from_services_file(SAMPLE);
        assert_eq!(registry.lookup(80), Some("http"));
    }

    #[test]
    fn unknown_ports_resolve_to_unknown() {
        let registry = ServiceRegistry::builtin();
        assert_eq!(registry.name_for(22), "ssh");
        assert_eq!(registry.name_for(6553), UNKNOWN_SERVICE);
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let registry = ServiceRegistry::load("/definitely/not/a/services/file");
        assert_eq!(registry.lookup(443), Some("https"));
    }

    #[test]
    fn system_registry_knows_ssh() {
        assert_eq!(service_name(22), "ssh");
    }
}
