use std::collections::BTreeSet;

use crate::error::ScanError;

/// Ascending, duplicate free sequence of TCP ports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    ports: Vec<u16>,
}

impl PortSet {
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &u16> {
        self.ports.iter()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.ports
    }
}

impl FromIterator<u16> for PortSet {
    fn from_iter<T: IntoIterator<Item = u16>>(iter: T) -> Self {
        let unique: BTreeSet<u16> = iter.into_iter().collect();
        Self {
            ports: unique.into_iter().collect(),
        }
    }
}

/// Parses "22,80,443" or "1-1024" style port lists. Overlaps are coalesced.
pub fn parse_port_range(text: &str) -> Result<PortSet, ScanError> {
    let mut ports: BTreeSet<u16> = BTreeSet::new();

    for token in text.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(ScanError::InvalidRange(format!("empty port token in '{text}'")));
        }

        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_port(start)?;
                let end = parse_port(end)?;
                if end < start {
                    return Err(ScanError::InvalidRange(format!("inverted port range '{token}'")));
                }
                ports.extend(start..=end);
            }
            None => {
                ports.insert(parse_port(token)?);
            }
        }
    }

    Ok(PortSet {
        ports: ports.into_iter().collect(),
    })
}

fn parse_port(s: &str) -> Result<u16, ScanError> {
    s.trim()
        .parse::<u16>()
        .map_err(|e| ScanError::InvalidRange(format!("invalid port '{s}': {e}")))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
