use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;

/// Transport protocol of an observed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub const ALL: [Protocol; 2] = [Protocol::Tcp, Protocol::Udp];

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            other => Err(format!("unknown protocol '{}'", other)),
        }
    }
}

/// IP version partition of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IpVersion::V4 => "IPv4",
            IpVersion::V6 => "IPv6",
        }
    }
}

/// Destination ports seen for one address, split by protocol.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PortTable {
    pub tcp: BTreeSet<u16>,
    pub udp: BTreeSet<u16>,
}

impl PortTable {
    pub fn ports(&self, protocol: Protocol) -> &BTreeSet<u16> {
        match protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        }
    }

    pub fn ports_mut(&mut self, protocol: Protocol) -> &mut BTreeSet<u16> {
        match protocol {
            Protocol::Tcp => &mut self.tcp,
            Protocol::Udp => &mut self.udp,
        }
    }
}

/// Per-version map keyed by destination address.
pub type AddressMap = BTreeMap<IpAddr, PortTable>;

/// One (address, protocol) line of a table or export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    pub address: IpAddr,
    pub protocol: Protocol,
    /// Strictly ascending.
    pub ports: Vec<u16>,
}

impl SnapshotRow {
    /// Ports joined with commas, e.g. `80,443`.
    pub fn ports_joined(&self) -> String {
        self.ports
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Copy of the aggregate taken under the store locks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub v4: AddressMap,
    pub v6: AddressMap,
}

impl Snapshot {
    /// Rows for one IP version: addresses ascending, TCP before UDP, empty sets omitted.
    pub fn rows(&self, version: IpVersion) -> Vec<SnapshotRow> {
        let map = match version {
            IpVersion::V4 => &self.v4,
            IpVersion::V6 => &self.v6,
        };
        let mut rows = Vec::new();
        for (address, table) in map {
            for protocol in Protocol::ALL {
                let ports = table.ports(protocol);
                if ports.is_empty() {
                    continue;
                }
                rows.push(SnapshotRow {
                    address: *address,
                    protocol,
                    ports: ports.iter().copied().collect(),
                });
            }
        }
        rows
    }

    /// All rows, IPv4 first.
    pub fn all_rows(&self) -> Vec<SnapshotRow> {
        let mut rows = self.rows(IpVersion::V4);
        rows.extend(self.rows(IpVersion::V6));
        rows
    }

    /// Number of distinct addresses across both versions.
    pub fn address_count(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }
}
