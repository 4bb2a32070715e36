pub mod raw;
pub mod state;

pub use raw::{RawBuffer, RawPacket, RawPush};
pub use state::{AddressMap, IpVersion, Protocol, Snapshot, SnapshotRow};

use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

/// Destination address → per-protocol port sets, partitioned by IP version.
///
/// The capture thread is the only writer; the render loop and the exporter
/// read through [`AggregateStore::snapshot`], which copies the maps out under
/// the read locks so callers never see a set mid-update.
#[derive(Debug, Default)]
pub struct AggregateStore {
    v4: RwLock<AddressMap>,
    v6: RwLock<AddressMap>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a destination port for `address`. Returns true if the port was new.
    pub fn record(&self, address: IpAddr, protocol: Protocol, port: u16) -> bool {
        let lock = match IpVersion::of(&address) {
            IpVersion::V4 => &self.v4,
            IpVersion::V6 => &self.v6,
        };
        let mut map = lock.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(address)
            .or_default()
            .ports_mut(protocol)
            .insert(port)
    }

    pub fn snapshot(&self) -> Snapshot {
        let v4 = self.v4.read().unwrap_or_else(PoisonError::into_inner).clone();
        let v6 = self.v6.read().unwrap_or_else(PoisonError::into_inner).clone();
        Snapshot { v4, v6 }
    }
}
