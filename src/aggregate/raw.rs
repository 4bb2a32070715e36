//! Verbatim frame buffer backing the pcap export.
//!
//! Frames are kept in memory until shutdown. Without a limit the buffer grows
//! for the whole run, roughly by the captured bytes plus a small per-frame
//! header; `--raw-limit` caps it at a frame count and later frames are counted
//! as dropped instead of stored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// A captured frame and the pcap record header it arrived with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub ts_sec: i64,
    pub ts_usec: i64,
    /// Bytes actually captured (length of `data`).
    pub caplen: u32,
    /// Length of the frame on the wire.
    pub len: u32,
    pub data: Vec<u8>,
}

impl RawPacket {
    pub fn from_pcap(header: &pcap::PacketHeader, data: &[u8]) -> Self {
        Self {
            ts_sec: header.ts.tv_sec as i64,
            ts_usec: header.ts.tv_usec as i64,
            caplen: header.caplen,
            len: header.len,
            data: data.to_vec(),
        }
    }

    pub fn pcap_header(&self) -> pcap::PacketHeader {
        pcap::PacketHeader {
            ts: libc::timeval {
                tv_sec: self.ts_sec as _,
                tv_usec: self.ts_usec as _,
            },
            caplen: self.caplen,
            len: self.len,
        }
    }
}

/// Outcome of [`RawBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPush {
    Stored,
    /// The limit was reached; `first` is set on the first dropped frame.
    Dropped { first: bool },
}

#[derive(Debug)]
pub struct RawBuffer {
    packets: Mutex<Vec<RawPacket>>,
    limit: Option<usize>,
    dropped: AtomicU64,
    /// DLT of the frames, written into the pcap global header.
    linktype: i32,
}

impl RawBuffer {
    pub fn new(linktype: i32, limit: Option<usize>) -> Self {
        Self {
            packets: Mutex::new(Vec::new()),
            limit,
            dropped: AtomicU64::new(0),
            linktype,
        }
    }

    pub fn push(&self, packet: RawPacket) -> RawPush {
        let mut packets = self.packets.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(limit) = self.limit {
            if packets.len() >= limit {
                let prev = self.dropped.fetch_add(1, Ordering::Relaxed);
                return RawPush::Dropped { first: prev == 0 };
            }
        }
        packets.push(packet);
        RawPush::Stored
    }

    /// Run `f` over the buffered frames, in capture order, under the lock.
    pub fn with_frames<R>(&self, f: impl FnOnce(&[RawPacket]) -> R) -> R {
        let packets = self.packets.lock().unwrap_or_else(PoisonError::into_inner);
        f(&packets)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.packets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn linktype(&self) -> i32 {
        self.linktype
    }
}
