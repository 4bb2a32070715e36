//! pcap export of the raw frame buffer.

use std::path::Path;

use pcap::{Capture, Linktype, Packet};

use super::ExportError;
use crate::aggregate::RawBuffer;

/// Write every buffered frame, in capture order, to a pcap savefile.
/// Returns the number of frames written.
pub fn export_raw(path: &Path, buffer: &RawBuffer) -> Result<usize, ExportError> {
    let dead = Capture::dead(Linktype(buffer.linktype()))?;
    let mut savefile = dead.savefile(path)?;
    let count = buffer.with_frames(|frames| {
        for frame in frames {
            let header = frame.pcap_header();
            savefile.write(&Packet::new(&header, &frame.data));
        }
        frames.len()
    });
    savefile.flush()?;
    Ok(count)
}
