pub mod interface;
pub mod packet;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pcap::Capture;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateStore, RawBuffer, RawPacket, RawPush};
use crate::config::CaptureConfig;
use crate::handoff::Notifier;
use crate::shutdown::ShutdownCheck;
use packet::{classify, LinkLayer};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture poll failed: {0}")]
    Poll(#[from] pcap::Error),
}

/// One captured frame, borrowed from the source until the next poll.
pub struct Frame<'a> {
    pub header: pcap::PacketHeader,
    pub data: &'a [u8],
}

/// A live packet feed polled with a bounded timeout.
pub trait PacketSource: Send {
    /// pcap DLT of the frames this source yields.
    fn datalink(&self) -> i32;

    /// Wait up to one poll interval for a frame. `Ok(None)` means the poll
    /// timed out without traffic.
    fn next_frame(&mut self) -> Result<Option<Frame<'_>>, CaptureError>;
}

/// libpcap-backed source on a single interface.
pub struct PcapSource {
    cap: Capture<pcap::Active>,
    datalink: i32,
}

impl PcapSource {
    /// Open `interface` with the poll interval as the read timeout.
    pub fn open(interface: &str, poll: Duration) -> Result<Self, pcap::Error> {
        let timeout_ms = i32::try_from(poll.as_millis()).unwrap_or(i32::MAX);
        let cap = Capture::from_device(interface)?
            .promisc(true)
            .immediate_mode(true)
            .snaplen(65535)
            .timeout(timeout_ms)
            .open()?;
        let datalink = cap.get_datalink().0;
        Ok(Self { cap, datalink })
    }
}

impl PacketSource for PcapSource {
    fn datalink(&self) -> i32 {
        self.datalink
    }

    fn next_frame(&mut self) -> Result<Option<Frame<'_>>, CaptureError> {
        match self.cap.next_packet() {
            Ok(pkt) => Ok(Some(Frame {
                header: *pkt.header,
                data: pkt.data,
            })),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Where the capture loop delivers its results.
pub struct CaptureSink {
    pub store: Arc<AggregateStore>,
    pub raw: Option<Arc<RawBuffer>>,
    pub notifier: Notifier,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    /// Frames that produced an aggregate entry.
    pub recorded: u64,
    /// Failed polls.
    pub errors: u64,
}

/// Run the capture loop until shutdown is requested.
///
/// Blocks; call it from a dedicated thread. Shutdown is checked once per
/// poll, so the loop exits within one poll interval of the request.
pub fn capture_loop<S, C>(
    source: &mut S,
    config: &CaptureConfig,
    sink: &CaptureSink,
    shutdown: &C,
    poll: Duration,
) -> CaptureStats
where
    S: PacketSource + ?Sized,
    C: ShutdownCheck + ?Sized,
{
    let link = LinkLayer::from_dlt(source.datalink());
    if let LinkLayer::Unsupported(dlt) = link {
        warn!("link type {} is not decoded; frames will only be kept raw", dlt);
    }
    info!(interface = %config.interface, ?link, "capture started");

    let mut stats = CaptureStats::default();
    while !shutdown.should_stop() {
        match source.next_frame() {
            Ok(Some(frame)) => {
                stats.frames += 1;
                if handle_frame(&frame, link, config, sink) {
                    stats.recorded += 1;
                }
            }
            Ok(None) => {}
            Err(e) => {
                stats.errors += 1;
                warn!("{}; retrying in {:?}", e, poll);
                thread::sleep(poll);
            }
        }
    }

    info!(
        frames = stats.frames,
        recorded = stats.recorded,
        errors = stats.errors,
        "capture stopped"
    );
    stats
}

/// Buffer, classify and record one frame. Returns true if it was aggregated.
fn handle_frame(frame: &Frame<'_>, link: LinkLayer, config: &CaptureConfig, sink: &CaptureSink) -> bool {
    if let Some(raw) = &sink.raw {
        if let RawPush::Dropped { first: true } = raw.push(RawPacket::from_pcap(&frame.header, frame.data)) {
            warn!("raw capture limit reached; later frames are not kept");
        }
    }

    let Some(obs) = classify(link, frame.data, config.ipv4, config.ipv6) else {
        return false;
    };

    if let Some(context) = config.context_filter {
        if obs.src != context && obs.dst != context {
            return false;
        }
    }

    if sink.store.record(obs.dst, obs.protocol, obs.port) {
        debug!("new {} port {} for {}", obs.protocol, obs.port, obs.dst);
    }
    sink.notifier.notify();
    true
}
