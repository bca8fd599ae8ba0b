use std::fmt::{Display, Formatter};

use bytes::Bytes;

/// Timestamp tag for frames that are not part of a live stream (single
/// still image). Results produced for such frames carry the same tag.
pub const NO_TIMESTAMP: i64 = i64::MIN;

/// One unit of image input submitted for processing.
///
/// Immutable once submitted; the engine echoes it back inside the
/// [`Bundle`] it produces for the frame.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Bytes,
    width: u32,
    height: u32,
    timestamp: i64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp: i64) -> Self {
        Self {
            data: Bytes::from(data),
            width,
            height,
            timestamp,
        }
    }

    /// A frame without a stream position, e.g. a decoded still image.
    pub fn still(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::new(data, width, height, NO_TIMESTAMP)
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn has_timestamp(&self) -> bool {
        self.timestamp != NO_TIMESTAMP
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "Frame {{ {}x{}, {} bytes, ts: {} }}",
            self.width,
            self.height,
            self.data.len(),
            self.timestamp
        )
    }
}

/// One opaque output payload produced by the engine for a single output
/// stream. The wire format is owned by the engine; decoding happens in the
/// solution layer.
#[derive(Clone, Debug, Default)]
pub struct Packet {
    data: Bytes,
    timestamp: i64,
}

impl Packet {
    pub fn new(data: Vec<u8>, timestamp: i64) -> Self {
        Self {
            data: Bytes::from(data),
            timestamp,
        }
    }

    /// A payload-less packet, e.g. an output stream with zero detections.
    pub fn empty(timestamp: i64) -> Self {
        Self {
            data: Bytes::new(),
            timestamp,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered set of raw output payloads produced by the engine for one frame.
///
/// Entries are keyed by fixed output-stream index; the echoed input frame
/// occupies the last index and is carried structurally as [`Bundle::source`].
/// The total length always equals the number of configured output streams.
#[derive(Clone, Debug)]
pub struct Bundle {
    packets: Vec<Packet>,
    source: Frame,
}

impl Bundle {
    pub fn new(packets: Vec<Packet>, source: Frame) -> Self {
        Self { packets, source }
    }

    /// Payload packet at the given output-stream index. The echoed-input
    /// index is not addressable here; use [`Bundle::source`].
    pub fn get(&self, index: usize) -> Option<&Packet> {
        self.packets.get(index)
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// The input frame this bundle was produced for.
    pub fn source(&self) -> &Frame {
        &self.source
    }

    pub fn into_parts(self) -> (Vec<Packet>, Frame) {
        (self.packets, self.source)
    }

    /// Number of output streams represented, echoed input included.
    pub fn stream_count(&self) -> usize {
        self.packets.len() + 1
    }
}
