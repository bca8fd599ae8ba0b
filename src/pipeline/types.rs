use graph_bus::packet::{Frame, NO_TIMESTAMP};
use std::collections::HashMap;

use crate::landmark::{ClassificationList, LandmarkList};

/// Operating mode for a pipeline instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// One frame in, one result (or error) out per submission.
    SingleShot,
    /// Continuous frame submission with asynchronous, possibly lossy
    /// delivery.
    Streaming,
}

/// Processing backend selection. Opaque to this layer; the engine factory
/// picks the matching graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Cpu,
    Gpu,
}

/// Payload type of one engine output stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    /// Collection of landmark lists, one per detected object.
    Landmarks,
    /// Collection of classification lists, one per detected object.
    Classifications,
    /// The input frame echoed back by the engine.
    EchoedInput,
}

/// Static output-stream contract for one solution graph.
///
/// Indices are fixed at configuration time, never discovered at runtime.
/// The echoed input stream is always last.
#[derive(Clone, Debug)]
pub struct StreamLayout {
    streams: Vec<(String, StreamKind)>,
}

impl StreamLayout {
    pub fn new(streams: Vec<(&str, StreamKind)>) -> Self {
        let echoed = streams
            .iter()
            .filter(|(_, kind)| *kind == StreamKind::EchoedInput)
            .count();
        assert_eq!(echoed, 1, "layout needs exactly one echoed-input stream");
        assert_eq!(
            streams.last().map(|(_, kind)| *kind),
            Some(StreamKind::EchoedInput),
            "echoed-input stream must be last"
        );
        Self {
            streams: streams
                .into_iter()
                .map(|(name, kind)| (name.to_string(), kind))
                .collect(),
        }
    }

    /// Total stream count, echoed input included.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Streams carrying decodable payloads (everything but the echoed input).
    pub fn payload_streams(&self) -> &[(String, StreamKind)] {
        &self.streams[..self.streams.len() - 1]
    }

    pub fn echoed_input_index(&self) -> usize {
        self.streams.len() - 1
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.streams.get(index).map(|(name, _)| name.as_str())
    }
}

/// Immutable configuration for one pipeline instance. Changing any field
/// requires full pipeline recreation.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub mode: Mode,
    /// Upper bound on detected objects per frame. Must be positive.
    pub max_detections: u32,
    pub backend: Backend,
    pub layout: StreamLayout,
    /// Side-packet name the engine reads `max_detections` from, e.g.
    /// "num_hands". None for graphs without a detection-count knob.
    pub max_detections_packet: Option<String>,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Side configuration applied to the engine once, before the first frame.
    pub fn side_packets(&self) -> HashMap<String, i32> {
        let mut packets = HashMap::new();
        if let Some(name) = &self.max_detections_packet {
            packets.insert(name.clone(), self.max_detections as i32);
        }
        packets
    }
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    mode: Option<Mode>,
    max_detections: Option<u32>,
    backend: Backend,
    layout: Option<StreamLayout>,
    max_detections_packet: Option<String>,
}

impl PipelineConfigBuilder {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn max_detections(mut self, count: u32) -> Self {
        self.max_detections = Some(count);
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn layout(mut self, layout: StreamLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Name of the side packet carrying the max-detections count.
    pub fn max_detections_packet(mut self, name: impl Into<String>) -> Self {
        self.max_detections_packet = Some(name.into());
        self
    }

    pub fn build(self) -> PipelineConfig {
        PipelineConfig {
            mode: self.mode.expect("mode is required"),
            max_detections: self.max_detections.unwrap_or(1),
            backend: self.backend,
            layout: self.layout.expect("output layout is required"),
            max_detections_packet: self.max_detections_packet,
        }
    }
}

/// One decoded payload entry of a [`SolutionResult`], in layout order.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultEntry {
    Landmarks(Vec<LandmarkList>),
    Classifications(Vec<ClassificationList>),
}

/// Decoded, application-level representation of one engine bundle.
#[derive(Clone, Debug)]
pub struct SolutionResult {
    entries: Vec<ResultEntry>,
    source: Frame,
    timestamp: i64,
}

impl SolutionResult {
    pub fn new(entries: Vec<ResultEntry>, source: Frame, timestamp: i64) -> Self {
        Self {
            entries,
            source,
            timestamp,
        }
    }

    /// Decoded entries, ordered by output-stream index.
    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ResultEntry> {
        self.entries
    }

    pub fn into_parts(self) -> (Vec<ResultEntry>, Frame, i64) {
        (self.entries, self.source, self.timestamp)
    }

    pub fn landmarks_at(&self, index: usize) -> Option<&[LandmarkList]> {
        match self.entries.get(index) {
            Some(ResultEntry::Landmarks(lists)) => Some(lists),
            _ => None,
        }
    }

    pub fn classifications_at(&self, index: usize) -> Option<&[ClassificationList]> {
        match self.entries.get(index) {
            Some(ResultEntry::Classifications(lists)) => Some(lists),
            _ => None,
        }
    }

    /// The input frame this result was produced for. Read-only.
    pub fn source(&self) -> &Frame {
        &self.source
    }

    /// Echoed input timestamp for streaming results, [`NO_TIMESTAMP`] for
    /// single-shot ones.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn has_timestamp(&self) -> bool {
        self.timestamp != NO_TIMESTAMP
    }
}
