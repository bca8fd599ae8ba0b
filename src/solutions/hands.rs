//! Hand landmark tracking solution.
//!
//! Processes a frame and returns the hand landmarks and handedness (left
//! vs. right) of each detected hand.

use std::sync::Arc;

use graph_bus::engine::GraphEngine;
use graph_bus::packet::Frame;

use crate::landmark::{ClassificationList, LandmarkList, NormalizedLandmark};
use crate::pipeline::{
    Backend, Mode, Pipeline, PipelineConfig, PipelineError, ResultEntry, SolutionResult,
    StreamKind, StreamLayout,
};

/// Hand landmark indices within a [`LandmarkList`].
pub mod hand_landmark {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
    pub const NUM_LANDMARKS: usize = 21;
}

/// Landmark index pairs forming the hand skeleton, for rendering.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = {
    use hand_landmark::*;
    [
        (WRIST, THUMB_CMC),
        (THUMB_CMC, THUMB_MCP),
        (THUMB_MCP, THUMB_IP),
        (THUMB_IP, THUMB_TIP),
        (WRIST, INDEX_FINGER_MCP),
        (INDEX_FINGER_MCP, INDEX_FINGER_PIP),
        (INDEX_FINGER_PIP, INDEX_FINGER_DIP),
        (INDEX_FINGER_DIP, INDEX_FINGER_TIP),
        (INDEX_FINGER_MCP, MIDDLE_FINGER_MCP),
        (MIDDLE_FINGER_MCP, MIDDLE_FINGER_PIP),
        (MIDDLE_FINGER_PIP, MIDDLE_FINGER_DIP),
        (MIDDLE_FINGER_DIP, MIDDLE_FINGER_TIP),
        (MIDDLE_FINGER_MCP, RING_FINGER_MCP),
        (RING_FINGER_MCP, RING_FINGER_PIP),
        (RING_FINGER_PIP, RING_FINGER_DIP),
        (RING_FINGER_DIP, RING_FINGER_TIP),
        (RING_FINGER_MCP, PINKY_MCP),
        (WRIST, PINKY_MCP),
        (PINKY_MCP, PINKY_PIP),
        (PINKY_PIP, PINKY_DIP),
        (PINKY_DIP, PINKY_TIP),
    ]
};

const NUM_HANDS: &str = "num_hands";

/// Configuration options for [`Hands`].
#[derive(Clone, Debug)]
pub struct HandsOptions {
    pub mode: Mode,
    pub max_num_hands: u32,
    pub run_on_gpu: bool,
}

impl HandsOptions {
    pub fn builder() -> HandsOptionsBuilder {
        HandsOptionsBuilder::default()
    }
}

pub struct HandsOptionsBuilder {
    mode: Mode,
    max_num_hands: u32,
    run_on_gpu: bool,
}

impl Default for HandsOptionsBuilder {
    fn default() -> Self {
        Self {
            mode: Mode::SingleShot,
            max_num_hands: 2,
            run_on_gpu: false,
        }
    }
}

impl HandsOptionsBuilder {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_num_hands(mut self, count: u32) -> Self {
        self.max_num_hands = count;
        self
    }

    pub fn run_on_gpu(mut self, gpu: bool) -> Self {
        self.run_on_gpu = gpu;
        self
    }

    pub fn build(self) -> HandsOptions {
        HandsOptions {
            mode: self.mode,
            max_num_hands: self.max_num_hands,
            run_on_gpu: self.run_on_gpu,
        }
    }
}

/// Per-frame output of the hands solution.
#[derive(Clone, Debug)]
pub struct HandsResult {
    /// Landmark lists, one per detected hand, sorted by confidence.
    pub multi_hand_landmarks: Vec<LandmarkList>,
    /// Handedness classifications, aligned with `multi_hand_landmarks`.
    pub multi_handedness: Vec<ClassificationList>,
    /// The input frame the result was produced for.
    pub source: Frame,
    /// Echoed input timestamp in streaming mode, the no-timestamp sentinel
    /// in single-shot mode.
    pub timestamp: i64,
}

impl HandsResult {
    fn from_solution(result: SolutionResult) -> Self {
        let (entries, source, timestamp) = result.into_parts();
        let mut entries = entries.into_iter();
        let multi_hand_landmarks = match entries.next() {
            Some(ResultEntry::Landmarks(lists)) => lists,
            _ => Vec::new(),
        };
        let multi_handedness = match entries.next() {
            Some(ResultEntry::Classifications(lists)) => lists,
            _ => Vec::new(),
        };
        Self {
            multi_hand_landmarks,
            multi_handedness,
            source,
            timestamp,
        }
    }
}

/// Hands solution API: a [`Pipeline`] with the hand-tracking stream layout
/// applied and results converted to [`HandsResult`].
pub struct Hands {
    pipeline: Arc<Pipeline>,
}

impl Hands {
    /// Output-stream contract of the hand-tracking graph.
    pub fn layout() -> StreamLayout {
        StreamLayout::new(vec![
            ("multi_hand_landmarks", StreamKind::Landmarks),
            ("multi_handedness", StreamKind::Classifications),
            ("image", StreamKind::EchoedInput),
        ])
    }

    pub fn config(options: &HandsOptions) -> PipelineConfig {
        PipelineConfig::builder()
            .mode(options.mode)
            .max_detections(options.max_num_hands)
            .backend(if options.run_on_gpu {
                Backend::Gpu
            } else {
                Backend::Cpu
            })
            .layout(Self::layout())
            .max_detections_packet(NUM_HANDS)
            .build()
    }

    /// Creates and starts a hands pipeline on the given engine.
    pub fn new(engine: Arc<dyn GraphEngine>, options: HandsOptions) -> Result<Self, PipelineError> {
        let pipeline = Arc::new(Pipeline::new(engine, Self::config(&options)));
        pipeline.start()?;
        Ok(Self { pipeline })
    }

    /// Sets a callback invoked when a [`HandsResult`] becomes available.
    pub fn set_result_listener<F>(&self, mut listener: F)
    where
        F: FnMut(HandsResult) + Send + 'static,
    {
        self.pipeline
            .set_result_listener(move |result| listener(HandsResult::from_solution(result)));
    }

    /// Sets a callback invoked when the solution reports an error.
    pub fn set_error_listener<F>(&self, listener: F)
    where
        F: FnMut(PipelineError) + Send + 'static,
    {
        self.pipeline.set_error_listener(listener);
    }

    /// Submits a frame for processing.
    pub fn send(&self, frame: Frame) -> Result<(), PipelineError> {
        self.pipeline.submit(frame)
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn close(&self) {
        self.pipeline.close();
    }
}

/// A specific hand landmark by hand index and landmark type. Returns the
/// default landmark when either index is out of range.
pub fn get_hand_landmark(
    result: &HandsResult,
    hand_index: usize,
    landmark_type: usize,
) -> NormalizedLandmark {
    if landmark_type >= hand_landmark::NUM_LANDMARKS {
        return NormalizedLandmark::default();
    }
    result
        .multi_hand_landmarks
        .get(hand_index)
        .and_then(|list| list.landmark.get(landmark_type))
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "hands_test.rs"]
mod hands_test;
