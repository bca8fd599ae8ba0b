//! Face mesh solution.
//!
//! Processes a frame and returns the face landmarks of each detected face.

use std::sync::Arc;

use graph_bus::engine::GraphEngine;
use graph_bus::packet::Frame;

use crate::landmark::LandmarkList;
use crate::pipeline::{
    Backend, Mode, Pipeline, PipelineConfig, PipelineError, ResultEntry, SolutionResult,
    StreamKind, StreamLayout,
};

const NUM_FACES: &str = "num_faces";

/// Configuration options for [`FaceMesh`].
#[derive(Clone, Debug)]
pub struct FaceMeshOptions {
    pub mode: Mode,
    pub max_num_faces: u32,
    pub run_on_gpu: bool,
}

impl FaceMeshOptions {
    pub fn builder() -> FaceMeshOptionsBuilder {
        FaceMeshOptionsBuilder::default()
    }
}

pub struct FaceMeshOptionsBuilder {
    mode: Mode,
    max_num_faces: u32,
    run_on_gpu: bool,
}

impl Default for FaceMeshOptionsBuilder {
    fn default() -> Self {
        Self {
            mode: Mode::SingleShot,
            max_num_faces: 1,
            run_on_gpu: false,
        }
    }
}

impl FaceMeshOptionsBuilder {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_num_faces(mut self, count: u32) -> Self {
        self.max_num_faces = count;
        self
    }

    pub fn run_on_gpu(mut self, gpu: bool) -> Self {
        self.run_on_gpu = gpu;
        self
    }

    pub fn build(self) -> FaceMeshOptions {
        FaceMeshOptions {
            mode: self.mode,
            max_num_faces: self.max_num_faces,
            run_on_gpu: self.run_on_gpu,
        }
    }
}

/// Per-frame output of the face mesh solution.
#[derive(Clone, Debug)]
pub struct FaceMeshResult {
    /// Landmark lists, one per detected face.
    pub multi_face_landmarks: Vec<LandmarkList>,
    /// The input frame the result was produced for.
    pub source: Frame,
    /// Echoed input timestamp in streaming mode, the no-timestamp sentinel
    /// in single-shot mode.
    pub timestamp: i64,
}

impl FaceMeshResult {
    fn from_solution(result: SolutionResult) -> Self {
        let (entries, source, timestamp) = result.into_parts();
        let multi_face_landmarks = match entries.into_iter().next() {
            Some(ResultEntry::Landmarks(lists)) => lists,
            _ => Vec::new(),
        };
        Self {
            multi_face_landmarks,
            source,
            timestamp,
        }
    }
}

/// Face mesh solution API.
pub struct FaceMesh {
    pipeline: Arc<Pipeline>,
}

impl FaceMesh {
    /// Output-stream contract of the face-landmark graph.
    pub fn layout() -> StreamLayout {
        StreamLayout::new(vec![
            ("multi_face_landmarks", StreamKind::Landmarks),
            ("image", StreamKind::EchoedInput),
        ])
    }

    pub fn config(options: &FaceMeshOptions) -> PipelineConfig {
        PipelineConfig::builder()
            .mode(options.mode)
            .max_detections(options.max_num_faces)
            .backend(if options.run_on_gpu {
                Backend::Gpu
            } else {
                Backend::Cpu
            })
            .layout(Self::layout())
            .max_detections_packet(NUM_FACES)
            .build()
    }

    /// Creates and starts a face mesh pipeline on the given engine.
    pub fn new(
        engine: Arc<dyn GraphEngine>,
        options: FaceMeshOptions,
    ) -> Result<Self, PipelineError> {
        let pipeline = Arc::new(Pipeline::new(engine, Self::config(&options)));
        pipeline.start()?;
        Ok(Self { pipeline })
    }

    /// Sets a callback invoked when a [`FaceMeshResult`] becomes available.
    pub fn set_result_listener<F>(&self, mut listener: F)
    where
        F: FnMut(FaceMeshResult) + Send + 'static,
    {
        self.pipeline
            .set_result_listener(move |result| listener(FaceMeshResult::from_solution(result)));
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
