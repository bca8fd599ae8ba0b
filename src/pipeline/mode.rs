use std::sync::Arc;

use graph_bus::engine::GraphEngine;

use crate::pipeline::error::PipelineError;
use crate::pipeline::pipe::Pipeline;
use crate::pipeline::types::{Mode, PipelineConfig};

/// Builds an engine for a pipeline configuration. A real factory would load
/// the graph matching `config.backend`; tests inject doubles.
pub type EngineFactory =
    Box<dyn Fn(&PipelineConfig) -> anyhow::Result<Arc<dyn GraphEngine>> + Send + Sync>;

/// Owns the single live [`Pipeline`] and recreates it on mode change.
///
/// The previous pipeline is always fully closed before a new one is
/// constructed, so no result tagged with an old instance can be delivered
/// after a switch and never two engines are live simultaneously.
pub struct SolutionController {
    make_engine: EngineFactory,
    current: Option<(Mode, Arc<Pipeline>)>,
}

impl SolutionController {
    pub fn new(make_engine: EngineFactory) -> Self {
        Self {
            make_engine,
            current: None,
        }
    }

    /// Returns the live pipeline for `config.mode`, recreating it if the
    /// mode differs or none exists. A no-op when the mode already matches a
    /// live pipeline.
    ///
    /// On construction or start failure the previous pipeline has already
    /// been released and no partial pipeline is installed; the controller
    /// is left pipeline-less and the caller may re-attempt.
    pub fn switch_mode(&mut self, config: PipelineConfig) -> Result<Arc<Pipeline>, PipelineError> {
        if let Some((mode, pipeline)) = &self.current {
            if *mode == config.mode && !pipeline.is_closed() {
                return Ok(Arc::clone(pipeline));
            }
        }

        if let Some((mode, old)) = self.current.take() {
            log::info!("SolutionController: leaving {:?} mode", mode);
            old.close();
        }

        let engine = (self.make_engine)(&config)
            .map_err(|e| PipelineError::Configuration(format!("{:#}", e)))?;
        let mode = config.mode;
        let pipeline = Arc::new(Pipeline::new(engine, config));
        pipeline.start()?;

        log::info!("SolutionController: entered {:?} mode", mode);
        self.current = Some((mode, Arc::clone(&pipeline)));
        Ok(pipeline)
    }

    pub fn pipeline(&self) -> Option<Arc<Pipeline>> {
        self.current
            .as_ref()
            .map(|(_, pipeline)| Arc::clone(pipeline))
    }

    pub fn mode(&self) -> Option<Mode> {
        self.current.as_ref().map(|(mode, _)| *mode)
    }

    /// Closes and forgets the live pipeline, if any.
    pub fn teardown(&mut self) {
        if let Some((_, pipeline)) = self.current.take() {
            pipeline.close();
        }
    }
}

impl Drop for SolutionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
