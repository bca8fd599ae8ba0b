use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use graph_bus::engine::GraphEngine;
use graph_bus::packet::Frame;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::pipeline::dispatch::OutputHandler;
use crate::pipeline::error::PipelineError;
use crate::pipeline::types::{Mode, PipelineConfig, SolutionResult};

/// Bridges a frame source to the engine and engine output to the
/// dispatcher. Owns the engine handle for its lifetime.
///
/// Lifecycle: `new` → `start` (once) → `submit`* → `close` (idempotent).
/// One mutex guards the open flag together with the submission path, so a
/// `close()` happens-before any later submit is observed by the engine.
pub struct Pipeline {
    engine: Arc<dyn GraphEngine>,
    config: PipelineConfig,
    handler: Arc<OutputHandler>,
    state: Mutex<PipeState>,
    /// SingleShot only: a submission is outstanding until its result or
    /// error has been delivered.
    awaiting: Arc<AtomicBool>,
    cancel: CancellationToken,
}

struct PipeState {
    started: bool,
    open: bool,
}

impl Pipeline {
    pub fn new(engine: Arc<dyn GraphEngine>, config: PipelineConfig) -> Self {
        let handler = Arc::new(OutputHandler::new(config.layout.clone(), config.mode));
        Self {
            engine,
            config,
            handler,
            state: Mutex::new(PipeState {
                started: false,
                open: true,
            }),
            awaiting: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().unwrap().started
    }

    pub fn is_closed(&self) -> bool {
        !self.state.lock().unwrap().open
    }

    /// Applies side configuration to the engine and starts the event task.
    /// Must be called exactly once, before any submit.
    pub fn start(&self) -> Result<(), PipelineError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(PipelineError::State("start on closed pipeline".into()));
        }
        if state.started {
            return Err(PipelineError::State("pipeline already started".into()));
        }
        if self.config.max_detections == 0 {
            return Err(PipelineError::Configuration(
                "max_detections must be positive".into(),
            ));
        }

        self.engine
            .configure(&self.config.side_packets())
            .map_err(|e| PipelineError::Configuration(format!("{:#}", e)))?;

        let mut events = self.engine.subscribe();
        let handler = Arc::clone(&self.handler);
        let awaiting = Arc::clone(&self.awaiting);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        log::info!("Pipeline: event task cancelled");
                        break;
                    }
                    result = events.recv() => {
                        match result {
                            Ok(event) => {
                                handler.dispatch(event);
                                // Delivery done; the next single-shot
                                // submission may proceed.
                                awaiting.store(false, Ordering::Release);
                            }
                            Err(RecvError::Closed) => {
                                log::info!("Pipeline: engine event channel closed");
                                break;
                            }
                            Err(RecvError::Lagged(n)) => {
                                log::warn!("Pipeline: lagged {} engine events", n);
                            }
                        }
                    }
                }
            }
        });

        state.started = true;
        log::info!(
            "Pipeline: started in {:?} mode ({:?} backend, max {} detections)",
            self.config.mode,
            self.config.backend,
            self.config.max_detections
        );
        Ok(())
    }

    /// Submits a frame for processing.
    ///
    /// Streaming mode is fire-and-forget: the engine may drop the frame if
    /// still busy. SingleShot mode accepts one frame at a time; a second
    /// submit before the previous result (or error) was delivered is a
    /// state error.
    pub fn submit(&self, frame: Frame) -> Result<(), PipelineError> {
        let state = self.state.lock().unwrap();
        if !state.open {
            return Err(PipelineError::State("submit on closed pipeline".into()));
        }
        if !state.started {
            return Err(PipelineError::State("submit before start".into()));
        }

        match self.config.mode {
            Mode::SingleShot => {
                if self.awaiting.swap(true, Ordering::AcqRel) {
                    return Err(PipelineError::State(
                        "previous single-shot submission still pending".into(),
                    ));
                }
                if let Err(e) = self.engine.submit(frame) {
                    self.awaiting.store(false, Ordering::Release);
                    return Err(PipelineError::EngineRuntime(format!("{:#}", e)));
                }
            }
            Mode::Streaming => {
                self.engine
                    .submit(frame)
                    .map_err(|e| PipelineError::EngineRuntime(format!("{:#}", e)))?;
            }
        }
        Ok(())
    }

    /// Replaces the result listener. Applies to subsequent deliveries,
    /// including results already in flight when the listener is set.
    pub fn set_result_listener<F>(&self, listener: F)
    where
        F: FnMut(SolutionResult) + Send + 'static,
    {
        self.handler.set_result_listener(listener);
    }

    /// Replaces the error listener.
    pub fn set_error_listener<F>(&self, listener: F)
    where
        F: FnMut(PipelineError) + Send + 'static,
    {
        self.handler.set_error_listener(listener);
    }

    /// Closes the pipeline: no deliveries after this returns, engine
    /// resources released synchronously, in-flight results discarded.
    /// Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return;
        }
        state.open = false;
        self.cancel.cancel();
        self.handler.close();
        self.engine.release();
        self.awaiting.store(false, Ordering::Release);
        log::info!("Pipeline: closed");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "pipe_test.rs"]
mod pipe_test;
