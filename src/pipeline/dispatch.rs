use std::sync::{Arc, Mutex};

use graph_bus::engine::EngineEvent;
use graph_bus::packet::{Bundle, NO_TIMESTAMP};

use crate::landmark::{parse_classification_lists, parse_landmark_lists};
use crate::pipeline::error::PipelineError;
use crate::pipeline::types::{Mode, ResultEntry, SolutionResult, StreamKind, StreamLayout};

pub type ResultListener = Box<dyn FnMut(SolutionResult) + Send>;
pub type ErrorListener = Box<dyn FnMut(PipelineError) + Send>;

/// Decodes engine bundles into [`SolutionResult`]s and publishes them to a
/// single replaceable listener.
///
/// All deliveries go through [`OutputHandler::dispatch`], which is only ever
/// called from the pipeline's single event task, so listeners observe
/// results in arrival order and never concurrently. One lock guards the
/// listener slots and the closed flag, so replacing a listener cannot race
/// a delivery in progress; a listener set while a frame is in flight
/// receives that frame's result.
pub struct OutputHandler {
    layout: StreamLayout,
    mode: Mode,
    slots: Arc<Mutex<ListenerSlots>>,
}

#[derive(Default)]
struct ListenerSlots {
    result: Option<ResultListener>,
    error: Option<ErrorListener>,
    closed: bool,
}

impl ListenerSlots {
    fn deliver_error(&mut self, error: PipelineError) {
        match self.error.as_mut() {
            Some(listener) => listener(error),
            None => log::error!("OutputHandler: no error listener for: {}", error),
        }
    }
}

impl OutputHandler {
    pub fn new(layout: StreamLayout, mode: Mode) -> Self {
        Self {
            layout,
            mode,
            slots: Arc::new(Mutex::new(ListenerSlots::default())),
        }
    }

    /// Replaces the result listener. Takes effect for subsequent deliveries
    /// only; past results are not replayed.
    pub fn set_result_listener<F>(&self, listener: F)
    where
        F: FnMut(SolutionResult) + Send + 'static,
    {
        self.slots.lock().unwrap().result = Some(Box::new(listener));
    }

    /// Replaces the error listener.
    pub fn set_error_listener<F>(&self, listener: F)
    where
        F: FnMut(PipelineError) + Send + 'static,
    {
        self.slots.lock().unwrap().error = Some(Box::new(listener));
    }

    /// Stops all further deliveries. Idempotent.
    pub fn close(&self) {
        self.slots.lock().unwrap().closed = true;
    }

    /// Decodes one engine event and invokes the matching listener. Events
    /// arriving after close are silently discarded.
    pub fn dispatch(&self, event: EngineEvent) {
        let mut slots = self.slots.lock().unwrap();
        if slots.closed {
            return;
        }
        match event {
            EngineEvent::Output(bundle) => {
                match decode_bundle(&self.layout, self.mode, bundle) {
                    Ok(result) => match slots.result.as_mut() {
                        Some(listener) => listener(result),
                        None => log::trace!("OutputHandler: no result listener, dropping result"),
                    },
                    Err(e) => slots.deliver_error(e),
                }
            }
            EngineEvent::Error(message) => {
                slots.deliver_error(PipelineError::EngineRuntime(message));
            }
        }
    }
}

/// Decodes a bundle against the configured layout.
///
/// A missing or malformed mandatory payload fails the whole bundle; no
/// partial result is produced.
pub fn decode_bundle(
    layout: &StreamLayout,
    mode: Mode,
    bundle: Bundle,
) -> Result<SolutionResult, PipelineError> {
    if bundle.stream_count() != layout.len() {
        return Err(PipelineError::Decode {
            stream: "<bundle>".to_string(),
            message: format!(
                "bundle has {} streams, layout expects {}",
                bundle.stream_count(),
                layout.len()
            ),
        });
    }

    let (packets, source) = bundle.into_parts();
    let mut entries = Vec::with_capacity(layout.payload_streams().len());
    for (index, (name, kind)) in layout.payload_streams().iter().enumerate() {
        let packet = packets.get(index).ok_or_else(|| PipelineError::Decode {
            stream: name.clone(),
            message: "missing packet".to_string(),
        })?;
        let entry = match kind {
            StreamKind::Landmarks => parse_landmark_lists(packet.data())
                .map(ResultEntry::Landmarks)
                .map_err(|e| PipelineError::Decode {
                    stream: name.clone(),
                    message: format!("{:#}", e),
                })?,
            StreamKind::Classifications => parse_classification_lists(packet.data())
                .map(ResultEntry::Classifications)
                .map_err(|e| PipelineError::Decode {
                    stream: name.clone(),
                    message: format!("{:#}", e),
                })?,
            // Layout construction keeps the echoed input out of payload
            // streams.
            StreamKind::EchoedInput => {
                return Err(PipelineError::Decode {
                    stream: name.clone(),
                    message: "echoed input in payload position".to_string(),
                });
            }
        };
        entries.push(entry);
    }

    let timestamp = match mode {
        Mode::SingleShot => NO_TIMESTAMP,
        Mode::Streaming => source.timestamp(),
    };
    Ok(SolutionResult::new(entries, source, timestamp))
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod dispatch_test;
