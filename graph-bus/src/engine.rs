use std::collections::HashMap;

use crate::packet::{Bundle, Frame};

pub type EngineEventSender = tokio::sync::broadcast::Sender<EngineEvent>;
pub type EngineEventReceiver = tokio::sync::broadcast::Receiver<EngineEvent>;

/// Event emitted by an engine on its own threads.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// Outputs for one processed frame, in output-stream order.
    Output(Bundle),
    /// A per-frame or fatal processing fault.
    Error(String),
}

/// Capability interface over a graph-execution engine.
///
/// The engine schedules processing on threads this layer does not control
/// and keeps at most one frame in flight. Any concrete engine (test double
/// or a real backend) implements this trait, so pipeline and dispatch logic
/// never depend on a specific runtime.
pub trait GraphEngine: Send + Sync {
    /// Applies side configuration (e.g. a max-detections count). Called
    /// once, before the first frame.
    fn configure(&self, side_packets: &HashMap<String, i32>) -> anyhow::Result<()>;

    /// Subscribes to output and error events.
    fn subscribe(&self) -> EngineEventReceiver;

    /// Enqueues a frame for asynchronous processing. The engine may
    /// silently drop the frame if it is still busy with a previous one.
    fn submit(&self, frame: Frame) -> anyhow::Result<()>;

    /// Synchronous teardown. Frames still in flight may be discarded.
    fn release(&self);
}
