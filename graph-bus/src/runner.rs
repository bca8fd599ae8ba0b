use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use tokio_util::sync::CancellationToken;

use crate::engine::{EngineEvent, EngineEventReceiver, EngineEventSender, GraphEngine};
use crate::packet::{Bundle, Frame, Packet};

/// Per-frame processing function run by [`LocalGraphRunner`]. Returns one
/// payload packet per configured output stream (echoed input excluded).
pub type ProcessFn =
    dyn Fn(&Frame, &HashMap<String, i32>) -> anyhow::Result<Vec<Packet>> + Send + Sync;

/// In-process engine running a pluggable processing function on the
/// blocking thread pool.
///
/// Keeps a single in-flight slot: a submit while the previous frame is
/// still processing drops the new frame (drop newest, keep processing
/// oldest). Outputs are therefore emitted in submission order.
pub struct LocalGraphRunner {
    process: Arc<ProcessFn>,
    events: EngineEventSender,
    cancel: CancellationToken,
    busy: Arc<AtomicBool>,
    configured: AtomicBool,
    side_packets: Mutex<HashMap<String, i32>>,
}

impl LocalGraphRunner {
    pub fn new<F>(process: F) -> Self
    where
        F: Fn(&Frame, &HashMap<String, i32>) -> anyhow::Result<Vec<Packet>>
            + Send
            + Sync
            + 'static,
    {
        let (events, _) = tokio::sync::broadcast::channel(64);
        Self {
            process: Arc::new(process),
            events,
            cancel: CancellationToken::new(),
            busy: Arc::new(AtomicBool::new(false)),
            configured: AtomicBool::new(false),
            side_packets: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_released(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True while a frame occupies the in-flight slot. Slot release happens
    /// shortly after the frame's event is observable.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl GraphEngine for LocalGraphRunner {
    fn configure(&self, side_packets: &HashMap<String, i32>) -> anyhow::Result<()> {
        if self.cancel.is_cancelled() {
            anyhow::bail!("engine already released");
        }
        if self.configured.swap(true, Ordering::SeqCst) {
            anyhow::bail!("engine already configured");
        }
        *self.side_packets.lock().unwrap() = side_packets.clone();
        log::info!("LocalGraphRunner: configured with {:?}", side_packets);
        Ok(())
    }

    fn subscribe(&self) -> EngineEventReceiver {
        self.events.subscribe()
    }

    fn submit(&self, frame: Frame) -> anyhow::Result<()> {
        if self.cancel.is_cancelled() {
            anyhow::bail!("submit on released engine");
        }

        // Single in-flight slot: drop the new frame if still busy.
        if self.busy.swap(true, Ordering::AcqRel) {
            log::trace!("LocalGraphRunner: busy, dropping {}", frame);
            return Ok(());
        }

        let process = Arc::clone(&self.process);
        let events = self.events.clone();
        let busy = Arc::clone(&self.busy);
        let cancel = self.cancel.clone();
        let side_packets = self.side_packets.lock().unwrap().clone();

        tokio::task::spawn_blocking(move || {
            let result = (process)(&frame, &side_packets);
            if !cancel.is_cancelled() {
                let event = match result {
                    Ok(packets) => EngineEvent::Output(Bundle::new(packets, frame)),
                    Err(e) => EngineEvent::Error(format!("{:#}", e)),
                };
                // Send error means no live subscriber; nothing to do.
                let _ = events.send(event);
            }
            busy.store(false, Ordering::Release);
        });

        Ok(())
    }

    fn release(&self) {
        self.cancel.cancel();
    }
}

impl Drop for LocalGraphRunner {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod runner_test;
