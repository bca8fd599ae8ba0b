use futures::{Stream, StreamExt};
use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::Instant,
};

use graph_bus::packet::Frame;
use tokio_util::sync::CancellationToken;

use crate::pipeline::error::PipelineError;
use crate::pipeline::pipe::Pipeline;

/// Channel-backed frame source decoupling a producer (camera callback,
/// image decoder) from pipeline submission.
///
/// Tags streamed frames with strictly increasing timestamps; still images
/// keep their sentinel timestamp. Bounded: when the buffer is full the
/// newest frame is rejected rather than blocking the producer.
pub struct FrameFeed {
    writer: tokio::sync::mpsc::Sender<Frame>,
    inner: Mutex<tokio::sync::mpsc::Receiver<Frame>>,
    started: Instant,
    last_timestamp: Mutex<i64>,
}

impl FrameFeed {
    pub fn new() -> Self {
        Self::with_capacity(32)
    }

    pub fn with_capacity(buffer_size: usize) -> Self {
        let (writer, receiver) = tokio::sync::mpsc::channel(buffer_size);
        Self {
            writer,
            inner: Mutex::new(receiver),
            started: Instant::now(),
            last_timestamp: Mutex::new(0),
        }
    }

    /// Next stream timestamp: microseconds since the feed was created,
    /// bumped to stay strictly increasing for frames produced in the same
    /// microsecond.
    pub fn next_timestamp(&self) -> i64 {
        let now = self.started.elapsed().as_micros() as i64;
        let mut last = self.last_timestamp.lock().unwrap();
        let next = now.max(*last + 1);
        *last = next;
        next
    }

    /// Enqueues a live frame tagged with the next stream timestamp.
    /// Returns false when the buffer is full or the feed is closed.
    pub fn push_stream_frame(&self, data: Vec<u8>, width: u32, height: u32) -> bool {
        let frame = Frame::new(data, width, height, self.next_timestamp());
        self.try_send(frame)
    }

    /// Enqueues a still image (sentinel timestamp).
    pub fn push_still_frame(&self, data: Vec<u8>, width: u32, height: u32) -> bool {
        self.try_send(Frame::still(data, width, height))
    }

    pub fn try_send(&self, frame: Frame) -> bool {
        self.writer.try_send(frame).is_ok()
    }

    /// Returns a stream of frames. Use when holding `Arc<FrameFeed>`.
    pub fn as_stream(this: Arc<Self>) -> FrameFeedStream {
        FrameFeedStream(this)
    }
}

impl Default for FrameFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for FrameFeed {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut guard = self.get_mut().inner.lock().unwrap();
        guard.poll_recv(cx)
    }
}

/// Wrapper to use `Arc<FrameFeed>` as Stream (orphan rule workaround).
pub struct FrameFeedStream(pub Arc<FrameFeed>);

impl Stream for FrameFeedStream {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut guard = self.0.inner.lock().unwrap();
        guard.poll_recv(cx)
    }
}

/// Forwards frames from a feed into a pipeline until the feed ends, the
/// pipeline closes or the token is cancelled.
pub async fn forward_feed_to_pipeline(
    feed: Arc<FrameFeed>,
    pipeline: Arc<Pipeline>,
    cancel: CancellationToken,
) {
    let mut stream = FrameFeed::as_stream(feed);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("FrameFeed: forward cancelled");
                break;
            }
            next = stream.next() => {
                match next {
                    Some(frame) => match pipeline.submit(frame) {
                        Ok(()) => {}
                        Err(PipelineError::State(_)) => {
                            log::info!("FrameFeed: pipeline closed, stopping forward");
                            break;
                        }
                        Err(e) => {
                            log::warn!("FrameFeed: submit failed: {}", e);
                        }
                    },
                    None => break,
                }
            }
        }
    }
}
