use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use graph_bus::engine::{EngineEvent, EngineEventReceiver, EngineEventSender, GraphEngine};
use graph_bus::packet::{Bundle, Frame, NO_TIMESTAMP, Packet};
use tokio::time::timeout;

use super::Pipeline;
use crate::landmark::{LandmarkList, NormalizedLandmark, encode_landmark_lists};
use crate::pipeline::error::PipelineError;
use crate::pipeline::mode::SolutionController;
use crate::pipeline::types::{Mode, PipelineConfig, StreamKind, StreamLayout};

// ------------------------------------------------------------------------
// Test double: scripted engine
// ------------------------------------------------------------------------

/// Engine double: records configuration and submissions, emits whatever the
/// test scripts via `emit_output` / `emit_error`.
struct FakeEngine {
    events: EngineEventSender,
    side_packets: Mutex<Option<HashMap<String, i32>>>,
    submitted: Mutex<Vec<Frame>>,
    released: AtomicBool,
    fail_configure: bool,
}

impl FakeEngine {
    fn new() -> Arc<Self> {
        Self::with_fail_configure(false)
    }

    fn with_fail_configure(fail_configure: bool) -> Arc<Self> {
        let (events, _) = tokio::sync::broadcast::channel(32);
        Arc::new(Self {
            events,
            side_packets: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
            fail_configure,
        })
    }

    fn emit_output(&self, bundle: Bundle) {
        let _ = self.events.send(EngineEvent::Output(bundle));
    }

    fn emit_error(&self, message: &str) {
        let _ = self.events.send(EngineEvent::Error(message.to_string()));
    }

    fn submitted(&self) -> Vec<Frame> {
        self.submitted.lock().unwrap().clone()
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn side_packets(&self) -> Option<HashMap<String, i32>> {
        self.side_packets.lock().unwrap().clone()
    }
}

impl GraphEngine for FakeEngine {
    fn configure(&self, side_packets: &HashMap<String, i32>) -> anyhow::Result<()> {
        if self.fail_configure {
            anyhow::bail!("graph failed to load");
        }
        *self.side_packets.lock().unwrap() = Some(side_packets.clone());
        Ok(())
    }

    fn subscribe(&self) -> EngineEventReceiver {
        self.events.subscribe()
    }

    fn submit(&self, frame: Frame) -> anyhow::Result<()> {
        if self.released.load(Ordering::Acquire) {
            anyhow::bail!("submit on released engine");
        }
        self.submitted.lock().unwrap().push(frame);
        Ok(())
    }

    fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

// ------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------

fn layout() -> StreamLayout {
    StreamLayout::new(vec![
        ("multi_hand_landmarks", StreamKind::Landmarks),
        ("image", StreamKind::EchoedInput),
    ])
}

fn config(mode: Mode) -> PipelineConfig {
    PipelineConfig::builder()
        .mode(mode)
        .max_detections(2)
        .layout(layout())
        .max_detections_packet("num_hands")
        .build()
}

fn frame(ts: i64) -> Frame {
    Frame::new(vec![0u8; 8], 2, 2, ts)
}

fn output_for(input: &Frame) -> Bundle {
    let lists = vec![LandmarkList {
        landmark: vec![NormalizedLandmark::default()],
    }];
    Bundle::new(
        vec![Packet::new(
            encode_landmark_lists(&lists).unwrap(),
            input.timestamp(),
        )],
        input.clone(),
    )
}

fn malformed_output_for(input: &Frame) -> Bundle {
    Bundle::new(
        vec![Packet::new(b"garbage".to_vec(), input.timestamp())],
        input.clone(),
    )
}

/// What the listeners observed, in delivery order.
#[derive(Debug, PartialEq)]
enum Delivered {
    Result(i64),
    Error(String),
}

fn attach_listeners(
    pipeline: &Pipeline,
) -> tokio::sync::mpsc::UnboundedReceiver<Delivered> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let result_tx = tx.clone();
    pipeline.set_result_listener(move |result| {
        let _ = result_tx.send(Delivered::Result(result.timestamp()));
    });
    pipeline.set_error_listener(move |error| {
        let _ = tx.send(Delivered::Error(error.to_string()));
    });
    rx
}

async fn recv_delivery(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<Delivered>,
) -> Delivered {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("delivery in time")
        .expect("listener channel open")
}

/// Submits once the previous single-shot delivery has unblocked the slot.
async fn submit_when_idle(pipeline: &Pipeline, frame: Frame) {
    for _ in 0..200 {
        match pipeline.submit(frame.clone()) {
            Ok(()) => return,
            Err(PipelineError::State(_)) => tokio::time::sleep(Duration::from_millis(2)).await,
            Err(e) => panic!("unexpected submit error: {}", e),
        }
    }
    panic!("pipeline never became idle");
}

// ------------------------------------------------------------------------
// Lifecycle
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_start_applies_side_packets_once() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::Streaming));
    assert!(!pipeline.is_started());

    pipeline.start().unwrap();
    assert!(pipeline.is_started());

    let mut expected = HashMap::new();
    expected.insert("num_hands".to_string(), 2);
    assert_eq!(engine.side_packets(), Some(expected));
}

#[tokio::test]
async fn test_double_start_is_a_state_error() {
    let pipeline = Pipeline::new(FakeEngine::new(), config(Mode::Streaming));
    pipeline.start().unwrap();

    match pipeline.start() {
        Err(PipelineError::State(_)) => {}
        other => panic!("expected state error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_before_start_is_a_state_error() {
    let pipeline = Pipeline::new(FakeEngine::new(), config(Mode::Streaming));

    match pipeline.submit(frame(1)) {
        Err(PipelineError::State(_)) => {}
        other => panic!("expected state error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_configure_failure_is_fatal_configuration_error() {
    let engine = FakeEngine::with_fail_configure(true);
    let pipeline = Pipeline::new(engine, config(Mode::Streaming));

    match pipeline.start() {
        Err(PipelineError::Configuration(message)) => {
            assert!(message.contains("graph failed to load"));
        }
        other => panic!("expected configuration error, got {:?}", other),
    }
    assert!(!pipeline.is_started());
}

#[tokio::test]
async fn test_zero_max_detections_rejected_at_start() {
    let cfg = PipelineConfig::builder()
        .mode(Mode::Streaming)
        .max_detections(0)
        .layout(layout())
        .build();
    let pipeline = Pipeline::new(FakeEngine::new(), cfg);

    match pipeline.start() {
        Err(PipelineError::Configuration(_)) => {}
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_close_is_idempotent_and_releases_engine() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::Streaming));
    pipeline.start().unwrap();

    pipeline.close();
    assert!(pipeline.is_closed());
    assert!(engine.is_released());

    // Second close has no observable effect.
    pipeline.close();
    assert!(pipeline.is_closed());
}

#[tokio::test]
async fn test_submit_after_close_is_a_state_error() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::Streaming));
    pipeline.start().unwrap();
    pipeline.close();

    match pipeline.submit(frame(1)) {
        Err(PipelineError::State(_)) => {}
        other => panic!("expected state error, got {:?}", other),
    }
    assert!(engine.submitted().is_empty());
}

#[tokio::test]
async fn test_no_delivery_after_close() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::Streaming));
    pipeline.start().unwrap();
    let mut rx = attach_listeners(&pipeline);

    pipeline.close();
    engine.emit_output(output_for(&frame(1)));

    assert!(
        timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
        "closed pipeline must not deliver"
    );
}

// ------------------------------------------------------------------------
// Single-shot mode
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_single_shot_one_result_per_submission() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::SingleShot));
    pipeline.start().unwrap();
    let mut rx = attach_listeners(&pipeline);

    pipeline.submit(frame(NO_TIMESTAMP)).unwrap();

    // Second submit while the first is outstanding is rejected.
    match pipeline.submit(frame(NO_TIMESTAMP)) {
        Err(PipelineError::State(_)) => {}
        other => panic!("expected state error, got {:?}", other),
    }

    engine.emit_output(output_for(&engine.submitted()[0]));
    assert_eq!(recv_delivery(&mut rx).await, Delivered::Result(NO_TIMESTAMP));

    // Delivery frees the slot for the next submission.
    submit_when_idle(&pipeline, frame(NO_TIMESTAMP)).await;
    engine.emit_output(output_for(&engine.submitted()[1]));
    assert_eq!(recv_delivery(&mut rx).await, Delivered::Result(NO_TIMESTAMP));

    assert_eq!(engine.submitted().len(), 2);
}

#[tokio::test]
async fn test_single_shot_error_frees_the_slot() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::SingleShot));
    pipeline.start().unwrap();
    let mut rx = attach_listeners(&pipeline);

    pipeline.submit(frame(NO_TIMESTAMP)).unwrap();
    engine.emit_error("landmark graph fault");

    match recv_delivery(&mut rx).await {
        Delivered::Error(message) => assert!(message.contains("landmark graph fault")),
        other => panic!("expected error delivery, got {:?}", other),
    }

    submit_when_idle(&pipeline, frame(NO_TIMESTAMP)).await;
    assert_eq!(engine.submitted().len(), 2);
}

#[tokio::test]
async fn test_single_shot_results_carry_sentinel_timestamp() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::SingleShot));
    pipeline.start().unwrap();
    let mut rx = attach_listeners(&pipeline);

    pipeline.submit(frame(NO_TIMESTAMP)).unwrap();
    engine.emit_output(output_for(&engine.submitted()[0]));

    assert_eq!(recv_delivery(&mut rx).await, Delivered::Result(NO_TIMESTAMP));
}

// ------------------------------------------------------------------------
// Streaming mode
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_streaming_results_delivered_in_timestamp_order() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::Streaming));
    pipeline.start().unwrap();
    let mut rx = attach_listeners(&pipeline);

    for ts in [10i64, 20, 30] {
        pipeline.submit(frame(ts)).unwrap();
    }
    for input in engine.submitted() {
        engine.emit_output(output_for(&input));
    }

    let mut timestamps = Vec::new();
    for _ in 0..3 {
        match recv_delivery(&mut rx).await {
            Delivered::Result(ts) => timestamps.push(ts),
            other => panic!("expected result, got {:?}", other),
        }
    }
    assert_eq!(timestamps, vec![10, 20, 30]);
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_streaming_dropped_frames_never_duplicate() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::Streaming));
    pipeline.start().unwrap();
    let mut rx = attach_listeners(&pipeline);

    // Engine processed only the first and third frame.
    for ts in [1i64, 2, 3] {
        pipeline.submit(frame(ts)).unwrap();
    }
    let submitted = engine.submitted();
    engine.emit_output(output_for(&submitted[0]));
    engine.emit_output(output_for(&submitted[2]));

    assert_eq!(recv_delivery(&mut rx).await, Delivered::Result(1));
    assert_eq!(recv_delivery(&mut rx).await, Delivered::Result(3));
    assert!(
        timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
        "delivered count must stay <= submitted count"
    );
}

#[tokio::test]
async fn test_decode_failure_mid_stream_yields_result_error_result() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::Streaming));
    pipeline.start().unwrap();
    let mut rx = attach_listeners(&pipeline);

    for ts in [1i64, 2, 3] {
        pipeline.submit(frame(ts)).unwrap();
    }
    let submitted = engine.submitted();
    engine.emit_output(output_for(&submitted[0]));
    engine.emit_output(malformed_output_for(&submitted[1]));
    engine.emit_output(output_for(&submitted[2]));

    assert_eq!(recv_delivery(&mut rx).await, Delivered::Result(1));
    match recv_delivery(&mut rx).await {
        Delivered::Error(message) => assert!(message.contains("multi_hand_landmarks")),
        other => panic!("expected decode error, got {:?}", other),
    }
    assert_eq!(recv_delivery(&mut rx).await, Delivered::Result(3));
}

#[tokio::test]
async fn test_listener_set_after_submit_receives_in_flight_result() {
    let engine = FakeEngine::new();
    let pipeline = Pipeline::new(engine.clone(), config(Mode::Streaming));
    pipeline.start().unwrap();

    // Frame submitted with no listener registered yet.
    pipeline.submit(frame(5)).unwrap();

    let mut rx = attach_listeners(&pipeline);
    engine.emit_output(output_for(&engine.submitted()[0]));

    assert_eq!(recv_delivery(&mut rx).await, Delivered::Result(5));
}

// ------------------------------------------------------------------------
// Mode switching
// ------------------------------------------------------------------------

fn controller_with_engines() -> (SolutionController, Arc<Mutex<Vec<Arc<FakeEngine>>>>) {
    let engines: Arc<Mutex<Vec<Arc<FakeEngine>>>> = Arc::new(Mutex::new(Vec::new()));
    let made = Arc::clone(&engines);
    let controller = SolutionController::new(Box::new(move |_config| {
        let engine = FakeEngine::new();
        made.lock().unwrap().push(Arc::clone(&engine));
        let engine: Arc<dyn GraphEngine> = engine;
        Ok(engine)
    }));
    (controller, engines)
}

#[tokio::test]
async fn test_switch_mode_same_mode_is_a_noop() {
    let (mut controller, engines) = controller_with_engines();

    let first = controller.switch_mode(config(Mode::Streaming)).unwrap();
    let second = controller.switch_mode(config(Mode::Streaming)).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(engines.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_switch_mode_releases_previous_pipeline_first() {
    let (mut controller, engines) = controller_with_engines();

    let streaming = controller.switch_mode(config(Mode::Streaming)).unwrap();
    let mut old_rx = attach_listeners(&streaming);
    streaming.submit(frame(1)).unwrap();

    let single_shot = controller.switch_mode(config(Mode::SingleShot)).unwrap();
    assert!(!Arc::ptr_eq(&streaming, &single_shot));
    assert!(streaming.is_closed());

    let engines = engines.lock().unwrap();
    assert_eq!(engines.len(), 2);
    assert!(engines[0].is_released());
    assert!(!engines[1].is_released());

    // A late result from the old engine is never delivered.
    engines[0].emit_output(output_for(&engines[0].submitted()[0]));
    assert!(
        timeout(Duration::from_millis(100), old_rx.recv()).await.is_err(),
        "old pipeline must not deliver after switch"
    );
}

#[tokio::test]
async fn test_switch_mode_failure_leaves_controller_pipeline_less() {
    let failing = AtomicBool::new(false);
    let mut controller = SolutionController::new(Box::new(move |_config| {
        if failing.swap(true, Ordering::SeqCst) {
            anyhow::bail!("no graph for this mode");
        }
        let engine: Arc<dyn GraphEngine> = FakeEngine::new();
        Ok(engine)
    }));

    let streaming = controller.switch_mode(config(Mode::Streaming)).unwrap();

    match controller.switch_mode(config(Mode::SingleShot)) {
        Err(PipelineError::Configuration(_)) => {}
        other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
    }

    // Old pipeline already released, nothing installed in its place.
    assert!(streaming.is_closed());
    assert!(controller.pipeline().is_none());
}
