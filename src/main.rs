use std::sync::Arc;

use graph_bus::packet::Packet;
use graph_bus::runner::LocalGraphRunner;
use tokio_util::sync::CancellationToken;

use landmark_pipe::landmark::{LandmarkList, NormalizedLandmark, encode_landmark_lists};
use landmark_pipe::pipeline::{FrameFeed, Mode, source::forward_feed_to_pipeline};
use landmark_pipe::solutions::hands::{Hands, HandsOptions, get_hand_landmark, hand_landmark};

/// Synthetic hand sweeping across the image, for running the streaming
/// path without a real graph.
fn synthetic_hand(timestamp: i64) -> LandmarkList {
    let phase = (timestamp % 1_000_000) as f32 / 1_000_000.0;
    LandmarkList {
        landmark: (0..hand_landmark::NUM_LANDMARKS)
            .map(|i| NormalizedLandmark {
                x: phase,
                y: i as f32 / hand_landmark::NUM_LANDMARKS as f32,
                z: 0.0,
                visibility: None,
            })
            .collect(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let engine = Arc::new(LocalGraphRunner::new(|frame, _side| {
        let lists = vec![synthetic_hand(frame.timestamp())];
        Ok(vec![
            Packet::new(encode_landmark_lists(&lists)?, frame.timestamp()),
            Packet::new(b"[]".to_vec(), frame.timestamp()),
        ])
    }));

    let hands = Hands::new(
        engine,
        HandsOptions::builder()
            .mode(Mode::Streaming)
            .max_num_hands(1)
            .build(),
    )?;

    hands.set_result_listener(|result| {
        let wrist = get_hand_landmark(&result, 0, hand_landmark::WRIST);
        log::info!(
            "hands result ts={} wrist=({:.3}, {:.3})",
            result.timestamp,
            wrist.x,
            wrist.y
        );
    });
    hands.set_error_listener(|error| {
        log::error!("hands error: {}", error);
    });

    let cancel = CancellationToken::new();
    let feed = Arc::new(FrameFeed::new());

    let forward = tokio::spawn(forward_feed_to_pipeline(
        Arc::clone(&feed),
        hands.pipeline(),
        cancel.clone(),
    ));

    // Synthetic camera: ~30 fps until ctrl-c.
    let producer_cancel = cancel.clone();
    let producer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(33));
        loop {
            tokio::select! {
                _ = producer_cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !feed.push_stream_frame(vec![0u8; 64], 8, 8) {
                        log::warn!("frame feed full, dropping frame");
                    }
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    let _ = producer.await;
    let _ = forward.await;
    hands.close();

    Ok(())
}
