//! Decoded landmark and classification payloads.
//!
//! Engine output packets carry these as serialized bytes; the dispatcher
//! parses them into the typed collections below. Field names follow the
//! upstream landmark wire schema.

use serde::{Deserialize, Serialize};

/// A single landmark, coordinates normalized to `[0.0, 1.0]` by image width
/// and height. `z` shares the scale of `x`; smaller values are closer to
/// the camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

/// Landmarks for one detected object, in a fixed per-solution order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkList {
    pub landmark: Vec<NormalizedLandmark>,
}

/// One label with a confidence score.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub index: i32,
    pub score: f32,
    pub label: String,
}

/// Classifications for one detected object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationList {
    pub classification: Vec<Classification>,
}

/// Parses a landmark stream payload: one list per detected object.
pub fn parse_landmark_lists(data: &[u8]) -> anyhow::Result<Vec<LandmarkList>> {
    serde_json::from_slice(data).map_err(|e| anyhow::anyhow!("landmark payload: {}", e))
}

/// Parses a classification stream payload: one list per detected object.
pub fn parse_classification_lists(data: &[u8]) -> anyhow::Result<Vec<ClassificationList>> {
    serde_json::from_slice(data).map_err(|e| anyhow::anyhow!("classification payload: {}", e))
}

/// Serializes landmark lists into the payload form engines emit. Used by
/// in-process engines and test doubles.
pub fn encode_landmark_lists(lists: &[LandmarkList]) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec(lists).map_err(|e| anyhow::anyhow!("encode landmarks: {}", e))
}

/// Serializes classification lists into the payload form engines emit.
pub fn encode_classification_lists(lists: &[ClassificationList]) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec(lists).map_err(|e| anyhow::anyhow!("encode classifications: {}", e))
}
