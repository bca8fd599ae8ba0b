//! Typed solution wrappers over the pipeline core.
//!
//! Each solution fixes the engine's output-stream layout, side-packet names
//! and result shape, so callers work with domain types instead of raw
//! bundles.

pub mod face_mesh;
pub mod hands;

pub use face_mesh::{FaceMesh, FaceMeshOptions, FaceMeshResult};
pub use hands::{Hands, HandsOptions, HandsResult};
