//! Landmark solution pipeline over an opaque graph-execution engine.
//!
//! Data flow:
//! ```text
//! FrameFeed ──► Pipeline::submit(frame) ──► [GraphEngine]
//!                                                │
//!                       EngineEvent::Output(bundle) / Error(message)
//!                                                │
//!                                                ▼
//!                  OutputHandler ── decode ──► result / error listener
//! ```
//!
//! The engine behind [`graph_bus::engine::GraphEngine`] executes
//! asynchronously on threads this crate does not own and keeps at most one
//! frame in flight; everything above it is mode lifecycle, submission
//! serialization and ordered result delivery.

pub mod landmark;
pub mod pipeline;
pub mod solutions;
