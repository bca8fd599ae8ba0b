//! Pipeline core: mode lifecycle, frame submission and ordered delivery.
//!
//! ```text
//! SolutionController ── switch_mode ──► Pipeline (exactly one live)
//!                                          │ submit
//!                                          ▼
//!                                     GraphEngine ──► events
//!                                          │
//!                                     OutputHandler ──► listener
//! ```
//!
//! A `Pipeline` owns the engine handle for its lifetime; switching mode
//! always closes the previous instance before the next one accepts frames.

pub mod dispatch;
pub mod error;
pub mod pipe;
pub mod source;
pub mod types;

mod mode;

pub use dispatch::OutputHandler;
pub use error::PipelineError;
pub use mode::{EngineFactory, SolutionController};
pub use pipe::Pipeline;
pub use source::FrameFeed;
pub use types::{
    Backend, Mode, PipelineConfig, ResultEntry, SolutionResult, StreamKind, StreamLayout,
};
