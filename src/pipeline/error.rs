use thiserror::Error;

/// Errors surfaced by the solution pipeline.
///
/// Only `Configuration` is fatal to a pipeline instance. `Decode` and
/// `EngineRuntime` are per-frame and leave the pipeline usable; `State` is a
/// programming error signaled immediately instead of being swallowed.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The engine failed to initialize with the given configuration.
    #[error("engine configuration failed: {0}")]
    Configuration(String),

    /// A delivered bundle's payload failed to parse. The offending frame's
    /// result is suppressed; later frames are unaffected.
    #[error("failed to decode output stream '{stream}': {message}")]
    Decode { stream: String, message: String },

    /// The engine reported a processing fault for a specific frame.
    #[error("engine runtime error: {0}")]
    EngineRuntime(String),

    /// Operation attempted in an invalid lifecycle state, e.g. submit on a
    /// closed pipeline or a double start.
    #[error("invalid pipeline state: {0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
