//! Error types for synthesis and scheduling

use thiserror::Error;

/// TTS error types. Per-sentence synthesis failures are recovered locally
/// by the scheduler (drop and continue); none of these block the pipeline.
#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    #[error("Synthesis failed: {0}")]
    SynthesisError(String),

    #[error("Synthesis service returned {status}: {detail}")]
    ServiceError { status: u16, detail: String },

    #[error("Invalid text input: {0}")]
    InvalidInput(String),
}

/// Result type for TTS operations
pub type TtsResult<T> = Result<T, TtsError>;
