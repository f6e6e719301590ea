pub mod error;
pub mod state;

pub use error::{AppError, CaptureError, SessionError};
pub use state::{SessionState, SessionStateMachine};

/// Target sample rate for the whole pipeline (recognizer contract).
pub const SAMPLE_RATE_HZ: u32 = 16_000;
