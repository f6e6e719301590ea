pub mod capture;
pub mod frame_encoder;
pub mod gain;
pub mod playback;

// Public API
pub use capture::{CaptureConfig, CaptureStats, CaptureThread};
pub use frame_encoder::{AudioFrame, FrameDuration, FrameEncoder};
pub use gain::GainControl;
pub use playback::{decode_wav, CpalPlayer, DecodeError, DecodedAudio, PlaybackError};
