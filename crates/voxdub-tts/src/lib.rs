//! Sentence assembly, voice assignment, and synthesis scheduling for VoxDub
//!
//! Takes the ordered transcript pieces produced by the recognition client
//! and turns them into dubbed speech: sentences are assembled per speaker,
//! deduplicated, assigned a stable synthetic voice, synthesized one at a
//! time, and played back strictly in order.

pub mod dedup;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod sentence;
pub mod voices;

pub use dedup::{DedupConfig, DedupWindow};
pub use engine::{HttpSynthesizer, Synthesizer};
pub use error::{TtsError, TtsResult};
pub use scheduler::{AudioMode, AudioSink, SchedulerConfig, SpeakScheduler};
pub use sentence::{SentenceBuffer, Utterance};
pub use voices::{voice_bank, Accent, Gender, VoiceAssignmentTable};
