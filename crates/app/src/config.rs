//! Runtime configuration assembled from the command line.

use std::path::PathBuf;

use url::Url;
use voxdub_audio::FrameDuration;
use voxdub_tts::{Accent, AudioMode, Gender};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub stt_endpoint: Url,
    pub api_key: String,
    pub language: String,
    pub tts_endpoint: String,
    pub tts_api_key: Option<String>,
    /// No accent means transcript-only: nothing is synthesized.
    pub accent: Option<Accent>,
    pub gender: Gender,
    pub mode: AudioMode,
    pub device: Option<String>,
    pub frame: FrameDuration,
    pub transcript_path: PathBuf,
}

impl AppConfig {
    pub fn voice_selection(&self) -> Option<(Accent, Gender)> {
        self.accent.map(|a| (a, self.gender))
    }
}
