//! Output device adapter for the scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use voxdub_audio::{CpalPlayer, DecodedAudio, PlaybackError};
use voxdub_tts::AudioSink;

/// Plays buffers on the default output device. The blocking cpal player
/// runs on the blocking pool so the scheduler's playback task stays async.
pub struct CpalSink {
    player: Arc<CpalPlayer>,
}

impl CpalSink {
    pub fn new() -> Self {
        Self {
            player: Arc::new(CpalPlayer::default()),
        }
    }
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSink for CpalSink {
    async fn play(&self, audio: DecodedAudio) -> Result<(), PlaybackError> {
        let player = self.player.clone();
        tokio::task::spawn_blocking(move || player.play_blocking(&audio))
            .await
            .map_err(|e| PlaybackError::Backend(e.to_string()))?
    }
}
