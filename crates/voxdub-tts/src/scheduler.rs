//! Ordered synthesis and playback scheduling.
//!
//! Utterances flow through two single-consumer queues: one task performs
//! synthesis strictly one request at a time, a second plays the resulting
//! buffers strictly one at a time. Ordering is therefore end-to-end FIFO
//! with no per-item locking, and a slow synthesis call can never reorder
//! audio that is already queued for playback.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use voxdub_audio::{decode_wav, DecodedAudio, GainControl, PlaybackError};
use voxdub_telemetry::PipelineMetrics;

use crate::dedup::{DedupConfig, DedupWindow};
use crate::engine::Synthesizer;
use crate::sentence::Utterance;
use crate::voices::VoiceAssignmentTable;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*__\s*\]").expect("placeholder regex"));

/// Where the synthesized audio comes out. With speakers the microphone
/// stays open during playback, so capture gain is muted for the duration
/// of each buffer to keep the recognizer from hearing the dub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    Headphones,
    Speakers,
}

impl std::str::FromStr for AudioMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "headphones" => Ok(AudioMode::Headphones),
            "speakers" => Ok(AudioMode::Speakers),
            other => Err(format!("unknown audio mode: {}", other)),
        }
    }
}

/// Playback output abstraction. The production implementation wraps the
/// blocking cpal player; tests substitute an in-memory recorder.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, audio: DecodedAudio) -> Result<(), PlaybackError>;
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub mode: AudioMode,
    pub dedup: DedupConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: AudioMode::Headphones,
            dedup: DedupConfig::default(),
        }
    }
}

/// Strips redaction placeholders and collapses the leftover whitespace so
/// the synthesizer never reads bracket noise aloud.
fn clean_for_speech(text: &str) -> String {
    let stripped = PLACEHOLDER_RE.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Handle to the two scheduler tasks. Dropping the handle without calling
/// [`SpeakScheduler::shutdown`] aborts nothing; queued audio keeps playing
/// until both queues drain.
pub struct SpeakScheduler {
    request_tx: mpsc::UnboundedSender<Utterance>,
    synth_task: JoinHandle<()>,
    playback_task: JoinHandle<()>,
}

impl SpeakScheduler {
    pub fn spawn(
        synth: Arc<dyn Synthesizer>,
        sink: Arc<dyn AudioSink>,
        voices: VoiceAssignmentTable,
        gain: GainControl,
        config: SchedulerConfig,
        metrics: PipelineMetrics,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();

        let dedup = DedupWindow::new(config.dedup.clone());
        let synth_task = tokio::spawn(run_synthesis(
            request_rx,
            audio_tx,
            synth,
            voices,
            dedup,
            metrics.clone(),
        ));
        let playback_task = tokio::spawn(run_playback(
            audio_rx,
            sink,
            gain,
            config.mode,
            metrics,
        ));

        Self {
            request_tx,
            synth_task,
            playback_task,
        }
    }

    /// Queues one utterance. Never blocks; returns false if the scheduler
    /// has already shut down.
    pub fn enqueue(&self, utterance: Utterance) -> bool {
        self.request_tx.send(utterance).is_ok()
    }

    /// Stops accepting new utterances and waits for everything already
    /// queued to be synthesized and played.
    pub async fn shutdown(self) {
        drop(self.request_tx);
        let _ = self.synth_task.await;
        let _ = self.playback_task.await;
    }
}

async fn run_synthesis(
    mut request_rx: mpsc::UnboundedReceiver<Utterance>,
    audio_tx: mpsc::UnboundedSender<Vec<u8>>,
    synth: Arc<dyn Synthesizer>,
    mut voices: VoiceAssignmentTable,
    mut dedup: DedupWindow,
    metrics: PipelineMetrics,
) {
    while let Some(utterance) = request_rx.recv().await {
        let text = clean_for_speech(&utterance.text);
        if text.is_empty() {
            continue;
        }
        if !dedup.accept(&text) {
            metrics.utterances_suppressed.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        let Some(voice) = voices.assign(&utterance.speaker) else {
            // No accent configured: transcript-only session
            continue;
        };

        metrics.synth_requests.fetch_add(1, Ordering::Relaxed);
        match synth.synthesize(&text, &voice).await {
            Ok(bytes) => {
                metrics.playback_queue_depth.fetch_add(1, Ordering::Relaxed);
                if audio_tx.send(bytes).is_err() {
                    break;
                }
            }
            Err(e) => {
                metrics.synth_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "tts", "Synthesis failed ({}): {}", synth.name(), e);
            }
        }
    }
    tracing::debug!(target: "tts", "Synthesis queue closed");
}

async fn run_playback(
    mut audio_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    sink: Arc<dyn AudioSink>,
    gain: GainControl,
    mode: AudioMode,
    metrics: PipelineMetrics,
) {
    while let Some(bytes) = audio_rx.recv().await {
        metrics.playback_queue_depth.fetch_sub(1, Ordering::Relaxed);

        let decoded = match decode_wav(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "tts", "Dropping undecodable buffer: {}", e);
                continue;
            }
        };

        // Mute spans exactly one buffer; the prior gain comes back even if
        // the sink errors.
        let prior = match mode {
            AudioMode::Speakers => Some(gain.mute()),
            AudioMode::Headphones => None,
        };

        match sink.play(decoded).await {
            Ok(()) => {
                metrics.buffers_played.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!(target: "tts", "Playback failed: {}", e);
            }
        }

        if let Some(prior) = prior {
            gain.set(prior);
        }
    }
    tracing::debug!(target: "tts", "Playback queue closed");
}
