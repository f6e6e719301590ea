use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared counters for cross-task pipeline monitoring.
///
/// All fields are plain atomics so every stage can update them from its own
/// task or the capture thread without locking.
#[derive(Clone)]
pub struct PipelineMetrics {
    // Capture / encoder
    pub capture_callbacks: Arc<AtomicU64>,
    pub frames_encoded: Arc<AtomicU64>,
    pub frames_dropped: Arc<AtomicU64>,

    // Transcription client
    pub results_received: Arc<AtomicU64>,
    pub partials_skipped: Arc<AtomicU64>,
    pub duplicates_skipped: Arc<AtomicU64>,
    pub low_confidence_redactions: Arc<AtomicU64>,
    pub pieces_emitted: Arc<AtomicU64>,
    pub session_errors: Arc<AtomicU64>,

    // Sentence / synthesis / playback
    pub sentences_extracted: Arc<AtomicU64>,
    pub utterances_suppressed: Arc<AtomicU64>,
    pub synth_requests: Arc<AtomicU64>,
    pub synth_failures: Arc<AtomicU64>,
    pub buffers_played: Arc<AtomicU64>,
    pub decode_failures: Arc<AtomicU64>,
    pub playback_queue_depth: Arc<AtomicUsize>,

    pub last_piece_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            capture_callbacks: Arc::new(AtomicU64::new(0)),
            frames_encoded: Arc::new(AtomicU64::new(0)),
            frames_dropped: Arc::new(AtomicU64::new(0)),

            results_received: Arc::new(AtomicU64::new(0)),
            partials_skipped: Arc::new(AtomicU64::new(0)),
            duplicates_skipped: Arc::new(AtomicU64::new(0)),
            low_confidence_redactions: Arc::new(AtomicU64::new(0)),
            pieces_emitted: Arc::new(AtomicU64::new(0)),
            session_errors: Arc::new(AtomicU64::new(0)),

            sentences_extracted: Arc::new(AtomicU64::new(0)),
            utterances_suppressed: Arc::new(AtomicU64::new(0)),
            synth_requests: Arc::new(AtomicU64::new(0)),
            synth_failures: Arc::new(AtomicU64::new(0)),
            buffers_played: Arc::new(AtomicU64::new(0)),
            decode_failures: Arc::new(AtomicU64::new(0)),
            playback_queue_depth: Arc::new(AtomicUsize::new(0)),

            last_piece_time: Arc::new(RwLock::new(None)),
        }
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_piece(&self) {
        self.pieces_emitted.fetch_add(1, Ordering::Relaxed);
        *self.last_piece_time.write() = Some(Instant::now());
    }

    /// One-line pipeline summary for shutdown logging.
    pub fn summary(&self) -> String {
        format!(
            "frames encoded: {}, dropped: {}, pieces: {}, sentences: {}, suppressed: {}, synth ok/fail: {}/{}, played: {}, decode failures: {}",
            self.frames_encoded.load(Ordering::Relaxed),
            self.frames_dropped.load(Ordering::Relaxed),
            self.pieces_emitted.load(Ordering::Relaxed),
            self.sentences_extracted.load(Ordering::Relaxed),
            self.utterances_suppressed.load(Ordering::Relaxed),
            self.synth_requests.load(Ordering::Relaxed)
                - self.synth_failures.load(Ordering::Relaxed),
            self.synth_failures.load(Ordering::Relaxed),
            self.buffers_played.load(Ordering::Relaxed),
            self.decode_failures.load(Ordering::Relaxed),
        )
    }
}
