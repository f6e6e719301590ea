//! Transcription client: session lifecycle plus event classification.
//!
//! Converts the recognizer's event stream into a clean, deduplicated,
//! ordered sequence of final text pieces with speaker labels. Partial
//! results never leave this module.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dedup::{result_id, ResultDedup};
use crate::protocol::{
    AudioFormat, ServerMessage, SpeakerDiarizationConfig, StartRecognition,
    TranscriptFilteringConfig, TranscriptionOptions,
};
use crate::transport::RecognitionTransport;
use crate::TokenProvider;
use voxdub_foundation::{SessionError, SessionState, SessionStateMachine, SAMPLE_RATE_HZ};
use voxdub_telemetry::PipelineMetrics;

/// Rendered in place of a low-confidence word so the sentence structure
/// keeps its timing slot.
pub const REDACTION_PLACEHOLDER: &str = "[ __ ]";

/// Fallback label when the recognizer omits diarization info.
pub const DEFAULT_SPEAKER: &str = "S1";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub language: String,
    pub operating_point: String,
    pub max_delay: f64,
    pub max_speakers: u32,
    /// Results below this confidence are redacted, not dropped.
    pub confidence_threshold: f64,
    pub dedup_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            language: "en".into(),
            operating_point: "enhanced".into(),
            max_delay: 3.0,
            max_speakers: 5,
            confidence_threshold: 0.7,
            dedup_capacity: crate::dedup::DEFAULT_CAPACITY,
        }
    }
}

impl ClientConfig {
    fn start_message(&self) -> StartRecognition {
        StartRecognition::new(
            AudioFormat::raw_pcm16(SAMPLE_RATE_HZ),
            TranscriptionOptions {
                language: self.language.clone(),
                operating_point: self.operating_point.clone(),
                max_delay: self.max_delay,
                enable_partials: false,
                diarization: "speaker",
                speaker_diarization_config: SpeakerDiarizationConfig {
                    max_speakers: self.max_speakers,
                },
                transcript_filtering_config: TranscriptFilteringConfig {
                    remove_disfluencies: true,
                },
            },
        )
    }
}

/// One final text piece attributed to a speaker.
///
/// The raw content and the low-confidence flag are kept separate so the
/// transcript view and the synthesis input stay two derived views of the
/// same result, never a mutated string.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub content: String,
    pub speaker: String,
    pub low_confidence: bool,
    pub start_time: f64,
    pub end_time: f64,
}

impl Piece {
    /// Transcript view: placeholder in place of redacted words.
    pub fn display_text(&self) -> &str {
        if self.low_confidence {
            REDACTION_PLACEHOLDER
        } else {
            &self.content
        }
    }
}

/// Events delivered downstream, in recognizer order.
#[derive(Debug, Clone)]
pub enum TranscriptEvent {
    Piece(Piece),
    /// The recognizer flushed everything it will ever send; trailing
    /// unterminated buffers should be flushed now.
    EndOfSession,
    Error {
        kind: String,
        reason: String,
    },
}

enum Flow {
    Continue,
    Stop,
}

pub struct TranscriptionClient<T: RecognitionTransport> {
    transport: T,
    config: ClientConfig,
    state: SessionStateMachine,
    dedup: ResultDedup,
    event_tx: mpsc::Sender<TranscriptEvent>,
    metrics: Option<Arc<PipelineMetrics>>,
    seq_no: u64,
}

impl<T: RecognitionTransport> TranscriptionClient<T> {
    pub fn new(transport: T, config: ClientConfig, event_tx: mpsc::Sender<TranscriptEvent>) -> Self {
        let dedup = ResultDedup::new(config.dedup_capacity);
        Self {
            transport,
            config,
            state: SessionStateMachine::new(),
            dedup,
            event_tx,
            metrics: None,
            seq_no: 0,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// Fetch a credential and open the session. On failure the state falls
    /// back to `Idle` and the error is returned; nothing retries.
    pub async fn start(&mut self, tokens: &dyn TokenProvider) -> Result<(), SessionError> {
        self.state
            .transition(SessionState::Starting)
            .map_err(|e| SessionError::StartFailed(e.to_string()))?;
        self.dedup.clear();
        self.seq_no = 0;

        let token = match tokens.fetch_token().await {
            Ok(t) => t,
            Err(e) => {
                let _ = self.state.transition(SessionState::Idle);
                return Err(e);
            }
        };

        match self.transport.open(&token, &self.config.start_message()).await {
            Ok(()) => {
                self.state
                    .transition(SessionState::Streaming)
                    .map_err(|e| SessionError::StartFailed(e.to_string()))?;
                Ok(())
            }
            Err(e) => {
                let _ = self.state.transition(SessionState::Idle);
                Err(e)
            }
        }
    }

    /// Pump audio out and recognition events in until the frame source
    /// closes, the recognizer finishes, or a fatal error arrives.
    ///
    /// Frames arrive as wire-ready bytes; ownership moves straight to the
    /// transport. Closing `frame_rx` is the stop signal.
    pub async fn run(mut self, mut frame_rx: mpsc::Receiver<Vec<u8>>) {
        info!(
            target: "stt",
            "Transcription client streaming (language: {}, max_delay: {}s)",
            self.config.language,
            self.config.max_delay
        );

        loop {
            tokio::select! {
                maybe_frame = frame_rx.recv() => {
                    match maybe_frame {
                        Some(frame) => {
                            self.seq_no += 1;
                            if let Err(e) = self.transport.send_audio(frame).await {
                                self.fail("transport", &e.to_string()).await;
                                break;
                            }
                        }
                        None => {
                            debug!(target: "stt", "Frame source closed, stopping session");
                            break;
                        }
                    }
                }
                maybe_event = self.transport.next_event() => {
                    match maybe_event {
                        Some(Ok(msg)) => {
                            if matches!(self.handle_message(msg).await, Flow::Stop) {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            self.fail("transport", &e.to_string()).await;
                            break;
                        }
                        None => {
                            debug!(target: "stt", "Recognizer closed the stream");
                            break;
                        }
                    }
                }
            }
        }

        self.stop().await;
    }

    /// Graceful termination: request immediate close, no grace timeout,
    /// then settle in `Idle` regardless of acknowledgement.
    async fn stop(&mut self) {
        if self.state.current() == SessionState::Streaming {
            let _ = self.state.transition(SessionState::Stopping);
        }
        let _ = self.transport.close(self.seq_no).await;
        let _ = self.state.transition(SessionState::Idle);
        info!(target: "stt", "Transcription session closed (last_seq_no: {})", self.seq_no);
    }

    async fn fail(&mut self, kind: &str, reason: &str) {
        warn!(target: "stt", "Fatal session error [{}]: {}", kind, reason);
        if let Some(m) = &self.metrics {
            m.session_errors.fetch_add(1, Ordering::Relaxed);
        }
        let _ = self.state.transition(SessionState::Error {
            reason: reason.to_string(),
        });
        let _ = self
            .event_tx
            .send(TranscriptEvent::Error {
                kind: kind.to_string(),
                reason: reason.to_string(),
            })
            .await;
    }

    async fn handle_message(&mut self, msg: ServerMessage) -> Flow {
        match msg {
            ServerMessage::AddTranscript { results } => {
                for result in results {
                    self.ingest_result(result).await;
                }
                Flow::Continue
            }
            ServerMessage::EndOfTranscript => {
                debug!(target: "stt", "EndOfTranscript received");
                let _ = self.event_tx.send(TranscriptEvent::EndOfSession).await;
                Flow::Stop
            }
            ServerMessage::Error { kind, reason } => {
                self.fail(
                    &kind.unwrap_or_else(|| "unknown".into()),
                    &reason.unwrap_or_default(),
                )
                .await;
                Flow::Stop
            }
            ServerMessage::Warning { kind, reason } => {
                warn!(
                    target: "stt",
                    "Recognizer warning [{:?}]: {:?}", kind, reason
                );
                Flow::Continue
            }
            ServerMessage::RecognitionStarted { id } => {
                info!(target: "stt", "Recognition started (id: {:?})", id);
                Flow::Continue
            }
            ServerMessage::AudioAdded { .. } | ServerMessage::Unknown => Flow::Continue,
        }
    }

    async fn ingest_result(&mut self, result: crate::protocol::TranscriptResult) {
        if let Some(m) = &self.metrics {
            m.results_received.fetch_add(1, Ordering::Relaxed);
        }

        // Partials are provisional and never consumed.
        if result.is_partial {
            if let Some(m) = &self.metrics {
                m.partials_skipped.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }

        let Some(alternative) = result.alternatives.first() else {
            return;
        };
        let content = alternative.content.trim();
        if content.is_empty() {
            return;
        }

        let low_confidence = alternative
            .confidence
            .map(|c| c < self.config.confidence_threshold)
            .unwrap_or(false);
        if low_confidence {
            debug!(
                target: "stt",
                "Low confidence word redacted: {:?} ({:.0}%)",
                content,
                alternative.confidence.unwrap_or(0.0) * 100.0
            );
            if let Some(m) = &self.metrics {
                m.low_confidence_redactions.fetch_add(1, Ordering::Relaxed);
            }
        }

        let speaker = alternative
            .speaker
            .clone()
            .unwrap_or_else(|| DEFAULT_SPEAKER.to_string());

        let piece = Piece {
            content: content.to_string(),
            speaker: speaker.clone(),
            low_confidence,
            start_time: result.start_time.unwrap_or(0.0),
            end_time: result.end_time.unwrap_or(0.0),
        };

        // Identity is computed over the display text so a redacted repeat
        // of the same slot still dedups against itself.
        let id = result_id(
            piece.start_time,
            piece.end_time,
            &speaker,
            piece.display_text(),
        );
        if !self.dedup.insert(id) {
            if let Some(m) = &self.metrics {
                m.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }

        if let Some(m) = &self.metrics {
            m.mark_piece();
        }
        let _ = self.event_tx.send(TranscriptEvent::Piece(piece)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::protocol::{Alternative, TranscriptResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct ScriptedTransport {
        events: VecDeque<ServerMessage>,
        sent_frames: std::sync::Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
    }

    impl ScriptedTransport {
        fn new(events: Vec<ServerMessage>) -> Self {
            Self {
                events: events.into(),
                sent_frames: Default::default(),
            }
        }

        fn frame_log(&self) -> std::sync::Arc<std::sync::Mutex<Vec<Vec<u8>>>> {
            self.sent_frames.clone()
        }
    }

    #[async_trait]
    impl RecognitionTransport for ScriptedTransport {
        async fn open(
            &mut self,
            _token: &str,
            _start: &StartRecognition,
        ) -> Result<(), SessionError> {
            Ok(())
        }

        async fn send_audio(&mut self, frame: Vec<u8>) -> Result<(), SessionError> {
            self.sent_frames.lock().unwrap().push(frame);
            Ok(())
        }

        async fn next_event(&mut self) -> Option<Result<ServerMessage, SessionError>> {
            match self.events.pop_front() {
                Some(msg) => Some(Ok(msg)),
                None => {
                    // Keep the select! arm pending rather than spinning on
                    // a closed stream while frames are still arriving.
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        async fn close(&mut self, _last_seq_no: u64) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn word(content: &str, speaker: &str, t0: f64, t1: f64, conf: f64) -> TranscriptResult {
        TranscriptResult {
            kind: Some("word".into()),
            start_time: Some(t0),
            end_time: Some(t1),
            is_partial: false,
            alternatives: vec![Alternative {
                content: content.into(),
                confidence: Some(conf),
                speaker: Some(speaker.into()),
            }],
        }
    }

    async fn run_session(
        events: Vec<ServerMessage>,
    ) -> Vec<TranscriptEvent> {
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let mut client =
            TranscriptionClient::new(ScriptedTransport::new(events), ClientConfig::default(), event_tx);
        client.start(&StaticToken::new("test-key")).await.unwrap();
        assert_eq!(client.state(), SessionState::Streaming);

        let (_frame_tx, frame_rx) = mpsc::channel(4);
        client.run(frame_rx).await;

        let mut out = Vec::new();
        while let Ok(ev) = event_rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn idempotent_ingestion() {
        let repeated = word("hello", "S1", 0.5, 0.9, 0.95);
        let events = vec![
            ServerMessage::AddTranscript {
                results: vec![repeated.clone(), repeated],
            },
            ServerMessage::EndOfTranscript,
        ];
        let out = run_session(events).await;
        let pieces: Vec<_> = out
            .iter()
            .filter(|e| matches!(e, TranscriptEvent::Piece(_)))
            .collect();
        assert_eq!(pieces.len(), 1);
    }

    #[tokio::test]
    async fn partials_never_emitted() {
        let mut partial = word("provisional", "S1", 0.1, 0.2, 0.99);
        partial.is_partial = true;
        let events = vec![
            ServerMessage::AddTranscript {
                results: vec![partial, word("final", "S1", 0.3, 0.4, 0.99)],
            },
            ServerMessage::EndOfTranscript,
        ];
        let out = run_session(events).await;
        let pieces: Vec<_> = out
            .iter()
            .filter_map(|e| match e {
                TranscriptEvent::Piece(p) => Some(p.content.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(pieces, vec!["final".to_string()]);
    }

    #[tokio::test]
    async fn low_confidence_is_redacted_not_dropped() {
        let events = vec![
            ServerMessage::AddTranscript {
                results: vec![word("mumble", "S1", 0.1, 0.2, 0.4)],
            },
            ServerMessage::EndOfTranscript,
        ];
        let out = run_session(events).await;
        match &out[0] {
            TranscriptEvent::Piece(p) => {
                assert!(p.low_confidence);
                assert_eq!(p.display_text(), REDACTION_PLACEHOLDER);
                assert_eq!(p.content, "mumble");
            }
            other => panic!("expected piece, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fatal_error_reported_and_session_stops() {
        let events = vec![ServerMessage::Error {
            kind: Some("quota_exceeded".into()),
            reason: Some("limit reached".into()),
        }];
        let out = run_session(events).await;
        assert!(matches!(out[0], TranscriptEvent::Error { .. }));
    }

    #[tokio::test]
    async fn end_of_transcript_emits_end_of_session() {
        let out = run_session(vec![ServerMessage::EndOfTranscript]).await;
        assert!(matches!(out.last(), Some(TranscriptEvent::EndOfSession)));
    }

    #[tokio::test]
    async fn missing_speaker_defaults() {
        let events = vec![
            ServerMessage::AddTranscript {
                results: vec![TranscriptResult {
                    kind: Some("word".into()),
                    start_time: Some(0.1),
                    end_time: Some(0.2),
                    is_partial: false,
                    alternatives: vec![Alternative {
                        content: "hi".into(),
                        confidence: None,
                        speaker: None,
                    }],
                }],
            },
            ServerMessage::EndOfTranscript,
        ];
        let out = run_session(events).await;
        match &out[0] {
            TranscriptEvent::Piece(p) => assert_eq!(p.speaker, DEFAULT_SPEAKER),
            other => panic!("expected piece, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn frames_flow_to_transport_in_order() {
        let (event_tx, _event_rx) = mpsc::channel(16);
        // No scripted events: the transport stays pending so the client
        // drains every frame before the closed channel stops the session.
        let transport = ScriptedTransport::new(vec![]);
        let frame_log = transport.frame_log();
        let mut client =
            TranscriptionClient::new(transport, ClientConfig::default(), event_tx);
        client.start(&StaticToken::new("k")).await.unwrap();

        let (frame_tx, frame_rx) = mpsc::channel(8);
        frame_tx.send(vec![1u8, 2]).await.unwrap();
        frame_tx.send(vec![3u8, 4]).await.unwrap();
        drop(frame_tx);
        client.run(frame_rx).await;

        let sent = frame_log.lock().unwrap();
        assert_eq!(*sent, vec![vec![1u8, 2], vec![3u8, 4]]);
    }
}
