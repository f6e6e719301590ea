//! End-to-end pipeline test: scripted recognition events in, ordered
//! synthesized playback and a transcript out. Only the device edges
//! (microphone, speakers, network) are replaced with test doubles.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use voxdub_app::runtime::drive_events;
use voxdub_audio::{DecodedAudio, GainControl, PlaybackError};
use voxdub_foundation::SessionError;
use voxdub_stt::protocol::{Alternative, ServerMessage, StartRecognition, TranscriptResult};
use voxdub_stt::{
    ClientConfig, RecognitionTransport, StaticToken, TranscriptionClient,
};
use voxdub_telemetry::PipelineMetrics;
use voxdub_tts::{
    Accent, AudioMode, AudioSink, Gender, SchedulerConfig, SpeakScheduler, Synthesizer,
    TtsResult, VoiceAssignmentTable,
};

struct ScriptedTransport {
    events: VecDeque<ServerMessage>,
}

#[async_trait]
impl RecognitionTransport for ScriptedTransport {
    async fn open(&mut self, _token: &str, _start: &StartRecognition) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_audio(&mut self, _frame: Vec<u8>) -> Result<(), SessionError> {
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<ServerMessage, SessionError>> {
        match self.events.pop_front() {
            Some(msg) => Some(Ok(msg)),
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn close(&mut self, _last_seq_no: u64) -> Result<(), SessionError> {
        Ok(())
    }
}

fn wav_bytes(samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Records (text, voice) pairs and stamps each buffer with its request
/// index so ordering is observable at the sink.
#[derive(Default)]
struct RecordingSynth {
    requests: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Synthesizer for RecordingSynth {
    fn name(&self) -> &str {
        "recording"
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> TtsResult<Vec<u8>> {
        let mut requests = self.requests.lock().unwrap();
        requests.push((text.to_string(), voice_id.to_string()));
        Ok(wav_bytes(&[(requests.len() - 1) as i16; 8]))
    }
}

struct RecordingSink {
    played: Mutex<Vec<i16>>,
    gain: GainControl,
    gain_during_play: Mutex<Vec<f32>>,
}

impl RecordingSink {
    fn new(gain: GainControl) -> Self {
        Self {
            played: Mutex::new(Vec::new()),
            gain,
            gain_during_play: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, audio: DecodedAudio) -> Result<(), PlaybackError> {
        self.gain_during_play.lock().unwrap().push(self.gain.get());
        self.played.lock().unwrap().push(audio.samples[0]);
        Ok(())
    }
}

fn word(content: &str, speaker: &str, t0: f64, conf: f64) -> TranscriptResult {
    TranscriptResult {
        kind: Some("word".into()),
        start_time: Some(t0),
        end_time: Some(t0 + 0.2),
        is_partial: false,
        alternatives: vec![Alternative {
            content: content.into(),
            confidence: Some(conf),
            speaker: Some(speaker.into()),
        }],
    }
}

struct Harness {
    synth: Arc<RecordingSynth>,
    sink: Arc<RecordingSink>,
    gain: GainControl,
    metrics: PipelineMetrics,
    transcript: voxdub_app::transcript::TranscriptStore,
}

async fn run_pipeline(events: Vec<ServerMessage>, mode: AudioMode) -> Harness {
    let gain = GainControl::default();
    let synth = Arc::new(RecordingSynth::default());
    let sink = Arc::new(RecordingSink::new(gain.clone()));
    let metrics = PipelineMetrics::new();

    let (event_tx, event_rx) = mpsc::channel(64);
    let mut client = TranscriptionClient::new(
        ScriptedTransport {
            events: events.into(),
        },
        ClientConfig::default(),
        event_tx,
    )
    .with_metrics(Arc::new(metrics.clone()));
    client.start(&StaticToken::new("test-key")).await.unwrap();

    // Keep the frame channel open; the scripted EndOfTranscript is what
    // terminates the session, mirroring a recognizer-driven close.
    let (_frame_tx, frame_rx) = mpsc::channel(4);
    let client_task = tokio::spawn(client.run(frame_rx));

    let scheduler = SpeakScheduler::spawn(
        synth.clone(),
        sink.clone(),
        VoiceAssignmentTable::new(Some((Accent::British, Gender::Male))),
        gain.clone(),
        SchedulerConfig {
            mode,
            ..SchedulerConfig::default()
        },
        metrics.clone(),
    );

    let transcript = drive_events(event_rx, scheduler, metrics.clone()).await;
    client_task.await.unwrap();

    Harness {
        synth,
        sink,
        gain,
        metrics,
        transcript,
    }
}

#[tokio::test]
async fn sentences_play_in_order_with_stable_voices() {
    let events = vec![
        ServerMessage::AddTranscript {
            results: vec![
                word("hello", "S1", 0.0, 0.95),
                word("world", "S1", 0.3, 0.95),
                word(".", "S1", 0.6, 0.95),
            ],
        },
        ServerMessage::AddTranscript {
            results: vec![word("hi", "S2", 1.0, 0.95), word("there.", "S2", 1.3, 0.95)],
        },
        ServerMessage::AddTranscript {
            results: vec![word("again.", "S1", 2.0, 0.95)],
        },
        ServerMessage::EndOfTranscript,
    ];
    let h = run_pipeline(events, AudioMode::Headphones).await;

    let requests = h.synth.requests.lock().unwrap().clone();
    let texts: Vec<&str> = requests.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(texts, vec!["hello world.", "hi there.", "again."]);

    // Same speaker keeps the same voice across sentences
    assert_eq!(requests[0].1, requests[2].1);
    assert_ne!(requests[0].1, requests[1].1);

    // Playback strictly follows synthesis order
    assert_eq!(*h.sink.played.lock().unwrap(), vec![0, 1, 2]);

    assert_eq!(
        h.transcript.render(),
        "S1: hello world.\nS2: hi there.\nS1: again.\n"
    );
}

#[tokio::test]
async fn session_end_flushes_unterminated_sentences() {
    let events = vec![
        ServerMessage::AddTranscript {
            results: vec![word("still", "S1", 0.0, 0.95), word("going", "S1", 0.3, 0.95)],
        },
        ServerMessage::EndOfTranscript,
    ];
    let h = run_pipeline(events, AudioMode::Headphones).await;

    let requests = h.synth.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "still going");
    assert_eq!(h.transcript.render(), "S1: still going\n");
}

#[tokio::test]
async fn low_confidence_words_redacted_in_transcript_and_stripped_from_speech() {
    let events = vec![
        ServerMessage::AddTranscript {
            results: vec![
                word("I", "S1", 0.0, 0.99),
                word("mumble", "S1", 0.3, 0.3),
                word("said.", "S1", 0.6, 0.99),
            ],
        },
        ServerMessage::EndOfTranscript,
    ];
    let h = run_pipeline(events, AudioMode::Headphones).await;

    assert_eq!(h.transcript.render(), "S1: I [ __ ] said.\n");
    let requests = h.synth.requests.lock().unwrap().clone();
    assert_eq!(requests[0].0, "I said.");
    assert_eq!(
        h.metrics
            .low_confidence_redactions
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn speakers_mode_mutes_microphone_while_dub_plays() {
    let events = vec![
        ServerMessage::AddTranscript {
            results: vec![word("hello.", "S1", 0.0, 0.95)],
        },
        ServerMessage::EndOfTranscript,
    ];
    let h = run_pipeline(events, AudioMode::Speakers).await;

    assert_eq!(*h.sink.gain_during_play.lock().unwrap(), vec![0.0]);
    // Gain restored once the buffer finishes
    assert!((h.gain.get() - GainControl::DEFAULT_ACTIVE).abs() < f32::EPSILON);
}

#[tokio::test]
async fn recognizer_error_still_drains_queued_audio() {
    let events = vec![
        ServerMessage::AddTranscript {
            results: vec![word("first.", "S1", 0.0, 0.95)],
        },
        ServerMessage::Error {
            kind: Some("quota_exceeded".into()),
            reason: Some("limit reached".into()),
        },
    ];
    let h = run_pipeline(events, AudioMode::Headphones).await;

    // The sentence accepted before the error still plays to completion
    assert_eq!(*h.sink.played.lock().unwrap(), vec![0]);
    assert_eq!(
        h.metrics
            .session_errors
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}
