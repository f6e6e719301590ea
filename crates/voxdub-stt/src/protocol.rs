//! Wire protocol types for the remote recognizer session.
//!
//! The session speaks JSON control messages plus raw binary PCM frames.
//! Only the fields this client consumes are modelled; unknown inbound
//! messages deserialize to `ServerMessage::Unknown` instead of failing
//! the stream.

use serde::{Deserialize, Serialize};

pub const AUDIO_ENCODING: &str = "pcm_s16le";

#[derive(Debug, Clone, Serialize)]
pub struct AudioFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub encoding: &'static str,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub fn raw_pcm16(sample_rate: u32) -> Self {
        Self {
            kind: "raw",
            encoding: AUDIO_ENCODING,
            sample_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakerDiarizationConfig {
    pub max_speakers: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptFilteringConfig {
    pub remove_disfluencies: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionOptions {
    pub language: String,
    pub operating_point: String,
    pub max_delay: f64,
    pub enable_partials: bool,
    pub diarization: &'static str,
    pub speaker_diarization_config: SpeakerDiarizationConfig,
    pub transcript_filtering_config: TranscriptFilteringConfig,
}

/// Opens a recognition session, declaring the audio format and options.
#[derive(Debug, Clone, Serialize)]
pub struct StartRecognition {
    pub message: &'static str,
    pub audio_format: AudioFormat,
    pub transcription_config: TranscriptionOptions,
}

impl StartRecognition {
    pub fn new(audio_format: AudioFormat, transcription_config: TranscriptionOptions) -> Self {
        Self {
            message: "StartRecognition",
            audio_format,
            transcription_config,
        }
    }
}

/// Requests immediate session termination; the recognizer may still flush
/// an `EndOfTranscript`, but the client does not wait for it.
#[derive(Debug, Clone, Serialize)]
pub struct EndOfStream {
    pub message: &'static str,
    pub last_seq_no: u64,
}

impl EndOfStream {
    pub fn new(last_seq_no: u64) -> Self {
        Self {
            message: "EndOfStream",
            last_seq_no,
        }
    }
}

/// One recognized span (typically a single word or punctuation mark).
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptResult {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub is_partial: bool,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Alternative {
    pub content: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Inbound control messages, tagged by the `message` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "message")]
pub enum ServerMessage {
    RecognitionStarted {
        #[serde(default)]
        id: Option<String>,
    },
    AudioAdded {
        #[serde(default)]
        seq_no: u64,
    },
    AddTranscript {
        #[serde(default)]
        results: Vec<TranscriptResult>,
    },
    EndOfTranscript,
    Warning {
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },
    Error {
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Unknown,
}
