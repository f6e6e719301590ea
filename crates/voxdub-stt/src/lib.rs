//! Streaming speech-recognition client for VoxDub
//!
//! Owns the session lifecycle with the remote recognizer and converts its
//! event stream into ordered, deduplicated final text pieces with speaker
//! labels. The wire protocol is treated as a black box behind
//! [`transport::RecognitionTransport`].

pub mod auth;
pub mod client;
pub mod dedup;
pub mod protocol;
pub mod transport;

pub use auth::{StaticToken, TokenProvider};
pub use client::{
    ClientConfig, Piece, TranscriptEvent, TranscriptionClient, DEFAULT_SPEAKER,
    REDACTION_PLACEHOLDER,
};
pub use transport::{RecognitionTransport, WsTransport};
