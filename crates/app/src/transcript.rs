//! Session transcript accumulation and persistence.
//!
//! Pieces are grouped into speaker turns as they arrive; the finished
//! transcript goes to a [`TranscriptSink`] once, when the session ends.

use std::path::{Path, PathBuf};

use chrono::Local;
use voxdub_stt::Piece;

/// Where the assembled transcript lands at session end. Receives the
/// full `speaker: text` rendering exactly once per session.
pub trait TranscriptSink {
    fn append(&mut self, full_text: &str) -> std::io::Result<()>;
}

/// Writes each session's transcript to a file with a timestamp header.
pub struct FileTranscriptSink {
    path: PathBuf,
}

impl FileTranscriptSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TranscriptSink for FileTranscriptSink {
    fn append(&mut self, full_text: &str) -> std::io::Result<()> {
        let header = format!(
            "Transcript - {}\n\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        std::fs::write(&self.path, header + full_text)
    }
}

/// One speaker turn: consecutive pieces from the same speaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: String,
    pub text: String,
}

#[derive(Default)]
pub struct TranscriptStore {
    turns: Vec<Turn>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one piece using its display text, so redacted words show
    /// their placeholder in the transcript.
    pub fn push(&mut self, piece: &Piece) {
        let text = piece.display_text();
        match self.turns.last_mut() {
            Some(turn) if turn.speaker == piece.speaker => {
                if !text.starts_with(['.', '!', '?', ',']) {
                    turn.text.push(' ');
                }
                turn.text.push_str(text);
            }
            _ => {
                self.turns.push(Turn {
                    speaker: piece.speaker.clone(),
                    text: text.to_string(),
                });
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str(&turn.speaker);
            out.push_str(": ");
            out.push_str(&turn.text);
            out.push('\n');
        }
        out
    }

    /// Hands the rendered transcript to the sink. Called once at session
    /// end; an empty transcript appends nothing.
    pub fn save(&self, sink: &mut dyn TranscriptSink) -> std::io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        sink.append(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(speaker: &str, content: &str, low_confidence: bool) -> Piece {
        Piece {
            content: content.to_string(),
            speaker: speaker.to_string(),
            low_confidence,
            start_time: 0.0,
            end_time: 0.0,
        }
    }

    #[test]
    fn consecutive_pieces_merge_into_one_turn() {
        let mut store = TranscriptStore::new();
        store.push(&piece("S1", "hello", false));
        store.push(&piece("S1", "there", false));
        store.push(&piece("S1", ".", false));
        assert_eq!(store.render(), "S1: hello there.\n");
    }

    #[test]
    fn speaker_change_starts_new_turn() {
        let mut store = TranscriptStore::new();
        store.push(&piece("S1", "hi", false));
        store.push(&piece("S2", "hey", false));
        store.push(&piece("S1", "ok", false));
        assert_eq!(store.turns().len(), 3);
        assert_eq!(store.render(), "S1: hi\nS2: hey\nS1: ok\n");
    }

    #[test]
    fn redacted_piece_shows_placeholder() {
        let mut store = TranscriptStore::new();
        store.push(&piece("S1", "mumble", true));
        assert_eq!(store.render(), "S1: [ __ ]\n");
    }

    #[test]
    fn empty_transcript_writes_nothing() {
        let store = TranscriptStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        let mut sink = FileTranscriptSink::new(path.clone());
        store.save(&mut sink).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn save_includes_header_and_turns() {
        let mut store = TranscriptStore::new();
        store.push(&piece("S1", "hello", false));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        let mut sink = FileTranscriptSink::new(path.clone());
        store.save(&mut sink).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Transcript - "));
        assert!(contents.ends_with("S1: hello\n"));
    }

    #[test]
    fn sink_receives_full_rendering_once() {
        struct Capture(Vec<String>);
        impl TranscriptSink for Capture {
            fn append(&mut self, full_text: &str) -> std::io::Result<()> {
                self.0.push(full_text.to_string());
                Ok(())
            }
        }

        let mut store = TranscriptStore::new();
        store.push(&piece("S1", "hello", false));
        store.push(&piece("S2", "hey", false));
        let mut sink = Capture(Vec::new());
        store.save(&mut sink).unwrap();
        assert_eq!(sink.0, vec!["S1: hello\nS2: hey\n".to_string()]);
    }
}
