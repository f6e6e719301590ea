//! Per-speaker sentence assembly.
//!
//! Recognized pieces arrive word-by-word; synthesis wants whole sentences.
//! Text accumulates per speaker and is released either when a terminal
//! punctuation mark closes a sentence or when the floor passes to another
//! speaker.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]+[.!?]").expect("sentence regex"));

/// A sentence ready for synthesis, tagged with its speaker label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
}

/// Accumulates transcript pieces into complete sentences, one buffer per
/// speaker. Only one speaker's buffer grows at a time; a speaker change
/// flushes whatever the previous speaker had pending, complete or not.
#[derive(Default)]
pub struct SentenceBuffer {
    buffers: HashMap<String, String>,
    active_speaker: Option<String>,
}

impl SentenceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one recognized piece and returns any utterances released by it.
    /// Empty and whitespace-only pieces are ignored.
    pub fn push(&mut self, speaker: &str, piece: &str) -> Vec<Utterance> {
        let mut out = Vec::new();
        if piece.trim().is_empty() {
            return out;
        }

        if let Some(prev) = self.active_speaker.as_deref() {
            if prev != speaker {
                let prev = prev.to_string();
                out.extend(self.flush(&prev));
            }
        }
        self.active_speaker = Some(speaker.to_string());

        let buffer = self.buffers.entry(speaker.to_string()).or_default();
        if buffer.is_empty() || piece.starts_with(['.', '!', '?', ',']) {
            buffer.push_str(piece);
        } else {
            buffer.push(' ');
            buffer.push_str(piece);
        }

        if buffer.ends_with(['.', '!', '?']) {
            // Snapshot-then-clear: the entry comes out of the map, so a fully
            // terminated sentence leaves nothing pending for this speaker.
            let text = self.buffers.remove(speaker).unwrap_or_default();
            let mut remainder_end = 0;
            for m in SENTENCE_RE.find_iter(&text) {
                let sentence = m.as_str().trim();
                if !sentence.is_empty() {
                    out.push(Utterance {
                        speaker: speaker.to_string(),
                        text: sentence.to_string(),
                    });
                }
                remainder_end = m.end();
            }
            // Text after the last terminal mark stays buffered
            let remainder = text[remainder_end..].trim_start();
            if !remainder.is_empty() {
                self.buffers
                    .insert(speaker.to_string(), remainder.to_string());
            }
        }

        out
    }

    /// Releases one speaker's pending text even without terminal punctuation.
    pub fn flush(&mut self, speaker: &str) -> Option<Utterance> {
        let text = self.buffers.remove(speaker)?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        Some(Utterance {
            speaker: speaker.to_string(),
            text,
        })
    }

    /// Drains all pending buffers, ordered by speaker label for determinism.
    pub fn flush_all(&mut self) -> Vec<Utterance> {
        let mut speakers: Vec<String> = self.buffers.keys().cloned().collect();
        speakers.sort();
        self.active_speaker = None;
        speakers
            .into_iter()
            .filter_map(|s| self.flush(&s))
            .collect()
    }

    pub fn pending(&self, speaker: &str) -> Option<&str> {
        self.buffers.get(speaker).map(String::as_str)
    }
}
