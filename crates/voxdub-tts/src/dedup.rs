//! Utterance-level duplicate suppression.
//!
//! Sits between sentence extraction and synthesis. Recognizers routinely
//! re-finalize overlapping text, so the scheduler drops any sentence that
//! normalizes to something it recently spoke.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// How many recent normalized utterances to remember.
    pub window_size: usize,
    /// Also suppress when one utterance contains the other.
    pub substring_filter: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            substring_filter: true,
        }
    }
}

/// Sliding window of recently spoken utterances.
pub struct DedupWindow {
    config: DedupConfig,
    recent: VecDeque<String>,
    last: Option<String>,
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl DedupWindow {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            recent: VecDeque::new(),
            last: None,
        }
    }

    /// Decides whether `text` should be spoken. Accepted utterances are
    /// recorded immediately so a duplicate arriving before playback
    /// finishes is still caught.
    pub fn accept(&mut self, text: &str) -> bool {
        let norm = normalize(text);
        if norm.is_empty() {
            return false;
        }

        if self.last.as_deref() == Some(norm.as_str()) {
            tracing::debug!(target: "tts", "Suppressing repeat of last utterance: {}", text);
            return false;
        }

        for prior in &self.recent {
            if *prior == norm {
                tracing::debug!(target: "tts", "Suppressing windowed duplicate: {}", text);
                return false;
            }
            if self.config.substring_filter
                && (prior.contains(norm.as_str()) || norm.contains(prior.as_str()))
            {
                tracing::debug!(target: "tts", "Suppressing near-duplicate: {}", text);
                return false;
            }
        }

        self.recent.push_back(norm.clone());
        while self.recent.len() > self.config.window_size {
            self.recent.pop_front();
        }
        self.last = Some(norm);
        true
    }

    pub fn reset(&mut self) {
        self.recent.clear();
        self.last = None;
    }
}
