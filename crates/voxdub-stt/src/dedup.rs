//! At-most-once ingestion of recognition results.
//!
//! Recognizers re-transmit corrected results; a bounded membership set keyed
//! on `(start_time, end_time, speaker, text)` drops repeats without
//! reordering anything.

use std::collections::{HashSet, VecDeque};

pub const DEFAULT_CAPACITY: usize = 100;

/// Composite identity of one final result.
pub fn result_id(start_time: f64, end_time: f64, speaker: &str, text: &str) -> String {
    format!("{}-{}-{}-{}", start_time, end_time, speaker, text)
}

/// FIFO-bounded set of recently processed result ids.
pub struct ResultDedup {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl ResultDedup {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns true if the id was new (and is now recorded); false if it was
    /// already processed. Oldest entries are evicted past capacity.
    pub fn insert(&mut self, id: String) -> bool {
        if self.seen.contains(&id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(id.clone());
        self.order.push_back(id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

impl Default for ResultDedup {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
