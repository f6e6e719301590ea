use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared microphone gain scalar (0.0 silence .. ~1.2 boosted).
///
/// Stored as f32 bits in an atomic so the real-time capture callback can
/// read it without locking. The playback scheduler is the only writer;
/// capture only reads.
#[derive(Clone)]
pub struct GainControl {
    bits: Arc<AtomicU32>,
}

impl GainControl {
    /// Default active gain: slight boost feeding the recognizer.
    pub const DEFAULT_ACTIVE: f32 = 1.2;

    pub fn new(initial: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(initial.to_bits())),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Mute, returning the value to restore afterwards.
    pub fn mute(&self) -> f32 {
        let prior = self.get();
        self.set(0.0);
        prior
    }
}

impl Default for GainControl {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ACTIVE)
    }
}
