use voxdub_foundation::SAMPLE_RATE_HZ;

/// Supported frame durations at the 16 kHz target rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDuration {
    /// 20 ms, 320 samples
    Ms20,
    /// 50 ms, 800 samples
    Ms50,
}

impl FrameDuration {
    pub fn samples(self) -> usize {
        match self {
            FrameDuration::Ms20 => 320,
            FrameDuration::Ms50 => 800,
        }
    }
}

/// A fixed-length mono 16 kHz S16LE PCM frame, ready for network transmission.
/// Immutable once encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Little-endian wire representation (`samples * 2` bytes).
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for &s in &self.samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }
}

/// Streaming encoder from float samples at an arbitrary source rate into
/// fixed-size 16 kHz PCM frames.
///
/// - Resampling is plain linear interpolation: cheap, O(n), and good enough
///   for speech recognition. Not suitable for high-fidelity audio.
/// - Maintains a carry-over buffer so arbitrary input chunk sizes never
///   produce partial frames; the remainder waits for the next push.
/// - Pure numeric transformation, no failure modes. Empty input yields
///   zero frames.
pub struct FrameEncoder {
    source_rate: u32,
    frame_samples: usize,
    carry: Vec<f32>,
}

impl FrameEncoder {
    pub fn new(source_rate: u32, frame: FrameDuration) -> Self {
        Self {
            source_rate,
            frame_samples: frame.samples(),
            carry: Vec::with_capacity(frame.samples() * 4),
        }
    }

    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Samples currently buffered and not yet emitted as a frame.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    /// Resample to the target rate and append to the carry-over buffer.
    pub fn push(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        if self.source_rate == SAMPLE_RATE_HZ {
            self.carry.extend_from_slice(samples);
        } else {
            let resampled = resample_linear(samples, self.source_rate, SAMPLE_RATE_HZ);
            self.carry.extend_from_slice(&resampled);
        }
    }

    /// Slice off every complete frame, converting to 16-bit PCM.
    ///
    /// Frames are always exactly `frame_samples` long; consumed samples
    /// appear in exactly one frame, in order.
    pub fn drain_frames(&mut self) -> Vec<AudioFrame> {
        let mut frames = Vec::new();
        let fs = self.frame_samples;
        let whole = self.carry.len() / fs;
        for chunk in self.carry.chunks_exact(fs).take(whole) {
            frames.push(AudioFrame {
                samples: chunk.iter().map(|&s| f32_to_pcm16(s)).collect(),
            });
        }
        self.carry.drain(..whole * fs);
        frames
    }

    /// Discard buffered samples (session reset).
    pub fn reset(&mut self) {
        self.carry.clear();
    }
}

/// Linear interpolation resampler: for output index i, srcPos = i / ratio
/// with ratio = target/source, interpolating between floor(srcPos) and the
/// next sample (clamped to the last index).
fn resample_linear(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (input.len() as f64 * ratio).floor() as usize;
    let last = input.len() - 1;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let t = (src_pos - idx as f64) as f32;
        let a = input[idx.min(last)];
        let b = input[(idx + 1).min(last)];
        out.push(a + (b - a) * t);
    }
    out
}

/// Asymmetric scaling matching the two's-complement range: negative values
/// scale by 32768, non-negative by 32767.
fn f32_to_pcm16(s: f32) -> i16 {
    let c = s.clamp(-1.0, 1.0);
    if c < 0.0 {
        (c * 32768.0) as i16
    } else {
        (c * 32767.0) as i16
    }
}
