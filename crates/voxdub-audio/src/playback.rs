use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors on the playback side. Decode failures are always recovered
/// locally by the scheduler (drop the buffer, continue); they never
/// surface to the user.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Audio decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("No output device available")]
    NoOutputDevice,

    #[error("Output backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("WAV parse error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported WAV format: {0}")]
    Unsupported(String),
}

/// A decoded synthesis payload, ready for the output stream.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() as u64 / self.channels.max(1) as u64;
        Duration::from_millis(frames * 1000 / self.sample_rate.max(1) as u64)
    }
}

/// Decode a WAV container (the synthesizer's wire format) into PCM.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .collect::<Result<Vec<i16>, _>>()?,
        (hound::SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * 32767.0) as i16))
            .collect::<Result<Vec<i16>, _>>()?,
        (fmt, bits) => {
            return Err(DecodeError::Unsupported(format!(
                "{:?} {} bits",
                fmt, bits
            )));
        }
    };

    if samples.is_empty() {
        return Err(DecodeError::Unsupported("empty audio payload".into()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Blocking single-buffer player over the default output device.
///
/// One buffer at a time is the contract: the scheduler never starts the
/// next item until this call returns, which is what makes playback
/// strictly serial.
pub struct CpalPlayer {
    /// Small preroll before the first sample to avoid a click from an
    /// immediate start.
    pub preroll: Duration,
}

impl Default for CpalPlayer {
    fn default() -> Self {
        Self {
            preroll: Duration::from_millis(30),
        }
    }
}

impl CpalPlayer {
    /// Play the decoded buffer to completion. Returns once the last sample
    /// has been handed to the device (plus a small margin).
    pub fn play_blocking(&self, audio: &DecodedAudio) -> Result<(), PlaybackError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(PlaybackError::NoOutputDevice)?;

        let stream_config = StreamConfig {
            channels: audio.channels,
            sample_rate: SampleRate(audio.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let queue: Arc<Mutex<VecDeque<i16>>> =
            Arc::new(Mutex::new(audio.samples.iter().copied().collect()));
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let stream = self.build_output_stream(&device, &stream_config, queue, done_tx)?;

        std::thread::sleep(self.preroll);
        stream
            .play()
            .map_err(|e| PlaybackError::Backend(e.to_string()))?;

        // Wait for the callback to exhaust the queue; the timeout is a
        // safety net in case the device stalls.
        let limit = audio.duration() + Duration::from_secs(2);
        let _ = done_rx.recv_timeout(limit);
        drop(stream);
        Ok(())
    }

    fn build_output_stream(
        &self,
        device: &cpal::Device,
        config: &StreamConfig,
        queue: Arc<Mutex<VecDeque<i16>>>,
        done_tx: crossbeam_channel::Sender<()>,
    ) -> Result<Stream, PlaybackError> {
        let err_fn = |err: cpal::StreamError| {
            tracing::error!(target: "audio", "Output stream error: {}", err);
        };

        let supports_f32 = device
            .default_output_config()
            .map(|c| c.sample_format() == SampleFormat::F32)
            .unwrap_or(true);

        let stream = if supports_f32 {
            device.build_output_stream(
                config,
                move |out: &mut [f32], _: &_| {
                    let mut q = queue.lock();
                    for sample in out.iter_mut() {
                        *sample = match q.pop_front() {
                            Some(s) => s as f32 / 32768.0,
                            None => {
                                let _ = done_tx.try_send(());
                                0.0
                            }
                        };
                    }
                },
                err_fn,
                None,
            )
        } else {
            device.build_output_stream(
                config,
                move |out: &mut [i16], _: &_| {
                    let mut q = queue.lock();
                    for sample in out.iter_mut() {
                        *sample = match q.pop_front() {
                            Some(s) => s,
                            None => {
                                let _ = done_tx.try_send(());
                                0
                            }
                        };
                    }
                },
                err_fn,
                None,
            )
        };

        stream.map_err(|e| PlaybackError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
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

    #[test]
    fn decode_int16_wav() {
        let bytes = wav_bytes(&[0, 100, -100, 32767], 16_000);
        let decoded = decode_wav(&bytes).unwrap();
        assert_eq!(decoded.samples, vec![0, 100, -100, 32767]);
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.channels, 1);
    }

    #[test]
    fn corrupt_payload_is_an_error_not_a_panic() {
        assert!(decode_wav(&[0x52, 0x49, 0x46, 0x46, 0x00]).is_err());
        assert!(decode_wav(b"not a wav at all").is_err());
    }

    #[test]
    fn empty_payload_rejected() {
        let bytes = wav_bytes(&[], 16_000);
        assert!(matches!(
            decode_wav(&bytes),
            Err(DecodeError::Unsupported(_))
        ));
    }

    #[test]
    fn duration_from_spec() {
        let audio = DecodedAudio {
            samples: vec![0i16; 24_000],
            sample_rate: 24_000,
            channels: 1,
        };
        assert_eq!(audio.duration(), Duration::from_secs(1));
    }
}
