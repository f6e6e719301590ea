use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::frame_encoder::{AudioFrame, FrameDuration, FrameEncoder};
use crate::gain::GainControl;
use voxdub_foundation::{CaptureError, SAMPLE_RATE_HZ};
use voxdub_telemetry::PipelineMetrics;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Input device name; None selects the host default.
    pub device: Option<String>,
    pub frame: FrameDuration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            frame: FrameDuration::Ms20,
        }
    }
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub callbacks: AtomicU64,
    pub frames_encoded: AtomicU64,
    pub frames_dropped: AtomicU64,
}

/// Handle to the dedicated capture thread.
///
/// The cpal stream lives entirely on that thread; the rest of the pipeline
/// sees only encoded frames on the bounded channel passed to `spawn`.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    pub stats: Arc<CaptureStats>,
}

impl CaptureThread {
    /// Acquire the microphone and start streaming encoded frames.
    ///
    /// The shared `gain` is applied to every sample before encoding; this
    /// pipeline only reads it, the playback scheduler owns the writes.
    /// Echo cancellation / noise suppression are deliberately not requested:
    /// the recognizer performs its own filtering and host DSP would distort
    /// the framing.
    pub fn spawn(
        config: CaptureConfig,
        frame_tx: crossbeam_channel::Sender<AudioFrame>,
        gain: GainControl,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Result<Self, CaptureError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(CaptureStats::default());
        let (startup_tx, startup_rx) = crossbeam_channel::bounded::<Result<(), CaptureError>>(1);

        let thread_shutdown = shutdown.clone();
        let thread_stats = stats.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                run_capture(
                    config,
                    frame_tx,
                    gain,
                    metrics,
                    thread_stats,
                    thread_shutdown,
                    startup_tx,
                );
            })
            .map_err(|e| CaptureError::Fatal(format!("Failed to spawn capture thread: {}", e)))?;

        // Wait for the stream to come up (or fail) before reporting success.
        match startup_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(Self {
                handle,
                shutdown,
                stats,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = handle.join();
                Err(CaptureError::Fatal(
                    "Capture thread did not start within timeout".into(),
                ))
            }
        }
    }

    /// Stop capturing and join the thread. Teardown inside the thread is
    /// best-effort: a failing step never prevents the following ones.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_capture(
    config: CaptureConfig,
    frame_tx: crossbeam_channel::Sender<AudioFrame>,
    gain: GainControl,
    metrics: Option<Arc<PipelineMetrics>>,
    stats: Arc<CaptureStats>,
    shutdown: Arc<AtomicBool>,
    startup_tx: crossbeam_channel::Sender<Result<(), CaptureError>>,
) {
    let encoder: Arc<Mutex<Option<FrameEncoder>>> = Arc::new(Mutex::new(None));

    let stream = match build_capture_stream(
        &config,
        frame_tx,
        gain,
        metrics,
        stats,
        encoder.clone(),
    ) {
        Ok(s) => s,
        Err(e) => {
            let _ = startup_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = startup_tx.send(Err(e.into()));
        return;
    }
    let _ = startup_tx.send(Ok(()));
    tracing::info!(target: "audio", "Capture stream started");

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    // Teardown in strict order, each step guarded so one failure does not
    // stop the rest: encoder first (no more frames leave this thread),
    // then the stream, then the handle drop closes the device.
    if let Some(enc) = encoder.lock().as_mut() {
        enc.reset();
    }
    if let Err(e) = stream.pause() {
        tracing::warn!(target: "audio", "Failed to pause capture stream: {}", e);
    }
    drop(stream);
    tracing::info!(target: "audio", "Capture thread shut down");
}

fn build_capture_stream(
    config: &CaptureConfig,
    frame_tx: crossbeam_channel::Sender<AudioFrame>,
    gain: GainControl,
    metrics: Option<Arc<PipelineMetrics>>,
    stats: Arc<CaptureStats>,
    encoder: Arc<Mutex<Option<FrameEncoder>>>,
) -> Result<Stream, CaptureError> {
    let host = cpal::default_host();
    let device = open_device(&host, config.device.as_deref())?;
    if let Ok(name) = device.name() {
        tracing::info!(target: "audio", "Selected input device: {}", name);
    }

    let (stream_config, sample_format) = negotiate_config(&device)?;
    let channels = stream_config.channels as usize;
    let source_rate = stream_config.sample_rate.0;
    tracing::info!(
        target: "audio",
        "Capture config: {} Hz, {} ch, {:?}",
        source_rate,
        channels,
        sample_format
    );

    *encoder.lock() = Some(FrameEncoder::new(source_rate, config.frame));

    let err_fn = |err: cpal::StreamError| {
        tracing::error!(target: "audio", "Capture stream error: {}", err);
    };

    // Shared per-callback path: mono-mix, apply the gain stage, encode,
    // forward every drained frame without blocking the audio callback.
    // Arc so each sample-format arm can hold its own handle.
    let handle_f32 = Arc::new(move |data: &[f32]| {
        stats.callbacks.fetch_add(1, Ordering::Relaxed);
        if let Some(m) = &metrics {
            m.capture_callbacks.fetch_add(1, Ordering::Relaxed);
        }

        let g = gain.get();
        let mono: Vec<f32> = if channels == 1 {
            data.iter().map(|&s| s * g).collect()
        } else {
            data.chunks_exact(channels)
                .map(|c| c.iter().sum::<f32>() / channels as f32 * g)
                .collect()
        };

        let mut guard = encoder.lock();
        let Some(enc) = guard.as_mut() else { return };
        enc.push(&mono);
        for frame in enc.drain_frames() {
            match frame_tx.try_send(frame) {
                Ok(()) => {
                    stats.frames_encoded.fetch_add(1, Ordering::Relaxed);
                    if let Some(m) = &metrics {
                        m.frames_encoded.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(_) => {
                    stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    if let Some(m) = &metrics {
                        m.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    });

    let stream = match sample_format {
        SampleFormat::F32 => {
            let handle = handle_f32.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &_| (*handle)(data),
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            let handle = handle_f32.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &_| {
                    let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    (*handle)(&floats);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let handle = handle_f32.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &_| {
                    let floats: Vec<f32> = data
                        .iter()
                        .map(|&s| (s as i32 - 32768) as f32 / 32768.0)
                        .collect();
                    (*handle)(&floats);
                },
                err_fn,
                None,
            )?
        }
        other => {
            return Err(CaptureError::UnsupportedConstraints {
                detail: format!("sample format {:?}", other),
            });
        }
    };

    Ok(stream)
}

fn open_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    match name {
        Some(wanted) => {
            let devices = host
                .input_devices()
                .map_err(|e| CaptureError::Backend(e.to_string()))?;
            for device in devices {
                if device.name().map(|n| n == wanted).unwrap_or(false) {
                    return Ok(device);
                }
            }
            Err(CaptureError::DeviceNotFound {
                name: Some(wanted.to_string()),
            })
        }
        None => host
            .default_input_device()
            .ok_or(CaptureError::DeviceNotFound { name: None }),
    }
}

/// Prefer mono at the target rate; otherwise take the device default and let
/// the frame encoder resample/mono-mix.
fn negotiate_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    if let Ok(configs) = device.supported_input_configs() {
        for range in configs {
            if range.channels() == 1
                && range.min_sample_rate().0 <= SAMPLE_RATE_HZ
                && range.max_sample_rate().0 >= SAMPLE_RATE_HZ
            {
                let cfg = range.with_sample_rate(SampleRate(SAMPLE_RATE_HZ));
                return Ok((
                    StreamConfig {
                        channels: 1,
                        sample_rate: SampleRate(SAMPLE_RATE_HZ),
                        buffer_size: cpal::BufferSize::Default,
                    },
                    cfg.sample_format(),
                ));
            }
        }
    }

    let default = device.default_input_config()?;
    Ok((
        StreamConfig {
            channels: default.channels(),
            sample_rate: default.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        },
        default.sample_format(),
    ))
}
