//! Pipeline wiring: capture thread, recognition client, sentence assembly,
//! and the synthesis scheduler, connected by channels.
//!
//! Shutdown propagates along the data path. Stopping capture drops the
//! frame sender, which ends the bridge, which closes the client's frame
//! source, which closes the session and the event stream; the event loop
//! then flushes pending sentences and lets queued audio finish playing.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use voxdub_audio::{AudioFrame, CaptureConfig, CaptureThread, GainControl};
use voxdub_stt::{
    ClientConfig, StaticToken, TranscriptEvent, TranscriptionClient, WsTransport,
};
use voxdub_telemetry::PipelineMetrics;
use voxdub_tts::{
    HttpSynthesizer, SchedulerConfig, SentenceBuffer, SpeakScheduler, VoiceAssignmentTable,
};

use crate::config::AppConfig;
use crate::sink::CpalSink;
use crate::transcript::{FileTranscriptSink, TranscriptStore};

const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Runs one full session: open the recognizer, stream the microphone, dub
/// until Ctrl-C or the recognizer ends the session, then drain and save
/// the transcript.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let metrics = PipelineMetrics::new();
    let gain = GainControl::default();

    // Capture thread feeds encoded frames over a bounded channel; a full
    // channel drops frames rather than stalling the audio callback.
    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<AudioFrame>(FRAME_CHANNEL_CAPACITY);
    let capture = CaptureThread::spawn(
        CaptureConfig {
            device: config.device.clone(),
            frame: config.frame,
        },
        frame_tx,
        gain.clone(),
        Some(Arc::new(metrics.clone())),
    )
    .context("failed to start audio capture")?;

    // Bridge from the capture thread's sync channel into the async side,
    // converting each frame to its wire bytes.
    let (wire_tx, wire_rx) = mpsc::channel::<Vec<u8>>(FRAME_CHANNEL_CAPACITY);
    let bridge = tokio::task::spawn_blocking(move || {
        while let Ok(frame) = frame_rx.recv() {
            if wire_tx.blocking_send(frame.to_le_bytes()).is_err() {
                break;
            }
        }
    });

    let (event_tx, event_rx) = mpsc::channel::<TranscriptEvent>(FRAME_CHANNEL_CAPACITY);
    let mut client = TranscriptionClient::new(
        WsTransport::new(config.stt_endpoint.clone()),
        ClientConfig {
            language: config.language.clone(),
            ..ClientConfig::default()
        },
        event_tx,
    )
    .with_metrics(Arc::new(metrics.clone()));
    client
        .start(&StaticToken::new(&config.api_key))
        .await
        .context("failed to open recognition session")?;
    let client_task = tokio::spawn(client.run(wire_rx));

    let synth = Arc::new(HttpSynthesizer::new(
        config.tts_endpoint.clone(),
        config.tts_api_key.clone(),
    ));
    let scheduler = SpeakScheduler::spawn(
        synth,
        Arc::new(CpalSink::new()),
        VoiceAssignmentTable::new(config.voice_selection()),
        gain.clone(),
        SchedulerConfig {
            mode: config.mode,
            ..SchedulerConfig::default()
        },
        metrics.clone(),
    );

    let mut event_task = tokio::spawn(drive_events(event_rx, scheduler, metrics.clone()));
    info!("Pipeline running (mode: {:?})", config.mode);

    let early = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, stopping session");
            None
        }
        res = &mut event_task => {
            info!("Session ended by recognizer");
            Some(res)
        }
    };

    capture.stop();
    let _ = bridge.await;
    let _ = client_task.await;
    let transcript = match early {
        Some(res) => res?,
        None => event_task.await?,
    };

    let mut sink = FileTranscriptSink::new(config.transcript_path.clone());
    transcript
        .save(&mut sink)
        .context("failed to write transcript")?;
    if !transcript.is_empty() {
        info!("Transcript saved to {}", config.transcript_path.display());
    }
    info!("Pipeline summary: {}", metrics.summary());
    Ok(())
}

/// Consumes recognition events until the stream closes, feeding both the
/// transcript and the synthesis queue. Returns once all queued audio has
/// played.
pub async fn drive_events(
    mut event_rx: mpsc::Receiver<TranscriptEvent>,
    scheduler: SpeakScheduler,
    metrics: PipelineMetrics,
) -> TranscriptStore {
    let mut transcript = TranscriptStore::new();
    let mut sentences = SentenceBuffer::new();

    while let Some(event) = event_rx.recv().await {
        match event {
            TranscriptEvent::Piece(piece) => {
                transcript.push(&piece);
                for utterance in sentences.push(&piece.speaker, piece.display_text()) {
                    metrics.sentences_extracted.fetch_add(1, Ordering::Relaxed);
                    scheduler.enqueue(utterance);
                }
            }
            TranscriptEvent::EndOfSession => break,
            TranscriptEvent::Error { kind, reason } => {
                error!("Recognition error [{}]: {}", kind, reason);
                break;
            }
        }
    }

    // Unterminated sentences still get spoken at session end
    for utterance in sentences.flush_all() {
        metrics.sentences_extracted.fetch_add(1, Ordering::Relaxed);
        scheduler.enqueue(utterance);
    }
    scheduler.shutdown().await;
    transcript
}
