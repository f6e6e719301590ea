use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use url::Url;

use voxdub_app::config::AppConfig;
use voxdub_app::runtime;
use voxdub_audio::FrameDuration;
use voxdub_tts::{Accent, AudioMode, Gender};

/// Real-time transcription and dubbing: microphone in, per-speaker
/// synthesized speech and a transcript out.
#[derive(Parser, Debug)]
#[command(name = "voxdub", version, about)]
struct Cli {
    /// Recognition service API key
    #[arg(long, env = "VOXDUB_STT_API_KEY")]
    api_key: String,

    /// Recognition WebSocket endpoint
    #[arg(long, default_value = "wss://eu2.rt.speechmatics.com/v2")]
    stt_url: Url,

    /// Transcription language code
    #[arg(long, default_value = "en")]
    language: String,

    /// Synthesis service endpoint
    #[arg(long, default_value = "http://127.0.0.1:8000/tts")]
    tts_url: String,

    /// Synthesis service API key
    #[arg(long, env = "VOXDUB_TTS_API_KEY")]
    tts_api_key: Option<String>,

    /// Dub accent (american, british, australian, indian).
    /// Omit for a transcript-only session with no synthesis.
    #[arg(long)]
    accent: Option<Accent>,

    /// Dub voice gender (male, female)
    #[arg(long, default_value = "female")]
    gender: Gender,

    /// Output routing (headphones, speakers). With speakers the
    /// microphone is muted while dubbed audio plays.
    #[arg(long, default_value = "headphones")]
    mode: AudioMode,

    /// Input device name; defaults to the system default microphone
    #[arg(long)]
    device: Option<String>,

    /// Audio frame length in milliseconds (20 or 50)
    #[arg(long, default_value_t = 20)]
    frame_ms: u32,

    /// Where to write the transcript at session end
    #[arg(long, default_value = "transcript.txt")]
    transcript: PathBuf,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let frame = match cli.frame_ms {
        20 => FrameDuration::Ms20,
        50 => FrameDuration::Ms50,
        other => anyhow::bail!("unsupported frame length: {}ms (use 20 or 50)", other),
    };

    let config = AppConfig {
        stt_endpoint: cli.stt_url,
        api_key: cli.api_key,
        language: cli.language,
        tts_endpoint: cli.tts_url,
        tts_api_key: cli.tts_api_key,
        accent: cli.accent,
        gender: cli.gender,
        mode: cli.mode,
        device: cli.device,
        frame,
        transcript_path: cli.transcript,
    };

    tracing::info!("Starting VoxDub");
    runtime::run(config).await
}
