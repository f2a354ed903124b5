//! vocalog CLI — transcript server and client.
//!
//! ```text
//! vocalog serve [--port 5000] [--host 127.0.0.1] [--db voice_data.db] [--tld com] [--slow]
//! vocalog say "hello world" [--lang en-US] [--out tts.mp3] [--server http://localhost:5000]
//! vocalog save clip.webm --text "hello world" [--lang en-US] [--server ...]
//! vocalog fetch 3 [--out audio_3.webm] [--server ...]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vocalog_lib::client::Client;
use vocalog_lib::server::{router, AppState};
use vocalog_lib::vocalog_core::types::{
    ServerConfig, TtsConfig, DEFAULT_DB_PATH, DEFAULT_LANGUAGE_TAG, DEFAULT_MAX_UPLOAD_BYTES,
};

/// vocalog — voice transcript recorder with server-side TTS
#[derive(Parser)]
#[command(name = "vocalog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the vocalog HTTP server
    Serve {
        /// Listen port
        #[arg(long, default_value = "5000")]
        port: u16,
        /// Listen host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// SQLite database file
        #[arg(long, default_value = DEFAULT_DB_PATH)]
        db: PathBuf,
        /// Google Translate top-level domain used for TTS
        #[arg(long, default_value = "com")]
        tld: String,
        /// Request slower speech from the TTS provider
        #[arg(long)]
        slow: bool,
        /// Maximum upload size in bytes
        #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,
    },
    /// Synthesize text on the running server and save the MP3
    Say {
        /// Text to speak
        text: String,
        #[arg(long, default_value = DEFAULT_LANGUAGE_TAG)]
        lang: String,
        /// Output file
        #[arg(long, default_value = "tts.mp3")]
        out: PathBuf,
        /// Server URL
        #[arg(long, default_value = "http://localhost:5000")]
        server: String,
    },
    /// Upload an audio file and its transcript
    Save {
        /// Audio file (.webm or .mp3)
        audio: PathBuf,
        /// Transcript text
        #[arg(long)]
        text: String,
        #[arg(long, default_value = DEFAULT_LANGUAGE_TAG)]
        lang: String,
        #[arg(long, default_value = "http://localhost:5000")]
        server: String,
    },
    /// Download the stored audio of a transcript
    Fetch {
        /// Transcript id
        id: i64,
        /// Output file (defaults to the name the server suggests, e.g. audio_<id>.mp3)
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value = "http://localhost:5000")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve {
            port,
            host,
            db,
            tld,
            slow,
            max_upload_bytes,
        } => {
            let config = ServerConfig {
                db_path: db,
                tts: TtsConfig {
                    tld,
                    slow,
                    ..Default::default()
                },
                max_upload_bytes,
            };
            serve(&config, &format!("{host}:{port}")).await
        }

        Command::Say {
            text,
            lang,
            out,
            server,
        } => Client::new(server)
            .say(&text, &lang, &out)
            .await
            .map(|n| println!("wrote {n} bytes to {}", out.display())),

        Command::Save {
            audio,
            text,
            lang,
            server,
        } => Client::new(server)
            .save(&audio, &text, &lang)
            .await
            .and_then(|reply| {
                serde_json::to_string(&reply)
                    .map(|json| println!("{json}"))
                    .map_err(|e| e.to_string())
            }),

        Command::Fetch { id, out, server } => Client::new(server)
            .fetch(id, out.as_deref())
            .await
            .map(|(path, n)| println!("wrote {n} bytes to {}", path.display())),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: &ServerConfig, addr: &str) -> Result<(), String> {
    let state = AppState::from_config(config).map_err(|e| e.to_string())?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind {addr}: {e}"))?;
    info!("vocalog listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server error: {e}"))
}
