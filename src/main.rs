use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use tts_reader::notification::{FileProgressObserver, LoggingStateObserver, ProgressBarObserver};
use tts_reader::tts::voices::list_voices;
use tts_reader::utils::logger::init_logger;
use tts_reader::{PlaybackOutcome, ProviderKind, ReaderConfig, TtsReader};

#[derive(Parser, Debug)]
#[command(name = "tts-reader")]
#[command(version)]
#[command(about = "Read documents aloud through local or remote TTS providers", long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// TTS provider: local, elevenlabs, speecht5, kokoro
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read a text file aloud (p = pause, r = resume, s = stop)
    Read {
        /// Plain text file to read
        file: PathBuf,

        /// Maximum chunk length in characters
        #[arg(long)]
        max_chunk: Option<usize>,

        /// Append progress updates to this file
        #[arg(long)]
        progress_log: Option<PathBuf>,
    },
    /// List available ElevenLabs voices
    Voices,
}

/// Команды управления с клавиатуры
#[derive(Debug, Clone, Copy)]
enum Control {
    Pause,
    Resume,
    Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => ReaderConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReaderConfig::default(),
    };
    config.apply_env();
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }

    match cli.command {
        Commands::Read {
            file,
            max_chunk,
            progress_log,
        } => {
            if let Some(max_chunk) = max_chunk {
                config.max_chunk_chars = max_chunk;
            }
            read(config, &file, progress_log).await
        }
        Commands::Voices => voices(&config).await,
    }
}

async fn read(config: ReaderConfig, file: &Path, progress_log: Option<PathBuf>) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let reader = Arc::new(TtsReader::from_config(config)?);
    reader.add_progress_observer(Box::new(ProgressBarObserver::default()));
    if let Some(path) = progress_log {
        reader.add_progress_observer(Box::new(FileProgressObserver::new(path)));
    }
    reader.add_state_observer(Box::new(LoggingStateObserver));

    println!(
        "Reading {} via {}. Commands: p = pause, r = resume, s = stop",
        file.display(),
        reader.active_provider()
    );

    let mut controls = spawn_stdin_controls();
    let control_task = {
        let reader = reader.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    control = controls.recv() => match control {
                        Some(Control::Pause) => reader.pause(),
                        Some(Control::Resume) => reader.resume(),
                        Some(Control::Stop) => reader.stop(),
                        None => break,
                    },
                    signal = tokio::signal::ctrl_c() => {
                        if signal.is_ok() {
                            reader.stop();
                        }
                        break;
                    }
                }
            }
        })
    };

    let result = reader.play(&text).await;
    control_task.abort();

    match result {
        Ok(PlaybackOutcome::Completed) => println!("Done."),
        Ok(PlaybackOutcome::Stopped) => println!("\nStopped."),
        Err(e) => {
            if let Some(kind) = e.kind() {
                eprintln!("\n{}", kind.user_message());
            }
            return Err(e.into());
        }
    }
    Ok(())
}

/// Читать команды из stdin в отдельном потоке: блокирующее чтение не
/// должно задерживать завершение рантайма
fn spawn_stdin_controls() -> mpsc::UnboundedReceiver<Control> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let control = match line.trim() {
                "p" | "pause" => Control::Pause,
                "r" | "resume" => Control::Resume,
                "s" | "stop" | "q" => Control::Stop,
                "" => continue,
                other => {
                    eprintln!("Unknown command: {}", other);
                    continue;
                }
            };
            if tx.send(control).is_err() {
                break;
            }
        }
    });
    rx
}

async fn voices(config: &ReaderConfig) -> Result<()> {
    if config.elevenlabs.api_key.trim().is_empty() {
        log::warn!("No ElevenLabs API key configured, showing built-in voices");
    }
    let client = reqwest::Client::new();
    for voice in list_voices(&client, &config.api_base, &config.elevenlabs.api_key).await {
        println!("{:<24} {}", voice.voice_id, voice.label());
    }
    Ok(())
}
