//! nexus-audio: audio session orchestrator over a line-delimited JSON bus.
//!
//! Inbound messages are read from stdin, outbound messages are written to
//! stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use nexus_audio::bus::{topic, Message};
use nexus_audio::hal::SimulatedHal;
use nexus_audio::{AudioConfig, AudioService, EventSender};

#[derive(Parser, Debug)]
#[command(name = "nexus-audio")]
#[command(about = "Audio session orchestrator for speech, effects and background streams")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "NEXUS_AUDIO_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "nexus_audio=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AudioConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AudioConfig::default(),
    };

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Message>();
    let (events, mut outbound_rx) = EventSender::channel();

    let hal = Arc::new(SimulatedHal::new(inbound_tx.clone()));
    let mut service = AudioService::start(&config, hal, events);
    let router = service.spawn_router(inbound_rx);

    // Local bus: print everything we emit, and echo speech telemetry back to
    // the router the way a broadcast bus would.
    let loopback = inbound_tx.clone();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = outbound_rx.recv().await {
            let message = event.into_message();
            if message.msg_type == topic::AUDIO_OUTPUT_START
                || message.msg_type == topic::AUDIO_OUTPUT_END
            {
                let _ = loopback.send(message.clone());
            }
            match message.serialize() {
                Ok(line) => {
                    if stdout.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(e) => tracing::error!("Failed to serialize {}: {}", message.msg_type, e),
            }
        }
    });

    tracing::info!("Reading bus messages from stdin. Ctrl+C to stop.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match Message::deserialize(&line) {
                        Ok(message) => {
                            if inbound_tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("Ignoring malformed message: {}", e),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    service.shutdown().await;
    drop(service);
    drop(inbound_tx);
    router.abort();
    let _ = router.await;
    // Every emitter is gone now, so the writer drains and exits.
    let _ = writer.await;
    Ok(())
}
