//! Main Entrypoint for the Botline terminal client
//!
//! This binary is responsible for:
//! 1. Loading configuration from the command line and the environment.
//! 2. Initializing logging.
//! 3. Starting a bot session over the conversation socket.
//! 4. Relaying stdin lines to the bot and printing its output until the user quits.

use anyhow::Context;
use botline_cli::{
    config::{Cli, Config},
    console::{ConsoleCallback, FileLog, UiEvent},
};
use botline_core::MessageKind;
use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::info;

/// Inputs that end the demo instead of being sent to the bot.
const QUIT_WORDS: [&str; 2] = ["bye", "quit"];

/// Prints one event. Returns `true` when the bot should move on to its next message.
fn show(event: &UiEvent) -> bool {
    match event {
        UiEvent::Message {
            kind: MessageKind::Received,
            text,
        } => {
            println!("bot> {text}");
            true
        }
        UiEvent::Message { text, .. } => {
            println!("you> {text}");
            false
        }
        UiEvent::Image(url) => {
            println!("     [image {url}]");
            false
        }
        UiEvent::Video(url) => {
            println!("     [video {url}]");
            false
        }
        UiEvent::Command { name, code } => {
            println!("     [{name} {code}]");
            false
        }
        UiEvent::Sound(sound) => {
            println!("     [sound {sound}]");
            false
        }
        UiEvent::Status(status) => {
            info!(%status, "Status changed.");
            false
        }
        UiEvent::Error(error) => {
            eprintln!("error: {error}");
            false
        }
        UiEvent::End => {
            println!("     [session ended, type anything to start again]");
            false
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    let client_id = uuid::Uuid::new_v4().to_string();
    info!(%client_id, url = %config.base_url, "Configuration loaded. Starting session...");

    // --- 3. Start the Session ---
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let callback = ConsoleCallback::new(ui_tx, FileLog::new(&cli.log_dir, client_id.as_str()));
    let (handle, task) = botline_core::spawn(config.bot_config(), callback);
    let options = cli.init_options(config.token.clone());
    handle
        .init(options.clone())
        .context("Session task stopped before init")?;

    // --- 4. Relay Input and Output ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ended = false;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if QUIT_WORDS.contains(&text.to_lowercase().as_str()) {
                    break;
                }
                if ended {
                    ended = false;
                    handle.init(options.clone())?;
                } else {
                    handle.submit_text(text)?;
                }
            }
            Some(event) = ui_rx.recv() => {
                ended |= event == UiEvent::End;
                if show(&event) {
                    handle.advance()?;
                }
            }
        }
    }

    handle.stop()?;
    drop(handle);
    task.await.context("Session task failed")?;
    info!("Session closed. Bye.");
    Ok(())
}
