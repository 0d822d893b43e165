//! Terminal-side implementation of the bot callback.
//!
//! The callback runs on the orchestrator task, so it only records diagnostics
//! to files and forwards everything user-visible to the main loop as
//! [`UiEvent`]s.

use botline_core::{ChannelError, ClientCallback, MessageKind, Status, VideoDone};
use chrono::Local;
use serde_json::{Map, Value, json};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use tokio::sync::mpsc;
use tracing::warn;

/// What the terminal loop shows to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Message { kind: MessageKind, text: String },
    Image(String),
    Status(Status),
    Command { name: String, code: String },
    Sound(String),
    Video(String),
    Error(String),
    End,
}

/// Appends diagnostics to `<dir>/<client_id>_<category>.log`.
#[derive(Debug, Clone)]
pub struct FileLog {
    dir: PathBuf,
    client_id: String,
}

impl FileLog {
    pub fn new(dir: impl Into<PathBuf>, client_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            client_id: client_id.into(),
        }
    }

    pub fn path(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.log", self.client_id, category))
    }

    pub fn append(&self, category: &str, message: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(category))?;
        writeln!(file, "{} {}", Local::now().to_rfc3339(), message)
    }
}

pub struct ConsoleCallback {
    ui: mpsc::UnboundedSender<UiEvent>,
    log: FileLog,
}

impl ConsoleCallback {
    pub fn new(ui: mpsc::UnboundedSender<UiEvent>, log: FileLog) -> Self {
        Self { ui, log }
    }

    fn emit(&self, event: UiEvent) {
        // The main loop is gone once the user quit.
        let _ = self.ui.send(event);
    }

    fn write_log(&self, category: &str, message: &str) {
        if let Err(e) = self.log.append(category, message) {
            warn!(error = %e, category, "Failed to write log file");
        }
    }
}

impl ClientCallback for ConsoleCallback {
    fn on_error(&mut self, error: &ChannelError) {
        self.write_log("error", &error.to_string());
        self.emit(UiEvent::Error(error.to_string()));
    }

    fn set_status(&mut self, status: Status) {
        self.emit(UiEvent::Status(status));
    }

    fn get_voice(&self) -> Option<String> {
        None
    }

    fn on_end(&mut self) {
        self.emit(UiEvent::End);
    }

    fn add_message(
        &mut self,
        kind: MessageKind,
        text: Option<&str>,
        image: Option<&str>,
        _background: Option<&str>,
        signal: Option<&str>,
    ) {
        self.write_log(
            "messages",
            &format!("{kind}: {}", text.or(signal).unwrap_or_default()),
        );
        if let Some(image) = image {
            self.emit(UiEvent::Image(image.to_string()));
        }
        // The main loop answers every received message with `advance`.
        if kind == MessageKind::Received || text.is_some() {
            self.emit(UiEvent::Message {
                kind,
                text: text.unwrap_or_default().to_string(),
            });
        }
    }

    fn handle_command(&mut self, command: &str, code: &str) {
        self.emit(UiEvent::Command {
            name: command.to_string(),
            code: code.to_string(),
        });
    }

    fn play(&mut self, sound: &str) {
        self.emit(UiEvent::Sound(sound.to_string()));
    }

    fn get_uuid(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn get_attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert(
            "clientType".to_string(),
            json!(format!("botline-cli:{}", env!("CARGO_PKG_VERSION"))),
        );
        attributes
    }

    fn add_logs(&mut self, logs: &Value) {
        self.write_log("server", &logs.to_string());
    }

    fn add_debug_logs(&mut self, category: &str, message: &str) {
        self.write_log(category, message);
    }

    fn add_video(&mut self, video: &str, done: VideoDone) {
        self.emit(UiEvent::Video(video.to_string()));
        done.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback(dir: &std::path::Path) -> (ConsoleCallback, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConsoleCallback::new(tx, FileLog::new(dir, "client-1")), rx)
    }

    #[test]
    fn test_file_log_appends_per_category() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileLog::new(dir.path().join("logs"), "client-1");

        log.append("error", "first").unwrap();
        log.append("error", "second").unwrap();
        log.append("Bot", "init").unwrap();

        let errors = fs::read_to_string(dir.path().join("logs/client-1_error.log")).unwrap();
        let lines: Vec<_> = errors.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" first"));
        assert!(lines[1].ends_with(" second"));
        assert!(log.path("Bot").exists());
    }

    #[test]
    fn test_masked_echo_is_logged_but_not_shown() {
        let dir = tempfile::tempdir().unwrap();
        let (mut callback, mut rx) = callback(dir.path());

        callback.add_message(MessageKind::Sent, None, None, None, Some("#intro"));
        callback.add_message(MessageKind::Received, Some("Hello"), None, None, None);

        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::Message {
                kind: MessageKind::Received,
                text: "Hello".to_string(),
            }
        );
        assert!(rx.try_recv().is_err());

        let messages =
            fs::read_to_string(dir.path().join("client-1_messages.log")).unwrap();
        assert!(messages.contains("sent: #intro"));
        assert!(messages.contains("received: Hello"));
    }

    #[test]
    fn test_forwards_notifications() {
        let dir = tempfile::tempdir().unwrap();
        let (mut callback, mut rx) = callback(dir.path());

        callback.set_status(Status::Listening);
        callback.handle_command("#show", "{}");
        callback.on_error(&ChannelError::Server("boom".to_string()));
        callback.on_end();

        assert_eq!(rx.try_recv().unwrap(), UiEvent::Status(Status::Listening));
        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::Command {
                name: "#show".to_string(),
                code: "{}".to_string(),
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::Error("Server: boom".to_string())
        );
        assert_eq!(rx.try_recv().unwrap(), UiEvent::End);
        assert!(dir.path().join("client-1_error.log").exists());
    }

    #[test]
    fn test_attributes_and_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let (mut callback, _rx) = callback(dir.path());

        let attributes = callback.get_attributes();
        assert!(
            attributes["clientType"]
                .as_str()
                .unwrap()
                .starts_with("botline-cli:")
        );
        assert_ne!(callback.get_uuid(), callback.get_uuid());
    }
}
