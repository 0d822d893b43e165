//! The capability interface through which the orchestrator talks to its host.

use crate::{bot::BotCommand, bot::Status, error::ChannelError};
use serde_json::{Map, Value};
use std::fmt;
use tokio::sync::mpsc;

/// Direction of a message shown in the conversation transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Echo of something the user said or the client sent on their behalf.
    Sent,
    /// Bot output.
    Received,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Sent => write!(f, "sent"),
            MessageKind::Received => write!(f, "received"),
        }
    }
}

/// Host-side collaborator notified of everything the session does.
///
/// All methods are invoked from the orchestrator task, one at a time and in
/// event order. Implementations must not block.
pub trait ClientCallback: Send + 'static {
    fn on_error(&mut self, error: &ChannelError);

    fn set_status(&mut self, status: Status);

    /// Preferred synthesis voice, if the host has one.
    fn get_voice(&self) -> Option<String>;

    fn on_end(&mut self);

    /// Adds a message to the transcript. For sent signals `text` may be
    /// `None` while `signal` still carries the raw input.
    fn add_message(
        &mut self,
        kind: MessageKind,
        text: Option<&str>,
        image: Option<&str>,
        background: Option<&str>,
        signal: Option<&str>,
    );

    /// A `#`-prefixed record and its structured payload.
    fn handle_command(&mut self, command: &str, payload: &str);

    fn play(&mut self, sound: &str);

    /// Identifier assigned to the session when the server reports `Ready`.
    fn get_uuid(&mut self) -> String;

    /// Attributes attached to every outbound `Input` frame.
    fn get_attributes(&self) -> Map<String, Value>;

    /// Server-side logs delivered with a `Response`.
    fn add_logs(&mut self, logs: &Value);

    fn add_debug_logs(&mut self, category: &str, message: &str);

    fn focus_on_node(&mut self, _node_id: i64) {}

    /// Presents a video record. Delivery of later records resumes once
    /// `done` is completed. Hosts without video support complete at once.
    fn add_video(&mut self, _video: &str, done: VideoDone) {
        done.complete();
    }
}

/// Completion handle for a video record handed to [`ClientCallback::add_video`].
#[derive(Debug)]
pub struct VideoDone {
    commands: mpsc::UnboundedSender<BotCommand>,
    generation: u64,
}

impl VideoDone {
    pub(crate) fn new(commands: mpsc::UnboundedSender<BotCommand>, generation: u64) -> Self {
        Self {
            commands,
            generation,
        }
    }

    /// Signals that the video finished playing.
    pub fn complete(self) {
        if self
            .commands
            .send(BotCommand::VideoDone {
                generation: self.generation,
            })
            .is_err()
        {
            tracing::debug!("Video completed after the session task stopped.");
        }
    }
}
