//! Cloneable front door to a running orchestrator task.

use super::BotCommand;
use crate::config::InitOptions;
use tokio::sync::mpsc;

/// Returned when the orchestrator task is no longer running.
#[derive(Debug, thiserror::Error)]
#[error("Session task has stopped")]
pub struct SessionClosed;

/// Sends caller operations to the orchestrator. Operations are processed in
/// the order they are issued, interleaved with server events.
#[derive(Clone, Debug)]
pub struct BotHandle {
    commands: mpsc::UnboundedSender<BotCommand>,
}

impl BotHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<BotCommand>) -> Self {
        Self { commands }
    }

    /// Starts a new session, or resumes a sleeping one whose deadline has not passed.
    pub fn init(&self, options: InitOptions) -> Result<(), SessionClosed> {
        self.send(BotCommand::Init(options))
    }

    pub fn submit_text(&self, text: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(BotCommand::SubmitText(text.into()))
    }

    pub fn stop(&self) -> Result<(), SessionClosed> {
        self.send(BotCommand::Stop)
    }

    pub fn pause(&self) -> Result<(), SessionClosed> {
        self.send(BotCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), SessionClosed> {
        self.send(BotCommand::Resume)
    }

    /// Tells the orchestrator the last received message has been presented,
    /// so the next queued record may be delivered.
    pub fn advance(&self) -> Result<(), SessionClosed> {
        self.send(BotCommand::Advance)
    }

    fn send(&self, command: BotCommand) -> Result<(), SessionClosed> {
        self.commands.send(command).map_err(|_| SessionClosed)
    }
}
