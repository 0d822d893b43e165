//! Session Orchestrator
//!
//! Translates transport events into status changes, delivery queue mutations
//! and caller notifications. It is organized into submodules:
//!
//! - `session`: the per-conversation state and the client-visible `Status`.
//! - `handle`: the cloneable `BotHandle` callers use to drive a running bot.
//!
//! The orchestrator runs as a single task that owns all session state and
//! processes caller commands and transport events strictly one at a time.

mod handle;
mod session;

pub use handle::{BotHandle, SessionClosed};
pub use session::{Session, Status};

use crate::{
    callback::{ClientCallback, MessageKind, VideoDone},
    config::{BotConfig, InitOptions},
    error::ChannelError,
    protocol::{InboundEvent, Recognition, ResponsePayload},
    queue::DeliveryQueue,
    record::{ResponseRecord, is_signal},
    transport::{Transport, TransportEvent, init_frame},
    turn_log::{LogLevel, TurnLog},
};
use std::time::Duration;
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, error, info, warn};

/// Signal that is handed to the host but pauses the drain like a regular message.
pub const NO_AUTO_CONTINUE_SIGNAL: &str = "#walk";
/// Sound requested when a session is ready and nothing is sent automatically.
pub const READY_SOUND: &str = "bot_ready";

/// Caller operations, delivered to the orchestrator task through [`BotHandle`].
#[derive(Debug)]
pub enum BotCommand {
    Init(InitOptions),
    SubmitText(String),
    Stop,
    Pause,
    Resume,
    Advance,
    /// A video handed to the host finished playing.
    VideoDone { generation: u64 },
}

/// Outcome of a single drain step.
enum DrainStep {
    Continue,
    Stop,
}

/// The session orchestrator.
pub struct Bot<T: Transport, C: ClientCallback> {
    config: BotConfig,
    options: InitOptions,
    transport: T,
    callback: C,
    session: Session,
    queue: DeliveryQueue,
    turn_log: TurnLog,
    /// Used to mint video completion handles without keeping the command
    /// channel open on our own.
    commands: mpsc::WeakUnboundedSender<BotCommand>,
}

impl<T: Transport, C: ClientCallback> Bot<T, C> {
    pub fn new(
        config: BotConfig,
        transport: T,
        callback: C,
        commands: mpsc::WeakUnboundedSender<BotCommand>,
    ) -> Self {
        Self {
            config,
            options: InitOptions::new(String::new()),
            transport,
            callback,
            session: Session::default(),
            queue: DeliveryQueue::new(),
            turn_log: TurnLog::new(),
            commands,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Processes commands and transport events until every [`BotHandle`] is
    /// dropped, then closes the transport.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<BotCommand>,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = events.recv() => match event {
                    TransportEvent::Event(event) => self.on_event(event).await,
                    TransportEvent::Error(e) => self.fail(e).await,
                },
            }
        }
        self.transport.close().await;
        info!("Session task finished.");
    }

    pub async fn handle_command(&mut self, command: BotCommand) {
        match command {
            BotCommand::Init(options) => self.init(options).await,
            BotCommand::SubmitText(text) => self.submit_text(&text).await,
            BotCommand::Stop => self.stop().await,
            BotCommand::Pause => self.pause(),
            BotCommand::Resume => self.resume(),
            BotCommand::Advance => self.drain(),
            BotCommand::VideoDone { generation } => self.video_done(generation),
        }
    }

    /// Starts a session, or resumes the current one while its sleep deadline
    /// has not passed.
    pub async fn init(&mut self, options: InitOptions) {
        self.options = options;
        if !self.session.can_resume(Instant::now()) {
            self.initialize().await;
            return;
        }

        self.session.sleep_deadline = None;
        let start_message = self.options.start_message.clone();
        match self.send_turn(&start_message).await {
            Ok(()) => {
                info!(session_id = ?self.session.id, "Resumed sleeping session.");
                self.turn_log.restart_clock();
                self.echo_sent(&start_message);
            }
            Err(e) => {
                warn!(error = %e, "Could not resume session, starting a new one.");
                self.initialize().await;
            }
        }
    }

    async fn initialize(&mut self) {
        self.session
            .begin(&self.options.language, &self.config.device_id, self.options.auth_token.clone());
        self.assign_session(None);
        self.turn_log.restart_clock();

        self.callback.add_debug_logs("Bot", "init");
        self.turn_log.push(LogLevel::Info, "Bot init");
        info!(app_key = %self.options.app_key, language = %self.options.language, "Opening session.");

        let init = init_frame(&self.config, &self.options, self.callback.get_voice());
        if let Err(e) = self.transport.open(&init).await {
            self.fail(e).await;
        }
    }

    pub async fn submit_text(&mut self, text: &str) {
        self.flush_queue();
        self.session.sleep_deadline = None;
        self.echo_sent(text);
        self.set_status(Status::Processing);
        self.send_text(text).await;
        self.turn_log.restart_clock();
    }

    pub async fn stop(&mut self) {
        self.session.ended = true;
        self.assign_session(None);
        self.transport.close().await;
        self.session.sleep_deadline = None;
        self.set_status(Status::Sleeping);
    }

    pub fn pause(&mut self) {
        self.set_status(Status::Paused);
    }

    pub fn resume(&mut self) {
        self.flush_queue();
        self.set_status(Status::Listening);
    }

    pub async fn on_event(&mut self, event: InboundEvent) {
        self.turn_log
            .push(LogLevel::Info, format!("Received event {}", event.kind()));
        match event {
            InboundEvent::Ready => self.on_ready().await,
            InboundEvent::SessionStarted { session_id } => {
                info!(%session_id, "Session started.");
                self.session.last_transcript.clear();
                self.assign_session(Some(session_id));
                self.set_status(Status::Responding);
            }
            InboundEvent::InputAudioStreamOpen => self.set_status(Status::Listening),
            InboundEvent::Recognized(recognition) => self.on_recognized(&recognition),
            InboundEvent::ResponseItem { response_item } => {
                self.set_status(Status::Responding);
                let record = ResponseRecord::from_item(&response_item, &self.config.base_url);
                self.queue.push(record);
                self.drain();
            }
            InboundEvent::Response { response } => self.on_response(response),
            InboundEvent::Error { text } => {
                let error = ChannelError::Server(text.unwrap_or_default());
                warn!(%error, "Server reported an error.");
                self.callback.on_error(&error);
                // Fatal only when the server rejected `Init`.
                if !self.session.id_assigned {
                    self.end_session().await;
                }
            }
            InboundEvent::SessionEnded => self.end_session().await,
            InboundEvent::Unknown => debug!("Ignoring unknown event."),
        }
    }

    async fn on_ready(&mut self) {
        let session_id = self.callback.get_uuid();
        info!(%session_id, "Session ready.");
        self.assign_session(Some(session_id));
        self.session.ended = false;
        self.set_status(Status::Listening);

        if self.config.auto_start {
            let start_message = self.options.start_message.clone();
            self.echo_sent(&start_message);
            self.set_status(Status::Processing);
            self.send_text(&start_message).await;
            self.turn_log.restart_clock();
        } else {
            self.play(READY_SOUND);
        }
    }

    fn on_recognized(&mut self, recognition: &Recognition) {
        let Some(item) = recognition.item() else {
            debug!("Recognition event without a result.");
            return;
        };
        let grew = item.text.chars().count() > self.session.last_transcript.chars().count();
        if grew || item.is_final {
            self.echo_sent(&item.text);
            self.session.last_transcript = item.text;
        }
        self.turn_log.restart_clock();
        if item.is_final {
            self.session.last_transcript.clear();
            self.set_status(Status::Processing);
        }
    }

    fn on_response(&mut self, response: ResponsePayload) {
        self.set_status(Status::Responding);
        if let Some(locale) = response.locale.as_deref() {
            self.transport.set_locale(locale);
        }
        if let Some(timeout) = response
            .sleep_timeout
            .filter(|seconds| *seconds > 0.0)
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        {
            self.session.sleep_deadline = Some(Instant::now() + timeout);
            debug!(?timeout, "Sleep deadline set.");
        }

        let base_url = &self.config.base_url;
        self.queue.extend(
            response
                .items
                .iter()
                .map(|item| ResponseRecord::from_item(item, base_url)),
        );
        if let Some(logs) = response.logs.as_ref() {
            self.callback.add_logs(logs);
        }
        self.drain();
    }

    async fn end_session(&mut self) {
        self.flush_turn_log().await;
        self.turn_log.restart_clock();
        self.session.ended = true;
        self.assign_session(None);
        info!("Session ended.");
        self.callback.on_end();
        self.set_status(Status::Sleeping);
    }

    /// Connectivity failure: ship the turn log, report, and force the session down.
    async fn fail(&mut self, error: ChannelError) {
        error!(%error, "Transport failure.");
        self.turn_log.push(LogLevel::Error, error.to_string());
        self.flush_turn_log().await;
        self.callback.on_error(&error);
        self.stop().await;
        self.callback.on_end();
    }

    /// Runs drain steps until one stops, unless a pass is already in progress.
    fn drain(&mut self) {
        if !self.queue.request_drain() {
            debug!("Drain already in progress, restart scheduled.");
            return;
        }
        while let DrainStep::Continue = self.drain_one() {}
    }

    fn drain_one(&mut self) -> DrainStep {
        let Some(head) = self.queue.front().cloned() else {
            self.on_queue_empty();
            return DrainStep::Stop;
        };
        if head.node_id != 0 {
            self.callback.focus_on_node(head.node_id);
        }

        if let Some(video) = head.video.as_deref() {
            let Some(commands) = self.commands.upgrade() else {
                warn!("No caller left to play video, skipping it.");
                self.queue.pop_front();
                return DrainStep::Continue;
            };
            self.queue.suspend();
            let done = VideoDone::new(commands, self.queue.generation());
            self.callback.add_video(video, done);
            return DrainStep::Stop;
        }

        self.queue.pop_front();
        if head.is_signal() {
            debug!(command = %head.text, "Delivering command record.");
            self.callback.handle_command(&head.text, &head.signal_code);
            if head.text == NO_AUTO_CONTINUE_SIGNAL {
                DrainStep::Stop
            } else {
                DrainStep::Continue
            }
        } else {
            self.callback.add_message(
                MessageKind::Received,
                Some(&head.text),
                head.image.as_deref(),
                head.background.as_deref(),
                None,
            );
            DrainStep::Stop
        }
    }

    fn on_queue_empty(&mut self) {
        if self.session.is_active() && self.session.sleep_deadline.is_none() {
            return;
        }
        if self.session.status == Some(Status::Sleeping) {
            return;
        }
        if self.session.ended || self.session.sleep_deadline.is_some() {
            self.callback.on_end();
        }
        self.set_status(Status::Sleeping);
    }

    fn video_done(&mut self, generation: u64) {
        match self.queue.resume(generation) {
            Some(restart) => {
                self.queue.pop_front();
                if restart {
                    debug!("Resuming coalesced drain.");
                }
                self.drain();
            }
            None => debug!(generation, "Ignoring stale video completion."),
        }
    }

    /// Hands every undelivered record to the caller at once.
    fn flush_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        if self.queue.is_draining() {
            debug!("Abandoning suspended drain pass.");
        }
        for record in self.queue.flush() {
            if record.is_signal() {
                self.callback.handle_command(&record.text, &record.signal_code);
            } else {
                self.callback.add_message(
                    MessageKind::Received,
                    Some(&record.text),
                    record.image.as_deref(),
                    record.background.as_deref(),
                    None,
                );
            }
        }
    }

    async fn send_text(&mut self, text: &str) {
        if let Err(e) = self.send_turn(text).await {
            warn!(error = %e, "Failed to send input.");
            self.callback.add_debug_logs("error", &e.to_string());
        }
    }

    /// Ships the log of the turn that just finished, then sends `text` as the next one.
    async fn send_turn(&mut self, text: &str) -> Result<(), ChannelError> {
        self.flush_turn_log().await;
        let attributes = self.callback.get_attributes();
        self.transport.send_input(text, attributes).await
    }

    async fn flush_turn_log(&mut self) {
        if self.turn_log.is_empty() {
            return;
        }
        let entries = self.turn_log.take();
        self.transport.send_logs(entries).await;
    }

    fn echo_sent(&mut self, text: &str) {
        let visible = if is_signal(text) && self.options.mask_signals {
            None
        } else {
            Some(text)
        };
        self.callback
            .add_message(MessageKind::Sent, visible, None, None, Some(text));
    }

    fn set_status(&mut self, status: Status) {
        self.turn_log
            .push(LogLevel::Info, format!("Client status changed to {status}"));
        debug!(%status, "Status changed.");
        self.session.status = Some(status);
        self.callback.set_status(status);
    }

    fn play(&mut self, sound: &str) {
        if self.options.allows_sound(sound) {
            self.callback.play(sound);
        } else {
            debug!(sound, "Sound not allowed, skipping.");
        }
    }

    fn assign_session(&mut self, session_id: Option<String>) {
        self.session.id_assigned |= session_id.is_some();
        self.session.id = session_id.clone();
        self.transport.set_session_id(session_id);
    }
}
