//! Botline Core
//!
//! Client-side session manager for a turn-based conversation server reached
//! over a WebSocket. The crate is layered in two parts:
//!
//! - `transport`: the socket, frame encoding/decoding and keepalive.
//! - `bot`: the orchestrator that turns server events into status changes,
//!   ordered message delivery and notifications on a [`ClientCallback`].
//!
//! Hosts usually call [`spawn`] and drive the session through the returned
//! [`BotHandle`].

pub mod bot;
pub mod callback;
pub mod config;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod record;
pub mod transport;
pub mod turn_log;

pub use bot::{Bot, BotCommand, BotHandle, SessionClosed, Status};
pub use callback::{ClientCallback, MessageKind, VideoDone};
pub use config::{BotConfig, InitOptions};
pub use error::ChannelError;

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::Instrument;
use transport::WsTransport;

/// Capacity of the channel carrying decoded server events.
const EVENT_BUFFER: usize = 64;

/// Starts an orchestrator over a [`WsTransport`] on the current tokio runtime.
///
/// The task runs until every clone of the returned handle is dropped.
pub fn spawn<C: ClientCallback>(config: BotConfig, callback: C) -> (BotHandle, JoinHandle<()>) {
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let transport = WsTransport::new(&config, events_tx);
    let span = tracing::info_span!("bot_session", device_id = %config.device_id);
    let bot = Bot::new(config, transport, callback, commands_tx.downgrade());
    let task = tokio::spawn(bot.run(commands_rx, events_rx).instrument(span));

    (BotHandle::new(commands_tx), task)
}
