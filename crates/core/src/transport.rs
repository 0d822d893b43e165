//! Owns the conversation socket: framing, decoding and keepalive.

use crate::{
    config::{BotConfig, InitOptions},
    error::ChannelError,
    protocol::{
        ClientFrame, InboundEvent, InitConfig, InitFrame, InputPayload, STT_SAMPLE_RATE,
        TTS_MODE, Transcript,
    },
    turn_log::LogEntry,
};
use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde_json::{Map, Value};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tracing::{debug, info, warn};

/// Interval between keepalive pings while a session is active.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// What the transport reports upward to the orchestrator.
#[derive(Debug)]
pub enum TransportEvent {
    /// A decoded text frame.
    Event(InboundEvent),
    /// A socket error or an unexpected close.
    Error(ChannelError),
}

/// The socket operations the orchestrator depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send {
    /// Connects and sends `init`. Resolves once the frame is written.
    async fn open(&mut self, init: &InitFrame) -> Result<(), ChannelError>;

    /// Sends a user turn.
    async fn send_input(
        &mut self,
        text: &str,
        attributes: Map<String, Value>,
    ) -> Result<(), ChannelError>;

    /// Ships diagnostic logs. Silently does nothing when not connected.
    async fn send_logs(&mut self, entries: Vec<LogEntry>);

    async fn close(&mut self);

    /// Keepalive pings only run while a session id is assigned.
    fn set_session_id(&mut self, session_id: Option<String>);

    /// Locale reported with subsequent `Input` frames.
    fn set_locale(&mut self, locale: &str);
}

/// Maps a synthesis voice to the locale it speaks.
pub fn voice_locale(voice: &str) -> Option<&'static str> {
    match voice {
        "George" | "Grace" | "Gordon" | "Gwyneth" | "Anthony" | "Audrey" | "Arthur" | "Amy"
        | "Michael" | "Mary" | "Victor" | "Victoria" => Some("en"),
        "Gabriela" | "Milan" => Some("cs"),
        _ => None,
    }
}

/// Builds the `Init` frame for a new session.
pub fn init_frame(config: &BotConfig, options: &InitOptions, voice: Option<String>) -> InitFrame {
    let locale = voice
        .as_deref()
        .and_then(voice_locale)
        .map(str::to_string)
        .unwrap_or_else(|| options.language.clone());

    InitFrame {
        key: options.app_key.clone(),
        app_key: options.app_key.clone(),
        device_id: config.device_id.clone(),
        sender: config.device_id.clone(),
        token: options.auth_token.clone(),
        config: InitConfig {
            tts: TTS_MODE.to_string(),
            stt_sample_rate: STT_SAMPLE_RATE,
            tts_file_type: config.tts_file_type.clone(),
            locale,
            zone_id: config.zone_id.clone(),
            voice,
            send_response_items: true,
            stt_interim_results: true,
        },
    }
}

/// Flags shared between a connection and its background tasks.
#[derive(Debug, Default)]
struct LinkState {
    open: AtomicBool,
    /// Set when the client itself closed the socket.
    closing: AtomicBool,
}

impl LinkState {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// One live socket and the tasks serving it.
struct Link {
    sink: Arc<Mutex<WsSink>>,
    state: Arc<LinkState>,
    reader: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
        self.keepalive.abort();
    }
}

/// [`Transport`] over a tokio-tungstenite WebSocket.
pub struct WsTransport {
    url: String,
    zone_id: String,
    locale: String,
    events: mpsc::Sender<TransportEvent>,
    session_id: watch::Sender<Option<String>>,
    link: Option<Link>,
}

impl WsTransport {
    /// Creates a disconnected transport that will report to `events`.
    pub fn new(config: &BotConfig, events: mpsc::Sender<TransportEvent>) -> Self {
        let (session_id, _) = watch::channel(None);
        Self {
            url: config.socket_url(),
            zone_id: config.zone_id.clone(),
            locale: String::new(),
            events,
            session_id,
            link: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.state.is_open())
    }

    async fn shutdown(&mut self) {
        if let Some(link) = self.link.take() {
            link.state.closing.store(true, Ordering::Release);
            link.state.open.store(false, Ordering::Release);
            if let Err(e) = link.sink.lock().await.close().await {
                debug!(error = %e, "Socket close handshake failed");
            }
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&mut self, init: &InitFrame) -> Result<(), ChannelError> {
        self.shutdown().await;
        self.locale = init.config.locale.clone();

        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        info!(url = %self.url, "Connected to conversation socket.");
        let (sink, stream) = ws_stream.split();

        let sink = Arc::new(Mutex::new(sink));
        let state = Arc::new(LinkState::default());
        state.open.store(true, Ordering::Release);

        let reader = tokio::spawn(read_frames(
            stream,
            self.events.clone(),
            state.clone(),
            self.session_id.subscribe(),
        ));
        let keepalive = tokio::spawn(keep_alive(
            sink.clone(),
            state.clone(),
            self.session_id.subscribe(),
        ));
        self.link = Some(Link {
            sink: sink.clone(),
            state,
            reader,
            keepalive,
        });

        send_frame(&sink, &ClientFrame::Init(init.clone()))
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))
    }

    async fn send_input(
        &mut self,
        text: &str,
        attributes: Map<String, Value>,
    ) -> Result<(), ChannelError> {
        let link = self.link.as_ref().ok_or(ChannelError::NotConnected)?;
        if !link.state.is_open() {
            return Err(ChannelError::InvalidState);
        }
        let frame = ClientFrame::Input {
            input: InputPayload {
                zone_id: self.zone_id.clone(),
                locale: self.locale.clone(),
                attributes,
                transcript: Transcript {
                    text: text.to_string(),
                },
            },
        };
        send_frame(&link.sink, &frame).await
    }

    async fn send_logs(&mut self, entries: Vec<LogEntry>) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        if let Err(e) = send_frame(&link.sink, &ClientFrame::Log { entries }).await {
            debug!(error = %e, "Dropped diagnostic logs");
        }
    }

    async fn close(&mut self) {
        self.shutdown().await;
    }

    fn set_session_id(&mut self, session_id: Option<String>) {
        self.session_id.send_replace(session_id);
    }

    fn set_locale(&mut self, locale: &str) {
        self.locale = locale.to_string();
    }
}

async fn send_frame(sink: &Mutex<WsSink>, frame: &ClientFrame) -> Result<(), ChannelError> {
    let payload = frame
        .encode()
        .map_err(|e| ChannelError::Send(e.to_string()))?;
    sink.lock()
        .await
        .send(Message::Text(payload.into()))
        .await
        .map_err(|e| ChannelError::Send(e.to_string()))
}

/// Decodes inbound frames until the socket ends.
async fn read_frames(
    mut stream: SplitStream<WsStream>,
    events: mpsc::Sender<TransportEvent>,
    state: Arc<LinkState>,
    session_id: watch::Receiver<Option<String>>,
) {
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match InboundEvent::decode(&text) {
                Ok(event) => {
                    debug!(kind = event.kind(), "Received frame");
                    if events.send(TransportEvent::Event(event)).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "Dropping undecodable frame"),
            },
            Ok(Message::Binary(data)) => {
                debug!(len = data.len(), "Ignoring binary frame");
            }
            Ok(Message::Close(close_frame)) => {
                debug!(?close_frame, "Socket closed by server.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                state.open.store(false, Ordering::Release);
                if !state.closing.load(Ordering::Acquire) {
                    warn!(error = %e, "Socket error");
                    let _ = events
                        .send(TransportEvent::Error(ChannelError::Socket(e.to_string())))
                        .await;
                }
                return;
            }
        }
    }

    state.open.store(false, Ordering::Release);
    let in_session = session_id.borrow().is_some();
    if !state.closing.load(Ordering::Acquire) && in_session {
        warn!("Socket closed while a session was active");
        let _ = events.send(TransportEvent::Error(ChannelError::Closed)).await;
    }
}

/// Sends a zero-length binary ping every [`KEEPALIVE_INTERVAL`] while the
/// socket is open and a session id is assigned. Ends for good once an
/// assigned id is cleared.
async fn keep_alive(
    sink: Arc<Mutex<WsSink>>,
    state: Arc<LinkState>,
    mut session_id: watch::Receiver<Option<String>>,
) {
    let start = tokio::time::Instant::now() + KEEPALIVE_INTERVAL;
    let mut ticks = tokio::time::interval_at(start, KEEPALIVE_INTERVAL);
    let mut seen_session = session_id.borrow_and_update().is_some();
    loop {
        tokio::select! {
            _ = ticks.tick() => {}
            changed = session_id.changed() => {
                if changed.is_err() {
                    return;
                }
                let assigned = session_id.borrow_and_update().is_some();
                if !assigned && seen_session {
                    debug!("Keepalive stopped, session id cleared");
                    return;
                }
                seen_session |= assigned;
                continue;
            }
        }

        if !state.is_open() {
            debug!("Keepalive stopped, socket closed");
            return;
        }
        let in_session = session_id.borrow().is_some();
        if !in_session {
            continue;
        }
        if let Err(e) = sink.lock().await.send(Message::Binary(Default::default())).await {
            warn!(error = %e, "Keepalive ping failed");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_locale() {
        assert_eq!(voice_locale("Grace"), Some("en"));
        assert_eq!(voice_locale("Milan"), Some("cs"));
        assert_eq!(voice_locale("Nobody"), None);
    }

    #[test]
    fn test_init_frame_uses_voice_locale() {
        let config = BotConfig::new("https://core.example.ai");
        let mut options = InitOptions::new("bot-1");
        options.language = "de".to_string();
        options.auth_token = Some("jwt".to_string());

        let frame = init_frame(&config, &options, Some("Gabriela".to_string()));
        assert_eq!(frame.key, "bot-1");
        assert_eq!(frame.app_key, "bot-1");
        assert_eq!(frame.sender, "sender");
        assert_eq!(frame.token.as_deref(), Some("jwt"));
        assert_eq!(frame.config.locale, "cs");
        assert_eq!(frame.config.voice.as_deref(), Some("Gabriela"));
        assert_eq!(frame.config.stt_sample_rate, 44100);
    }

    #[test]
    fn test_init_frame_falls_back_to_language() {
        let config = BotConfig::new("https://core.example.ai");
        let mut options = InitOptions::new("bot-1");
        options.language = "de".to_string();

        assert_eq!(init_frame(&config, &options, None).config.locale, "de");
        assert_eq!(
            init_frame(&config, &options, Some("Unknown".to_string()))
                .config
                .locale,
            "de"
        );
    }

    #[tokio::test]
    async fn test_send_input_without_socket() {
        let (tx, _rx) = mpsc::channel(8);
        let mut transport = WsTransport::new(&BotConfig::new("http://127.0.0.1:1"), tx);
        assert!(!transport.is_connected());
        let err = transport.send_input("hi", Map::new()).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotConnected));

        // Logs are best-effort and closing twice is harmless.
        transport.send_logs(Vec::new()).await;
        transport.close().await;
        transport.close().await;
    }
}
