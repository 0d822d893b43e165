//! Defines the JSON frame protocol spoken with the conversation server.
//!
//! Every text frame carries a `type` discriminator. Binary frames are reserved
//! for audio and are only used by this crate as zero-length keepalive pings.

use crate::{error::ChannelError, turn_log::LogEntry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Speech synthesis mode requested from the server: links instead of inline audio.
pub const TTS_MODE: &str = "RequiredLinks";
/// Sample rate announced for speech recognition input.
pub const STT_SAMPLE_RATE: u32 = 44100;

/// Frames sent from the client to the server.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Opens a session. Must be the first frame on a fresh socket.
    Init(InitFrame),
    /// A user turn.
    Input { input: InputPayload },
    /// Diagnostic log entries collected during a turn.
    Log { entries: Vec<LogEntry> },
}

impl ClientFrame {
    /// Serializes the frame into the text payload written to the socket.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitFrame {
    pub key: String,
    pub app_key: String,
    pub device_id: String,
    pub sender: String,
    /// JWT identifying the user. Anonymous sessions omit it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub config: InitConfig,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitConfig {
    pub tts: String,
    pub stt_sample_rate: u32,
    pub tts_file_type: String,
    pub locale: String,
    pub zone_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    pub send_response_items: bool,
    pub stt_interim_results: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputPayload {
    pub zone_id: String,
    pub locale: String,
    pub attributes: Map<String, Value>,
    pub transcript: Transcript,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
}

/// Events received from the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum InboundEvent {
    /// The server accepted `Init` and is ready for input.
    Ready,
    SessionStarted {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    InputAudioStreamOpen,
    /// A partial or final speech recognition result.
    Recognized(Recognition),
    /// A single streamed response fragment.
    ResponseItem {
        #[serde(rename = "responseItem")]
        response_item: ResponseItem,
    },
    /// A complete bot turn.
    Response { response: ResponsePayload },
    Error {
        #[serde(default)]
        text: Option<String>,
    },
    SessionEnded,
    #[serde(other)]
    Unknown,
}

impl InboundEvent {
    /// Decodes a text frame.
    pub fn decode(text: &str) -> Result<Self, ChannelError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The wire name of the event, used in turn logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Ready => "Ready",
            InboundEvent::SessionStarted { .. } => "SessionStarted",
            InboundEvent::InputAudioStreamOpen => "InputAudioStreamOpen",
            InboundEvent::Recognized(_) => "Recognized",
            InboundEvent::ResponseItem { .. } => "ResponseItem",
            InboundEvent::Response { .. } => "Response",
            InboundEvent::Error { .. } => "Error",
            InboundEvent::SessionEnded => "SessionEnded",
            InboundEvent::Unknown => "Unknown",
        }
    }
}

/// Recognition payload. Some servers send `{text, isFinal}` directly, others
/// nest the result under `message.items`.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub message: Option<RecognizedMessage>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RecognizedMessage {
    #[serde(default)]
    pub items: Vec<RecognizedItem>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedItem {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_final: bool,
}

impl Recognition {
    /// The effective recognition result, whichever shape it arrived in.
    pub fn item(&self) -> Option<RecognizedItem> {
        match &self.message {
            Some(message) => message.items.first().cloned(),
            None => self.text.as_ref().map(|text| RecognizedItem {
                text: text.clone(),
                is_final: self.is_final,
            }),
        }
    }
}

/// One unit of bot output as sent by the server, before URL resolution.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseItem {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ssml: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    /// Structured payload of a signal item. Usually a JSON string.
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub node_id: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    #[serde(default)]
    pub items: Vec<ResponseItem>,
    #[serde(default)]
    pub locale: Option<String>,
    /// Seconds the session may sleep before it must be restarted.
    #[serde(default)]
    pub sleep_timeout: Option<f64>,
    #[serde(default)]
    pub logs: Option<Value>,
}
