//! Client and session configuration.

/// Path of the conversation socket relative to the service base URL.
pub const SOCKET_PATH: &str = "/socket/";

/// Connection-level settings fixed for the lifetime of a [`crate::bot::Bot`].
#[derive(Clone, Debug, PartialEq)]
pub struct BotConfig {
    /// Service base URL (`http`/`https`), also used to resolve relative media paths.
    pub base_url: String,
    /// Identifier of this device, sent as both `deviceId` and `sender`.
    pub device_id: String,
    /// Send the start message as soon as the server reports `Ready`.
    pub auto_start: bool,
    /// Audio container requested for synthesized speech.
    pub tts_file_type: String,
    /// IANA timezone reported with every `Init` and `Input` frame.
    pub zone_id: String,
}

impl BotConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            device_id: "sender".to_string(),
            auto_start: true,
            tts_file_type: "mp3".to_string(),
            zone_id: "UTC".to_string(),
        }
    }

    /// WebSocket endpoint derived from the base URL (`http` → `ws`, `https` → `wss`).
    pub fn socket_url(&self) -> String {
        format!("{}{}", self.base_url.replacen("http", "ws", 1), SOCKET_PATH)
    }
}

/// Per-session settings supplied by the caller on every `init`.
#[derive(Clone, Debug, PartialEq)]
pub struct InitOptions {
    /// Key of the bot application to converse with.
    pub app_key: String,
    pub language: String,
    /// Text sent to open the conversation, typically a signal such as `#intro`.
    pub start_message: String,
    /// Hide the visible text of sent signals in the transcript.
    pub mask_signals: bool,
    /// Sounds the host is allowed to play.
    pub allowed_sounds: Vec<String>,
    /// Whether the host wants the session kept across restarts.
    pub save_session: bool,
    /// JWT identifying the user. `None` starts an anonymous conversation.
    pub auth_token: Option<String>,
}

impl InitOptions {
    pub fn new(app_key: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            language: "en".to_string(),
            start_message: "#intro".to_string(),
            mask_signals: true,
            allowed_sounds: vec!["error".to_string()],
            save_session: false,
            auth_token: None,
        }
    }

    pub fn allows_sound(&self, sound: &str) -> bool {
        self.allowed_sounds.iter().any(|allowed| allowed == sound)
    }
}
