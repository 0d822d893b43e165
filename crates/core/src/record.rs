//! Deliverable bot output with media references resolved against the service URL.

use crate::protocol::ResponseItem;
use serde_json::Value;

/// Prefix marking a text as a control signal rather than a displayable message.
pub const SIGNAL_MARKER: char = '#';
/// Payload reported for signals that carry no code.
pub const EMPTY_SIGNAL_CODE: &str = "{}";

/// One unit of bot output to be delivered to the presentation layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseRecord {
    pub text: String,
    pub image: Option<String>,
    pub audio: Option<String>,
    pub video: Option<String>,
    pub background: Option<String>,
    /// Structured payload of a signal record. Empty for regular messages.
    pub signal_code: String,
    /// Position in the dialogue graph, `0` when unset.
    pub node_id: i64,
}

impl ResponseRecord {
    /// Builds a record from a server item, resolving relative references
    /// against `base_url`.
    pub fn from_item(item: &ResponseItem, base_url: &str) -> Self {
        let text = item.text.clone().unwrap_or_default();
        let audio = resolve(item.audio.as_deref(), base_url)
            .or_else(|| item.ssml.as_deref().and_then(ssml_audio));
        let signal_code = if is_signal(&text) {
            match item.code.as_ref() {
                Some(Value::String(code)) if !code.is_empty() => code.clone(),
                Some(Value::Null) | None => EMPTY_SIGNAL_CODE.to_string(),
                Some(Value::String(_)) => EMPTY_SIGNAL_CODE.to_string(),
                Some(other) => other.to_string(),
            }
        } else {
            String::new()
        };

        Self {
            text,
            image: resolve(item.image.as_deref(), base_url),
            audio,
            video: resolve(item.video.as_deref(), base_url),
            background: resolve(item.background.as_deref(), base_url),
            signal_code,
            node_id: item.node_id.unwrap_or(0),
        }
    }

    pub fn is_signal(&self) -> bool {
        is_signal(&self.text)
    }
}

pub fn is_signal(text: &str) -> bool {
    text.starts_with(SIGNAL_MARKER)
}

/// Prefixes root-relative paths with the service base URL. Empty values are absent.
fn resolve(reference: Option<&str>, base_url: &str) -> Option<String> {
    match reference {
        None | Some("") => None,
        Some(path) if path.starts_with('/') => {
            Some(format!("{}{}", base_url.trim_end_matches('/'), path))
        }
        Some(other) => Some(other.to_string()),
    }
}

/// Extracts the source of the first `<audio src="...">` tag in an SSML document.
fn ssml_audio(ssml: &str) -> Option<String> {
    if !ssml.contains("<audio") {
        return None;
    }
    ssml.split('"')
        .nth(1)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}
