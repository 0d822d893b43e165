//! Per-conversation state owned by the orchestrator.

use serde::Serialize;
use std::fmt;
use tokio::time::Instant;

/// Client-visible status of the conversation.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Listening,
    Processing,
    Responding,
    Sleeping,
    Paused,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Listening => "LISTENING",
            Status::Processing => "PROCESSING",
            Status::Responding => "RESPONDING",
            Status::Sleeping => "SLEEPING",
            Status::Paused => "PAUSED",
        };
        f.write_str(name)
    }
}

/// One logical conversation.
#[derive(Debug, Default)]
pub struct Session {
    /// Assigned on `Ready`/`SessionStarted`, cleared when the session ends.
    pub id: Option<String>,
    /// Whether an id was assigned since the transport session was opened.
    pub id_assigned: bool,
    pub status: Option<Status>,
    /// After this instant the session must be restarted instead of resumed.
    pub sleep_deadline: Option<Instant>,
    pub language: String,
    pub device_id: String,
    pub auth_token: Option<String>,
    /// Set once the server or the caller ended the session.
    pub ended: bool,
    /// Longest partial transcript echoed so far in the current utterance.
    pub last_transcript: String,
}

impl Session {
    /// Records the settings a new transport session is opened with and
    /// forgets everything tied to the previous one.
    pub fn begin(&mut self, language: &str, device_id: &str, auth_token: Option<String>) {
        self.id = None;
        self.id_assigned = false;
        self.ended = false;
        self.sleep_deadline = None;
        self.last_transcript.clear();
        self.language = language.to_string();
        self.device_id = device_id.to_string();
        self.auth_token = auth_token;
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    /// A session put to sleep by the server may be resumed until its deadline.
    pub fn can_resume(&self, now: Instant) -> bool {
        self.sleep_deadline.is_some_and(|deadline| now <= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&Status::Listening).unwrap(),
            "\"LISTENING\""
        );
        assert_eq!(Status::Sleeping.to_string(), "SLEEPING");
    }

    #[test]
    fn test_begin_forgets_previous_session() {
        let mut session = Session {
            id: Some("old".to_string()),
            id_assigned: true,
            ended: true,
            last_transcript: "hel".to_string(),
            ..Default::default()
        };
        session.begin("cs", "kiosk", None);

        assert!(session.id.is_none());
        assert!(!session.id_assigned);
        assert!(!session.ended);
        assert!(session.last_transcript.is_empty());
        assert_eq!(session.language, "cs");
        assert_eq!(session.device_id, "kiosk");
    }

    #[tokio::test(start_paused = true)]
    async fn test_can_resume_until_deadline() {
        let mut session = Session::default();
        assert!(!session.can_resume(Instant::now()));

        session.sleep_deadline = Some(Instant::now() + Duration::from_secs(5));
        assert!(session.can_resume(Instant::now()));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!session.can_resume(Instant::now()));
    }
}
