use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coerce;
use crate::ids::{MessageId, SessionId};
use crate::messages::Message;

/// Titles derived from a first message are cut to this many characters.
pub const TITLE_MAX_CHARS: usize = 30;

pub const DEFAULT_TITLE: &str = "New chat";

/// An ordered conversation thread. Sessions are held newest-created-first by
/// the store; messages are append-only within a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub id: SessionId,
    #[serde(default, deserialize_with = "coerce::de_or_default")]
    pub title: String,
    #[serde(default, deserialize_with = "coerce::de_seq")]
    pub messages: Vec<Message>,
    #[serde(deserialize_with = "coerce::de_timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "coerce::de_timestamp", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }
}

/// Derive a session title from its first message: at most
/// [`TITLE_MAX_CHARS`] characters, with an ellipsis when cut.
pub fn derive_title(content: &str) -> String {
    let trimmed = content.trim();
    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Role;
    use serde_json::json;

    #[test]
    fn new_session_is_empty() {
        let session = Session::new("Dinner ideas");
        assert_eq!(session.title, "Dinner ideas");
        assert!(session.messages.is_empty());
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn long_first_message_is_cut_with_ellipsis() {
        let content = "a".repeat(35);
        let title = derive_title(&content);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
        assert!(title.starts_with(&"a".repeat(30)));
    }

    #[test]
    fn short_first_message_is_kept_verbatim() {
        let content = "a".repeat(20);
        assert_eq!(derive_title(&content), content);
    }

    #[test]
    fn exactly_thirty_chars_is_not_cut() {
        let content = "b".repeat(30);
        assert_eq!(derive_title(&content), content);
    }

    #[test]
    fn title_cut_counts_chars_not_bytes() {
        let content = "é".repeat(35);
        let title = derive_title(&content);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 1);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(derive_title("  what is mirepoix?  "), "what is mirepoix?");
    }

    #[test]
    fn session_with_bad_timestamps_rehydrates() {
        let raw = json!({
            "id": "sess_x",
            "title": "Braising",
            "messages": [
                {"id": "msg_1", "role": "user", "content": "hi", "timestamp": "not-a-date"}
            ],
            "created_at": 1_700_000_000,
            "updated_at": null
        });
        let session: Session = serde_json::from_value(raw).unwrap();
        assert_eq!(session.title, "Braising");
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.created_at.timestamp(), 1_700_000_000);
        assert!(session.updated_at <= Utc::now());
    }

    #[test]
    fn session_with_non_array_messages_rehydrates_empty() {
        let raw = json!({
            "id": "sess_x",
            "title": "Broken",
            "messages": "oops",
            "created_at": "2026-03-01T08:30:00Z",
            "updated_at": "2026-03-01T08:30:00Z"
        });
        let session: Session = serde_json::from_value(raw).unwrap();
        assert!(session.messages.is_empty());
    }
}
