use serde::{Deserialize, Serialize};

use crate::ids::NoticeId;

/// Severity of a user-visible notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
    Warning,
}

/// A structured event handed to the presentation layer. The engine never
/// renders anything itself; it only emits these.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notice {
    #[serde(default)]
    pub id: NoticeId,
    pub kind: NoticeKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Notice {
    pub fn new(kind: NoticeKind, title: impl Into<String>) -> Self {
        Self {
            id: NoticeId::new(),
            kind,
            title: title.into(),
            message: None,
            duration_ms: None,
        }
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, title)
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, title)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_fields() {
        let notice = Notice::error("Message failed")
            .with_message("Could not reach the assistant")
            .with_duration_ms(5000);
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.title, "Message failed");
        assert_eq!(notice.message.as_deref(), Some("Could not reach the assistant"));
        assert_eq!(notice.duration_ms, Some(5000));
    }

    #[test]
    fn serde_roundtrip() {
        let notice = Notice::success("Copied");
        let json = serde_json::to_string(&notice).unwrap();
        let parsed: Notice = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, notice.id);
        assert_eq!(parsed.kind, NoticeKind::Success);
        assert!(parsed.message.is_none());
    }
}
