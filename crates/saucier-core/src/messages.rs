use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coerce;
use crate::ids::MessageId;
use crate::recipes::RecipeRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Reader reaction to an assistant message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    ThumbsUp,
    ThumbsDown,
}

/// One turn in a session. Assistant turns start as empty placeholders and are
/// rewritten in place (whole-value, not appended) while a response streams.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: MessageId,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(deserialize_with = "coerce::de_timestamp", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackKind>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, metadata: Option<MessageMetadata>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
            feedback: None,
        }
    }
}

/// Fields a caller supplies when appending a message; id and timestamp are
/// allocated by the store.
#[derive(Clone, Debug)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub metadata: Option<MessageMetadata>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            metadata: None,
        }
    }

    /// Empty assistant message to stream a response into.
    pub fn assistant_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            metadata: None,
        }
    }
}

/// Structured extras attached to a message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, deserialize_with = "coerce::de_seq", skip_serializing_if = "Vec::is_empty")]
    pub related_recipes: Vec<RecipeRef>,
    #[serde(default, deserialize_with = "coerce::de_seq", skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MessageContext>,
}

impl MessageMetadata {
    pub fn is_empty(&self) -> bool {
        self.related_recipes.is_empty() && self.suggestions.is_empty() && self.context.is_none()
    }
}

/// Context payload carried with a message. Known shapes deserialize into
/// typed variants; anything else survives as an opaque value so a newer
/// writer never breaks an older reader.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContext {
    Known(KnownContext),
    Opaque(serde_json::Value),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownContext {
    Recipe { recipe: RecipeRef },
    Search { query: String },
}
