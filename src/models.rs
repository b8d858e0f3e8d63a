use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// Fixed set of slide layouts understood by the viewer and the exporter
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SlideLayout {
    Title,
    TwoColumn,
    ImageText,
    // Unknown layout names fall back to plain content
    #[default]
    #[serde(other)]
    Content,
}

impl SlideLayout {
    /// Parses a model-supplied layout name; anything unknown is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "title" => Some(Self::Title),
            "content" => Some(Self::Content),
            "two-column" => Some(Self::TwoColumn),
            "image-text" => Some(Self::ImageText),
            _ => None,
        }
    }
}

// A single slide of a deck
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Slide {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_id: Option<String>,
    pub title: String,
    pub content: Vec<String>,
    #[serde(default)]
    pub layout: SlideLayout,
    #[serde(default)]
    pub order: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// The full ordered deck plus metadata
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Presentation {
    #[serde(default = "new_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub slides: Vec<Slide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningKind {
    Thinking,
    Searching,
    Reading,
    Analyzing,
    Generating,
}

// Narrated progress shown while a deck is being generated. Display only.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReasoningStep {
    #[serde(rename = "type")]
    pub kind: ReasoningKind,
    #[serde(default)]
    pub title: String,
    pub content: String,
}

impl ReasoningStep {
    pub fn new(kind: ReasoningKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            title: String::new(),
            content: content.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

// Represents a single turn in a conversation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    #[serde(default = "new_id")]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Vec<ReasoningStep>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<Presentation>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

// A titled thread of chat turns
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Conversation {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}
