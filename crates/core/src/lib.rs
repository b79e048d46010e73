pub mod client;
pub mod decode;
pub mod error;
pub mod settings;
pub mod storage;
pub mod store;
pub mod stream;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use client::{ClientConfig, GeminiClient};
pub use error::QuillError;
pub use storage::{MemoryStore, RecordStore, SqliteStore};
pub use store::ConversationStore;
pub use stream::CancelToken;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// The Gemini API has no "assistant" role; generated turns are "model".
    pub fn wire_name(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// One chat thread. Messages are append-only; their order is the order
/// they were exchanged in.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub last_activity: DateTime<Utc>,
}
