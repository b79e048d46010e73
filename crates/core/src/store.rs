//! Ordered, persisted conversation history.

use chrono::Utc;
use uuid::Uuid;

use crate::storage::{self, RecordStore};
use crate::{Conversation, Message, Role};

const DEFAULT_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 50;

/// The set of saved conversations, most recent first, plus the id of the
/// one currently open (if any).
///
/// Mutations are synchronous; the full collection is re-serialized and
/// written through the injected [`RecordStore`] after each one. Writes are
/// best-effort: a failed write is logged and never propagated.
pub struct ConversationStore<S: RecordStore> {
    conversations: Vec<Conversation>,
    current: Option<String>,
    storage: S,
}

impl<S: RecordStore> ConversationStore<S> {
    /// Load persisted history. Corrupt or unreadable state degrades to an
    /// empty store rather than failing.
    pub fn load(storage: S) -> Self {
        let conversations = match storage.read(storage::HISTORY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!("failed to parse stored chat history: {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("failed to read stored chat history: {e}");
                Vec::new()
            }
        };

        Self {
            conversations,
            current: None,
            storage,
        }
    }

    /// Start an empty conversation at the front of the list and make it
    /// current. Returns its id.
    pub fn create_conversation(&mut self) -> String {
        let id = Uuid::new_v4().to_string();
        self.conversations.insert(
            0,
            Conversation {
                id: id.clone(),
                title: DEFAULT_TITLE.to_string(),
                messages: Vec::new(),
                last_activity: Utc::now(),
            },
        );
        self.current = Some(id.clone());
        self.persist();
        id
    }

    /// Append a message and bump the conversation's activity time.
    ///
    /// The first message ever appended, if it is a user message, also
    /// derives the title from its content. Titles are never auto-derived
    /// again after that.
    pub fn append_message(&mut self, id: &str, message: Message) {
        let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) else {
            tracing::warn!(%id, "append to unknown conversation ignored");
            return;
        };

        if conversation.messages.is_empty() && message.role == Role::User {
            conversation.title = derive_title(&message.content);
        }

        conversation.messages.push(message);
        conversation.last_activity = Utc::now();
        self.persist();
    }

    /// Manually retitle a conversation. Same length cap as derived titles.
    pub fn rename(&mut self, id: &str, title: &str) {
        let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) else {
            tracing::warn!(%id, "rename of unknown conversation ignored");
            return;
        };
        conversation.title = truncate_title(title);
        self.persist();
    }

    /// Remove a conversation. If it was current, no selection remains.
    pub fn delete_conversation(&mut self, id: &str) {
        self.conversations.retain(|c| c.id != id);
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        self.persist();
    }

    pub fn set_current(&mut self, id: &str) {
        self.current = Some(id.to_string());
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The currently open conversation, or `None` when nothing is selected
    /// (or the selected id no longer exists).
    pub fn current(&self) -> Option<&Conversation> {
        let id = self.current.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Drop everything and delete the persisted record itself, so storage
    /// holds no key at all afterwards.
    pub fn clear_all(&mut self) {
        self.conversations.clear();
        self.current = None;
        if let Err(e) = self.storage.remove(storage::HISTORY_KEY) {
            tracing::warn!("failed to remove stored chat history: {e}");
        }
    }

    fn persist(&self) {
        match serde_json::to_string(&self.conversations) {
            Ok(raw) => {
                if let Err(e) = self.storage.write(storage::HISTORY_KEY, &raw) {
                    tracing::warn!("failed to persist chat history: {e}");
                }
            }
            Err(e) => tracing::warn!("failed to serialize chat history: {e}"),
        }
    }
}

fn truncate_title(title: &str) -> String {
    title.chars().take(TITLE_MAX_CHARS).collect()
}

fn derive_title(content: &str) -> String {
    truncate_title(content).trim().to_string()
}
