//! User-adjustable records: system prompt and API key.

use anyhow::Result;

use crate::storage::{API_KEY_KEY, RecordStore, SYSTEM_PROMPT_KEY};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. \
Provide clear, accurate, and helpful responses. When providing code \
examples, use proper syntax highlighting and explain the code clearly.";

/// The stored system prompt, or the default when none is saved.
pub fn system_prompt(storage: &impl RecordStore) -> String {
    match storage.read(SYSTEM_PROMPT_KEY) {
        Ok(Some(prompt)) if !prompt.trim().is_empty() => prompt,
        Ok(_) => DEFAULT_SYSTEM_PROMPT.to_string(),
        Err(e) => {
            tracing::warn!("failed to read system prompt: {e}");
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

pub fn set_system_prompt(storage: &impl RecordStore, prompt: &str) -> Result<()> {
    storage.write(SYSTEM_PROMPT_KEY, prompt)
}

/// The stored API key, if one has been saved.
pub fn api_key(storage: &impl RecordStore) -> Option<String> {
    match storage.read(API_KEY_KEY) {
        Ok(Some(key)) if !key.trim().is_empty() => Some(key),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("failed to read API key: {e}");
            None
        }
    }
}

pub fn set_api_key(storage: &impl RecordStore, key: &str) -> Result<()> {
    storage.write(API_KEY_KEY, key)
}
