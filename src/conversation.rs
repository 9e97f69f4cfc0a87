//! Caller-supplied conversation history and its bounding policy.
//!
//! History is owned by the caller and passed in full on every turn; the
//! service holds no per-client state. Before prompt assembly the history is
//! capped to the most recent [`MAX_HISTORY`] entries, oldest dropped first.
//! Truncation is unaware of tool-call pairing — a bounded history may begin
//! mid tool-exchange. That is accepted policy, not an error.

use serde::{Deserialize, Serialize};

use crate::traits::ChatMessage;

/// Maximum number of history entries kept per turn.
pub const MAX_HISTORY: usize = 20;

/// A prior conversation turn as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_call_id: None,
        }
    }

    /// Convert into the typed message model.
    ///
    /// A tool entry whose call id was lost to pairing-unaware truncation is
    /// converted with an empty id rather than rejected.
    pub fn to_message(&self) -> ChatMessage {
        let content = self.content.clone().unwrap_or_default();
        match self.role {
            Role::System => ChatMessage::System { content },
            Role::User => ChatMessage::User { content },
            Role::Assistant => ChatMessage::Assistant {
                content: self.content.clone(),
                tool_calls: vec![],
            },
            Role::Tool => ChatMessage::Tool {
                tool_call_id: self.tool_call_id.clone().unwrap_or_default(),
                content,
            },
        }
    }
}

/// Cap the history to the most recent [`MAX_HISTORY`] entries, preserving
/// order. Oldest entries are dropped first.
pub fn bound_history(history: &[HistoryEntry]) -> &[HistoryEntry] {
    if history.len() > MAX_HISTORY {
        &history[history.len() - MAX_HISTORY..]
    } else {
        history
    }
}
