use thiserror::Error;

use crate::config::ConfigError;
use crate::models::chat::ChatEntry;

/// What a chat surface should currently show.
#[derive(Debug, Clone)]
pub enum SessionState {
    Loading,
    Ready {
        transcript: Vec<ChatEntry>,
        is_typing: bool,
    },
    Error {
        message: String,
    },
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SessionState::Error { message } => Some(message),
            _ => None,
        }
    }
}

/// Notifications that are not part of the state itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transcript grew or was replaced; `entries` is its new length.
    ScrollToNewest {
        entries: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, nothing happened.
    Ignored,
    /// No backend connection yet; `initialize` has not succeeded in connecting.
    NotConnected,
    Replied,
    /// The backend answered with a non-assistant message, which is dropped.
    Filtered,
    Failed,
    /// The transcript was reloaded or reset while the reply was pending, so
    /// the reply was dropped.
    Superseded,
    /// The session was disposed before the reply arrived.
    Disposed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Chat session has been disposed")]
    Disposed,
}
