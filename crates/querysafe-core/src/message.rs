//! UI-agnostic message log types
//!
//! Shared by every front end that hosts the widget. Nothing in here knows
//! about terminals or markup.

use chrono::{DateTime, Local};
use std::fmt;
use crate::format::FormattedText;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    User,
    Bot,
}

/// A chat message. Immutable once it is in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub text: String,
    pub author: Author,
    pub timestamp: DateTime<Local>,
}

impl Message {
    pub fn new(text: impl Into<String>, author: Author) -> Self {
        Self {
            text: text.into(),
            author,
            timestamp: Local::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Author::User)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(text, Author::Bot)
    }

    /// Hour and minute, e.g. `14:05`.
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}

/// Correlates a typing placeholder with the request it is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// A message together with its body as it should be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub message: Message,
    pub body: FormattedText,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Message(RenderedMessage),
    /// "Agent is typing..." while the request is in flight.
    Placeholder(RequestId),
}

impl LogEntry {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            LogEntry::Message(rendered) => Some(&rendered.message),
            LogEntry::Placeholder(_) => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, LogEntry::Placeholder(_))
    }
}
