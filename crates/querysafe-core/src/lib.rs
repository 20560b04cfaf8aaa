pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod message;
pub mod protocol;
pub mod session;
pub mod widget;

// Re-export main types for convenience
pub use backend::{ChatBackend, HttpBackend};
pub use config::{ConfigOverrides, WidgetConfig};
pub use controller::{ChatController, Completion};
pub use error::{ChatError, FormatError};
pub use format::{FormattedLine, FormattedText, Formatter, MarkdownFormatter, SpanStyle, StyledSpan};
pub use message::{Author, LogEntry, Message, RenderedMessage, RequestId};
pub use protocol::{ChatAnswer, ChatReply, ChatRequest};
pub use session::{Session, WidgetState};
pub use widget::{EntryView, HeaderView, PendingRequest, Widget, WidgetView};
