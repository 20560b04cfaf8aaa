//! The widget's state core.
//!
//! [`Widget`] holds the session and message log and decides what changes on
//! each event. It never performs I/O: sending hands back a
//! [`PendingRequest`] for the caller to dispatch, and the outcome comes back
//! through [`Widget::complete`].

use crate::config::WidgetConfig;
use crate::error::ChatError;
use crate::format::{render_text, FormattedText, Formatter, MarkdownFormatter};
use crate::message::{Author, LogEntry, Message, RenderedMessage, RequestId};
use crate::protocol::{ChatAnswer, ChatRequest};
use crate::session::{Session, WidgetState};

pub const GREETING: &str = "Hi! How can I help you today?";
pub const FAILURE_MESSAGE: &str = "Sorry, something went wrong. Please try again.";
pub const TYPING_TEXT: &str = "Agent is typing...";
pub const SUBTITLE: &str = "AI Assistant";
pub const USER_LABEL: &str = "You";

/// A request the caller must send to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub id: RequestId,
    pub request: ChatRequest,
}

pub struct Widget {
    config: WidgetConfig,
    session: Session,
    log: Vec<LogEntry>,
    input_enabled: bool,
    next_request: u64,
    formatter: Option<Box<dyn Formatter>>,
}

impl Widget {
    /// Markdown formatting is installed unless the config turns it off.
    pub fn new(config: WidgetConfig) -> Self {
        let formatter: Option<Box<dyn Formatter>> = if config.formatting {
            Some(Box::new(MarkdownFormatter))
        } else {
            None
        };
        Self::with_formatter(config, formatter)
    }

    pub fn without_formatter(config: WidgetConfig) -> Self {
        Self::with_formatter(config, None)
    }

    pub fn with_formatter(config: WidgetConfig, formatter: Option<Box<dyn Formatter>>) -> Self {
        Self {
            config,
            session: Session::new(),
            log: Vec::new(),
            input_enabled: true,
            next_request: 1,
            formatter,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> WidgetState {
        self.session.state()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Number of requests still waiting for a response.
    pub fn pending(&self) -> usize {
        self.log.iter().filter(|entry| entry.is_placeholder()).count()
    }

    /// Open or close the widget. The first opening appends the greeting.
    pub fn toggle(&mut self) -> bool {
        if self.session.toggle() {
            self.append(Message::bot(GREETING));
        }
        tracing::debug!(open = self.session.is_open, "widget toggled");
        self.session.is_open
    }

    /// Log the user's message and a typing placeholder, and return the
    /// request to dispatch. Blank input is ignored.
    ///
    /// Input enablement is the host's concern; this does not check it.
    pub fn begin_send(&mut self, text: &str) -> Option<PendingRequest> {
        let query = text.trim();
        if query.is_empty() {
            tracing::debug!("ignoring blank message");
            return None;
        }

        self.append(Message::user(query));

        let id = RequestId(self.next_request);
        self.next_request += 1;
        self.log.push(LogEntry::Placeholder(id));

        Some(PendingRequest {
            id,
            request: ChatRequest {
                query: query.to_string(),
                chatbot_id: self.config.chatbot_id.clone(),
                conversation_id: self.session.conversation_id.clone(),
            },
        })
    }

    /// Apply the outcome of request `id`. Returns false when the request
    /// failed and the generic failure message was logged instead.
    pub fn complete(&mut self, id: RequestId, result: Result<ChatAnswer, ChatError>) -> bool {
        if !self.remove_placeholder(id) {
            tracing::debug!(request = %id, "response arrived with no placeholder to remove");
        }

        match result {
            Ok(answer) => {
                if let Some(conversation_id) = answer.conversation_id {
                    self.session.adopt_conversation(conversation_id);
                }
                match answer.answer.filter(|text| !text.is_empty()) {
                    Some(text) => self.append(Message::bot(text)),
                    None => tracing::debug!(request = %id, "response carried no answer"),
                }
                true
            }
            Err(e) => {
                tracing::error!(request = %id, error = %e, "chat request failed");
                self.append(Message::bot(FAILURE_MESSAGE));
                false
            }
        }
    }

    pub fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> WidgetView<'_> {
        let entries = self
            .log
            .iter()
            .map(|entry| match entry {
                LogEntry::Message(rendered) => EntryView::Message {
                    author: rendered.message.author,
                    label: match rendered.message.author {
                        Author::User => USER_LABEL,
                        Author::Bot => self.config.display_name.as_str(),
                    },
                    body: &rendered.body,
                    time: rendered.message.time_label(),
                },
                LogEntry::Placeholder(id) => EntryView::Typing { id: *id },
            })
            .collect();

        WidgetView {
            is_open: self.session.is_open,
            header: HeaderView {
                display_name: &self.config.display_name,
                initials: self.config.initials(),
                logo_url: self.config.logo_url.as_deref(),
                subtitle: SUBTITLE,
            },
            entries,
            input_enabled: self.input_enabled,
        }
    }

    fn append(&mut self, message: Message) {
        let body = render_text(self.formatter.as_deref(), &message.text);
        self.log.push(LogEntry::Message(RenderedMessage { message, body }));
    }

    fn remove_placeholder(&mut self, id: RequestId) -> bool {
        let before = self.log.len();
        self.log.retain(|entry| !matches!(entry, LogEntry::Placeholder(p) if *p == id));
        self.log.len() != before
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderView<'a> {
    pub display_name: &'a str,
    pub initials: String,
    pub logo_url: Option<&'a str>,
    pub subtitle: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryView<'a> {
    Message {
        author: Author,
        label: &'a str,
        body: &'a FormattedText,
        time: String,
    },
    Typing {
        id: RequestId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetView<'a> {
    pub is_open: bool,
    pub header: HeaderView<'a>,
    pub entries: Vec<EntryView<'a>>,
    pub input_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatError;

    fn widget() -> Widget {
        let mut config = WidgetConfig::new("https://bots.example.com", "bot-1");
        config.display_name = "Helper".to_string();
        Widget::new(config)
    }

    fn texts(widget: &Widget) -> Vec<(Author, String)> {
        widget
            .log()
            .iter()
            .filter_map(LogEntry::as_message)
            .map(|m| (m.author, m.text.clone()))
            .collect()
    }

    fn answer(text: Option<&str>, conversation_id: Option<&str>) -> ChatAnswer {
        ChatAnswer {
            answer: text.map(str::to_string),
            conversation_id: conversation_id.map(str::to_string),
        }
    }

    #[test]
    fn test_greeting_once_across_toggles() {
        let mut widget = widget();
        assert_eq!(widget.state(), WidgetState::Closed);

        assert!(widget.toggle());
        assert!(!widget.toggle());
        assert!(widget.toggle());

        assert_eq!(texts(&widget), vec![(Author::Bot, GREETING.to_string())]);
        assert_eq!(widget.state(), WidgetState::OpenGreeted);
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut widget = widget();
        for input in ["", "   ", "\n\t "] {
            assert!(widget.begin_send(input).is_none());
        }
        assert!(widget.log().is_empty());
    }

    #[test]
    fn test_send_logs_user_message_then_placeholder() {
        let mut widget = widget();
        let pending = widget.begin_send("  What is querySafe?  ").unwrap();

        assert_eq!(pending.request.query, "What is querySafe?");
        assert_eq!(pending.request.chatbot_id, "bot-1");
        assert_eq!(pending.request.conversation_id, None);

        let log = widget.log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].as_message().unwrap().author, Author::User);
        assert_eq!(log[0].as_message().unwrap().text, "What is querySafe?");
        assert_eq!(log[1], LogEntry::Placeholder(pending.id));
    }

    #[test]
    fn test_success_adopts_conversation_and_appends_answer() {
        let mut widget = widget();
        let first = widget.begin_send("hi").unwrap();
        widget.complete(first.id, Ok(answer(Some("Hello"), Some("abc"))));

        assert_eq!(widget.pending(), 0);
        assert_eq!(widget.session().conversation_id.as_deref(), Some("abc"));
        assert_eq!(
            texts(&widget),
            vec![
                (Author::User, "hi".to_string()),
                (Author::Bot, "Hello".to_string()),
            ]
        );

        let second = widget.begin_send("again").unwrap();
        assert_eq!(second.request.conversation_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_each_response_overwrites_conversation() {
        let mut widget = widget();
        let first = widget.begin_send("one").unwrap();
        widget.complete(first.id, Ok(answer(None, Some("abc"))));
        let second = widget.begin_send("two").unwrap();
        widget.complete(second.id, Ok(answer(None, Some("xyz"))));

        assert_eq!(widget.session().conversation_id.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_missing_answer_appends_nothing() {
        let mut widget = widget();
        let pending = widget.begin_send("hi").unwrap();
        widget.complete(pending.id, Ok(answer(Some(""), None)));

        assert_eq!(widget.log().len(), 1);
        assert_eq!(widget.session().conversation_id, None);
    }

    #[test]
    fn test_failure_keeps_conversation() {
        let mut widget = widget();
        let first = widget.begin_send("hi").unwrap();
        assert!(widget.complete(first.id, Ok(answer(Some("Hello"), Some("abc")))));

        let failures = [
            ChatError::Backend("bad request".to_string()),
            ChatError::Status(502),
            ChatError::Transport("connection refused".to_string()),
            ChatError::Malformed("expected value".to_string()),
        ];
        for err in failures {
            let pending = widget.begin_send("again").unwrap();
            assert!(!widget.complete(pending.id, Err(err)));

            let last = widget.log().last().unwrap().as_message().unwrap();
            assert_eq!(last.author, Author::Bot);
            assert_eq!(last.text, FAILURE_MESSAGE);
            assert_eq!(widget.pending(), 0);
            assert_eq!(widget.session().conversation_id.as_deref(), Some("abc"));
        }
    }

    #[test]
    fn test_completion_removes_only_its_own_placeholder() {
        let mut widget = widget();
        let first = widget.begin_send("one").unwrap();
        let second = widget.begin_send("two").unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(widget.pending(), 2);

        widget.complete(second.id, Ok(answer(Some("two back"), None)));

        assert_eq!(widget.pending(), 1);
        assert!(widget.log().contains(&LogEntry::Placeholder(first.id)));
        assert!(!widget.log().contains(&LogEntry::Placeholder(second.id)));
    }

    #[test]
    fn test_response_lands_while_closed() {
        let mut widget = widget();
        widget.toggle();
        let pending = widget.begin_send("hi").unwrap();
        widget.toggle();
        assert!(!widget.is_open());

        widget.complete(pending.id, Ok(answer(Some("Hello"), None)));
        assert_eq!(texts(&widget).last().unwrap().1, "Hello");
    }

    #[test]
    fn test_answer_is_formatted() {
        let mut widget = widget();
        let pending = widget.begin_send("hi").unwrap();
        widget.complete(pending.id, Ok(answer(Some("**bold** move"), None)));

        let LogEntry::Message(rendered) = widget.log().last().unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(rendered.message.text, "**bold** move");
        assert!(rendered.body.lines[0].spans[0].style.bold);
        assert_eq!(rendered.body.plain_text(), "bold move");
    }

    #[test]
    fn test_plain_text_without_formatter() {
        let mut widget = Widget::without_formatter(WidgetConfig::new("https://x", "bot"));
        let pending = widget.begin_send("**raw**").unwrap();
        widget.complete(pending.id, Ok(answer(Some("*also raw*"), None)));

        let view = widget.view();
        let bodies: Vec<String> = view
            .entries
            .iter()
            .filter_map(|entry| match entry {
                EntryView::Message { body, .. } => Some(body.plain_text()),
                EntryView::Typing { .. } => None,
            })
            .collect();
        assert_eq!(bodies, vec!["**raw**".to_string(), "*also raw*".to_string()]);
    }

    #[test]
    fn test_failing_formatter_falls_back() {
        struct Failing;
        impl Formatter for Failing {
            fn format(&self, _text: &str) -> Result<FormattedText, FormatError> {
                Err(FormatError::Failed("no renderer".to_string()))
            }
        }

        let mut widget = Widget::with_formatter(
            WidgetConfig::new("https://x", "bot"),
            Some(Box::new(Failing)),
        );
        widget.toggle();

        let LogEntry::Message(rendered) = &widget.log()[0] else {
            panic!("expected the greeting");
        };
        assert_eq!(rendered.body, FormattedText::literal(GREETING));
    }

    #[test]
    fn test_view_labels_and_header() {
        let mut widget = widget();
        widget.toggle();
        let pending = widget.begin_send("hi").unwrap();
        widget.set_input_enabled(false);

        let view = widget.view();
        assert!(view.is_open);
        assert!(!view.input_enabled);
        assert_eq!(view.header.display_name, "Helper");
        assert_eq!(view.header.initials, "He");
        assert_eq!(view.header.subtitle, SUBTITLE);
        assert_eq!(view.entries.len(), 3);
        assert!(matches!(view.entries[0], EntryView::Message { label: "Helper", author: Author::Bot, .. }));
        assert!(matches!(view.entries[1], EntryView::Message { label: USER_LABEL, author: Author::User, .. }));
        assert_eq!(view.entries[2], EntryView::Typing { id: pending.id });

        if let EntryView::Message { time, .. } = &view.entries[0] {
            assert_eq!(time.len(), 5);
            assert_eq!(&time[2..3], ":");
        }
    }
}
