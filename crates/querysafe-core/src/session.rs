/// Where the widget is in its open/closed lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    Closed,
    /// Open, greeting not yet shown. Only seen in between the toggle and
    /// the greeting being appended.
    OpenNoGreeting,
    OpenGreeted,
}

/// Per-widget session state. Lives as long as the widget does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub is_open: bool,
    pub conversation_id: Option<String>,
    pub greeting_sent: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WidgetState {
        match (self.is_open, self.greeting_sent) {
            (false, _) => WidgetState::Closed,
            (true, false) => WidgetState::OpenNoGreeting,
            (true, true) => WidgetState::OpenGreeted,
        }
    }

    /// Flip open/closed. Returns true when the greeting is due, which
    /// happens only on the first opening.
    pub(crate) fn toggle(&mut self) -> bool {
        self.is_open = !self.is_open;
        if self.is_open && !self.greeting_sent {
            self.greeting_sent = true;
            return true;
        }
        false
    }

    /// Take the backend's conversation id. Overwrites any previous one.
    pub(crate) fn adopt_conversation(&mut self, conversation_id: String) {
        if self.conversation_id.as_deref() != Some(conversation_id.as_str()) {
            tracing::info!(
                previous = ?self.conversation_id,
                current = %conversation_id,
                "conversation id changed"
            );
        }
        self.conversation_id = Some(conversation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_closed() {
        let session = Session::new();
        assert_eq!(session.state(), WidgetState::Closed);
        assert_eq!(session.conversation_id, None);
    }

    #[test]
    fn test_greeting_due_only_once() {
        let mut session = Session::new();
        assert!(session.toggle());
        assert_eq!(session.state(), WidgetState::OpenGreeted);
        assert!(!session.toggle());
        assert_eq!(session.state(), WidgetState::Closed);
        assert!(!session.toggle());
        assert_eq!(session.state(), WidgetState::OpenGreeted);
    }

    #[test]
    fn test_conversation_id_overwrites() {
        let mut session = Session::new();
        session.adopt_conversation("abc".to_string());
        session.adopt_conversation("def".to_string());
        assert_eq!(session.conversation_id.as_deref(), Some("def"));
    }
}
