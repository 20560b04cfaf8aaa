use std::sync::Arc;
use tokio::sync::mpsc;
use crate::backend::{ChatBackend, HttpBackend};
use crate::config::WidgetConfig;
use crate::error::ChatError;
use crate::message::RequestId;
use crate::protocol::ChatAnswer;
use crate::widget::Widget;

/// The outcome of one request, delivered back to the event loop.
#[derive(Debug)]
pub struct Completion {
    pub id: RequestId,
    pub result: Result<ChatAnswer, ChatError>,
}

/// Drives a [`Widget`] against a chat backend.
///
/// Requests run as detached tokio tasks. Their results queue up on a channel
/// and only touch the widget when the owner applies them, so all state
/// changes happen on the owner's loop. Nothing is cancelled or retried.
pub struct ChatController {
    widget: Widget,
    backend: Arc<dyn ChatBackend>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl ChatController {
    /// Talk to the HTTP backend at `config.base_url`.
    pub fn new(config: WidgetConfig) -> Self {
        let backend = Arc::new(HttpBackend::new(&config.base_url));
        Self::with_backend(Widget::new(config), backend)
    }

    pub fn with_backend(widget: Widget, backend: Arc<dyn ChatBackend>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { widget, backend, tx, rx }
    }

    pub fn widget(&self) -> &Widget {
        &self.widget
    }

    pub fn toggle_widget(&mut self) -> bool {
        self.widget.toggle()
    }

    pub fn set_input_enabled(&mut self, enabled: bool) {
        self.widget.set_input_enabled(enabled);
    }

    /// Log the message and dispatch it. Returns `None` for blank input.
    ///
    /// Must be called from within a tokio runtime.
    pub fn send_message(&mut self, text: &str) -> Option<RequestId> {
        let pending = self.widget.begin_send(text)?;
        let id = pending.id;

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.send(&pending.request).await;
            // The receiver only goes away with the controller
            let _ = tx.send(Completion { id: pending.id, result });
        });

        tracing::debug!(request = %id, "chat request dispatched");
        Some(id)
    }

    /// Wait for the next finished request. Cancel-safe, for use in
    /// `tokio::select!`.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }

    /// Returns false when the request failed.
    pub fn apply(&mut self, completion: Completion) -> bool {
        self.widget.complete(completion.id, completion.result)
    }

    /// Apply every completion that has already arrived. Returns how many.
    pub fn apply_ready(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Wait until no request is in flight. Returns how many of the
    /// requests applied meanwhile failed.
    pub async fn settle(&mut self) -> usize {
        let mut failed = 0;
        while self.widget.pending() > 0 {
            match self.rx.recv().await {
                Some(completion) => {
                    if !self.apply(completion) {
                        failed += 1;
                    }
                }
                None => break,
            }
        }
        failed
    }
}
