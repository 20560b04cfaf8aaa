use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use crate::error::ChatError;
use crate::protocol::{ChatAnswer, ChatReply, ChatRequest};

/// Something that can carry one chat turn to the backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatAnswer, ChatError>;
}

/// The real `/chat/` endpoint over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat/", self.base_url)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn send(&self, request: &ChatRequest) -> Result<ChatAnswer, ChatError> {
        let url = self.chat_url();
        tracing::debug!(%url, conversation_id = ?request.conversation_id, "sending chat request");

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;

        ChatReply::decode(status, &body)?.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url() {
        let backend = HttpBackend::new("https://bots.example.com/");
        assert_eq!(backend.chat_url(), "https://bots.example.com/chat/");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Grab a free port, then close it so nothing is listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let backend = HttpBackend::new(&format!("http://127.0.0.1:{}", port));
        let request = ChatRequest {
            query: "hello".to_string(),
            chatbot_id: "bot".to_string(),
            conversation_id: None,
        };

        let err = backend.send(&request).await.unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)), "got {:?}", err);
    }
}
