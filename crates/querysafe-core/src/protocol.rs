//! Wire format of the `/chat/` endpoint.
//!
//! Responses are decoded exactly once, here, into [`ChatReply`]. Nothing
//! downstream looks at raw JSON fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::error::ChatError;

/// Body of `POST {base_url}/chat/`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub query: String,
    pub chatbot_id: String,
    /// Serialized as `null` until the backend has assigned one.
    pub conversation_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawChatResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// A successful turn. Either field may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatAnswer {
    pub answer: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Answer(ChatAnswer),
    Error(String),
}

impl ChatReply {
    /// Decode an HTTP status and body.
    ///
    /// Non-2xx statuses fail before the body is looked at. Empty strings are
    /// treated the same as missing fields.
    pub fn decode(status: u16, body: &[u8]) -> Result<ChatReply, ChatError> {
        if !(200..300).contains(&status) {
            return Err(ChatError::Status(status));
        }

        let value: Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(ChatError::Malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }

        let raw: RawChatResponse = serde_json::from_value(value)?;

        if let Some(error) = non_empty(raw.error) {
            return Ok(ChatReply::Error(error));
        }

        Ok(ChatReply::Answer(ChatAnswer {
            answer: non_empty(raw.answer),
            conversation_id: non_empty(raw.conversation_id),
        }))
    }

    pub fn into_result(self) -> Result<ChatAnswer, ChatError> {
        match self {
            ChatReply::Answer(answer) => Ok(answer),
            ChatReply::Error(message) => Err(ChatError::Backend(message)),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
