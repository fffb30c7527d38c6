//! Conversational intent source.
//!
//! A chat message is classified as creating a todo, asking about todos, or
//! plain chat, and comes back with a short in-character reply. Model output
//! is untrusted: [`parse_reply`] accepts anything and degrades to chat.

use crate::store::{normalise_title, Priority};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply used when no chat credential is configured.
pub const MISSING_CREDENTIAL_REPLY: &str =
    "Please add a chat API key in settings first, then we can talk~";
/// Reply used when the model answered without a reply text.
pub const ACKNOWLEDGE_REPLY: &str = "Mm-hm, I heard you~";
/// Reply used when the model output could not be understood.
pub const UNCLEAR_REPLY: &str = "Oops, I didn't quite catch that. Say it again?";
/// Reply used when the request itself failed.
pub const FAILURE_REPLY: &str = "Oops, something went wrong. Try again in a bit~";

/// What the user wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateTodo,
    QueryTodo,
    #[default]
    Chat,
}

/// Todo extracted from a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoDraft {
    pub title: String,
    pub priority: Priority,
}

/// Classified message with the pet's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentReply {
    pub intent: Intent,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo: Option<TodoDraft>,
}

impl IntentReply {
    /// Plain chat reply.
    pub fn chat(reply: impl Into<String>) -> Self {
        Self {
            intent: Intent::Chat,
            reply: reply.into(),
            todo: None,
        }
    }
}

/// Parse model output leniently.
///
/// Unknown or missing intent means chat, a missing reply becomes a generic
/// acknowledgement, non-JSON output becomes an apologetic reply, and
/// `create_todo` without a usable todo is downgraded to chat.
pub fn parse_reply(raw: &str) -> IntentReply {
    let value: Value = match serde_json::from_str(strip_code_fence(raw)) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(_) | Err(_) => {
            tracing::warn!("Unparseable intent response: {}", raw);
            return IntentReply::chat(UNCLEAR_REPLY);
        }
    };

    let intent = match value.get("intent").and_then(Value::as_str) {
        Some("create_todo") => Intent::CreateTodo,
        Some("query_todo") => Intent::QueryTodo,
        _ => Intent::Chat,
    };

    let reply = value
        .get("reply")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(ACKNOWLEDGE_REPLY)
        .to_string();

    let todo = value.get("todo").and_then(parse_draft);

    match (intent, todo) {
        (Intent::CreateTodo, Some(todo)) => IntentReply {
            intent,
            reply,
            todo: Some(todo),
        },
        (Intent::CreateTodo, None) => {
            tracing::debug!("create_todo without a usable todo, treating as chat");
            IntentReply::chat(reply)
        }
        (intent, _) => IntentReply {
            intent,
            reply,
            todo: None,
        },
    }
}

fn parse_draft(value: &Value) -> Option<TodoDraft> {
    let title = normalise_title(value.get("title")?.as_str()?)?;
    let priority = value
        .get("priority")
        .and_then(Value::as_str)
        .and_then(|p| p.parse().ok())
        .unwrap_or_default();
    Some(TodoDraft { title, priority })
}

/// Models sometimes wrap JSON in a markdown fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Something that can classify a chat message.
pub trait ConversationSource {
    /// Classify `text`. `credential` is the chat API key, if configured.
    fn process(&self, credential: Option<&str>, text: &str) -> Result<IntentReply, ChatError>;
}

/// Chat client errors.
#[derive(Debug)]
pub enum ChatError {
    /// Client could not be built
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// Response envelope could not be decoded
    Parse(String),
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::Config(msg) => write!(f, "Chat config error: {msg}"),
            ChatError::Network(msg) => write!(f, "Chat network error: {msg}"),
            ChatError::Server { status, message } => {
                write!(f, "Chat server error ({status}): {message}")
            }
            ChatError::Parse(msg) => write!(f, "Chat parse error: {msg}"),
        }
    }
}

impl std::error::Error for ChatError {}

/// Source that never leaves the machine: it only knows how to ask for a key.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineConversation;

impl ConversationSource for OfflineConversation {
    fn process(&self, _credential: Option<&str>, _text: &str) -> Result<IntentReply, ChatError> {
        Ok(IntentReply::chat(MISSING_CREDENTIAL_REPLY))
    }
}

#[cfg(feature = "network")]
pub use client::{BlockingChatClient, ChatClient, ChatEndpoint};

#[cfg(feature = "network")]
mod client {
    use super::{parse_reply, ChatError, ConversationSource, IntentReply, MISSING_CREDENTIAL_REPLY};
    use serde::{Deserialize, Serialize};

    const SYSTEM_PROMPT: &str = r#"You are "Cloudy", a cute cloud-shaped desktop pet assistant.
Decide whether the user wants to create a todo (create_todo), ask about todos (query_todo) or just chat (chat),
and answer warmly in at most 40 characters.
Reply with JSON only:
{"intent": "create_todo" | "query_todo" | "chat", "reply": "...", "todo": {"title": "...", "priority": "high" | "medium" | "low"}}
Priority: "urgent", "right now", "today", "ASAP" -> high; "important", "soon", "this week" -> medium; otherwise low."#;

    /// OpenAI-compatible chat-completions endpoint.
    #[derive(Debug, Clone)]
    pub struct ChatEndpoint {
        pub base_url: String,
        pub model: String,
    }

    impl Default for ChatEndpoint {
        fn default() -> Self {
            Self {
                base_url: "https://api.deepseek.com".to_string(),
                model: "deepseek-chat".to_string(),
            }
        }
    }

    impl ChatEndpoint {
        pub fn completions_url(&self) -> String {
            format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
        }
    }

    #[derive(Debug, Serialize)]
    struct CompletionRequest<'a> {
        model: &'a str,
        messages: [Message<'a>; 2],
        temperature: f32,
        max_tokens: u32,
        response_format: ResponseFormat,
    }

    #[derive(Debug, Serialize)]
    struct Message<'a> {
        role: &'a str,
        content: &'a str,
    }

    #[derive(Debug, Serialize)]
    struct ResponseFormat {
        #[serde(rename = "type")]
        kind: &'static str,
    }

    #[derive(Debug, Deserialize)]
    struct CompletionResponse {
        #[serde(default)]
        choices: Vec<Choice>,
    }

    #[derive(Debug, Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Debug, Deserialize)]
    struct ChoiceMessage {
        #[serde(default)]
        content: Option<String>,
    }

    /// Async chat-completions client.
    pub struct ChatClient {
        client: reqwest::Client,
        endpoint: ChatEndpoint,
    }

    impl ChatClient {
        pub fn new(endpoint: ChatEndpoint, timeout: std::time::Duration) -> Result<Self, ChatError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| ChatError::Config(e.to_string()))?;
            Ok(Self { client, endpoint })
        }

        /// Classify a message with the given API key.
        pub async fn process(&self, api_key: &str, text: &str) -> Result<IntentReply, ChatError> {
            let request = CompletionRequest {
                model: &self.endpoint.model,
                messages: [
                    Message {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    Message {
                        role: "user",
                        content: text,
                    },
                ],
                temperature: 0.7,
                max_tokens: 200,
                response_format: ResponseFormat {
                    kind: "json_object",
                },
            };

            let response = self
                .client
                .post(self.endpoint.completions_url())
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| ChatError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(ChatError::Server {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: CompletionResponse = response
                .json()
                .await
                .map_err(|e| ChatError::Parse(e.to_string()))?;

            let raw = body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_else(|| "{}".to_string());
            Ok(parse_reply(&raw))
        }
    }

    /// Blocking chat client for the synchronous controller loop.
    pub struct BlockingChatClient {
        inner: ChatClient,
        runtime: tokio::runtime::Runtime,
    }

    impl BlockingChatClient {
        pub fn new(endpoint: ChatEndpoint, timeout: std::time::Duration) -> Result<Self, ChatError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| ChatError::Config(format!("Failed to create runtime: {e}")))?;

            Ok(Self {
                inner: ChatClient::new(endpoint, timeout)?,
                runtime,
            })
        }
    }

    impl ConversationSource for BlockingChatClient {
        fn process(&self, credential: Option<&str>, text: &str) -> Result<IntentReply, ChatError> {
            match credential {
                Some(key) => self.runtime.block_on(self.inner.process(key, text)),
                None => Ok(IntentReply::chat(MISSING_CREDENTIAL_REPLY)),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_completions_url() {
            let endpoint = ChatEndpoint {
                base_url: "http://localhost:9000/v1/".to_string(),
                model: "m".to_string(),
            };
            assert_eq!(
                endpoint.completions_url(),
                "http://localhost:9000/v1/chat/completions"
            );
        }

        #[test]
        fn test_missing_credential_never_calls_out() {
            let client = BlockingChatClient::new(
                ChatEndpoint::default(),
                std::time::Duration::from_secs(1),
            )
            .unwrap();
            let reply = client.process(None, "remind me to buy milk").unwrap();
            assert_eq!(reply, IntentReply::chat(MISSING_CREDENTIAL_REPLY));
        }
    }
}
