use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::LlmConfig;
use crate::llm::{ChatMessage, LlmClient};

/// Answers free-form questions on behalf of a user.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Post `prompt` in the conversation of `user_key` and return the answer text.
    async fn post(&self, user_key: &str, prompt: &str) -> Result<String>;
}

/// Per-user conversation state
struct ConversationThread {
    id: String,
    messages: Vec<ChatMessage>,
}

impl ConversationThread {
    fn new(system_prompt: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }
}

/// Assistant backed by the chat completions API, keeping one thread per user
/// in memory for the lifetime of the process.
pub struct AssistantClient {
    llm: LlmClient,
    system_prompt: String,
    threads: Mutex<HashMap<String, ConversationThread>>,
}

impl AssistantClient {
    pub fn new(config: LlmConfig) -> Self {
        let system_prompt = config.system_prompt.clone();
        Self {
            llm: LlmClient::new(config),
            system_prompt,
            threads: Mutex::new(HashMap::new()),
        }
    }

    /// Thread ID for `user_key`, creating the thread on first use.
    pub async fn get_or_create_thread(&self, user_key: &str) -> String {
        let mut threads = self.threads.lock().await;
        let thread = threads.entry(user_key.to_string()).or_insert_with(|| {
            let thread = ConversationThread::new(&self.system_prompt);
            info!("Created assistant thread {} for {}", thread.id, user_key);
            thread
        });
        thread.id.clone()
    }
}

#[async_trait]
impl Assistant for AssistantClient {
    async fn post(&self, user_key: &str, prompt: &str) -> Result<String> {
        let thread_id = self.get_or_create_thread(user_key).await;

        let messages = {
            let mut threads = self.threads.lock().await;
            let Some(thread) = threads.get_mut(user_key) else {
                anyhow::bail!("Assistant thread for {user_key} disappeared");
            };
            thread.messages.push(ChatMessage::user(prompt));
            thread.messages.clone()
        };

        debug!(
            "Posting to thread {} ({} message(s))",
            thread_id,
            messages.len()
        );

        // A reply without text is not kept: replaying it would break the thread
        let result = self.llm.chat(&messages).await.and_then(|reply| {
            match reply.content.as_deref() {
                Some(text) if !text.trim().is_empty() => Ok(reply),
                _ => Err(anyhow::anyhow!("Assistant returned an empty answer")),
            }
        });

        let mut threads = self.threads.lock().await;
        let thread = threads.get_mut(user_key);
        match result {
            Ok(reply) => {
                let content = reply.content.clone().unwrap_or_default();
                if let Some(thread) = thread {
                    thread.messages.push(reply);
                }
                Ok(content)
            }
            Err(e) => {
                // Drop the unanswered turn so the next question starts clean
                if let Some(thread) = thread {
                    thread.messages.pop();
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AssistantClient {
        AssistantClient::new(LlmConfig {
            model: "test-model".into(),
            base_url: server.uri(),
            api_key: "sk-test".into(),
            max_tokens: 64,
            system_prompt: "be nice".into(),
        })
    }

    fn answer(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        }))
    }

    async fn request_messages(server: &MockServer) -> Vec<Vec<Value>> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|req| {
                let body: Value = serde_json::from_slice(&req.body).unwrap();
                body["messages"].as_array().unwrap().clone()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_thread_created_once_per_user() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let first = client.get_or_create_thread("alice").await;
        let again = client.get_or_create_thread("alice").await;
        let other = client.get_or_create_thread("bob").await;

        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_post_returns_answer_verbatim_and_keeps_history() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/chat/completions"))
            .respond_with(answer("  It is *noon*.  "))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let reply = client.post("alice", "what time is it?").await.unwrap();
        assert_eq!(reply, "  It is *noon*.  ");

        client.post("alice", "and tomorrow?").await.unwrap();

        let requests = request_messages(&server).await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].len(), 2);
        assert_eq!(requests[0][0]["role"], "system");
        assert_eq!(requests[0][1]["content"], "what time is it?");

        // system, user, assistant, user
        assert_eq!(requests[1].len(), 4);
        assert_eq!(requests[1][2]["role"], "assistant");
        assert_eq!(requests[1][3]["content"], "and tomorrow?");
    }

    #[tokio::test]
    async fn test_users_have_separate_threads() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(answer("ok"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.post("alice", "one").await.unwrap();
        client.post("bob", "two").await.unwrap();

        let requests = request_messages(&server).await;
        assert_eq!(requests[1].len(), 2);
        assert_eq!(requests[1][1]["content"], "two");
    }

    #[tokio::test]
    async fn test_null_answer_is_error_and_not_kept() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("POST"))
            .respond_with(answer("fine"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.post("alice", "one").await.is_err());
        assert_eq!(client.post("alice", "two").await.unwrap(), "fine");

        let requests = request_messages(&server).await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].len(), 2);
        assert_eq!(requests[1][0]["role"], "system");
        assert_eq!(requests[1][1]["content"], "two");
        assert!(requests[1].iter().all(|m| !m["content"].is_null()));
    }

    #[tokio::test]
    async fn test_blank_answer_is_error() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(answer("   "))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.post("alice", "one").await.unwrap_err();
        assert!(err.to_string().contains("empty answer"));
    }

    #[tokio::test]
    async fn test_failed_post_rolls_back_turn() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("POST"))
            .respond_with(answer("recovered"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.post("alice", "lost").await.is_err());
        assert_eq!(client.post("alice", "retry").await.unwrap(), "recovered");

        let requests = request_messages(&server).await;
        assert_eq!(requests[1].len(), 2);
        assert_eq!(requests[1][1]["content"], "retry");
    }
}
