use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::errors::{DroidQaError, DroidQaResult};
use crate::llm::client::RoleClient;
use crate::llm::provider::LlmProvider;
use crate::llm::registry::AgentRole;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

/// Replays canned replies in order and records every request it saw.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn push_error(&self, message: &str) {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn last_user_prompt(&self) -> String {
        self.seen
            .lock()
            .unwrap()
            .last()
            .and_then(|msgs| msgs.iter().rev().find(|m| m.role == "user"))
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: Vec<ChatMessage>, _cfg: &CallConfig) -> DroidQaResult<LlmResponse> {
        self.seen.lock().unwrap().push(messages);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(content)) => Ok(LlmResponse { content, reasoning: String::new() }),
            Some(Err(e)) => Err(DroidQaError::LlmProvider(e)),
            None => Err(DroidQaError::LlmProvider("script exhausted".into())),
        }
    }
}

pub fn client(role: AgentRole, provider: Arc<ScriptedProvider>) -> RoleClient {
    RoleClient::new(
        role,
        provider,
        CallConfig {
            model: "test-model".into(),
            stream: false,
            temperature: 0.0,
            max_tokens: 256,
        },
    )
}
