use std::sync::Arc;

use crate::errors::DroidQaResult;
use crate::llm::provider::LlmProvider;
use crate::llm::registry::AgentRole;
use crate::llm::types::{CallConfig, ChatMessage};

/// A provider bound to the call configuration of one agent role.
#[derive(Clone)]
pub struct RoleClient {
    role: AgentRole,
    provider: Arc<dyn LlmProvider>,
    cfg: CallConfig,
}

impl RoleClient {
    pub fn new(role: AgentRole, provider: Arc<dyn LlmProvider>, cfg: CallConfig) -> Self {
        Self { role, provider, cfg }
    }

    /// Send the messages and return the reply text.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> DroidQaResult<String> {
        let response = self.provider.chat(messages, &self.cfg).await?;
        if !response.reasoning.is_empty() {
            tracing::debug!(role = %self.role, reasoning = %response.reasoning, "model reasoning");
        }
        Ok(response.content)
    }
}
