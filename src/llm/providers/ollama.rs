use async_trait::async_trait;

use crate::errors::{DroidQaError, DroidQaResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

/// Native Ollama `/api/chat` adapter. Always requests a single JSON reply.
pub struct OllamaProvider {
    id: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// `OLLAMA_HOST` wins over the configured base URL, matching the ollama CLI.
    pub fn new(id: String, base_url: String) -> Self {
        Self::at(id, resolve_base_url(base_url, std::env::var("OLLAMA_HOST").ok()))
    }

    fn at(id: String, base_url: String) -> Self {
        Self {
            id,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> DroidQaResult<LlmResponse> {
        let body = serde_json::json!({
            "model": cfg.model,
            "messages": &messages,
            "stream": false,
            "options": {
                "temperature": cfg.temperature,
                "num_predict": cfg.max_tokens,
            },
        });

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            url = %self.endpoint(),
            "sending Ollama chat request"
        );

        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(DroidQaError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = response.json().await?;
        let content = json["message"]["content"]
            .as_str()
            .ok_or_else(|| DroidQaError::LlmProvider("ollama reply has no message.content".into()))?
            .to_string();
        let reasoning = json["message"]["thinking"].as_str().unwrap_or("").to_string();

        tracing::info!(
            provider = %self.id,
            content_len = content.len(),
            eval_count = json["eval_count"].as_u64().unwrap_or(0),
            "Ollama response received"
        );

        Ok(LlmResponse { content, reasoning })
    }
}

/// A bare `host:port` in `OLLAMA_HOST` gets an `http://` scheme.
fn resolve_base_url(configured: String, host: Option<String>) -> String {
    match host.filter(|h| !h.is_empty()) {
        Some(h) if h.starts_with("http") => h,
        Some(h) => format!("http://{h}"),
        None => configured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::stub::serve_once;

    fn cfg() -> CallConfig {
        CallConfig {
            model: "llama3.2:latest".into(),
            stream: true,
            temperature: 0.5,
            max_tokens: 300,
        }
    }

    #[test]
    fn ollama_host_overrides_configured_url() {
        let configured = || "http://localhost:11434".to_string();
        assert_eq!(resolve_base_url(configured(), None), "http://localhost:11434");
        assert_eq!(resolve_base_url(configured(), Some(String::new())), "http://localhost:11434");
        assert_eq!(resolve_base_url(configured(), Some("10.0.0.2:11434".into())), "http://10.0.0.2:11434");
        assert_eq!(
            resolve_base_url(configured(), Some("https://gpu-box:443".into())),
            "https://gpu-box:443"
        );
    }

    #[tokio::test]
    async fn posts_non_streaming_chat_with_options() {
        let reply = serde_json::json!({
            "message": {"role": "assistant", "content": "{\"passed\": true}"},
            "eval_count": 12
        });
        let (url, server) = serve_once("200 OK", "application/json", vec![reply.to_string().into_bytes()]).await;

        let provider = OllamaProvider::at("local".into(), format!("{url}/"));
        let out = provider.chat(vec![ChatMessage::user("verify")], &cfg()).await.unwrap();
        assert_eq!(out.content, "{\"passed\": true}");

        let req = server.await.unwrap();
        assert!(req.head.starts_with("post /api/chat "), "{}", req.head);
        assert_eq!(req.body["model"], "llama3.2:latest");
        assert_eq!(req.body["stream"], false);
        assert_eq!(req.body["options"]["temperature"], 0.5);
        assert_eq!(req.body["options"]["num_predict"], 300);
    }

    #[tokio::test]
    async fn reply_without_content_is_an_error() {
        let (url, _server) = serve_once("200 OK", "application/json", vec![b"{\"done\": true}".to_vec()]).await;
        let provider = OllamaProvider::at("local".into(), url);
        assert!(matches!(
            provider.chat(vec![ChatMessage::user("hi")], &cfg()).await,
            Err(DroidQaError::LlmProvider(_))
        ));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (url, _server) = serve_once("404 Not Found", "text/plain", vec![b"model not found".to_vec()]).await;
        let provider = OllamaProvider::at("local".into(), url);
        match provider.chat(vec![ChatMessage::user("hi")], &cfg()).await {
            Err(DroidQaError::LlmProvider(msg)) => assert!(msg.contains("404") && msg.contains("model not found")),
            other => panic!("expected provider error, got {other:?}"),
        }
    }
}
