use async_trait::async_trait;
use futures_util::StreamExt;

use crate::errors::{DroidQaError, DroidQaResult};
use crate::llm::provider::LlmProvider;
use crate::llm::sse_parser;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse, StreamChunkKind};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String) -> Self {
        Self {
            id,
            api_base,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> DroidQaResult<LlmResponse> {
        let body = serde_json::json!({
            "model": cfg.model,
            "messages": &messages,
            "stream": cfg.stream,
            "temperature": cfg.temperature,
            "max_tokens": cfg.max_tokens,
        });

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            messages = messages.len(),
            "sending LLM request"
        );

        let mut request = self.client.post(&self.api_base).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(DroidQaError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        if cfg.stream {
            self.handle_stream(response).await
        } else {
            self.handle_json(response).await
        }
    }
}

impl OpenAiCompatibleProvider {
    /// Handle SSE streaming response and accumulate the full reply.
    async fn handle_stream(&self, response: reqwest::Response) -> DroidQaResult<LlmResponse> {
        let mut byte_stream = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        let mut out = LlmResponse::default();
        let mut done = false;

        'stream: while let Some(result) = byte_stream.next().await {
            buf.extend_from_slice(&result?);
            for line in drain_lines(&mut buf) {
                if apply_line(&line, &mut out) {
                    done = true;
                    break 'stream;
                }
            }
        }

        // Last line may arrive without a trailing newline.
        if !done && !buf.is_empty() {
            let tail = String::from_utf8_lossy(&buf);
            apply_line(tail.trim(), &mut out);
        }

        tracing::info!(
            provider = %self.id,
            content_len = out.content.len(),
            reasoning_len = out.reasoning.len(),
            "LLM stream complete"
        );
        Ok(out)
    }

    async fn handle_json(&self, response: reqwest::Response) -> DroidQaResult<LlmResponse> {
        let json: serde_json::Value = response.json().await?;

        let message = &json["choices"][0]["message"];
        let content = message["content"].as_str().unwrap_or("").to_string();
        let reasoning = message["reasoning_content"].as_str().unwrap_or("").to_string();

        tracing::info!(
            provider = %self.id,
            content_len = content.len(),
            "LLM JSON response received"
        );

        Ok(LlmResponse { content, reasoning })
    }
}

/// Split the complete `\n`-terminated lines off the front of `buf`. A partial
/// line, possibly ending mid-character, stays buffered for the next chunk.
fn drain_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let Some(last_nl) = buf.iter().rposition(|b| *b == b'\n') else {
        return Vec::new();
    };
    let rest = buf.split_off(last_nl + 1);
    let complete = std::mem::replace(buf, rest);
    complete
        .split(|b| *b == b'\n')
        .map(|line| String::from_utf8_lossy(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Fold one SSE line into `out`. Returns true once the stream is finished.
fn apply_line(line: &str, out: &mut LlmResponse) -> bool {
    if line.is_empty() {
        return false;
    }
    match sse_parser::parse_sse_line(line) {
        Ok(Some(chunk)) => match chunk.kind {
            StreamChunkKind::Reasoning => out.reasoning.push_str(&chunk.content),
            StreamChunkKind::Content => out.content.push_str(&chunk.content),
            StreamChunkKind::Done => return true,
        },
        Ok(None) => {}
        Err(e) => {
            tracing::debug!("SSE parse skipped: {e}");
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::stub::serve_once;

    fn cfg(stream: bool) -> CallConfig {
        CallConfig {
            model: "glm-4-flash".into(),
            stream,
            temperature: 0.5,
            max_tokens: 256,
        }
    }

    fn delta(content: &str) -> String {
        format!("data: {}\n", serde_json::json!({"choices": [{"delta": {"content": content}}]}))
    }

    fn provider(url: String, key: &str) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new("glm".into(), url, key.into())
    }

    #[test]
    fn partial_lines_stay_buffered() {
        let mut buf = b"data: a\n\ndata: b\ndata: \xe5".to_vec();
        assert_eq!(drain_lines(&mut buf), vec!["data: a", "data: b"]);
        assert_eq!(buf, b"data: \xe5");
        assert!(drain_lines(&mut buf).is_empty());
    }

    #[tokio::test]
    async fn multibyte_char_split_across_chunks_survives() {
        let line = delta("开关");
        let split = line.find('开').unwrap() + 1;
        let bytes = line.into_bytes();
        let (url, server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec![bytes[..split].to_vec(), bytes[split..].to_vec(), b"data: [DONE]\n".to_vec()],
        )
        .await;

        let reply = provider(url, "").chat(vec![ChatMessage::user("hi")], &cfg(true)).await.unwrap();
        assert_eq!(reply.content, "开关");
        assert_eq!(server.await.unwrap().body["stream"], true);
    }

    #[tokio::test]
    async fn stream_accumulates_until_done_marker() {
        let (url, _server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec![
                b": keep-alive\n".to_vec(),
                format!("{}{}", delta("{\"passed\": "), delta("true}")).into_bytes(),
                b"data: [DONE]\n".to_vec(),
                delta("ignored").into_bytes(),
            ],
        )
        .await;

        let reply = provider(url, "").chat(vec![ChatMessage::user("hi")], &cfg(true)).await.unwrap();
        assert_eq!(reply.content, "{\"passed\": true}");
    }

    #[tokio::test]
    async fn finish_reason_ends_stream_and_unterminated_tail_is_kept() {
        let stop = "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n";
        let (url, _server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec![delta("Wi-Fi").into_bytes(), stop.as_bytes().to_vec(), delta("ignored").into_bytes()],
        )
        .await;
        let reply = provider(url, "").chat(vec![ChatMessage::user("hi")], &cfg(true)).await.unwrap();
        assert_eq!(reply.content, "Wi-Fi");

        let tail = delta("off");
        let (url, _server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec![tail.trim_end().as_bytes().to_vec()],
        )
        .await;
        let reply = provider(url, "").chat(vec![ChatMessage::user("hi")], &cfg(true)).await.unwrap();
        assert_eq!(reply.content, "off");
    }

    #[tokio::test]
    async fn json_reply_reads_first_choice_without_auth() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "{\"subgoals\": []}", "reasoning_content": "think"}}]
        });
        let (url, server) = serve_once("200 OK", "application/json", vec![body.to_string().into_bytes()]).await;

        let reply = provider(url, "").chat(vec![ChatMessage::user("plan")], &cfg(false)).await.unwrap();
        assert_eq!(reply.content, "{\"subgoals\": []}");
        assert_eq!(reply.reasoning, "think");

        let req = server.await.unwrap();
        assert!(!req.head.contains("authorization:"));
        assert_eq!(req.body["model"], "glm-4-flash");
        assert_eq!(req.body["stream"], false);
        assert_eq!(req.body["max_tokens"], 256);
        assert_eq!(req.body["messages"][0]["content"], "plan");
    }

    #[tokio::test]
    async fn bearer_auth_sent_when_key_set() {
        let body = serde_json::json!({"choices": [{"message": {"content": "ok"}}]});
        let (url, server) = serve_once("200 OK", "application/json", vec![body.to_string().into_bytes()]).await;

        provider(url, "sk-test").chat(vec![ChatMessage::user("hi")], &cfg(false)).await.unwrap();
        assert!(server.await.unwrap().head.contains("authorization: bearer sk-test"));
    }

    #[tokio::test]
    async fn error_status_carries_status_and_body() {
        let (url, _server) = serve_once(
            "503 Service Unavailable",
            "text/plain",
            vec![b"model overloaded".to_vec()],
        )
        .await;

        match provider(url, "").chat(vec![ChatMessage::user("hi")], &cfg(false)).await {
            Err(DroidQaError::LlmProvider(msg)) => {
                assert!(msg.contains("503"), "{msg}");
                assert!(msg.contains("model overloaded"), "{msg}");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }
}
