use crate::agents::Agent;
use crate::llm::client::RoleClient;
use crate::llm::json_extract::first_object;
use crate::llm::types::ChatMessage;
use crate::messages::{ExecutorResult, Subgoal, Verification};

const SYSTEM_PROMPT: &str = "\
You are a Verifier Agent for Android QA. Compare expected vs current UI state. \
Return ONLY a valid JSON object like this:
{\"passed\": true, \"reason\": \"...\"}
Always include a short but clear explanation of the decision in the 'reason'.";

/// Asks the model whether a step had the intended effect.
pub struct VerifierAgent {
    llm: RoleClient,
    ui_tree_chars: usize,
}

impl Agent for VerifierAgent {
    fn name(&self) -> &str {
        "verifier"
    }
}

impl VerifierAgent {
    pub fn new(llm: RoleClient, ui_tree_chars: usize) -> Self {
        Self { llm, ui_tree_chars }
    }

    /// Never fails: transport and parse problems come back as a failed verification.
    pub async fn verify(&self, goal: &str, subgoal: &Subgoal, exec_result: &ExecutorResult) -> Verification {
        let ui_tree = serde_json::to_string(&exec_result.observation.ui_tree).unwrap_or_default();
        let prompt = format!(
            "High-level goal: {goal}\n\
             Subgoal: {subgoal}\n\
             Executor success: {}, error: {}\n\
             Current ui_tree (partial): {}\n\
             Return ONLY valid JSON object: {{\"passed\": bool, \"reason\": str}}",
            exec_result.success,
            exec_result.error.as_deref().unwrap_or("none"),
            truncate_chars(&ui_tree, self.ui_tree_chars),
        );

        let content = match self
            .llm
            .complete(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
            .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, subgoal = %subgoal, "verifier LLM call failed");
                return Verification::failed(format!("verifier unavailable: {e}"));
            }
        };
        tracing::debug!(raw = %content, "verifier raw LLM response");

        parse_verification(&content)
    }
}

pub fn parse_verification(content: &str) -> Verification {
    let Some(span) = first_object(content.trim()) else {
        tracing::error!("verifier response does not contain a JSON object");
        return Verification::failed("non-json response");
    };

    match serde_json::from_str::<Verification>(span) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, extracted = %span, "JSON parse error in verifier");
            Verification::failed("json parse error")
        }
    }
}

/// Cut `s` to at most `max` characters without splitting a code point.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::types::{UiNode, UiTree};
    use crate::llm::registry::AgentRole;
    use crate::llm::testing::{client, ScriptedProvider};
    use crate::messages::Observation;

    fn result_with(nodes: Vec<UiNode>) -> ExecutorResult {
        ExecutorResult {
            success: false,
            observation: Observation {
                ui_tree: UiTree { nodes },
                reward: None,
                done: None,
                info: serde_json::Map::new(),
            },
            action_taken: None,
            error: Some("no element 'wifi'".into()),
        }
    }

    #[test]
    fn parses_first_object_with_expected_state() {
        let v = parse_verification(
            "Verdict:\n{\"passed\": true, \"reason\": \"Wi-Fi toggle is on\", \"expected_state\": {\"wifi\": true}}\nDone.",
        );
        assert!(v.passed);
        assert_eq!(v.reason, "Wi-Fi toggle is on");
        assert_eq!(v.expected_state.unwrap()["wifi"], true);
    }

    #[test]
    fn bad_replies_fail_the_step() {
        assert_eq!(parse_verification("looks fine to me").reason, "non-json response");
        assert_eq!(parse_verification("{\"passed\": \"maybe\"}").reason, "json parse error");
        assert_eq!(parse_verification("{passed: yes}").reason, "json parse error");
        assert!(!parse_verification("{\"reason\": \"no verdict\"}").passed);
    }

    #[test]
    fn single_quoted_verdict_is_not_repaired() {
        let v = parse_verification("{'passed': true, 'reason': 'ok'}");
        assert!(!v.passed);
        assert_eq!(v.reason, "json parse error");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("Wi-Fi 开关", 7), "Wi-Fi 开");
        assert_eq!(truncate_chars("short", 50), "short");
    }

    #[tokio::test]
    async fn prompt_includes_context_and_truncated_tree() {
        let llm = ScriptedProvider::new([r#"{"passed": false, "reason": "toggle missing"}"#]);
        let verifier = VerifierAgent::new(client(AgentRole::Verifier, llm.clone()), 40);

        let nodes = (0..20).map(|i| UiNode::new(format!("n{i}"), "Row")).collect();
        let v = verifier
            .verify("Turn Wi-Fi off", &Subgoal::new("Tap Wi-Fi", "Wi-Fi"), &result_with(nodes))
            .await;
        assert!(!v.passed);
        assert_eq!(v.reason, "toggle missing");

        let prompt = llm.last_user_prompt();
        assert!(prompt.contains("High-level goal: Turn Wi-Fi off"));
        assert!(prompt.contains("Subgoal: Tap Wi-Fi [Wi-Fi]"));
        assert!(prompt.contains("Executor success: false, error: no element 'wifi'"));
        let tree_line = prompt.lines().find(|l| l.starts_with("Current ui_tree")).unwrap();
        assert_eq!(tree_line.len(), "Current ui_tree (partial): ".len() + 40);
    }

    #[tokio::test]
    async fn transport_failure_is_a_failed_verification() {
        let llm = ScriptedProvider::new(Vec::<String>::new());
        llm.push_error("connection refused");
        let verifier = VerifierAgent::new(client(AgentRole::Verifier, llm), 5000);
        let v = verifier.verify("g", &Subgoal::new("s", ""), &result_with(vec![])).await;
        assert!(!v.passed);
        assert!(v.reason.starts_with("verifier unavailable"));
    }
}
