use crate::agents::Agent;
use crate::errors::DroidQaResult;
use crate::llm::client::RoleClient;
use crate::llm::json_extract::{outermost_object, parse_lenient};
use crate::llm::types::ChatMessage;
use crate::messages::{PlannerOutput, StepLog};

const SYSTEM_PROMPT: &str = "\
You are a Planner Agent for Android QA automation. \
Your job is to take a high-level goal and break it down into a JSON object with two fields:
- `subgoals`: a list of steps, where each step is an object with \"step\" and \"reference\".
- `reasoning`: a short explanation string.

IMPORTANT:
- Only respond with a valid JSON object.
- Do not include any extra commentary, markdown, or explanation outside the JSON.
- Use double quotes only (\"), not single quotes.";

const PLAN_SHAPE: &str = "\
{
  \"subgoals\": [
    {\"step\": \"<Step description>\", \"reference\": \"<Relevant UI Component or Activity>\"},
    {\"step\": \"<Another step>\", \"reference\": \"<Another component>\"}
  ],
  \"reasoning\": \"Brief reasoning for why these steps achieve the goal.\"
}";

/// Turns a goal into subgoals, and failed episodes into revised subgoals.
pub struct PlannerAgent {
    llm: RoleClient,
}

impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        "planner"
    }
}

impl PlannerAgent {
    pub fn new(llm: RoleClient) -> Self {
        Self { llm }
    }

    pub async fn plan(&self, goal: &str, task: Option<&str>) -> DroidQaResult<PlannerOutput> {
        let task_line = task.map(|t| format!("Task: {t}\n")).unwrap_or_default();
        let prompt = format!(
            "{task_line}Given this goal: \"{goal}\"\n\
             Generate a valid JSON object like this:\n{PLAN_SHAPE}"
        );
        let content = self.ask(prompt).await?;
        let plan = parse_plan(&content);
        tracing::debug!(goal = %goal, subgoals = plan.subgoals.len(), reasoning = %plan.reasoning, "plan parsed");
        Ok(plan)
    }

    pub async fn replan(
        &self,
        goal: &str,
        past_steps: &[StepLog],
        last_error: &str,
        task: Option<&str>,
    ) -> DroidQaResult<PlannerOutput> {
        let task_line = task.map(|t| format!("Original Task: {t}\n")).unwrap_or_default();
        let past = serde_json::to_string(past_steps)?;
        let prompt = format!(
            "We failed verifying the last step. Error: {last_error}\n\
             Past steps: {past}\n\
             {task_line}\
             Original goal: {goal}\n\n\
             Provide a revised JSON object containing only:\n\
             - `subgoals`: list of remaining steps (as objects with \"step\" and \"reference\")\n\
             - `reasoning`: a string\n\n\
             No commentary or extra text. Strict JSON only."
        );
        let content = self.ask(prompt).await?;
        let plan = parse_plan(&content);
        tracing::debug!(past_steps = past_steps.len(), subgoals = plan.subgoals.len(), "revised plan parsed");
        Ok(plan)
    }

    async fn ask(&self, prompt: String) -> DroidQaResult<String> {
        let content = self
            .llm
            .complete(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
            .await?;
        tracing::debug!(raw = %content, "planner raw LLM response");
        Ok(content)
    }
}

/// Lenient reply parsing. Anything unusable becomes an empty plan whose
/// `reasoning` says why.
pub fn parse_plan(content: &str) -> PlannerOutput {
    let Some(span) = outermost_object(content) else {
        tracing::error!(reply = %content, "planner returned non-JSON");
        return PlannerOutput::invalid("invalid");
    };

    let value = match parse_lenient(span) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, extracted = %span, "planner JSON parse error (even after quote fix)");
            return PlannerOutput::invalid(format!("parse_error: {e}"));
        }
    };

    match serde_json::from_value::<PlannerOutput>(value) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::error!(error = %e, "planner JSON does not match the plan shape");
            PlannerOutput::invalid(format!("schema_error: {e}"))
        }
    }
}
