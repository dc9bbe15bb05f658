//! Task planner.
//!
//! Takes a high-level goal and decomposes it into an ordered sequence of
//! steps using a chat model, and regenerates that plan when execution
//! reports a failure.  Malformed model output never surfaces as an error:
//! it is logged and turned into an empty [`Plan`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::llm::{ChatModel, Message};
use crate::state::HistoryEntry;

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// A single step within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// One-based position of the step.  Gaps and duplicates are not
    /// rejected.
    pub step_number: u32,

    /// Why this step is needed.
    pub reasoning: String,

    /// The high-level action to carry out.
    pub step: String,
}

impl PlanStep {
    pub fn new(step_number: u32, reasoning: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            step_number,
            reasoning: reasoning.into(),
            step: step.into(),
        }
    }
}

/// An ordered sequence of steps.  An empty plan is a legal value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Ordered list of steps to execute.
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    /// The plan returned whenever model output cannot be parsed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Pretty JSON in the `{"steps": [...]}` shape the model is asked for.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// System instruction for the initial planning call.
pub const PLANNER_SYSTEM_PROMPT: &str = r#"あなたはタスク計画を専門とするAIアシスタントです。
ユーザーの目標に基づいて、実行可能なステップからなる詳細な計画を作成してください。

重要な原則:
1. 各ステップは独立して実行可能で、明確な成果を持つこと
2. ステップ間の依存関係を考慮し、論理的な順序で配置すること
3. 各ステップは具体的で、実行者が迷わないよう明確に記述すること
4. 必要に応じて、エラーハンドリングや代替案を考慮すること

出力形式:
必ず以下のJSON形式で出力してください。他の形式や説明文は含めないでください。

```json
{
  "steps": [
    {
      "step_number": 1,
      "reasoning": "このステップが必要な理由や戦略的根拠",
      "step": "実行すべき高レベルタスクの明確な説明"
    },
    {
      "step_number": 2,
      "reasoning": "...",
      "step": "..."
    }
  ]
}
```"#;

/// Label prefixed to the goal in the user message.
const GOAL_LABEL: &str = "目標";

/// Build the replanning system instruction.
fn build_replan_prompt(goal: &str, current_plan: &str, history: &str, observation: &str) -> String {
    format!(
        r#"あなたはタスク計画を専門とするAIアシスタントです。
現在の計画の実行状況と観測結果に基づいて、計画を見直し、必要に応じて修正・更新してください。

重要な原則:
1. 既に成功したステップは変更しない
2. 失敗や予期しない結果に対して、適切な代替案を提供する
3. 新しい情報を活用して、より効果的な計画に更新する
4. 目標達成の可能性を最大化する

現在の状況:
- 元の目標: {goal}
- 現在の計画: {current_plan}
- 実行履歴: {history}
- 最新の観測: {observation}

出力形式:
必ず以下のJSON形式で出力してください。他の形式や説明文は含めないでください。

```json
{{
  "steps": [
    {{
      "step_number": 1,
      "reasoning": "このステップが必要な理由（既存ステップの場合は変更理由）",
      "step": "実行すべき高レベルタスクの明確な説明"
    }}
  ]
}}
```"#
    )
}

// ---------------------------------------------------------------------------
// Replan heuristic
// ---------------------------------------------------------------------------

/// Substrings that mark an observation as a failure.  Matched against the
/// lower-cased observation, so entries must be lower-case.
pub const REPLAN_KEYWORDS: &[&str] = &[
    "エラー",
    "失敗",
    "見つかりません",
    "アクセスできません",
    "error",
    "failed",
    "not found",
    "cannot access",
    "exception",
    "timeout",
    "unable to",
    "denied",
];

/// Whether `observation` reports a failure that calls for replanning.
///
/// Plain case-insensitive substring matching: "no error occurred" still
/// triggers.
pub fn needs_replan(observation: &str) -> bool {
    let lowered = observation.to_lowercase();
    REPLAN_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Generates and regenerates plans with a chat model.
#[derive(Clone)]
pub struct Planner {
    model: Arc<dyn ChatModel>,
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner").finish_non_exhaustive()
    }
}

impl Planner {
    /// Create a new planner bound to `model`.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// The model this planner calls.
    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// Decompose `goal` into a plan with a single model call.
    ///
    /// Returns an empty plan if the reply cannot be parsed.  Model-call
    /// failures propagate.
    pub async fn generate_initial_plan(&self, goal: &str) -> Result<Plan> {
        let messages = [
            Message::system(PLANNER_SYSTEM_PROMPT),
            Message::user(format!("{GOAL_LABEL}: {goal}")),
        ];

        let response = self.model.invoke(&messages).await?;
        let plan = parse_plan_response(&response.content);

        tracing::info!(goal = %goal, step_count = plan.len(), "initial plan generated");
        Ok(plan)
    }

    /// Produce a full replacement for `current_plan` given what happened so
    /// far.
    ///
    /// The returned plan replaces the old one entirely; nothing from
    /// `current_plan` is merged back in locally.
    pub async fn replan(
        &self,
        goal: &str,
        current_plan: &Plan,
        history: &[HistoryEntry],
        observation: &str,
    ) -> Result<Plan> {
        let current_plan_json = current_plan.to_json_pretty()?;
        let history_json = serde_json::to_string_pretty(history)?;

        let prompt = build_replan_prompt(goal, &current_plan_json, &history_json, observation);
        let messages = [Message::system(prompt)];

        let response = self.model.invoke(&messages).await?;
        let plan = parse_plan_response(&response.content);

        tracing::info!(
            goal = %goal,
            previous_steps = current_plan.len(),
            step_count = plan.len(),
            history_len = history.len(),
            "plan regenerated"
        );
        Ok(plan)
    }

    /// See [`needs_replan`].
    pub fn needs_replan(&self, observation: &str) -> bool {
        needs_replan(observation)
    }
}

/// Bind `model` into a new [`Planner`].
pub fn create_planner(model: Arc<dyn ChatModel>) -> Planner {
    Planner::new(model)
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PlanPayload {
    #[serde(default)]
    steps: Vec<PlanStep>,
}

/// Parse a model reply into a [`Plan`].
///
/// A ```` ```json ```` fence wins when present.  Otherwise the whole reply is
/// parsed, and only if that fails is the body of a bare or other-language
/// fence tried.  Any syntax error, missing field, or wrong value type
/// discards the whole reply and yields an empty plan.
pub fn parse_plan_response(response: &str) -> Plan {
    match parse_payload(response) {
        Ok(payload) => Plan::new(payload.steps),
        Err(e) => {
            tracing::warn!(error = %e, "could not parse plan from model reply; using empty plan");
            Plan::empty()
        }
    }
}

fn parse_payload(response: &str) -> serde_json::Result<PlanPayload> {
    if let Some(block) = json_fenced_block(response) {
        return serde_json::from_str(block);
    }

    let whole = serde_json::from_str(response.trim());
    if whole.is_err()
        && let Some(block) = bare_fenced_block(response)
    {
        return serde_json::from_str(block);
    }
    whole
}

/// Body of the first ```` ```json ```` fence.
fn json_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    Some(until_closing_fence(&text[start..]))
}

/// Body of the first fence of any kind, skipping a language tag such as
/// ```` ```JSON ```` or ```` ```javascript ````.
fn bare_fenced_block(text: &str) -> Option<&str> {
    let after = &text[text.find("```")? + 3..];
    let body = match after.find('\n') {
        Some(nl) if after[..nl].chars().all(|c| c.is_ascii_alphanumeric()) => &after[nl + 1..],
        _ => after,
    };
    Some(until_closing_fence(body))
}

fn until_closing_fence(body: &str) -> &str {
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fence_body() {
        let text = "以下が計画です:\n```json\n{\"steps\": []}\n```\nthanks";
        assert_eq!(json_fenced_block(text), Some(r#"{"steps": []}"#));
        assert_eq!(json_fenced_block("{\"steps\": []}"), None);
    }

    #[test]
    fn json_fence_without_closing_fence_takes_rest() {
        let text = "```json\n{\"steps\": []}";
        assert_eq!(json_fenced_block(text), Some(r#"{"steps": []}"#));
    }

    #[test]
    fn bare_fence_body() {
        assert_eq!(bare_fenced_block("```\n{\"steps\": []}\n```"), Some(r#"{"steps": []}"#));
        assert_eq!(bare_fenced_block("```JSON\n{\"steps\": []}\n```"), Some(r#"{"steps": []}"#));
        assert_eq!(bare_fenced_block("{\"steps\": []}"), None);
    }

    #[test]
    fn parse_plan_in_bare_fence() {
        let response = "計画:\n```\n{\"steps\": [{\"step_number\": 1, \"reasoning\": \"r\", \"step\": \"s\"}]}\n```";
        assert_eq!(parse_plan_response(response), Plan::new(vec![PlanStep::new(1, "r", "s")]));
    }

    #[test]
    fn bare_json_with_backticks_in_values() {
        let response = r#"{"steps": [{"step_number": 1, "reasoning": "show the command", "step": "Run ```ls -la``` in the terminal"}]}"#;
        let plan = parse_plan_response(response);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.steps[0].step, "Run ```ls -la``` in the terminal");
    }

    #[test]
    fn parse_fenced_plan() {
        let response = r#"以下が計画です:

```json
{
  "steps": [
    {
      "step_number": 1,
      "reasoning": "最初にページにアクセスする必要がある",
      "step": "https://example.comにナビゲート"
    },
    {
      "step_number": 2,
      "reasoning": "検索を実行するため",
      "step": "検索ボックスにキーワードを入力"
    }
  ]
}
```"#;

        let plan = parse_plan_response(response);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[0].step_number, 1);
        assert_eq!(plan.steps[0].reasoning, "最初にページにアクセスする必要がある");
        assert_eq!(plan.steps[1].step_number, 2);
        assert_eq!(plan.steps[1].step, "検索ボックスにキーワードを入力");
    }

    #[test]
    fn parse_bare_plan() {
        let response = r#"{"steps": [{"step_number": 1, "reasoning": "理由", "step": "アクション"}]}"#;
        let plan = parse_plan_response(response);
        assert_eq!(plan, Plan::new(vec![PlanStep::new(1, "理由", "アクション")]));
    }

    #[test]
    fn invalid_json_yields_empty_plan() {
        assert!(parse_plan_response("これは無効なJSON").is_empty());
        assert!(parse_plan_response("").is_empty());
        assert!(parse_plan_response("```json\n{\"steps\": [\n```").is_empty());
    }

    #[test]
    fn missing_field_discards_every_step() {
        let response = r#"{"steps": [
            {"step_number": 1, "reasoning": "ok", "step": "first"},
            {"step_number": 2, "reasoning": "no step field"}
        ]}"#;
        assert!(parse_plan_response(response).is_empty());
    }

    #[test]
    fn wrong_value_type_yields_empty_plan() {
        let response = r#"{"steps": [{"step_number": "one", "reasoning": "r", "step": "s"}]}"#;
        assert!(parse_plan_response(response).is_empty());

        let response = r#"{"steps": {"step_number": 1}}"#;
        assert!(parse_plan_response(response).is_empty());
    }

    #[test]
    fn missing_steps_key_is_an_empty_plan() {
        assert!(parse_plan_response(r#"{"plan": []}"#).is_empty());
    }

    #[test]
    fn numbering_gaps_are_accepted() {
        let response = r#"{"steps": [
            {"step_number": 3, "reasoning": "a", "step": "x"},
            {"step_number": 3, "reasoning": "b", "step": "y"}
        ]}"#;
        let plan = parse_plan_response(response);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[1].step_number, 3);
    }

    #[test]
    fn serialized_plan_parses_back() {
        let plan = Plan::new(vec![
            PlanStep::new(1, "理由1", "ステップ1"),
            PlanStep::new(2, "reason \"quoted\"", "step 2"),
        ]);
        let fenced = format!("```json\n{}\n```", plan.to_json_pretty().unwrap());
        assert_eq!(parse_plan_response(&fenced), plan);
    }

    #[test]
    fn plan_json_shape() {
        let plan = Plan::new(vec![PlanStep::new(1, "理由1", "ステップ1")]);
        let v: serde_json::Value = serde_json::from_str(&plan.to_json_pretty().unwrap()).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "steps": [{"step_number": 1, "reasoning": "理由1", "step": "ステップ1"}]
            })
        );
        // Non-ASCII text is written verbatim, not escaped.
        assert!(plan.to_json_pretty().unwrap().contains("ステップ1"));
    }

    #[test]
    fn needs_replan_matches_failure_keywords() {
        let failures = [
            "エラーが発生しました",
            "操作が失敗しました",
            "ページが見つかりません",
            "アクセスできません",
            "An error occurred",
            "AN ERROR OCCURRED",
            "Operation failed",
            "Page not found",
            "Cannot access the resource",
            "Exception raised",
            "Request timeout",
            "Unable to complete",
            "Permission denied",
        ];
        for observation in failures {
            assert!(needs_replan(observation), "expected replan for {observation:?}");
        }
    }

    #[test]
    fn needs_replan_ignores_success() {
        let successes = [
            "正常に完了しました",
            "ページが表示されました",
            "データを取得しました",
            "Successfully completed",
            "completed successfully",
            "Page loaded",
            "Data retrieved",
            "",
        ];
        for observation in successes {
            assert!(!needs_replan(observation), "unexpected replan for {observation:?}");
        }
    }

    #[test]
    fn needs_replan_has_no_negation_handling() {
        assert!(needs_replan("no error occurred"));
    }

    #[test]
    fn replan_prompt_interpolates_all_inputs() {
        let prompt = build_replan_prompt("goal-x", "{\"steps\": []}", "[]", "obs-y");
        assert!(prompt.contains("- 元の目標: goal-x"));
        assert!(prompt.contains("- 現在の計画: {\"steps\": []}"));
        assert!(prompt.contains("- 実行履歴: []"));
        assert!(prompt.contains("- 最新の観測: obs-y"));
        assert!(prompt.contains("\"step_number\": 1"));
        assert!(!prompt.contains("{{"));
    }
}
