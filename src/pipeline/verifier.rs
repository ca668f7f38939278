//! Verifier：判断请求是否被满足
//!
//! 生成式判定（LLM，受 {verdict, summary, achieved, missing} 约束）优先；不可用或输出无效时
//! 回落到按动作类型汇总的启发式判定。仅规划时直接返回 not_executed。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::actions::ActionKind;
use crate::core::types::{Plan, StepResult, StepStatus, Verdict, Verification};
use crate::llm::{extract_json, LlmClient};
use crate::memory::Message;
use crate::pipeline::planner::describe_action;

/// 判定输入
#[derive(Debug, Clone, Copy)]
pub struct VerifyRequest<'a> {
    pub message: &'a str,
    pub plan: &'a Plan,
    pub steps: &'a [StepResult],
    pub artifacts: &'a Map<String, Value>,
}

#[async_trait]
pub trait VerifyStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_verify(&self, request: &VerifyRequest<'_>) -> Option<Verification>;
}

fn truncated(mut items: Vec<String>, max: usize) -> Vec<String> {
    items.retain(|s| !s.trim().is_empty());
    items.truncate(max);
    items
}

/// LLM 回复中的判定（verdict 先按字符串接收再归一）
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVerification {
    verdict: String,
    summary: String,
    achieved: Vec<String>,
    missing: Vec<String>,
}

/// met / partial / not_met 以外的值一律视为 partial
fn coerce_verdict(raw: &str) -> Verdict {
    match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
        "met" => Verdict::Met,
        "not_met" => Verdict::NotMet,
        _ => Verdict::Partial,
    }
}

const VERIFY_PROMPT: &str = "You verify whether an assistant fulfilled a user's request. \
Compare the request with the executed steps and artifacts. \
Return ONLY one JSON object: {\"verdict\": \"met\" | \"partial\" | \"not_met\", \
\"summary\": string, \"achieved\": [string], \"missing\": [string]}.";

pub struct GenerativeVerifier {
    llm: Arc<dyn LlmClient>,
    max_list_items: usize,
}

impl GenerativeVerifier {
    pub fn new(llm: Arc<dyn LlmClient>, max_list_items: usize) -> Self {
        Self { llm, max_list_items }
    }

    fn user_prompt(request: &VerifyRequest<'_>) -> String {
        let evidence = json!({
            "request": request.message,
            "plan": {
                "summary": request.plan.summary,
                "steps": request.plan.steps,
            },
            "steps": request.steps,
            "artifacts": request.artifacts,
        });
        serde_json::to_string_pretty(&evidence).unwrap_or_else(|_| evidence.to_string())
    }
}

#[async_trait]
impl VerifyStrategy for GenerativeVerifier {
    fn name(&self) -> &'static str {
        "generative"
    }

    async fn try_verify(&self, request: &VerifyRequest<'_>) -> Option<Verification> {
        let messages = vec![
            Message::system(VERIFY_PROMPT),
            Message::user(Self::user_prompt(request)),
        ];
        let reply = match self.llm.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(llm = self.llm.name(), error = %e, "generative verification failed");
                return None;
            }
        };
        let raw: RawVerification = match extract_json(&reply).map(serde_json::from_str::<RawVerification>) {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "verification reply is not valid JSON");
                return None;
            }
            None => {
                tracing::warn!("verification reply contains no JSON object");
                return None;
            }
        };
        Some(Verification {
            verdict: coerce_verdict(&raw.verdict),
            summary: raw.summary.trim().to_string(),
            achieved: truncated(raw.achieved, self.max_list_items),
            missing: truncated(raw.missing, self.max_list_items),
        })
    }
}

/// 已完成 / 未完成时的固定描述
fn phrases(kind: ActionKind) -> (&'static str, &'static str) {
    match kind {
        ActionKind::SearchPapers => ("Search results retrieved", "Search did not return results"),
        ActionKind::SelectResult => ("A search result was selected", "No search result was selected"),
        ActionKind::SaveToLibrary => ("Papers saved to the library", "Papers were not saved to the library"),
        ActionKind::CreateProject => ("Project created", "Project was not created"),
        ActionKind::AddPaperToProject => (
            "Papers added to the project",
            "Papers were not added to the project",
        ),
        ActionKind::AnswerQuestion => ("Question answered", "Question was not answered"),
        ActionKind::CreateMemo => ("Summary memos created", "Memos were not created"),
        ActionKind::SuggestKeywords => ("Keywords applied", "Keywords were not applied"),
        ActionKind::FindRelated => ("Related papers found", "Related papers were not found"),
        ActionKind::CompileTex => ("LaTeX compiled", "LaTeX compilation did not succeed"),
    }
}

/// 计划动作的最终结果：重试结果覆盖原始失败，并记下是否经过重试才完成
#[derive(Debug, Clone, Copy)]
struct Outcome {
    kind: ActionKind,
    completed: bool,
    recovered: bool,
}

fn final_outcomes(steps: &[StepResult]) -> Vec<Outcome> {
    let mut outcomes: Vec<Outcome> = Vec::new();
    for step in steps {
        match step.status {
            StepStatus::Skipped => {}
            _ if step.retry => {
                if let Some(last) = outcomes.last_mut() {
                    last.completed = step.is_completed();
                    last.recovered = step.is_completed();
                }
            }
            _ => outcomes.push(Outcome {
                kind: step.action,
                completed: step.is_completed(),
                recovered: false,
            }),
        }
    }
    outcomes
}

/// 启发式判定：有完成且没有任何失败步骤为 met（重试后才完成也算出现过失败），
/// 有完成也有失败或未执行为 partial，没有完成为 not_met
#[derive(Debug, Clone)]
pub struct HeuristicVerifier {
    max_list_items: usize,
}

impl HeuristicVerifier {
    pub fn new(max_list_items: usize) -> Self {
        Self { max_list_items }
    }

    pub fn judge(&self, request: &VerifyRequest<'_>) -> Verification {
        let outcomes = final_outcomes(request.steps);
        let completed = outcomes.iter().filter(|o| o.completed).count();
        let recovered = outcomes.iter().filter(|o| o.recovered).count();
        let failed = outcomes.len() - completed;
        let total = request.plan.actions.len();
        let unattempted = &request.plan.actions[outcomes.len().min(total)..];

        let mut achieved = Vec::new();
        let mut missing = Vec::new();
        for outcome in &outcomes {
            let (done, not_done) = phrases(outcome.kind);
            let (list, phrase) = match (outcome.completed, outcome.recovered) {
                (true, false) => (&mut achieved, done.to_string()),
                (true, true) => (&mut achieved, format!("{done} (after a retry)")),
                (false, _) => (&mut missing, not_done.to_string()),
            };
            if !list.contains(&phrase) {
                list.push(phrase);
            }
        }
        for action in unattempted {
            missing.push(format!("Not attempted: {}", describe_action(action)));
        }

        let verdict = if completed == 0 {
            Verdict::NotMet
        } else if failed == 0 && recovered == 0 && unattempted.is_empty() {
            Verdict::Met
        } else {
            Verdict::Partial
        };
        let mut summary = format!("{completed} of {total} planned actions completed");
        if recovered > 0 {
            summary.push_str(&format!(", {recovered} only after a retry"));
        }
        if failed > 0 {
            summary.push_str(&format!(", {failed} failed"));
        }
        if !unattempted.is_empty() {
            summary.push_str(&format!(", {} not attempted", unattempted.len()));
        }
        summary.push('.');

        Verification {
            verdict,
            summary,
            achieved: truncated(achieved, self.max_list_items),
            missing: truncated(missing, self.max_list_items),
        }
    }
}

#[async_trait]
impl VerifyStrategy for HeuristicVerifier {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn try_verify(&self, request: &VerifyRequest<'_>) -> Option<Verification> {
        Some(self.judge(request))
    }
}

/// 组合判定：仅规划 → not_executed；否则生成式（可选）→ 启发式
pub struct Verifier {
    generative: Option<GenerativeVerifier>,
    heuristic: HeuristicVerifier,
}

impl Verifier {
    pub fn new(max_list_items: usize) -> Self {
        Self {
            generative: None,
            heuristic: HeuristicVerifier::new(max_list_items),
        }
    }

    pub fn with_generative(mut self, generative: GenerativeVerifier) -> Self {
        self.generative = Some(generative);
        self
    }

    pub fn not_executed(plan: &Plan) -> Verification {
        Verification {
            verdict: Verdict::NotExecuted,
            summary: format!(
                "Plan only: {} actions were planned and none were executed.",
                plan.actions.len()
            ),
            achieved: Vec::new(),
            missing: Vec::new(),
        }
    }

    pub async fn verify(&self, request: &VerifyRequest<'_>, executed: bool) -> Verification {
        if !executed {
            return Self::not_executed(request.plan);
        }
        if let Some(generative) = &self.generative {
            if let Some(verification) = generative.try_verify(request).await {
                tracing::info!(verdict = verification.verdict.as_str(), "verified by llm");
                return verification;
            }
        }
        let verification = self.heuristic.judge(request);
        tracing::info!(verdict = verification.verdict.as_str(), "verified by heuristic");
        verification
    }
}
