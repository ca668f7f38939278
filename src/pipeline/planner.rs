//! Planner：请求 → 有序动作列表 + 展示用步骤
//!
//! 两个可互换的策略：GenerativePlanner（LLM，输出经注册表过滤）与 KeywordPlanner（确定性触发词）。
//! Planner 先试生成式，返回 None 时落到关键词规划；两者都按 max_actions 截断，plan 永不失败。

use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::{plan_response_schema_json, ActionKind, ActionRegistry};
use crate::actions::params::{read_int, read_str, read_str_list};
use crate::actions::schema::PlanResponse;
use crate::config::PlannerSection;
use crate::core::types::{Plan, PlannedAction, ProposedAction, RequestContext};
use crate::llm::{extract_json, LlmClient};
use crate::memory::{recent_turns, Message};
use crate::pipeline::intent::{analyze, Intent, TriggerSets};

/// 隐式创建项目时的默认标题
pub const DEFAULT_PROJECT_TITLE: &str = "AI Agent Project";
/// 请求数量上限（与 save / link 的 top_k 范围一致）
const MAX_TOP_K: usize = 20;
const MAX_SEARCH_LIMIT: usize = 50;
/// 解说目标论文的检索条数
const EXPLAIN_SEARCH_LIMIT: usize = 3;

/// 规划输入
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub message: &'a str,
    pub history: &'a [Message],
    pub context: &'a RequestContext,
}

/// 规划策略：能给出计划则返回 Some，否则 None（由调用方换下一个策略）
#[async_trait]
pub trait PlanStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_plan(&self, request: &PlanRequest<'_>) -> Option<Plan>;
}

/// 展示用的单步描述
pub fn describe_action(action: &PlannedAction) -> String {
    let p = &action.params;
    let papers = |target: &str| -> String {
        if let Some(ids) = read_str_list(p, "paper_ids") {
            format!("{} papers {target}", ids.len())
        } else if let Some(k) = read_int(p, "top_k") {
            format!("the top {k} results {target}")
        } else {
            format!("the referenced paper {target}")
        }
    };
    match action.action {
        ActionKind::SearchPapers => format!(
            "Search {} for \"{}\"",
            read_str(p, "source").unwrap_or("papers"),
            read_str(p, "query").unwrap_or_default()
        ),
        ActionKind::SelectResult => format!("Select result #{}", read_int(p, "rank").unwrap_or(1)),
        ActionKind::SaveToLibrary => format!("Save {}", papers("to the library")),
        ActionKind::CreateProject => {
            format!("Create project \"{}\"", read_str(p, "title").unwrap_or_default())
        }
        ActionKind::AddPaperToProject => match read_str(p, "project_id") {
            Some(id) => format!("Add {}", papers(&format!("to project {id}"))),
            None => format!("Add {}", papers("to the project")),
        },
        ActionKind::AnswerQuestion => match read_str(p, "scope") {
            Some("paper") => format!(
                "Explain {} for \"{}\"",
                read_str(p, "paper_id").unwrap_or("the selected paper"),
                read_str(p, "question").unwrap_or_default()
            ),
            _ => format!(
                "Answer \"{}\" from the library",
                read_str(p, "question").unwrap_or_default()
            ),
        },
        ActionKind::CreateMemo => match read_str(p, "paper_id") {
            Some(id) => format!("Write a summary memo for {id}"),
            None if p.contains_key("paper_ids") || p.contains_key("top_k") => {
                format!("Write summary memos for {}", papers("in reading order"))
            }
            None => "Write summary memos for the referenced papers".to_string(),
        },
        ActionKind::SuggestKeywords => match read_str(p, "paper_id") {
            Some(id) => format!("Suggest keywords for {id}"),
            None => "Suggest keywords for the referenced paper".to_string(),
        },
        ActionKind::FindRelated => match read_str(p, "paper_id") {
            Some(id) => format!("Find papers related to {id}"),
            None => "Find papers related to the referenced paper".to_string(),
        },
        ActionKind::CompileTex => format!(
            "Compile {}",
            read_str(p, "entry_file").unwrap_or(crate::actions::tex::DEFAULT_ENTRY_FILE)
        ),
    }
}

fn describe_all(actions: &[PlannedAction]) -> Vec<String> {
    actions.iter().map(describe_action).collect()
}

fn chain_summary(actions: &[PlannedAction]) -> String {
    actions
        .iter()
        .map(|a| a.action.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// 生成式规划：约束 prompt（Action Catalog + 能力文档 + 响应 Schema），解析 JSON 并过滤未知动作
pub struct GenerativePlanner {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ActionRegistry>,
    capability_doc: Option<String>,
    max_actions: usize,
    history_turns: usize,
}

impl GenerativePlanner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ActionRegistry>,
        capability_doc: Option<String>,
        max_actions: usize,
        history_turns: usize,
    ) -> Self {
        Self {
            llm,
            registry,
            capability_doc,
            max_actions,
            history_turns,
        }
    }

    pub fn system_prompt(&self, context: &RequestContext) -> String {
        let mut system = String::from(
            "You are the planning component of a research-paper assistant. \
             Turn the user's request into an ordered list of actions from the Action Catalog.",
        );
        system.push_str("\n\nPlanning Rules:\n");
        system.push_str("1) Return ONLY one valid JSON object matching the Response Schema.\n");
        system.push_str("2) Use only action names listed in the Action Catalog; never invent actions.\n");
        system.push_str("3) params must satisfy the action's parameters schema.\n");
        system.push_str(
            "4) Actions run in order and share state: search results, the last referenced paper and the current project are reused implicitly by later actions.\n",
        );
        system.push_str(&format!("5) Use at most {} actions.\n", self.max_actions));
        system.push_str("6) If nothing else fits, plan a single answer_question action.\n");

        if context.project_id.is_some() || context.has_papers() {
            system.push_str("\nCurrent Context:\n");
            if let Some(id) = &context.project_id {
                system.push_str(&format!("- current project: {id}\n"));
            }
            if let Some(id) = &context.paper_id {
                system.push_str(&format!("- current paper: {id}\n"));
            }
            if !context.papers.is_empty() {
                let listed: Vec<String> = context
                    .papers
                    .iter()
                    .map(|p| format!("{} ({})", p.paper_id, p.title))
                    .collect();
                system.push_str(&format!("- papers from earlier turns: {}\n", listed.join("; ")));
            }
        }

        if let Some(doc) = self.capability_doc.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            system.push_str("\nCapabilities:\n");
            system.push_str(doc);
            system.push('\n');
        }

        system.push_str("\nAction Catalog:\n");
        system.push_str(&self.registry.catalog_json());
        system.push_str("\n\nResponse Schema:\n");
        system.push_str(&plan_response_schema_json());
        system
    }
}

#[async_trait]
impl PlanStrategy for GenerativePlanner {
    fn name(&self) -> &'static str {
        "generative"
    }

    async fn try_plan(&self, request: &PlanRequest<'_>) -> Option<Plan> {
        let mut messages = vec![Message::system(self.system_prompt(request.context))];
        messages.extend(recent_turns(request.history, self.history_turns));
        messages.push(Message::user(request.message));

        let reply = match self.llm.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(llm = self.llm.name(), error = %e, "generative planning failed");
                return None;
            }
        };
        let Some(json) = extract_json(&reply) else {
            tracing::warn!("generative plan contains no JSON object");
            return None;
        };
        let response: PlanResponse = match serde_json::from_str(json) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "generative plan is not valid plan JSON");
                return None;
            }
        };

        let proposed = response.actions.len();
        let mut actions: Vec<PlannedAction> = response
            .actions
            .iter()
            .filter_map(|a| self.registry.admit(a))
            .collect();
        if actions.is_empty() {
            tracing::warn!(proposed, "generative plan has no allowed actions");
            return None;
        }
        let dropped = proposed - actions.len();
        if dropped > 0 {
            tracing::info!(dropped, "dropped disallowed actions from generative plan");
        }
        actions.truncate(self.max_actions);

        let steps = if dropped == 0 && response.steps.len() == actions.len() {
            response.steps
        } else {
            describe_all(&actions)
        };
        let summary = match response.summary.trim() {
            "" => chain_summary(&actions),
            s => s.to_string(),
        };
        Some(Plan {
            summary,
            steps,
            actions,
        })
    }
}

/// 确定性关键词规划：每个命中的意图按优先级追加一个动作；无意图时规划单个问答
#[derive(Debug, Clone)]
pub struct KeywordPlanner {
    triggers: TriggerSets,
    attach_top_k: usize,
    default_source: String,
    search_limit: usize,
    max_actions: usize,
}

impl KeywordPlanner {
    pub fn new(cfg: &PlannerSection) -> Self {
        Self {
            triggers: cfg.triggers.clone(),
            attach_top_k: cfg.attach_top_k,
            default_source: cfg.default_source.clone(),
            search_limit: cfg.search_limit,
            max_actions: cfg.max_actions,
        }
    }

    /// 纯函数：相同输入总是得到相同计划
    ///
    /// 依赖论文的意图（保存、笔记、关键词、相关论文）只在本次请求有论文来源时规划：
    /// 检索、解说目标、或请求上下文中的论文；编译需要新建或上下文中的项目。
    pub fn plan_for(&self, request: &PlanRequest<'_>) -> Plan {
        let message = request.message.trim();
        let context = request.context;
        let analysis = analyze(message, &self.triggers);
        let explain_target = analysis
            .explain_target
            .as_deref()
            .filter(|_| analysis.has(Intent::Question));
        let searching = analysis.has(Intent::Search) && explain_target.is_none();
        let creating = analysis.has(Intent::CreateContainer) && explain_target.is_none();
        let count = analysis.count.unwrap_or(self.attach_top_k).clamp(1, MAX_TOP_K);
        let source = analysis.source.clone().unwrap_or_else(|| self.default_source.clone());

        let has_paper = searching || explain_target.is_some() || context.has_papers();
        let has_project = creating || context.project_id.is_some();

        let mut intents = analysis.intents.clone();
        // 检索并新建项目时，结果总要放进项目
        if searching && creating && !intents.contains(&Intent::Save) {
            intents.push(Intent::Save);
            intents.sort();
        }

        let mut actions = Vec::new();
        if let Some(target) = explain_target {
            // 解说：检索点名的论文，选中第一条并保存，再针对该论文回答
            actions.push(
                PlannedAction::new(ActionKind::SearchPapers)
                    .with("query", target)
                    .with("source", source.clone())
                    .with("limit", EXPLAIN_SEARCH_LIMIT),
            );
            actions.push(PlannedAction::new(ActionKind::SelectResult).with("rank", 1));
            actions.push(PlannedAction::new(ActionKind::SaveToLibrary));
            actions.push(
                PlannedAction::new(ActionKind::AnswerQuestion)
                    .with("question", message)
                    .with("scope", "paper"),
            );
            intents.retain(|i| {
                !matches!(
                    i,
                    Intent::Search | Intent::CreateContainer | Intent::Save | Intent::Question
                )
            });
        }

        for intent in intents {
            let usable = match intent {
                Intent::Save | Intent::Keywords | Intent::Related => has_paper,
                Intent::Memo => has_paper || context.project_id.is_some(),
                Intent::Compile => has_project,
                _ => true,
            };
            if !usable {
                tracing::debug!(?intent, "skipping intent without a source to act on");
                continue;
            }
            let action = match intent {
                Intent::Search => PlannedAction::new(ActionKind::SearchPapers)
                    .with("query", analysis.query.clone())
                    .with("source", source.clone())
                    .with("limit", self.search_limit.max(count).min(MAX_SEARCH_LIMIT)),
                Intent::CreateContainer => PlannedAction::new(ActionKind::CreateProject)
                    .with(
                        "title",
                        analysis
                            .project_title
                            .clone()
                            .unwrap_or_else(|| DEFAULT_PROJECT_TITLE.to_string()),
                    )
                    .with(
                        "description",
                        format!(
                            "AI Agent generated from: {}",
                            message.chars().take(120).collect::<String>()
                        ),
                    ),
                Intent::Save => {
                    let kind = if has_project {
                        ActionKind::AddPaperToProject
                    } else {
                        ActionKind::SaveToLibrary
                    };
                    let action = PlannedAction::new(kind);
                    if searching {
                        action.with("top_k", count)
                    } else if context.paper_id.is_none() && !context.papers.is_empty() {
                        action.with("paper_ids", context_paper_ids(context))
                    } else {
                        action
                    }
                }
                Intent::Memo => {
                    let action = PlannedAction::new(ActionKind::CreateMemo);
                    if searching {
                        action.with("top_k", count)
                    } else {
                        action
                    }
                }
                Intent::Keywords => PlannedAction::new(ActionKind::SuggestKeywords),
                Intent::Related => PlannedAction::new(ActionKind::FindRelated),
                Intent::Compile => PlannedAction::new(ActionKind::CompileTex),
                Intent::Question => {
                    PlannedAction::new(ActionKind::AnswerQuestion).with("question", message)
                }
            };
            actions.push(action);
        }

        if actions.is_empty() {
            actions.push(PlannedAction::new(ActionKind::AnswerQuestion).with("question", message));
        }
        actions.truncate(self.max_actions.max(1));

        Plan {
            summary: chain_summary(&actions),
            steps: describe_all(&actions),
            actions,
        }
    }
}

fn context_paper_ids(context: &RequestContext) -> Vec<String> {
    context.papers.iter().map(|p| p.paper_id.clone()).collect()
}

#[async_trait]
impl PlanStrategy for KeywordPlanner {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn try_plan(&self, request: &PlanRequest<'_>) -> Option<Plan> {
        Some(self.plan_for(request))
    }
}

/// 规划结果及所用策略名
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub strategy: &'static str,
}

/// 组合策略：生成式（可选）→ 关键词
pub struct Planner {
    registry: Arc<ActionRegistry>,
    generative: Option<GenerativePlanner>,
    keyword: KeywordPlanner,
    max_actions: usize,
}

impl Planner {
    pub fn new(registry: Arc<ActionRegistry>, keyword: KeywordPlanner, max_actions: usize) -> Self {
        Self {
            registry,
            generative: None,
            keyword,
            max_actions,
        }
    }

    pub fn with_generative(mut self, generative: GenerativePlanner) -> Self {
        self.generative = Some(generative);
        self
    }

    pub fn has_generative(&self) -> bool {
        self.generative.is_some()
    }

    /// 总是返回一个计划
    pub async fn plan(&self, request: &PlanRequest<'_>) -> PlanOutcome {
        if let Some(generative) = &self.generative {
            if let Some(plan) = generative.try_plan(request).await {
                return PlanOutcome {
                    plan,
                    strategy: generative.name(),
                };
            }
            tracing::info!("falling back to keyword planner");
        }
        PlanOutcome {
            plan: self.keyword.plan_for(request),
            strategy: self.keyword.name(),
        }
    }

    /// 调用方提供的动作列表：同样经注册表过滤并截断
    pub fn plan_from_override(&self, proposed: &[ProposedAction]) -> PlanOutcome {
        let mut actions: Vec<PlannedAction> =
            proposed.iter().filter_map(|a| self.registry.admit(a)).collect();
        actions.truncate(self.max_actions);
        let summary = format!(
            "Caller-supplied plan ({} of {} actions accepted)",
            actions.len(),
            proposed.len()
        );
        PlanOutcome {
            plan: Plan {
                summary,
                steps: describe_all(&actions),
                actions,
            },
            strategy: "override",
        }
    }
}
