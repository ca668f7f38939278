//! 编排数据模型：PlannedAction / Plan / StepResult / Verification / 请求与响应
//!
//! Plan 与 PlannedAction 创建后不再修改；重试会生成新的 PlannedAction 并追加新的 StepResult。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::actions::ActionKind;
use crate::memory::Message;
use crate::services::PaperSummary;

/// 动作参数：开放的键值表，由各动作在执行时校验
pub type Params = Map<String, Value>;

/// 重试步骤 detail 的前缀
pub const RETRY_PREFIX: &str = "retry: ";
/// 重试仍失败后追加的终止标记 detail
pub const HALT_DETAIL: &str = "execution halted after retry failure";
/// 调用方放弃请求后追加的终止标记 detail
pub const CANCEL_DETAIL: &str = "execution cancelled";

/// 规划出的单个动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub action: ActionKind,
    #[serde(default)]
    pub params: Params,
}

impl PlannedAction {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            params: Params::new(),
        }
    }

    /// 追加一个参数（构造阶段使用）
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// 尚未经过注册表过滤的动作提议（LLM 输出或调用方覆盖列表）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProposedAction {
    /// 动作名，必须出现在 Action Catalog 中
    pub action: String,
    /// 动作参数，字段见 Action Catalog
    #[serde(default)]
    pub params: Value,
}

/// 一次请求的执行计划
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub summary: String,
    /// 仅用于展示的步骤描述
    pub steps: Vec<String>,
    pub actions: Vec<PlannedAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
}

/// 单次动作尝试的结果记录；追加到步骤日志后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub action: ActionKind,
    pub status: StepStatus,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 是否为替代动作的重试
    #[serde(default)]
    pub retry: bool,
}

impl StepResult {
    pub fn completed(action: ActionKind, detail: impl Into<String>, output: Map<String, Value>) -> Self {
        Self {
            action,
            status: StepStatus::Completed,
            detail: detail.into(),
            output: Some(output),
            error: None,
            retry: false,
        }
    }

    pub fn failed(action: ActionKind, detail: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            action,
            status: StepStatus::Failed,
            detail: detail.into(),
            output: None,
            error: Some(error.into()),
            retry: false,
        }
    }

    /// 重试失败后的终止标记
    pub fn halted(action: ActionKind) -> Self {
        Self::skipped(action, HALT_DETAIL)
    }

    /// 取消后的终止标记
    pub fn cancelled(action: ActionKind) -> Self {
        Self::skipped(action, CANCEL_DETAIL)
    }

    fn skipped(action: ActionKind, detail: &str) -> Self {
        Self {
            action,
            status: StepStatus::Skipped,
            detail: detail.to_string(),
            output: None,
            error: None,
            retry: false,
        }
    }

    /// 标记为重试结果（detail 加前缀）
    pub fn into_retry(mut self) -> Self {
        self.retry = true;
        self.detail = format!("{RETRY_PREFIX}{}", self.detail);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    pub fn is_halt_marker(&self) -> bool {
        self.status == StepStatus::Skipped && self.detail == HALT_DETAIL
    }

    /// 从 output 中读取字符串字段
    pub fn output_str(&self, key: &str) -> Option<&str> {
        self.output.as_ref()?.get(key)?.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Met,
    Partial,
    NotMet,
    NotExecuted,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Met => "met",
            Verdict::Partial => "partial",
            Verdict::NotMet => "not_met",
            Verdict::NotExecuted => "not_executed",
        }
    }
}

/// 对"请求是否被满足"的判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub verdict: Verdict,
    pub summary: String,
    pub achieved: Vec<String>,
    pub missing: Vec<String>,
}

/// 前几轮回复中列出的论文（客户端回传）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPaper {
    pub paper_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub venue: String,
}

impl ContextPaper {
    pub fn to_summary(&self) -> PaperSummary {
        PaperSummary {
            title: self.title.clone(),
            authors: self.authors.clone(),
            year: self.year,
            venue: self.venue.clone(),
            ..PaperSummary::from_id(self.paper_id.as_str())
        }
    }
}

/// 请求附带的上下文（当前页面所在的项目 / 论文，以及前几轮列出的论文）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub paper_id: Option<String>,
    #[serde(default, alias = "context_papers")]
    pub papers: Vec<ContextPaper>,
}

impl RequestContext {
    /// 上下文中是否带有可操作的论文
    pub fn has_papers(&self) -> bool {
        self.paper_id.is_some() || !self.papers.is_empty()
    }
}

fn default_execute() -> bool {
    true
}

/// 编排入口请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Message>,
    /// false 时只规划不执行
    #[serde(default = "default_execute")]
    pub execute: bool,
    #[serde(default)]
    pub context: RequestContext,
    /// 调用方提供的动作列表，存在时跳过规划
    #[serde(default)]
    pub actions_override: Option<Vec<ProposedAction>>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            execute: true,
            context: RequestContext::default(),
            actions_override: None,
        }
    }

    pub fn plan_only(mut self) -> Self {
        self.execute = false;
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_actions(mut self, actions: Vec<ProposedAction>) -> Self {
        self.actions_override = Some(actions);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Project,
    Paper,
    Search,
}

/// 回复后建议跳转的位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub id: String,
}

impl Target {
    pub fn project(id: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Project,
            id: id.into(),
        }
    }

    pub fn paper(id: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Paper,
            id: id.into(),
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Search,
            id: query.into(),
        }
    }

    /// 前端路由路径
    pub fn path(&self) -> String {
        match self.kind {
            TargetKind::Project => format!("/projects/{}", self.id),
            TargetKind::Paper => format!("/papers/{}", self.id),
            TargetKind::Search => {
                let q: String = url::form_urlencoded::byte_serialize(self.id.as_bytes()).collect();
                format!("/search?q={q}")
            }
        }
    }
}

/// 编排出口响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub summary: String,
    pub plan: Vec<String>,
    pub actions: Vec<PlannedAction>,
    pub steps: Vec<StepResult>,
    pub artifacts: Map<String, Value>,
    pub target: Option<Target>,
    pub target_path: Option<String>,
    pub verification: Verification,
    /// 未尝试的动作（仅规划 / 中止 / 取消后剩余），可作为 actions_override 再次提交
    pub pending_actions: Vec<PlannedAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_marks_detail() {
        let step = StepResult::failed(ActionKind::SelectResult, "rank out of range", "invalid_param")
            .into_retry();
        assert!(step.retry);
        assert!(step.detail.starts_with(RETRY_PREFIX));
    }

    #[test]
    fn test_halt_marker_detection() {
        let marker = StepResult::halted(ActionKind::AddPaperToProject);
        assert!(marker.is_halt_marker());
        assert_eq!(marker.status, StepStatus::Skipped);
        assert!(!StepResult::cancelled(ActionKind::SearchPapers).is_halt_marker());
    }

    #[test]
    fn test_target_paths() {
        assert_eq!(Target::project("prj_1").path(), "/projects/prj_1");
        assert_eq!(Target::paper("arxiv:1").path(), "/papers/arxiv:1");
        assert_eq!(Target::search("graph neural nets").path(), "/search?q=graph+neural+nets");
    }

    #[test]
    fn test_request_defaults_to_execute() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(req.execute);
        assert!(req.actions_override.is_none());
        assert_eq!(req.context, RequestContext::default());
    }
}
