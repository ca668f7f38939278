//! 动作契约注册表
//!
//! 封闭的动作集合：每个 ActionKind 对应一个实现 Action trait 的类型和一份静态 ActionContract
//! （参数 schema、读写的会话状态、重试类别）。ActionRegistry 按 kind 有序存储，
//! 规划阶段通过 admit 过滤掉不在集合内的动作名。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::actions::params::{is_absent, read_int, read_str, read_str_list};
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::{Params, PlannedAction, ProposedAction};
use crate::services::Services;

/// 注册表版本；契约表发生不兼容变化时递增
pub const REGISTRY_VERSION: u32 = 1;

/// 允许的动作名（封闭集合）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SearchPapers,
    SelectResult,
    SaveToLibrary,
    CreateProject,
    AddPaperToProject,
    AnswerQuestion,
    CreateMemo,
    SuggestKeywords,
    FindRelated,
    CompileTex,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::SearchPapers,
        ActionKind::SelectResult,
        ActionKind::SaveToLibrary,
        ActionKind::CreateProject,
        ActionKind::AddPaperToProject,
        ActionKind::AnswerQuestion,
        ActionKind::CreateMemo,
        ActionKind::SuggestKeywords,
        ActionKind::FindRelated,
        ActionKind::CompileTex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SearchPapers => "search_papers",
            ActionKind::SelectResult => "select_result",
            ActionKind::SaveToLibrary => "save_to_library",
            ActionKind::CreateProject => "create_project",
            ActionKind::AddPaperToProject => "add_paper_to_project",
            ActionKind::AnswerQuestion => "answer_question",
            ActionKind::CreateMemo => "create_memo",
            ActionKind::SuggestKeywords => "suggest_keywords",
            ActionKind::FindRelated => "find_related",
            ActionKind::CompileTex => "compile_tex",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ActionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))
    }
}

/// 会话状态中的槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSlot {
    LastResults,
    LastPaper,
    LastProject,
    /// 请求上下文带来的论文列表（只读）
    ContextPapers,
    Artifacts,
}

/// 重试类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClass {
    /// 重复执行无额外副作用
    Idempotent,
    /// 只能以不同参数重试（可能已产生副作用）
    ReparameterizeOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer { min: i64, max: Option<i64> },
    StringList,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub description: &'static str,
}

/// 单个动作的静态契约
#[derive(Debug)]
pub struct ActionContract {
    pub kind: ActionKind,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub reads: &'static [StateSlot],
    pub writes: &'static [StateSlot],
    pub retry: RetryClass,
}

impl ActionContract {
    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in self.params {
            let mut prop = match spec.ty {
                ParamType::String => json!({ "type": "string" }),
                ParamType::Integer { min, max } => {
                    let mut p = json!({ "type": "integer", "minimum": min });
                    if let Some(max) = max {
                        p["maximum"] = json!(max);
                    }
                    p
                }
                ParamType::StringList => json!({ "type": "array", "items": { "type": "string" } }),
            };
            prop["description"] = json!(spec.description);
            properties.insert(spec.name.to_string(), prop);
            if spec.required {
                required.push(spec.name);
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// 校验参数：必填项存在、类型正确、整数在声明范围内；未声明的参数忽略
    pub fn validate(&self, params: &Params) -> Result<(), ActionError> {
        for spec in self.params {
            let value = params.get(spec.name).filter(|v| !is_absent(v));
            let Some(value) = value else {
                if spec.required {
                    return Err(ActionError::MissingParam(spec.name.to_string()));
                }
                continue;
            };
            match spec.ty {
                ParamType::String => {
                    if !value.is_string() {
                        return Err(ActionError::invalid(spec.name, "must be a string"));
                    }
                }
                ParamType::Integer { min, max } => {
                    let n = read_int(params, spec.name)
                        .ok_or_else(|| ActionError::invalid(spec.name, "must be an integer"))?;
                    let in_range = n >= min && max.map_or(true, |max| n <= max);
                    if !in_range {
                        let reason = match max {
                            Some(max) => format!("must be between {min} and {max}"),
                            None => format!("must be at least {min}"),
                        };
                        return Err(ActionError::invalid(spec.name, reason));
                    }
                }
                ParamType::StringList => {
                    if read_str_list(params, spec.name).map_or(true, |l| l.is_empty()) {
                        return Err(ActionError::invalid(spec.name, "must be a non-empty list of strings"));
                    }
                }
            }
        }
        Ok(())
    }

    /// 目录条目：名称、描述、参数、状态足迹、重试类别
    pub fn catalog_entry(&self) -> Value {
        json!({
            "name": self.kind.as_str(),
            "description": self.description,
            "parameters": self.parameters_schema(),
            "reads": self.reads,
            "writes": self.writes,
            "retry": self.retry,
        })
    }
}

/// 动作执行成功后的紧凑结果
#[derive(Debug, Clone, Default)]
pub struct ActionOutcome {
    pub detail: String,
    pub output: Map<String, Value>,
}

impl ActionOutcome {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            output: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.output.insert(key.to_string(), value.into());
        self
    }
}

/// 动作 trait：静态契约 + 针对会话状态与协作服务的异步执行
#[async_trait]
pub trait Action: Send + Sync {
    fn contract(&self) -> &'static ActionContract;

    fn kind(&self) -> ActionKind {
        self.contract().kind
    }

    /// 执行动作；先校验参数，只读写契约声明的状态槽位
    async fn execute(
        &self,
        params: &Params,
        state: &mut SessionState,
        services: &Services,
    ) -> Result<ActionOutcome, ActionError>;
}

/// 内置动作的默认参数
#[derive(Debug, Clone)]
pub struct ActionSettings {
    pub default_source: String,
    pub search_limit: usize,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            default_source: "arxiv".to_string(),
            search_limit: 8,
        }
    }
}

/// 动作注册表：按 kind 有序存储 Arc<dyn Action>
#[derive(Default)]
pub struct ActionRegistry {
    actions: BTreeMap<ActionKind, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册全部内置动作
    pub fn with_builtin_actions(settings: &ActionSettings) -> Self {
        use crate::actions::{
            AddPaperToProjectAction, AnswerQuestionAction, CompileTexAction, CreateMemoAction,
            CreateProjectAction, FindRelatedAction, SaveToLibraryAction, SearchPapersAction,
            SelectResultAction, SuggestKeywordsAction,
        };

        let mut registry = Self::new();
        registry.register(SearchPapersAction::new(
            settings.default_source.clone(),
            settings.search_limit,
        ));
        registry.register(SelectResultAction);
        registry.register(SaveToLibraryAction);
        registry.register(CreateProjectAction);
        registry.register(AddPaperToProjectAction);
        registry.register(AnswerQuestionAction);
        registry.register(CreateMemoAction);
        registry.register(SuggestKeywordsAction);
        registry.register(FindRelatedAction);
        registry.register(CompileTexAction);
        registry
    }

    pub fn register(&mut self, action: impl Action + 'static) {
        self.actions.insert(action.kind(), Arc::new(action));
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn Action>> {
        self.actions.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ActionKind) -> bool {
        self.actions.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        self.actions.keys().copied().collect()
    }

    pub fn contracts(&self) -> Vec<&'static ActionContract> {
        self.actions.values().map(|a| a.contract()).collect()
    }

    /// 过滤动作提议：名称不在注册表内或参数不是对象时丢弃
    pub fn admit(&self, proposed: &ProposedAction) -> Option<PlannedAction> {
        let Ok(kind) = proposed.action.parse::<ActionKind>() else {
            tracing::debug!(action = %proposed.action, "dropping unknown action");
            return None;
        };
        if !self.contains(kind) {
            tracing::debug!(action = %kind, "dropping unregistered action");
            return None;
        }
        let params = match &proposed.params {
            Value::Object(map) => map.clone(),
            Value::Null => Params::new(),
            other => {
                tracing::debug!(action = %kind, params = %other, "dropping action with non-object params");
                return None;
            }
        };
        Some(PlannedAction { action: kind, params })
    }

    /// Action Catalog（JSON），拼入规划 prompt
    pub fn catalog_json(&self) -> String {
        let entries: Vec<Value> = self.contracts().iter().map(|c| c.catalog_entry()).collect();
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    }
}

/// 读取必填字符串（已通过 validate 时必然存在）
pub(crate) fn required_str<'a>(params: &'a Params, name: &str) -> Result<&'a str, ActionError> {
    read_str(params, name).ok_or_else(|| ActionError::MissingParam(name.to_string()))
}
