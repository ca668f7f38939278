//! 动作层：契约注册表、内置动作实现、带超时与审计日志的执行器

pub mod executor;
pub mod library;
pub mod memo;
pub mod keywords;
pub mod params;
pub mod project;
pub mod question;
pub mod registry;
pub mod related;
pub mod schema;
pub mod search;
pub mod select;
pub mod tex;

pub use executor::ActionExecutor;
pub use keywords::SuggestKeywordsAction;
pub use library::SaveToLibraryAction;
pub use memo::CreateMemoAction;
pub use project::{AddPaperToProjectAction, CreateProjectAction};
pub use question::AnswerQuestionAction;
pub use registry::{
    Action, ActionContract, ActionKind, ActionOutcome, ActionRegistry, ActionSettings, ParamSpec,
    ParamType, RetryClass, StateSlot, REGISTRY_VERSION,
};
pub use related::FindRelatedAction;
pub use schema::plan_response_schema_json;
pub use search::SearchPapersAction;
pub use select::SelectResultAction;
pub use tex::CompileTexAction;

use serde_json::{json, Value};

use crate::services::PaperSummary;

/// 输出中展示的论文条数上限
pub(crate) const OUTPUT_PREVIEW: usize = 5;

/// 论文列表的紧凑展示（id / title / year）
pub(crate) fn paper_briefs(papers: &[PaperSummary]) -> Value {
    Value::Array(
        papers
            .iter()
            .take(OUTPUT_PREVIEW)
            .map(|p| json!({ "id": p.id, "title": p.display_title(), "year": p.year }))
            .collect(),
    )
}

/// 论文 ID 列表
pub(crate) fn paper_ids(papers: &[PaperSummary]) -> Vec<String> {
    papers.iter().map(|p| p.id.clone()).collect()
}
