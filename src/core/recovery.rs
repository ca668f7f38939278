//! 失败恢复引擎
//!
//! 根据失败动作的 kind 与当前会话状态构造唯一的替代动作：
//! select_result 名次 +1；依赖"最近引用"的动作改为显式 ID（从会话状态中取出）。
//! 替代动作与原动作参数相同、或状态不足以构造时返回 None（不重试）。

use serde_json::Value;

use crate::actions::keywords::subject_paper_id;
use crate::actions::params::{read_int, read_str, read_str_list, read_usize};
use crate::actions::tex::DEFAULT_ENTRY_FILE;
use crate::actions::ActionKind;
use crate::core::state::SessionState;
use crate::core::types::{Params, PlannedAction};

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 为失败的动作构造一个替代动作
    pub fn alternative(&self, failed: &PlannedAction, state: &SessionState) -> Option<PlannedAction> {
        let params = &failed.params;
        let alt = match failed.action {
            ActionKind::SelectResult => {
                let rank = read_int(params, "rank")?;
                let mut p = params.clone();
                p.insert("rank".into(), Value::from(rank.checked_add(1)?));
                p
            }
            ActionKind::SaveToLibrary => {
                let mut p = Params::new();
                p.insert("paper_ids".into(), explicit_paper_ids(params, state)?);
                p
            }
            ActionKind::AddPaperToProject => {
                let project_id = read_str(params, "project_id")
                    .map(str::to_string)
                    .or_else(|| state.last_project_id.clone())?;
                let mut p = Params::new();
                p.insert("project_id".into(), Value::from(project_id));
                p.insert("paper_ids".into(), explicit_paper_ids(params, state)?);
                p
            }
            ActionKind::SuggestKeywords | ActionKind::FindRelated => {
                let paper_id = subject_paper_id(params, state).ok()?;
                let mut p = params.clone();
                p.insert("paper_id".into(), Value::from(paper_id));
                p
            }
            ActionKind::CompileTex => {
                let project_id = read_str(params, "project_id")
                    .map(str::to_string)
                    .or_else(|| state.last_project_id.clone())?;
                let mut p = Params::new();
                p.insert("project_id".into(), Value::from(project_id));
                p.insert("entry_file".into(), Value::from(DEFAULT_ENTRY_FILE));
                p
            }
            ActionKind::SearchPapers
            | ActionKind::CreateProject
            | ActionKind::AnswerQuestion
            | ActionKind::CreateMemo => return None,
        };

        if &alt == params {
            return None;
        }
        Some(PlannedAction {
            action: failed.action,
            params: alt,
        })
    }
}

/// 按与执行时相同的解析规则，把隐式论文选择固定为显式 paper_ids
fn explicit_paper_ids(params: &Params, state: &SessionState) -> Option<Value> {
    let explicit = read_str_list(params, "paper_ids");
    let papers = state
        .resolve_papers(explicit.as_deref(), read_usize(params, "top_k"))
        .ok()?;
    Some(Value::from(
        papers.into_iter().map(|p| p.id).collect::<Vec<String>>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::PaperSummary;
    use serde_json::json;

    fn action(kind: ActionKind, params: Value) -> PlannedAction {
        PlannedAction {
            action: kind,
            params: params.as_object().cloned().unwrap_or_default(),
        }
    }

    fn state_with_results() -> SessionState {
        let mut state = SessionState::new();
        state.set_results(vec![PaperSummary::from_id("a"), PaperSummary::from_id("b")]);
        state
    }

    #[test]
    fn test_select_shifts_rank() {
        let engine = RecoveryEngine::new();
        let alt = engine
            .alternative(&action(ActionKind::SelectResult, json!({ "rank": 1 })), &state_with_results())
            .unwrap();
        assert_eq!(alt.params["rank"], 2);
        assert_eq!(alt.action, ActionKind::SelectResult);
    }

    #[test]
    fn test_select_at_max_rank_has_no_alternative() {
        let engine = RecoveryEngine::new();
        let failed = action(ActionKind::SelectResult, json!({ "rank": i64::MAX }));
        assert!(engine.alternative(&failed, &state_with_results()).is_none());
    }

    #[test]
    fn test_link_pins_explicit_ids() {
        let engine = RecoveryEngine::new();
        let mut state = state_with_results();
        state.set_last_project("prj_1");
        let alt = engine
            .alternative(&action(ActionKind::AddPaperToProject, json!({ "top_k": 1 })), &state)
            .unwrap();
        assert_eq!(alt.params["project_id"], "prj_1");
        assert_eq!(alt.params["paper_ids"], json!(["a"]));
        assert!(!alt.params.contains_key("top_k"));
    }

    #[test]
    fn test_identical_alternative_is_not_retried() {
        let engine = RecoveryEngine::new();
        let state = state_with_results();
        let failed = action(
            ActionKind::AddPaperToProject,
            json!({ "project_id": "prj_1", "paper_ids": ["a"] }),
        );
        assert!(engine.alternative(&failed, &state).is_none());

        let failed = action(
            ActionKind::CompileTex,
            json!({ "project_id": "prj_1", "entry_file": "main.tex" }),
        );
        assert!(engine.alternative(&failed, &state).is_none());
    }

    #[test]
    fn test_link_without_project_has_no_alternative() {
        let engine = RecoveryEngine::new();
        let failed = action(ActionKind::AddPaperToProject, json!({}));
        assert!(engine.alternative(&failed, &state_with_results()).is_none());
    }

    #[test]
    fn test_kinds_without_alternative() {
        let engine = RecoveryEngine::new();
        let state = state_with_results();
        for kind in [
            ActionKind::SearchPapers,
            ActionKind::CreateProject,
            ActionKind::AnswerQuestion,
            ActionKind::CreateMemo,
        ] {
            assert!(engine.alternative(&action(kind, json!({ "query": "x" })), &state).is_none());
        }
    }

    #[test]
    fn test_compile_falls_back_to_main_tex() {
        let engine = RecoveryEngine::new();
        let mut state = SessionState::new();
        state.set_last_project("prj_9");
        let alt = engine
            .alternative(&action(ActionKind::CompileTex, json!({ "entry_file": "paper.tex" })), &state)
            .unwrap();
        assert_eq!(alt.params["project_id"], "prj_9");
        assert_eq!(alt.params["entry_file"], "main.tex");
    }
}
