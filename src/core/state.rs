//! 会话状态：单次编排内由执行器独占写入的临时工作区
//!
//! 保存上一次检索结果、最近引用的论文（含离线副本）、最近引用的项目，以及用于最终汇报的 artifacts。
//! 运行开始时为空（或由请求上下文预置），运行结束后丢弃。

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::error::ActionError;
use crate::core::types::{ContextPaper, RequestContext};
use crate::services::PaperSummary;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    pub last_results: Vec<PaperSummary>,
    pub last_paper_id: Option<String>,
    /// 最近引用论文的离线副本（仅 ID 已知时为 None）
    pub last_paper: Option<PaperSummary>,
    pub last_project_id: Option<String>,
    /// 请求上下文中前几轮列出的论文
    pub context_papers: Vec<PaperSummary>,
    pub artifacts: Map<String, Value>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用请求上下文预置项目 / 论文
    pub fn from_context(context: &RequestContext) -> Self {
        Self {
            last_paper_id: context.paper_id.clone(),
            last_project_id: context.project_id.clone(),
            context_papers: context.papers.iter().map(ContextPaper::to_summary).collect(),
            ..Self::default()
        }
    }

    pub fn set_results(&mut self, results: Vec<PaperSummary>) {
        self.last_results = results;
    }

    pub fn set_last_paper(&mut self, paper: PaperSummary) {
        self.last_paper_id = Some(paper.id.clone());
        self.last_paper = Some(paper);
    }

    pub fn set_last_project(&mut self, project_id: impl Into<String>) {
        self.last_project_id = Some(project_id.into());
    }

    /// 写入（覆盖）一个 artifact
    pub fn record(&mut self, key: &str, value: impl Into<Value>) {
        self.artifacts.insert(key.to_string(), value.into());
    }

    /// 向数组型 artifact 追加一项
    pub fn append(&mut self, key: &str, value: impl Into<Value>) {
        let entry = self
            .artifacts
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(value.into()),
            other => *other = Value::Array(vec![other.take(), value.into()]),
        }
    }

    /// 累加计数型 artifact
    pub fn add_count(&mut self, key: &str, n: u64) {
        let current = self.artifacts.get(key).and_then(Value::as_u64).unwrap_or(0);
        self.artifacts.insert(key.to_string(), Value::from(current + n));
    }

    /// 按 ID 查找已知论文副本（最近引用 / 上次结果 / 上下文论文）；都没有时返回仅含 ID 的占位
    pub fn known_paper(&self, id: &str) -> PaperSummary {
        self.last_paper
            .iter()
            .chain(self.last_results.iter())
            .chain(self.context_papers.iter())
            .find(|p| p.id == id)
            .cloned()
            .unwrap_or_else(|| PaperSummary::from_id(id))
    }

    /// 解析保存 / 关联动作的目标论文：
    /// 显式 paper_ids > 上次结果的前 top_k 篇 > 最近引用论文 > 上次结果第一篇
    pub fn resolve_papers(
        &self,
        explicit: Option<&[String]>,
        top_k: Option<usize>,
    ) -> Result<Vec<PaperSummary>, ActionError> {
        if let Some(ids) = explicit {
            if ids.is_empty() {
                return Err(ActionError::invalid("paper_ids", "must not be empty"));
            }
            return Ok(ids.iter().map(|id| self.known_paper(id)).collect());
        }
        if let Some(k) = top_k {
            if self.last_results.is_empty() {
                return Err(ActionError::MissingState(
                    "no search results to take top papers from".to_string(),
                ));
            }
            return Ok(self.last_results.iter().take(k).cloned().collect());
        }
        if let Some(id) = &self.last_paper_id {
            return Ok(vec![self.known_paper(id)]);
        }
        self.last_results
            .first()
            .cloned()
            .map(|p| vec![p])
            .ok_or_else(|| ActionError::MissingState("no referenced paper".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(id: &str) -> PaperSummary {
        PaperSummary {
            title: format!("Title {id}"),
            ..PaperSummary::from_id(id)
        }
    }

    #[test]
    fn test_from_context_seeds_ids() {
        let state = SessionState::from_context(&RequestContext {
            project_id: Some("prj_1".into()),
            paper_id: Some("p1".into()),
            ..RequestContext::default()
        });
        assert_eq!(state.last_project_id.as_deref(), Some("prj_1"));
        assert_eq!(state.last_paper_id.as_deref(), Some("p1"));
        assert!(state.last_paper.is_none());
    }

    #[test]
    fn test_context_papers_are_known() {
        let state = SessionState::from_context(&RequestContext {
            papers: vec![ContextPaper {
                paper_id: "p2".into(),
                title: "Graph Attention Networks".into(),
                authors: Vec::new(),
                year: Some(2018),
                venue: String::new(),
            }],
            ..RequestContext::default()
        });
        assert_eq!(state.context_papers.len(), 1);
        assert_eq!(state.known_paper("p2").title, "Graph Attention Networks");
        assert_eq!(state.known_paper("p3"), PaperSummary::from_id("p3"));
    }

    #[test]
    fn test_resolve_papers_priority() {
        let mut state = SessionState::new();
        state.set_results(vec![paper("a"), paper("b"), paper("c")]);

        // 无最近引用时取第一篇
        let ids: Vec<String> = state.resolve_papers(None, None).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a"]);

        state.set_last_paper(paper("c"));
        let ids: Vec<String> = state.resolve_papers(None, None).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["c"]);

        let ids: Vec<String> = state.resolve_papers(None, Some(2)).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let explicit = vec!["b".to_string(), "zz".to_string()];
        let papers = state.resolve_papers(Some(&explicit), Some(2)).unwrap();
        assert_eq!(papers[0].title, "Title b");
        assert_eq!(papers[1], PaperSummary::from_id("zz"));
    }

    #[test]
    fn test_resolve_papers_without_state_fails() {
        let state = SessionState::new();
        assert!(matches!(
            state.resolve_papers(None, None),
            Err(ActionError::MissingState(_))
        ));
        assert!(matches!(
            state.resolve_papers(None, Some(3)),
            Err(ActionError::MissingState(_))
        ));
    }

    #[test]
    fn test_artifact_helpers() {
        let mut state = SessionState::new();
        state.append("memos", "m1");
        state.append("memos", "m2");
        state.add_count("linked_count", 2);
        state.add_count("linked_count", 1);
        assert_eq!(state.artifacts["memos"], serde_json::json!(["m1", "m2"]));
        assert_eq!(state.artifacts["linked_count"], serde_json::json!(3));
    }
}
