//! select_result：从上一次检索结果中按名次（1 起）选中一篇论文

use async_trait::async_trait;

use crate::actions::params::read_usize;
use crate::actions::registry::{
    Action, ActionContract, ActionKind, ActionOutcome, ParamSpec, ParamType, RetryClass, StateSlot,
};
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::Params;
use crate::services::Services;

static CONTRACT: ActionContract = ActionContract {
    kind: ActionKind::SelectResult,
    description: "Select one paper from the current result set by 1-based rank.",
    params: &[ParamSpec {
        name: "rank",
        ty: ParamType::Integer { min: 1, max: Some(50) },
        required: true,
        description: "1-based position in the current result set",
    }],
    reads: &[StateSlot::LastResults],
    writes: &[StateSlot::LastPaper],
    retry: RetryClass::Idempotent,
};

pub struct SelectResultAction;

#[async_trait]
impl Action for SelectResultAction {
    fn contract(&self) -> &'static ActionContract {
        &CONTRACT
    }

    async fn execute(
        &self,
        params: &Params,
        state: &mut SessionState,
        _services: &Services,
    ) -> Result<ActionOutcome, ActionError> {
        CONTRACT.validate(params)?;
        let rank = read_usize(params, "rank").ok_or_else(|| ActionError::MissingParam("rank".into()))?;
        if state.last_results.is_empty() {
            return Err(ActionError::MissingState("no search results to select from".into()));
        }
        let total = state.last_results.len();
        let paper = state
            .last_results
            .get(rank - 1)
            .cloned()
            .ok_or_else(|| ActionError::invalid("rank", format!("must be between 1 and {total}")))?;

        let outcome = ActionOutcome::new(format!("selected #{rank}: {}", paper.display_title()))
            .with("rank", rank)
            .with("paper_id", paper.id.as_str())
            .with("title", paper.display_title());
        state.set_last_paper(paper);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryWorkspace, PaperSummary};
    use serde_json::json;
    use std::sync::Arc;

    fn rank(n: i64) -> Params {
        json!({ "rank": n }).as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_select_in_and_out_of_range() {
        let services = Services::in_memory(Arc::new(InMemoryWorkspace::default()));
        let mut state = SessionState::new();
        state.set_results(vec![PaperSummary::from_id("a"), PaperSummary::from_id("b")]);

        let out = SelectResultAction.execute(&rank(2), &mut state, &services).await.unwrap();
        assert_eq!(out.output["paper_id"], "b");
        assert_eq!(state.last_paper_id.as_deref(), Some("b"));

        let err = SelectResultAction.execute(&rank(3), &mut state, &services).await.unwrap_err();
        assert_eq!(err, ActionError::invalid("rank", "must be between 1 and 2"));
        // 失败不改动状态
        assert_eq!(state.last_paper_id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_select_without_results() {
        let services = Services::in_memory(Arc::new(InMemoryWorkspace::default()));
        let mut state = SessionState::new();
        let err = SelectResultAction.execute(&rank(1), &mut state, &services).await.unwrap_err();
        assert_eq!(err.kind(), "missing_state");
    }
}
