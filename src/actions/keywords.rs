//! suggest_keywords：为论文推荐并应用关键词

use async_trait::async_trait;

use crate::actions::params::read_str;
use crate::actions::registry::{
    Action, ActionContract, ActionKind, ActionOutcome, ParamSpec, ParamType, RetryClass, StateSlot,
};
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::Params;
use crate::services::Services;

static CONTRACT: ActionContract = ActionContract {
    kind: ActionKind::SuggestKeywords,
    description: "Suggest and apply keywords for a paper (default: the last referenced paper).",
    params: &[ParamSpec {
        name: "paper_id",
        ty: ParamType::String,
        required: false,
        description: "paper to tag",
    }],
    reads: &[StateSlot::LastPaper],
    writes: &[StateSlot::Artifacts],
    retry: RetryClass::Idempotent,
};

/// 单篇论文操作的目标：显式 paper_id > 最近引用论文 > 上次结果第一篇
pub(crate) fn subject_paper_id(params: &Params, state: &SessionState) -> Result<String, ActionError> {
    read_str(params, "paper_id")
        .map(str::to_string)
        .or_else(|| state.last_paper_id.clone())
        .or_else(|| state.last_results.first().map(|p| p.id.clone()))
        .ok_or_else(|| ActionError::MissingState("no referenced paper".into()))
}

pub struct SuggestKeywordsAction;

#[async_trait]
impl Action for SuggestKeywordsAction {
    fn contract(&self) -> &'static ActionContract {
        &CONTRACT
    }

    async fn execute(
        &self,
        params: &Params,
        state: &mut SessionState,
        services: &Services,
    ) -> Result<ActionOutcome, ActionError> {
        CONTRACT.validate(params)?;
        let paper_id = subject_paper_id(params, state)?;
        let applied = services
            .keywords
            .suggest(&paper_id)
            .await
            .map_err(ActionError::service)?;

        state.add_count("keywords_applied", applied as u64);
        Ok(ActionOutcome::new(format!("applied {applied} keywords to {paper_id}"))
            .with("paper_id", paper_id)
            .with("applied", applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryWorkspace;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_keywords_for_context_paper() {
        let ws = Arc::new(InMemoryWorkspace::with_demo_catalog());
        let services = Services::in_memory(ws.clone());
        let mut state = SessionState::new();
        state.last_paper_id = Some("arxiv:1710.10903".into());

        let out = SuggestKeywordsAction.execute(&Params::new(), &mut state, &services).await.unwrap();
        assert_eq!(out.output["paper_id"], "arxiv:1710.10903");
        assert_eq!(
            ws.keywords_of("arxiv:1710.10903").await,
            vec!["graph", "attention", "networks"]
        );
    }
}
