//! find_related：查找与某篇论文相关的论文，结果成为新的 last_results

use async_trait::async_trait;

use crate::actions::keywords::subject_paper_id;
use crate::actions::params::read_usize;
use crate::actions::registry::{
    Action, ActionContract, ActionKind, ActionOutcome, ParamSpec, ParamType, RetryClass, StateSlot,
};
use crate::actions::paper_briefs;
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::Params;
use crate::services::Services;

const DEFAULT_LIMIT: usize = 5;

static CONTRACT: ActionContract = ActionContract {
    kind: ActionKind::FindRelated,
    description: "Find papers related to a paper (default: the last referenced paper). Results become the current result set.",
    params: &[
        ParamSpec {
            name: "paper_id",
            ty: ParamType::String,
            required: false,
            description: "anchor paper",
        },
        ParamSpec {
            name: "limit",
            ty: ParamType::Integer { min: 1, max: Some(50) },
            required: false,
            description: "maximum number of related papers (default 5)",
        },
    ],
    reads: &[StateSlot::LastPaper],
    writes: &[StateSlot::LastResults],
    retry: RetryClass::Idempotent,
};

pub struct FindRelatedAction;

#[async_trait]
impl Action for FindRelatedAction {
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
        let limit = read_usize(params, "limit").unwrap_or(DEFAULT_LIMIT);
        let related = services
            .related
            .related(&paper_id, limit)
            .await
            .map_err(ActionError::service)?;

        let count = related.len();
        let top = paper_briefs(&related);
        state.set_results(related);
        Ok(ActionOutcome::new(format!("found {count} papers related to {paper_id}"))
            .with("paper_id", paper_id)
            .with("count", count)
            .with("top", top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryWorkspace;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_related_replaces_results() {
        let services = Services::in_memory(Arc::new(InMemoryWorkspace::with_demo_catalog()));
        let mut state = SessionState::new();
        let params = json!({ "paper_id": "arxiv:1609.02907", "limit": 2 })
            .as_object()
            .cloned()
            .unwrap_or_default();
        let out = FindRelatedAction.execute(&params, &mut state, &services).await.unwrap();
        assert_eq!(out.output["count"], 2);
        assert!(state.last_results.iter().all(|p| p.id != "arxiv:1609.02907"));
    }

    #[tokio::test]
    async fn test_related_unknown_paper_fails() {
        let services = Services::in_memory(Arc::new(InMemoryWorkspace::with_demo_catalog()));
        let mut state = SessionState::new();
        state.last_paper_id = Some("arxiv:0000.00000".into());
        let err = FindRelatedAction.execute(&Params::new(), &mut state, &services).await.unwrap_err();
        assert_eq!(err.to_string(), "paper not found: arxiv:0000.00000");
    }
}
