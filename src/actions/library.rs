//! save_to_library：把论文保存到个人文库

use async_trait::async_trait;

use crate::actions::params::{read_str_list, read_usize};
use crate::actions::registry::{
    Action, ActionContract, ActionKind, ActionOutcome, ParamSpec, ParamType, RetryClass, StateSlot,
};
use crate::actions::{paper_briefs, paper_ids};
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::Params;
use crate::services::Services;

static CONTRACT: ActionContract = ActionContract {
    kind: ActionKind::SaveToLibrary,
    description: "Save papers to the personal library. Without paper_ids, saves the top_k current results, else the last referenced paper.",
    params: &[
        ParamSpec {
            name: "paper_ids",
            ty: ParamType::StringList,
            required: false,
            description: "explicit paper ids",
        },
        ParamSpec {
            name: "top_k",
            ty: ParamType::Integer { min: 1, max: Some(20) },
            required: false,
            description: "save the first N papers of the current result set",
        },
    ],
    reads: &[StateSlot::LastResults, StateSlot::LastPaper],
    writes: &[StateSlot::LastPaper],
    retry: RetryClass::Idempotent,
};

pub struct SaveToLibraryAction;

#[async_trait]
impl Action for SaveToLibraryAction {
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
        let explicit = read_str_list(params, "paper_ids");
        let papers = state.resolve_papers(explicit.as_deref(), read_usize(params, "top_k"))?;

        for paper in &papers {
            services.library.save(paper).await.map_err(ActionError::service)?;
        }

        let count = papers.len();
        let outcome = ActionOutcome::new(format!("saved {count} papers to library"))
            .with("count", count)
            .with("paper_ids", paper_ids(&papers))
            .with("papers", paper_briefs(&papers));
        state.add_count("saved_count", count as u64);
        if let Some(first) = papers.into_iter().next() {
            state.set_last_paper(first);
        }
        Ok(outcome)
    }
}
