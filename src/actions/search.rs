//! search_papers：按 query 检索论文，结果写入 last_results

use async_trait::async_trait;

use crate::actions::params::{read_str, read_usize};
use crate::actions::registry::{
    required_str, Action, ActionContract, ActionKind, ActionOutcome, ParamSpec, ParamType,
    RetryClass, StateSlot,
};
use crate::actions::paper_briefs;
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::Params;
use crate::services::Services;

static CONTRACT: ActionContract = ActionContract {
    kind: ActionKind::SearchPapers,
    description: "Search papers by keyword query. Results become the current result set.",
    params: &[
        ParamSpec {
            name: "query",
            ty: ParamType::String,
            required: true,
            description: "search keywords",
        },
        ParamSpec {
            name: "source",
            ty: ParamType::String,
            required: false,
            description: "arxiv | pubmed | scholar | gemini",
        },
        ParamSpec {
            name: "limit",
            ty: ParamType::Integer { min: 1, max: Some(50) },
            required: false,
            description: "maximum number of results",
        },
    ],
    reads: &[],
    writes: &[StateSlot::LastResults],
    retry: RetryClass::Idempotent,
};

pub struct SearchPapersAction {
    default_source: String,
    default_limit: usize,
}

impl SearchPapersAction {
    pub fn new(default_source: impl Into<String>, default_limit: usize) -> Self {
        Self {
            default_source: default_source.into(),
            default_limit,
        }
    }
}

#[async_trait]
impl Action for SearchPapersAction {
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
        let query = required_str(params, "query")?;
        let source = read_str(params, "source").unwrap_or(self.default_source.as_str());
        let limit = read_usize(params, "limit").unwrap_or(self.default_limit);

        let results = services
            .search
            .search(query, source, limit)
            .await
            .map_err(ActionError::service)?;

        let count = results.len();
        let top = paper_briefs(&results);
        state.set_results(results);
        state.record("last_query", query);

        Ok(ActionOutcome::new(format!("found {count} papers for \"{query}\""))
            .with("query", query)
            .with("source", source)
            .with("count", count)
            .with("top", top))
    }
}
