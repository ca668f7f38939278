//! create_project / add_paper_to_project：项目创建与论文关联

use async_trait::async_trait;

use crate::actions::params::{read_str, read_str_list, read_usize};
use crate::actions::registry::{
    required_str, Action, ActionContract, ActionKind, ActionOutcome, ParamSpec, ParamType,
    RetryClass, StateSlot,
};
use crate::actions::{paper_briefs, paper_ids};
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::Params;
use crate::services::Services;

static CREATE_CONTRACT: ActionContract = ActionContract {
    kind: ActionKind::CreateProject,
    description: "Create a new research project. It becomes the current project.",
    params: &[
        ParamSpec {
            name: "title",
            ty: ParamType::String,
            required: true,
            description: "project title",
        },
        ParamSpec {
            name: "description",
            ty: ParamType::String,
            required: false,
            description: "short description",
        },
    ],
    reads: &[],
    writes: &[StateSlot::LastProject],
    retry: RetryClass::ReparameterizeOnly,
};

static LINK_CONTRACT: ActionContract = ActionContract {
    kind: ActionKind::AddPaperToProject,
    description: "Add papers to a project (default: the current project). Without paper_ids, adds the top_k current results, else the last referenced paper.",
    params: &[
        ParamSpec {
            name: "project_id",
            ty: ParamType::String,
            required: false,
            description: "explicit project id",
        },
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
            description: "add the first N papers of the current result set",
        },
    ],
    reads: &[StateSlot::LastProject, StateSlot::LastResults, StateSlot::LastPaper],
    writes: &[StateSlot::LastPaper],
    retry: RetryClass::Idempotent,
};

pub struct CreateProjectAction;

#[async_trait]
impl Action for CreateProjectAction {
    fn contract(&self) -> &'static ActionContract {
        &CREATE_CONTRACT
    }

    async fn execute(
        &self,
        params: &Params,
        state: &mut SessionState,
        services: &Services,
    ) -> Result<ActionOutcome, ActionError> {
        CREATE_CONTRACT.validate(params)?;
        let title = required_str(params, "title")?;
        let description = read_str(params, "description").unwrap_or_default();

        let project_id = services
            .projects
            .create_project(title, description)
            .await
            .map_err(ActionError::service)?;

        state.set_last_project(project_id.clone());
        state.record("project_id", project_id.as_str());
        state.record("project_title", title);
        Ok(ActionOutcome::new(format!("created project \"{title}\""))
            .with("project_id", project_id)
            .with("title", title))
    }
}

pub struct AddPaperToProjectAction;

#[async_trait]
impl Action for AddPaperToProjectAction {
    fn contract(&self) -> &'static ActionContract {
        &LINK_CONTRACT
    }

    async fn execute(
        &self,
        params: &Params,
        state: &mut SessionState,
        services: &Services,
    ) -> Result<ActionOutcome, ActionError> {
        LINK_CONTRACT.validate(params)?;
        let project_id = read_str(params, "project_id")
            .map(str::to_string)
            .or_else(|| state.last_project_id.clone())
            .ok_or_else(|| ActionError::MissingState("no project to add papers to".into()))?;
        let explicit = read_str_list(params, "paper_ids");
        let papers = state.resolve_papers(explicit.as_deref(), read_usize(params, "top_k"))?;

        for paper in &papers {
            services
                .projects
                .add_paper(&project_id, &paper.id)
                .await
                .map_err(ActionError::service)?;
        }

        let count = papers.len();
        let outcome = ActionOutcome::new(format!("added {count} papers to project {project_id}"))
            .with("project_id", project_id.as_str())
            .with("count", count)
            .with("paper_ids", paper_ids(&papers))
            .with("papers", paper_briefs(&papers));
        state.add_count("linked_count", count as u64);
        if let Some(first) = papers.into_iter().next() {
            state.set_last_paper(first);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryWorkspace, SearchService};
    use serde_json::json;
    use std::sync::Arc;

    fn params(v: serde_json::Value) -> Params {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_then_link_top_result() {
        let ws = Arc::new(InMemoryWorkspace::with_demo_catalog());
        let services = Services::in_memory(ws.clone());
        let mut state = SessionState::new();
        state.set_results(ws.search("diffusion models", "arxiv", 5).await.unwrap());

        let created = CreateProjectAction
            .execute(&params(json!({ "title": "Diffusion" })), &mut state, &services)
            .await
            .unwrap();
        let project_id = created.output["project_id"].as_str().unwrap().to_string();
        assert_eq!(state.last_project_id.as_deref(), Some(project_id.as_str()));

        AddPaperToProjectAction
            .execute(&params(json!({ "top_k": 1 })), &mut state, &services)
            .await
            .unwrap();
        assert_eq!(
            ws.project_papers(&project_id).await.unwrap(),
            vec!["arxiv:2006.11239".to_string()]
        );
        assert_eq!(ws.project_title(&project_id).await.as_deref(), Some("Diffusion"));
    }

    #[tokio::test]
    async fn test_link_without_project() {
        let services = Services::in_memory(Arc::new(InMemoryWorkspace::default()));
        let mut state = SessionState::new();
        state.set_last_paper(crate::services::PaperSummary::from_id("arxiv:1706.03762"));
        let err = AddPaperToProjectAction
            .execute(&Params::new(), &mut state, &services)
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::MissingState("no project to add papers to".into()));
    }

    #[tokio::test]
    async fn test_link_surfaces_service_error() {
        let services = Services::in_memory(Arc::new(InMemoryWorkspace::default()));
        let mut state = SessionState::new();
        let err = AddPaperToProjectAction
            .execute(
                &params(json!({ "project_id": "prj_missing", "paper_ids": ["arxiv:1706.03762"] })),
                &mut state,
                &services,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "project not found: prj_missing");
        assert!(state.last_paper_id.is_none());
    }
}
