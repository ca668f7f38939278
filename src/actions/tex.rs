//! compile_tex：编译项目的 LaTeX 入口文件

use async_trait::async_trait;

use crate::actions::params::read_str;
use crate::actions::registry::{
    Action, ActionContract, ActionKind, ActionOutcome, ParamSpec, ParamType, RetryClass, StateSlot,
};
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::Params;
use crate::services::Services;

pub const DEFAULT_ENTRY_FILE: &str = "main.tex";

static CONTRACT: ActionContract = ActionContract {
    kind: ActionKind::CompileTex,
    description: "Compile the LaTeX sources of a project (default: the current project, main.tex).",
    params: &[
        ParamSpec {
            name: "project_id",
            ty: ParamType::String,
            required: false,
            description: "project to compile",
        },
        ParamSpec {
            name: "entry_file",
            ty: ParamType::String,
            required: false,
            description: "entry .tex file (default main.tex)",
        },
    ],
    reads: &[StateSlot::LastProject],
    writes: &[StateSlot::Artifacts],
    retry: RetryClass::Idempotent,
};

pub struct CompileTexAction;

#[async_trait]
impl Action for CompileTexAction {
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
        let project_id = read_str(params, "project_id")
            .map(str::to_string)
            .or_else(|| state.last_project_id.clone())
            .ok_or_else(|| ActionError::MissingState("no project to compile".into()))?;
        let entry_file = read_str(params, "entry_file").unwrap_or(DEFAULT_ENTRY_FILE);

        let output = services
            .tex
            .compile(&project_id, entry_file)
            .await
            .map_err(ActionError::service)?;

        state.record("compiled_output", output.as_str());
        Ok(ActionOutcome::new(format!("compiled {entry_file} -> {output}"))
            .with("project_id", project_id)
            .with("entry_file", entry_file)
            .with("output", output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryWorkspace, ProjectService};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_compile_current_project() {
        let ws = Arc::new(InMemoryWorkspace::with_demo_catalog());
        let services = Services::in_memory(ws.clone());
        let project_id = ws.create_project("Thesis", "").await.unwrap();
        let mut state = SessionState::new();
        state.set_last_project(project_id.clone());

        let out = CompileTexAction.execute(&Params::new(), &mut state, &services).await.unwrap();
        assert_eq!(out.output["output"], json!(format!("/projects/{project_id}/build/main.pdf")));
        assert_eq!(out.output["entry_file"], DEFAULT_ENTRY_FILE);
    }

    #[tokio::test]
    async fn test_compile_bad_entry_file() {
        let ws = Arc::new(InMemoryWorkspace::with_demo_catalog());
        let services = Services::in_memory(ws.clone());
        let project_id = ws.create_project("Thesis", "").await.unwrap();
        let mut state = SessionState::new();
        let params = json!({ "project_id": project_id, "entry_file": "notes.md" })
            .as_object()
            .cloned()
            .unwrap_or_default();
        let err = CompileTexAction.execute(&params, &mut state, &services).await.unwrap_err();
        assert_eq!(err.kind(), "service_error");
        assert!(!state.artifacts.contains_key("compiled_output"));
    }
}
