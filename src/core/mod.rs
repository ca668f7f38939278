//! 核心编排层：数据模型、会话状态、错误、替代动作、重试协调与编排器

pub mod coordinator;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod state;
pub mod types;

pub use coordinator::{ExecutionReport, RetryCoordinator};
pub use error::{ActionError, OrchestratorError};
pub use orchestrator::{create_llm_from_config, Orchestrator};
pub use recovery::RecoveryEngine;
pub use state::SessionState;
pub use types::{
    ChatRequest, ChatResponse, ContextPaper, Plan, PlannedAction, ProposedAction, RequestContext, StepResult,
    StepStatus, Target, TargetKind, Verdict, Verification,
};
