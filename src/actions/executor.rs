//! 动作执行器
//!
//! 持有注册表、协作服务句柄与单动作超时，execute(action, state) 按 kind 分发；
//! 动作错误与超时在此转为 failed 的 StepResult，从不向上传播；每次执行输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::actions::ActionRegistry;
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::{PlannedAction, StepResult};
use crate::services::Services;

pub struct ActionExecutor {
    registry: Arc<ActionRegistry>,
    services: Services,
    timeout: Duration,
}

impl ActionExecutor {
    pub fn new(registry: Arc<ActionRegistry>, services: Services, timeout_secs: u64) -> Self {
        Self {
            registry,
            services,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// 执行单个动作；返回值总是一条 StepResult
    pub async fn execute(&self, planned: &PlannedAction, state: &mut SessionState) -> StepResult {
        let start = Instant::now();
        let kind = planned.action;
        let result = match self.registry.get(kind) {
            None => Err(ActionError::UnknownAction(kind.to_string())),
            Some(action) => {
                match timeout(self.timeout, action.execute(&planned.params, state, &self.services)).await {
                    Ok(r) => r,
                    Err(_) => Err(ActionError::Timeout(self.timeout.as_secs())),
                }
            }
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        let audit = serde_json::json!({
            "event": "action_audit",
            "ts": chrono::Utc::now().to_rfc3339(),
            "action": kind.as_str(),
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "params_preview": params_preview(planned),
        });
        tracing::info!(audit = %audit, "action");

        match result {
            Ok(done) => StepResult::completed(kind, done.detail, done.output),
            Err(e) => StepResult::failed(kind, format!("{kind} failed: {e}"), format!("{}: {e}", e.kind())),
        }
    }
}

fn params_preview(planned: &PlannedAction) -> String {
    let s = serde_json::Value::Object(planned.params.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionKind, ActionSettings};
    use crate::core::types::StepStatus;
    use crate::services::InMemoryWorkspace;

    fn executor(registry: ActionRegistry) -> ActionExecutor {
        let services = Services::in_memory(Arc::new(InMemoryWorkspace::with_demo_catalog()));
        ActionExecutor::new(Arc::new(registry), services, 5)
    }

    #[tokio::test]
    async fn test_completed_step_carries_output() {
        let exec = executor(ActionRegistry::with_builtin_actions(&ActionSettings::default()));
        let mut state = SessionState::new();
        let step = exec
            .execute(
                &PlannedAction::new(ActionKind::SearchPapers).with("query", "residual learning"),
                &mut state,
            )
            .await;
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.output_str("query"), Some("residual learning"));
        assert!(!state.last_results.is_empty());
    }

    #[tokio::test]
    async fn test_validation_error_becomes_failed_step() {
        let exec = executor(ActionRegistry::with_builtin_actions(&ActionSettings::default()));
        let mut state = SessionState::new();
        let step = exec
            .execute(&PlannedAction::new(ActionKind::CreateProject), &mut state)
            .await;
        assert!(step.is_failed());
        assert_eq!(
            step.error.as_deref(),
            Some("missing_param: missing required parameter `title`")
        );
        assert!(state.last_project_id.is_none());
    }

    #[tokio::test]
    async fn test_unregistered_action_fails() {
        let exec = executor(ActionRegistry::new());
        let mut state = SessionState::new();
        let step = exec
            .execute(&PlannedAction::new(ActionKind::CompileTex), &mut state)
            .await;
        assert!(step.is_failed());
        assert!(step.error.unwrap_or_default().starts_with("unknown_action"));
    }
}
