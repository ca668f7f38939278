//! 重试 / 替代协调器
//!
//! 按计划顺序逐个执行动作：成功则继续；失败则由 RecoveryEngine 构造唯一替代动作并执行一次，
//! 替代也失败（或不存在替代）时追加终止标记并停止。每个计划动作最多尝试两次，不会循环。
//! 每次分发前检查取消令牌，取消后追加取消标记，已提交的副作用不回滚。

use tokio_util::sync::CancellationToken;

use crate::actions::ActionExecutor;
use crate::core::recovery::RecoveryEngine;
use crate::core::state::SessionState;
use crate::core::types::{PlannedAction, StepResult};
use crate::pipeline::events::{emit, EventSender, OrchestratorEvent};

/// 一次执行的结果：步骤日志 + 未尝试的动作
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub steps: Vec<StepResult>,
    pub pending: Vec<PlannedAction>,
    pub halted: bool,
    pub cancelled: bool,
}

pub struct RetryCoordinator {
    executor: ActionExecutor,
    recovery: RecoveryEngine,
}

impl RetryCoordinator {
    pub fn new(executor: ActionExecutor) -> Self {
        Self {
            executor,
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// 顺序执行全部动作
    pub async fn run(
        &self,
        actions: &[PlannedAction],
        state: &mut SessionState,
        cancel: &CancellationToken,
        events: Option<&EventSender>,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for (index, action) in actions.iter().enumerate() {
            if cancel.is_cancelled() {
                self.cancel_at(&mut report, actions, index, events);
                break;
            }

            emit(events, OrchestratorEvent::StepStarted { index, action: action.action });
            let step = self.executor.execute(action, state).await;
            emit(events, finished(index, &step));
            let failed = step.is_failed();
            report.steps.push(step);
            if !failed {
                continue;
            }

            let Some(alt) = self.recovery.alternative(action, state) else {
                tracing::info!(action = %action.action, "no alternative for failed action");
                self.halt_at(&mut report, actions, index, events);
                break;
            };
            if cancel.is_cancelled() {
                self.cancel_at(&mut report, actions, index, events);
                break;
            }

            tracing::info!(action = %action.action, params = ?alt.params, "retrying with alternative");
            emit(
                events,
                OrchestratorEvent::Retrying {
                    index,
                    action: alt.action,
                    params: serde_json::Value::Object(alt.params.clone()),
                },
            );
            let retry = self.executor.execute(&alt, state).await.into_retry();
            emit(events, finished(index, &retry));
            let recovered = retry.is_completed();
            report.steps.push(retry);
            if !recovered {
                self.halt_at(&mut report, actions, index, events);
                break;
            }
        }

        report
    }

    fn halt_at(
        &self,
        report: &mut ExecutionReport,
        actions: &[PlannedAction],
        index: usize,
        events: Option<&EventSender>,
    ) {
        let action = actions[index].action;
        tracing::warn!(%action, index, remaining = actions.len() - index - 1, "execution halted");
        report.steps.push(StepResult::halted(action));
        report.pending = actions[index + 1..].to_vec();
        report.halted = true;
        emit(events, OrchestratorEvent::Halted { index, action });
    }

    fn cancel_at(
        &self,
        report: &mut ExecutionReport,
        actions: &[PlannedAction],
        index: usize,
        events: Option<&EventSender>,
    ) {
        tracing::info!(index, "execution cancelled");
        report.steps.push(StepResult::cancelled(actions[index].action));
        report.pending = actions[index..].to_vec();
        report.cancelled = true;
        emit(events, OrchestratorEvent::Cancelled { index });
    }
}

fn finished(index: usize, step: &StepResult) -> OrchestratorEvent {
    OrchestratorEvent::StepFinished {
        index,
        action: step.action,
        status: step.status,
        detail: step.detail.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionKind, ActionRegistry, ActionSettings};
    use crate::core::types::{StepStatus, HALT_DETAIL, CANCEL_DETAIL};
    use crate::services::{InMemoryWorkspace, PaperSummary, Services};
    use std::sync::Arc;

    fn coordinator() -> RetryCoordinator {
        let services = Services::in_memory(Arc::new(InMemoryWorkspace::with_demo_catalog()));
        let registry = Arc::new(ActionRegistry::with_builtin_actions(&ActionSettings::default()));
        RetryCoordinator::new(ActionExecutor::new(registry, services, 5))
    }

    #[tokio::test]
    async fn test_select_retry_recovers() {
        let coord = coordinator();
        let mut state = SessionState::new();
        state.set_results(vec![PaperSummary::from_id("a")]);
        // rank 0 越界，重试 rank 1 成功
        let actions = vec![
            PlannedAction::new(ActionKind::SelectResult).with("rank", 0),
            PlannedAction::new(ActionKind::SuggestKeywords).with("paper_id", "arxiv:1706.03762"),
        ];
        let report = coord.run(&actions, &mut state, &CancellationToken::new(), None).await;
        let statuses: Vec<StepStatus> = report.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Failed, StepStatus::Completed, StepStatus::Completed]
        );
        assert!(report.steps[1].retry);
        assert!(!report.halted);
        assert!(report.pending.is_empty());
    }

    #[tokio::test]
    async fn test_no_alternative_halts_immediately() {
        let coord = coordinator();
        let mut state = SessionState::new();
        let actions = vec![
            PlannedAction::new(ActionKind::CreateProject),
            PlannedAction::new(ActionKind::AnswerQuestion).with("question", "what is attention?"),
        ];
        let report = coord.run(&actions, &mut state, &CancellationToken::new(), None).await;
        assert_eq!(report.steps.len(), 2);
        assert!(report.steps[0].is_failed());
        assert_eq!(report.steps[1].detail, HALT_DETAIL);
        assert!(report.halted);
        assert_eq!(report.pending, actions[1..].to_vec());
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let coord = coordinator();
        let mut state = SessionState::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let actions = vec![PlannedAction::new(ActionKind::SearchPapers).with("query", "graph")];
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let report = coord.run(&actions, &mut state, &cancel, Some(&tx)).await;
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].detail, CANCEL_DETAIL);
        assert!(report.cancelled);
        assert_eq!(report.pending.len(), 1);
        assert_eq!(rx.try_recv().ok(), Some(OrchestratorEvent::Cancelled { index: 0 }));
        assert!(state.last_results.is_empty());
    }
}
