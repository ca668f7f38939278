//! 编排过程事件：用于流式/SSE 展示规划、逐步执行、重试、中止与判定

use serde::Serialize;
use tokio::sync::mpsc;

use crate::actions::ActionKind;
use crate::core::types::{StepStatus, Verdict};

/// 单个过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// 计划已生成
    Planned {
        summary: String,
        actions: Vec<ActionKind>,
        /// generative / keyword / override
        strategy: String,
    },
    /// 开始执行第 index 个计划动作（0 起）
    StepStarted { index: usize, action: ActionKind },
    /// 一次尝试结束（含重试）
    StepFinished {
        index: usize,
        action: ActionKind,
        status: StepStatus,
        detail: String,
    },
    /// 失败后改用替代动作重试
    Retrying {
        index: usize,
        action: ActionKind,
        params: serde_json::Value,
    },
    /// 重试仍失败，剩余动作不再执行
    Halted { index: usize, action: ActionKind },
    /// 调用方取消
    Cancelled { index: usize },
    /// 判定完成
    Verified { verdict: Verdict, summary: String },
}

/// 可选的事件发送端
pub type EventSender = mpsc::UnboundedSender<OrchestratorEvent>;

/// 发送事件；接收端已关闭时静默丢弃
pub(crate) fn emit(events: Option<&EventSender>, event: OrchestratorEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagged_serialization() {
        let event = OrchestratorEvent::Halted {
            index: 2,
            action: ActionKind::AddPaperToProject,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "halted");
        assert_eq!(json["action"], "add_paper_to_project");
    }

    #[test]
    fn test_emit_without_receiver_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        emit(Some(&tx), OrchestratorEvent::Cancelled { index: 0 });
        emit(None, OrchestratorEvent::Cancelled { index: 0 });
    }
}
