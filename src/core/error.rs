//! 编排错误类型
//!
//! ActionError 在动作边界被转换为 failed 的 StepResult（不会向上传播）；
//! OrchestratorError 仅用于组件构造阶段（配置、LLM 客户端）。

use thiserror::Error;

/// 单个动作执行失败的原因：参数校验、会话状态缺失、协作服务错误、超时
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("missing required parameter `{0}`")]
    MissingParam(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("missing session state: {0}")]
    MissingState(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// 协作服务返回的原始错误信息
    #[error("{0}")]
    Service(String),

    #[error("action timed out after {0}s")]
    Timeout(u64),
}

impl ActionError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// 将协作服务错误字符串化（保留完整的 context 链）
    pub fn service(err: anyhow::Error) -> Self {
        Self::Service(format!("{err:#}"))
    }

    /// 机器可读的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::MissingParam(_) => "missing_param",
            ActionError::InvalidParam { .. } => "invalid_param",
            ActionError::MissingState(_) => "missing_state",
            ActionError::UnknownAction(_) => "unknown_action",
            ActionError::Service(_) => "service_error",
            ActionError::Timeout(_) => "timeout",
        }
    }
}

/// 构造编排器时可能出现的错误
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_keeps_raw_message() {
        let err = ActionError::service(anyhow::anyhow!("link endpoint unavailable"));
        assert_eq!(err.to_string(), "link endpoint unavailable");
        assert_eq!(err.kind(), "service_error");
    }

    #[test]
    fn test_invalid_param_message() {
        let err = ActionError::invalid("rank", "must be between 1 and 50");
        assert_eq!(err.to_string(), "invalid parameter `rank`: must be between 1 and 50");
    }
}
