//! LLM 客户端抽象
//!
//! 规划与判定只需要非流式完成；后端（OpenAI 兼容 / Mock）实现 LlmClient::complete。
//! 是否存在 LLM 由 `Option<Arc<dyn LlmClient>>` 在构造时决定，调用方无需试探。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str {
        "llm"
    }
}
