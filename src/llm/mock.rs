//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预置回复；脚本用尽或处于失败模式时返回 LlmError，并记录收到的每次请求。

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<Message>>>,
    fail: bool,
}

impl MockLlmClient {
    /// 依次返回 replies 中的内容
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// 每次调用都失败
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// 已收到的请求（按调用顺序）
    pub async fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.requests.lock().await.push(messages.to_vec());
        if self.fail {
            return Err(LlmError::Api("mock failure".to_string()));
        }
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or(LlmError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let mock = MockLlmClient::scripted(["first", "second"]);
        let msgs = vec![Message::user("hi")];
        assert_eq!(mock.complete(&msgs).await.unwrap(), "first");
        assert_eq!(mock.complete(&msgs).await.unwrap(), "second");
        assert_eq!(mock.complete(&msgs).await, Err(LlmError::EmptyResponse));
        assert_eq!(mock.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let mock = MockLlmClient::failing();
        assert!(mock.complete(&[Message::user("hi")]).await.is_err());
    }
}
