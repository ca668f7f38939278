//! 对话历史：请求携带的最近若干轮消息
//!
//! Planner 只取最近 N 条拼入 prompt；角色名与前端约定一致（user / assistant / system）。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 取最近 `max_messages` 条非 system 消息（最新在最后），用于拼装规划上下文
pub fn recent_turns(history: &[Message], max_messages: usize) -> Vec<Message> {
    let filtered: Vec<&Message> = history
        .iter()
        .filter(|m| m.role != Role::System && !m.content.trim().is_empty())
        .collect();
    let skip = filtered.len().saturating_sub(max_messages);
    filtered.into_iter().skip(skip).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_turns_keeps_latest() {
        let history = vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::system("ignored"),
            Message::user("second"),
            Message::assistant("   "),
            Message::user("third"),
        ];
        let recent = recent_turns(&history, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "second");
        assert_eq!(recent[1].content, "third");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert!(json.contains("\"assistant\""));
        let back: Message = serde_json::from_str(r#"{"role":"user","content":"x"}"#).unwrap();
        assert_eq!(back.role, Role::User);
    }
}
