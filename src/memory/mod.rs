//! 对话记忆：消息模型与历史窗口

pub mod conversation;

pub use conversation::{recent_turns, Message, Role};
