//! LLM 层：客户端抽象、OpenAI 兼容实现、Mock、JSON 提取

pub mod json;
pub mod mock;
pub mod openai;
pub mod traits;

pub use json::extract_json;
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmError};
