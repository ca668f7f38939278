//! Kawa - 论文工作台智能体编排核心
//!
//! 模块划分：
//! - **actions**: 动作契约注册表、内置动作与执行器
//! - **agent**: 由配置装配 Orchestrator
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 数据模型、会话状态、替代动作、重试协调、编排器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话消息与历史窗口
//! - **observability**: 日志初始化
//! - **pipeline**: 意图识别、规划、判定、回复组装、过程事件
//! - **services**: 协作服务接口与内存实现

pub mod actions;
pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod services;

pub use agent::{create_orchestrator, create_orchestrator_with_llm};
pub use core::{ChatRequest, ChatResponse, Orchestrator};
