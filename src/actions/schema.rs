//! 规划响应 JSON Schema（schemars 生成）
//!
//! 拼入规划 prompt，约束 LLM 输出 `{"summary", "steps", "actions": [{"action", "params"}]}`。

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

use crate::core::types::ProposedAction;

/// LLM 规划响应格式
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct PlanResponse {
    /// 一句话概述计划
    #[serde(default)]
    pub summary: String,
    /// 面向用户的步骤描述
    #[serde(default)]
    pub steps: Vec<String>,
    /// 按执行顺序排列的动作
    #[serde(default)]
    pub actions: Vec<ProposedAction>,
}

/// 返回规划响应的 JSON Schema 字符串
pub fn plan_response_schema_json() -> String {
    let schema = schema_for!(PlanResponse);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
