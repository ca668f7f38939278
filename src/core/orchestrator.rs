//! 编排器：规划 → 顺序执行（含一次替代重试）→ 判定 → 组装回复
//!
//! 编排器本身无状态，每次请求新建 SessionState；单次请求内动作严格顺序执行。
//! 任何环节的失败都不会让请求整体报错，总是返回一个尽力而为的 ChatResponse。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::coordinator::{ExecutionReport, RetryCoordinator};
use crate::core::error::OrchestratorError;
use crate::core::state::SessionState;
use crate::core::types::{ChatRequest, ChatResponse, Target};
use crate::llm::{LlmClient, LlmError, OpenAiClient};
use crate::pipeline::composer::compose_reply;
use crate::pipeline::events::{emit, EventSender, OrchestratorEvent};
use crate::pipeline::planner::{PlanRequest, Planner};
use crate::pipeline::verifier::{Verifier, VerifyRequest};

const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";

/// 根据配置与环境变量选择 LLM 后端；未配置 provider 或缺少 API Key 时返回 None（规划与判定走确定性策略）
pub fn create_llm_from_config(
    cfg: &AppConfig,
) -> Result<Option<Arc<dyn LlmClient>>, OrchestratorError> {
    let provider = cfg.llm.provider.trim().to_lowercase();
    let (key_var, default_base) = match provider.as_str() {
        "" | "none" => {
            tracing::info!("LLM disabled by config");
            return Ok(None);
        }
        "openai" => ("OPENAI_API_KEY", None),
        "deepseek" => ("DEEPSEEK_API_KEY", Some(DEEPSEEK_BASE_URL)),
        other => return Err(LlmError::Api(format!("unknown llm provider: {other}")).into()),
    };

    let Some(api_key) = std::env::var(key_var).ok().filter(|k| !k.trim().is_empty()) else {
        tracing::warn!("{} not set, using keyword planner only", key_var);
        return Ok(None);
    };

    let base = cfg.llm.base_url.as_deref().or(default_base);
    // 默认模型名属于 OpenAI，DeepSeek 下换成 deepseek-chat
    let model = match (provider.as_str(), cfg.llm.model.as_str()) {
        ("deepseek", m) if m.starts_with("gpt-") => DEEPSEEK_DEFAULT_MODEL,
        (_, m) => m,
    };
    tracing::info!("Using {} LLM ({})", provider, model);
    Ok(Some(Arc::new(OpenAiClient::new(
        base,
        model,
        &api_key,
        cfg.llm.request_timeout_secs,
    ))))
}

pub struct Orchestrator {
    planner: Planner,
    coordinator: RetryCoordinator,
    verifier: Verifier,
}

impl Orchestrator {
    pub fn new(planner: Planner, coordinator: RetryCoordinator, verifier: Verifier) -> Self {
        Self {
            planner,
            coordinator,
            verifier,
        }
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// 处理一次请求（不可取消、无事件）
    pub async fn handle(&self, request: &ChatRequest) -> ChatResponse {
        self.handle_with(request, &CancellationToken::new(), None).await
    }

    /// 处理一次请求；cancel 在每个动作分发前检查，events 接收过程事件
    pub async fn handle_with(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        events: Option<&EventSender>,
    ) -> ChatResponse {
        let outcome = match &request.actions_override {
            Some(proposed) => self.planner.plan_from_override(proposed),
            None => {
                let plan_request = PlanRequest {
                    message: &request.message,
                    history: &request.history,
                    context: &request.context,
                };
                self.planner.plan(&plan_request).await
            }
        };
        let plan = outcome.plan;
        tracing::info!(
            strategy = outcome.strategy,
            actions = plan.actions.len(),
            execute = request.execute,
            "planned: {}",
            plan.summary
        );
        emit(
            events,
            OrchestratorEvent::Planned {
                summary: plan.summary.clone(),
                actions: plan.actions.iter().map(|a| a.action).collect(),
                strategy: outcome.strategy.to_string(),
            },
        );

        let mut state = SessionState::from_context(&request.context);
        let report = if request.execute {
            self.coordinator
                .run(&plan.actions, &mut state, cancel, events)
                .await
        } else {
            ExecutionReport {
                pending: plan.actions.clone(),
                ..ExecutionReport::default()
            }
        };

        let verification = self
            .verifier
            .verify(
                &VerifyRequest {
                    message: &request.message,
                    plan: &plan,
                    steps: &report.steps,
                    artifacts: &state.artifacts,
                },
                request.execute,
            )
            .await;
        emit(
            events,
            OrchestratorEvent::Verified {
                verdict: verification.verdict,
                summary: verification.summary.clone(),
            },
        );

        let reply = compose_reply(&plan, &report.steps, request.execute, &verification);
        ChatResponse {
            reply: reply.text,
            summary: plan.summary,
            plan: plan.steps,
            actions: plan.actions,
            steps: report.steps,
            artifacts: state.artifacts,
            target_path: reply.target.as_ref().map(Target::path),
            target: reply.target,
            verification,
            pending_actions: report.pending,
        }
    }
}
