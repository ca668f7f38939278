//! Agent 装配
//!
//! 由配置构建注册表、规划器、执行器、协调器与判定器，组合成一个可多请求共享的 Orchestrator。
//! 协作服务句柄在构造时注入；LLM 可选，缺失时规划与判定都走确定性策略。

use std::path::PathBuf;
use std::sync::Arc;

use crate::actions::{ActionExecutor, ActionRegistry};
use crate::config::{load_config, AppConfig};
use crate::core::{create_llm_from_config, Orchestrator, OrchestratorError, RetryCoordinator};
use crate::llm::LlmClient;
use crate::pipeline::{GenerativePlanner, GenerativeVerifier, KeywordPlanner, Planner, Verifier};
use crate::services::{InMemoryWorkspace, Services};

/// 用给定的 LLM（可为 None）构建编排器
pub fn create_orchestrator_with_llm(
    cfg: &AppConfig,
    services: Services,
    llm: Option<Arc<dyn LlmClient>>,
) -> Orchestrator {
    let registry = Arc::new(ActionRegistry::with_builtin_actions(
        &cfg.planner.action_settings(),
    ));

    let mut planner = Planner::new(
        registry.clone(),
        KeywordPlanner::new(&cfg.planner),
        cfg.planner.max_actions,
    );
    let mut verifier = Verifier::new(cfg.verifier.max_list_items);
    if let Some(llm) = llm {
        planner = planner.with_generative(GenerativePlanner::new(
            llm.clone(),
            registry.clone(),
            cfg.planner.load_capability_doc(),
            cfg.planner.max_actions,
            cfg.planner.history_turns,
        ));
        if cfg.verifier.use_llm {
            verifier = verifier.with_generative(GenerativeVerifier::new(llm, cfg.verifier.max_list_items));
        }
    }

    let executor = ActionExecutor::new(registry, services, cfg.executor.action_timeout_secs);
    Orchestrator::new(planner, RetryCoordinator::new(executor), verifier)
}

/// 按配置选择 LLM 后端并构建编排器
pub fn create_orchestrator(
    cfg: &AppConfig,
    services: Services,
) -> Result<Orchestrator, OrchestratorError> {
    let llm = create_llm_from_config(cfg)?;
    Ok(create_orchestrator_with_llm(cfg, services, llm))
}

/// 演示用：内置论文目录的内存工作区
pub fn demo_services() -> Services {
    Services::in_memory(Arc::new(InMemoryWorkspace::with_demo_catalog()))
}

/// 加载配置（失败时报错）并用演示工作区构建编排器
pub fn create_demo_orchestrator(
    config_path: Option<PathBuf>,
) -> Result<(AppConfig, Orchestrator), OrchestratorError> {
    let cfg = load_config(config_path)?;
    let orchestrator = create_orchestrator(&cfg, demo_services())?;
    Ok((cfg, orchestrator))
}
