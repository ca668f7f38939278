//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `KAWA__*` 覆盖（双下划线表示嵌套，如 `KAWA__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::actions::ActionSettings;
use crate::pipeline::intent::TriggerSets;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub planner: PlannerSection,
    pub executor: ExecutorSection,
    pub verifier: VerifierSection,
}

/// [app] 段：应用名、HTTP 监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub listen_addr: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "kawa".to_string(),
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek / none；是否启用还取决于 API Key 是否存在
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            request_timeout_secs: 60,
        }
    }
}

/// [planner] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerSection {
    /// 单个计划的动作数上限
    pub max_actions: usize,
    /// 拼入 prompt 的历史消息条数
    pub history_turns: usize,
    /// 未说明数量时保存 / 关联的论文数
    pub attach_top_k: usize,
    pub default_source: String,
    pub search_limit: usize,
    /// 能力说明文档（Markdown），拼入规划 prompt
    pub capability_doc: Option<PathBuf>,
    pub triggers: TriggerSets,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            max_actions: 40,
            history_turns: 6,
            attach_top_k: 3,
            default_source: "arxiv".to_string(),
            search_limit: 8,
            capability_doc: None,
            triggers: TriggerSets::default(),
        }
    }
}

impl PlannerSection {
    /// 内置动作使用的默认值
    pub fn action_settings(&self) -> ActionSettings {
        ActionSettings {
            default_source: self.default_source.clone(),
            search_limit: self.search_limit,
        }
    }

    /// 读取能力说明文档；未配置或读取失败时返回 None
    pub fn load_capability_doc(&self) -> Option<String> {
        let path = self.capability_doc.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "capability doc not readable");
                None
            }
        }
    }
}

/// [executor] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    /// 单个动作超时（秒）
    pub action_timeout_secs: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            action_timeout_secs: 30,
        }
    }
}

/// [verifier] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifierSection {
    /// achieved / missing 列表的最大条数
    pub max_list_items: usize,
    /// 是否尝试 LLM 判定（无 LLM 时始终使用启发式）
    pub use_llm: bool,
}

impl Default for VerifierSection {
    fn default() -> Self {
        Self {
            max_list_items: 10,
            use_llm: true,
        }
    }
}

/// 从 config 目录加载配置，环境变量 KAWA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 KAWA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path.filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("KAWA")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 加载配置，失败时记录警告并使用默认值
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.planner.max_actions, 40);
        assert_eq!(cfg.planner.history_turns, 6);
        assert_eq!(cfg.planner.attach_top_k, 3);
        assert_eq!(cfg.executor.action_timeout_secs, 30);
        assert_eq!(cfg.verifier.max_list_items, 10);
        assert!(cfg.planner.triggers.search.contains(&"search".to_string()));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[planner]\nmax_actions = 5\ndefault_source = \"pubmed\"\n\n[planner.triggers]\nsave = [\"keep\"]\n\n[llm]\nprovider = \"none\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.planner.max_actions, 5);
        assert_eq!(cfg.planner.default_source, "pubmed");
        assert_eq!(cfg.planner.history_turns, 6);
        assert_eq!(cfg.planner.triggers.save, vec!["keep".to_string()]);
        // 未覆盖的触发词集合保持默认
        assert!(!cfg.planner.triggers.search.is_empty());
        assert_eq!(cfg.llm.provider, "none");
        assert_eq!(cfg.executor.action_timeout_secs, 30);
    }

    #[test]
    fn test_capability_doc_missing_file() {
        let section = PlannerSection {
            capability_doc: Some(PathBuf::from("/nonexistent/capabilities.md")),
            ..PlannerSection::default()
        };
        assert!(section.load_capability_doc().is_none());
    }
}
