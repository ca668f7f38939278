//! 外部协作服务：检索、文库、项目、问答、笔记、关键词、相关论文、LaTeX 编译
//!
//! 编排核心只依赖这些窄接口；每个调用要么返回值、要么返回错误，执行器只捕获并字符串化错误，
//! 不关心具体实现的错误类型。`Services` 在构造时注入执行器，不存在模块级全局客户端。

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use memory::{demo_catalog, InMemoryWorkspace};

/// 论文摘要（检索结果 / 会话中复用的离线副本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub venue: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub source: String,
}

impl PaperSummary {
    /// 仅知道 ID 时的占位副本（例如来自请求上下文的论文）
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            authors: Vec::new(),
            year: None,
            venue: String::new(),
            abstract_text: String::new(),
            source: String::new(),
        }
    }

    /// 展示用标题：无标题时退回 ID
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

/// 问答引用来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub paper_id: String,
    pub title: String,
}

/// 文库问答结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub confidence: f64,
    pub citations: Vec<Citation>,
}

/// 笔记引用（论文 / 项目）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoRef {
    pub ref_type: String,
    pub ref_id: String,
}

/// 待创建的笔记
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoDraft {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub refs: Vec<MemoRef>,
}

#[async_trait]
pub trait SearchService: Send + Sync {
    /// 按 query 检索，source 为检索源提示（arxiv / pubmed / scholar ...）
    async fn search(&self, query: &str, source: &str, limit: usize) -> anyhow::Result<Vec<PaperSummary>>;
}

#[async_trait]
pub trait LibraryService: Send + Sync {
    /// 保存到个人文库（不存在则先登记论文）
    async fn save(&self, paper: &PaperSummary) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ProjectService: Send + Sync {
    /// 创建项目，返回项目 ID
    async fn create_project(&self, title: &str, description: &str) -> anyhow::Result<String>;

    /// 将论文加入项目
    async fn add_paper(&self, project_id: &str, paper_id: &str) -> anyhow::Result<()>;

    /// 项目中的论文（按加入顺序）
    async fn list_papers(&self, project_id: &str) -> anyhow::Result<Vec<PaperSummary>>;
}

#[async_trait]
pub trait QaService: Send + Sync {
    /// 在私有语料上回答问题
    async fn ask(&self, question: &str, top_k: usize) -> anyhow::Result<Answer>;

    /// 针对单篇论文回答问题（解说 / 要约）
    async fn explain(&self, paper: &PaperSummary, question: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait MemoService: Send + Sync {
    /// 创建笔记，返回笔记 ID
    async fn create_memo(&self, draft: MemoDraft) -> anyhow::Result<String>;
}

#[async_trait]
pub trait KeywordService: Send + Sync {
    /// 为论文推荐并应用关键词，返回应用数量
    async fn suggest(&self, paper_id: &str) -> anyhow::Result<usize>;
}

#[async_trait]
pub trait RelatedService: Send + Sync {
    async fn related(&self, paper_id: &str, limit: usize) -> anyhow::Result<Vec<PaperSummary>>;
}

#[async_trait]
pub trait TexService: Send + Sync {
    /// 编译项目中的 LaTeX 入口文件，返回产物路径或 URL
    async fn compile(&self, project_id: &str, entry_file: &str) -> anyhow::Result<String>;
}

/// 注入执行器的协作服务句柄集合
#[derive(Clone)]
pub struct Services {
    pub search: Arc<dyn SearchService>,
    pub library: Arc<dyn LibraryService>,
    pub projects: Arc<dyn ProjectService>,
    pub qa: Arc<dyn QaService>,
    pub memos: Arc<dyn MemoService>,
    pub keywords: Arc<dyn KeywordService>,
    pub related: Arc<dyn RelatedService>,
    pub tex: Arc<dyn TexService>,
}

impl Services {
    /// 所有接口由同一个内存工作区实现
    pub fn in_memory(workspace: Arc<InMemoryWorkspace>) -> Self {
        Self {
            search: workspace.clone(),
            library: workspace.clone(),
            projects: workspace.clone(),
            qa: workspace.clone(),
            memos: workspace.clone(),
            keywords: workspace.clone(),
            related: workspace.clone(),
            tex: workspace,
        }
    }
}
