//! 内存工作区：所有协作接口的进程内实现（CLI / Web 演示与测试使用）
//!
//! 检索与相关论文按词重叠打分（无真实向量），项目、文库、笔记、关键词均存于内存；
//! 后续可替换为真实后端，编排核心无需改动。

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    Answer, Citation, KeywordService, LibraryService, MemoDraft, MemoService, PaperSummary,
    ProjectService, QaService, RelatedService, SearchService, TexService,
};

/// 支持的检索源
const SOURCES: &[&str] = &["arxiv", "pubmed", "scholar", "gemini"];

/// 关键词推荐时忽略的常见词
const STOPWORDS: &[&str] = &[
    "with", "from", "that", "this", "into", "over", "under", "using", "towards", "via", "for",
    "and", "the", "are", "all", "you", "need", "what", "your", "their", "through",
];

#[derive(Debug, Clone)]
struct ProjectRecord {
    title: String,
    papers: Vec<String>,
}

#[derive(Default)]
struct WorkspaceData {
    catalog: Vec<PaperSummary>,
    library: BTreeMap<String, PaperSummary>,
    projects: HashMap<String, ProjectRecord>,
    memos: HashMap<String, MemoDraft>,
    keywords: HashMap<String, Vec<String>>,
}

/// 进程内工作区：论文目录 + 文库 + 项目 + 笔记 + 关键词
pub struct InMemoryWorkspace {
    data: RwLock<WorkspaceData>,
}

/// 将文本切分为小写词集合，用于简单相似度（词重叠数）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 1)
        .collect()
}

fn paper_tokens(paper: &PaperSummary) -> HashSet<String> {
    tokenize_lower(&format!("{} {}", paper.title, paper.abstract_text))
}

/// 按与 query_tokens 的重叠数排序；同分时较新的论文在前
fn rank_by_overlap<'a>(
    query_tokens: &HashSet<String>,
    papers: impl Iterator<Item = &'a PaperSummary>,
) -> Vec<(usize, PaperSummary)> {
    let mut scored: Vec<(usize, PaperSummary)> = papers
        .map(|p| (query_tokens.intersection(&paper_tokens(p)).count(), p.clone()))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.year.cmp(&a.1.year)));
    scored
}

impl InMemoryWorkspace {
    pub fn new(catalog: Vec<PaperSummary>) -> Self {
        Self {
            data: RwLock::new(WorkspaceData {
                catalog,
                ..WorkspaceData::default()
            }),
        }
    }

    /// 带演示论文目录的工作区
    pub fn with_demo_catalog() -> Self {
        Self::new(demo_catalog())
    }

    pub async fn project_papers(&self, project_id: &str) -> Option<Vec<String>> {
        let data = self.data.read().await;
        data.projects.get(project_id).map(|p| p.papers.clone())
    }

    pub async fn project_title(&self, project_id: &str) -> Option<String> {
        let data = self.data.read().await;
        data.projects.get(project_id).map(|p| p.title.clone())
    }

    pub async fn library_ids(&self) -> Vec<String> {
        self.data.read().await.library.keys().cloned().collect()
    }

    pub async fn memo_count(&self) -> usize {
        self.data.read().await.memos.len()
    }

    pub async fn keywords_of(&self, paper_id: &str) -> Vec<String> {
        self.data
            .read()
            .await
            .keywords
            .get(paper_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryWorkspace {
    fn default() -> Self {
        Self::with_demo_catalog()
    }
}

#[async_trait]
impl SearchService for InMemoryWorkspace {
    async fn search(&self, query: &str, source: &str, limit: usize) -> anyhow::Result<Vec<PaperSummary>> {
        let source = source.to_lowercase();
        if !SOURCES.contains(&source.as_str()) {
            bail!("unsupported search source: {source}");
        }
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            bail!("empty search query");
        }
        let data = self.data.read().await;
        Ok(rank_by_overlap(&query_tokens, data.catalog.iter())
            .into_iter()
            .take(limit)
            .map(|(_, mut paper)| {
                paper.source = source.clone();
                paper
            })
            .collect())
    }
}

#[async_trait]
impl LibraryService for InMemoryWorkspace {
    async fn save(&self, paper: &PaperSummary) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        let stored = data
            .catalog
            .iter()
            .find(|p| p.id == paper.id)
            .cloned()
            .unwrap_or_else(|| paper.clone());
        data.library.insert(stored.id.clone(), stored);
        Ok(())
    }
}

#[async_trait]
impl ProjectService for InMemoryWorkspace {
    async fn create_project(&self, title: &str, _description: &str) -> anyhow::Result<String> {
        let title = title.trim();
        if title.is_empty() {
            bail!("project title must not be empty");
        }
        let id = format!("prj_{}", uuid::Uuid::new_v4().simple());
        self.data.write().await.projects.insert(
            id.clone(),
            ProjectRecord {
                title: title.to_string(),
                papers: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn add_paper(&self, project_id: &str, paper_id: &str) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        let project = data
            .projects
            .get_mut(project_id)
            .ok_or_else(|| anyhow!("project not found: {project_id}"))?;
        if !project.papers.iter().any(|p| p == paper_id) {
            project.papers.push(paper_id.to_string());
        }
        Ok(())
    }

    async fn list_papers(&self, project_id: &str) -> anyhow::Result<Vec<PaperSummary>> {
        let data = self.data.read().await;
        let project = data
            .projects
            .get(project_id)
            .ok_or_else(|| anyhow!("project not found: {project_id}"))?;
        Ok(project
            .papers
            .iter()
            .map(|id| {
                data.library
                    .get(id)
                    .or_else(|| data.catalog.iter().find(|p| &p.id == id))
                    .cloned()
                    .unwrap_or_else(|| PaperSummary::from_id(id.as_str()))
            })
            .collect())
    }
}

#[async_trait]
impl QaService for InMemoryWorkspace {
    async fn ask(&self, question: &str, top_k: usize) -> anyhow::Result<Answer> {
        let query_tokens = tokenize_lower(question);
        let data = self.data.read().await;
        // 文库为空时退回整个目录
        let corpus: Vec<&PaperSummary> = if data.library.is_empty() {
            data.catalog.iter().collect()
        } else {
            data.library.values().collect()
        };
        let ranked = rank_by_overlap(&query_tokens, corpus.into_iter());
        if ranked.is_empty() {
            return Ok(Answer {
                text: "No relevant papers were found in the library for this question.".to_string(),
                confidence: 0.0,
                citations: Vec::new(),
            });
        }

        let best = ranked[0].0 as f64;
        let confidence = (best / query_tokens.len().max(1) as f64).min(1.0);
        let mut lines = Vec::new();
        let mut citations = Vec::new();
        for (_, paper) in ranked.into_iter().take(top_k.max(1)) {
            let first_sentence = paper
                .abstract_text
                .split(". ")
                .next()
                .unwrap_or_default()
                .trim_end_matches('.');
            lines.push(format!("{}: {}.", paper.title, first_sentence));
            citations.push(Citation {
                paper_id: paper.id,
                title: paper.title,
            });
        }
        Ok(Answer {
            text: lines.join("\n"),
            confidence,
            citations,
        })
    }

    async fn explain(&self, paper: &PaperSummary, _question: &str) -> anyhow::Result<String> {
        let data = self.data.read().await;
        let stored = data
            .library
            .get(&paper.id)
            .or_else(|| data.catalog.iter().find(|p| p.id == paper.id))
            .unwrap_or(paper);
        if stored.abstract_text.trim().is_empty() {
            bail!("no abstract available for {}", stored.id);
        }
        let sentences: Vec<&str> = stored
            .abstract_text
            .split(". ")
            .map(|s| s.trim().trim_end_matches('.'))
            .filter(|s| !s.is_empty())
            .take(2)
            .collect();
        Ok(format!(
            "{} ({}) in short: {}.",
            stored.display_title(),
            stored.year.map_or_else(|| "year unknown".to_string(), |y| y.to_string()),
            sentences.join(". ")
        ))
    }
}

#[async_trait]
impl MemoService for InMemoryWorkspace {
    async fn create_memo(&self, draft: MemoDraft) -> anyhow::Result<String> {
        if draft.title.trim().is_empty() {
            bail!("memo title must not be empty");
        }
        let id = format!("memo_{}", uuid::Uuid::new_v4().simple());
        self.data.write().await.memos.insert(id.clone(), draft);
        Ok(id)
    }
}

#[async_trait]
impl KeywordService for InMemoryWorkspace {
    async fn suggest(&self, paper_id: &str) -> anyhow::Result<usize> {
        let mut data = self.data.write().await;
        let paper = data
            .catalog
            .iter()
            .chain(data.library.values())
            .find(|p| p.id == paper_id)
            .cloned()
            .ok_or_else(|| anyhow!("paper not found: {paper_id}"))?;

        let mut suggested: Vec<String> = Vec::new();
        for word in paper.title.split(|c: char| !c.is_alphanumeric()) {
            let word = word.to_lowercase();
            if word.chars().count() > 3
                && !STOPWORDS.contains(&word.as_str())
                && !suggested.contains(&word)
            {
                suggested.push(word);
            }
        }
        suggested.truncate(5);

        let applied = data.keywords.entry(paper.id).or_default();
        let mut added = 0;
        for keyword in suggested {
            if !applied.contains(&keyword) {
                applied.push(keyword);
                added += 1;
            }
        }
        Ok(added)
    }
}

#[async_trait]
impl RelatedService for InMemoryWorkspace {
    async fn related(&self, paper_id: &str, limit: usize) -> anyhow::Result<Vec<PaperSummary>> {
        let data = self.data.read().await;
        let anchor = data
            .catalog
            .iter()
            .find(|p| p.id == paper_id)
            .ok_or_else(|| anyhow!("paper not found: {paper_id}"))?;
        let anchor_tokens = paper_tokens(anchor);
        Ok(
            rank_by_overlap(&anchor_tokens, data.catalog.iter().filter(|p| p.id != paper_id))
                .into_iter()
                .take(limit)
                .map(|(_, p)| p)
                .collect(),
        )
    }
}

#[async_trait]
impl TexService for InMemoryWorkspace {
    async fn compile(&self, project_id: &str, entry_file: &str) -> anyhow::Result<String> {
        let data = self.data.read().await;
        if !data.projects.contains_key(project_id) {
            bail!("project not found: {project_id}");
        }
        let stem = entry_file
            .strip_suffix(".tex")
            .ok_or_else(|| anyhow!("entry file must be a .tex file: {entry_file}"))?;
        Ok(format!("/projects/{project_id}/build/{stem}.pdf"))
    }
}

fn paper(
    id: &str,
    title: &str,
    authors: &[&str],
    year: i32,
    venue: &str,
    abstract_text: &str,
) -> PaperSummary {
    PaperSummary {
        id: id.to_string(),
        title: title.to_string(),
        authors: authors.iter().map(|a| a.to_string()).collect(),
        year: Some(year),
        venue: venue.to_string(),
        abstract_text: abstract_text.to_string(),
        source: "arxiv".to_string(),
    }
}

/// 演示用论文目录
pub fn demo_catalog() -> Vec<PaperSummary> {
    vec![
        paper(
            "arxiv:1706.03762",
            "Attention Is All You Need",
            &["Ashish Vaswani", "Noam Shazeer", "Niki Parmar"],
            2017,
            "NeurIPS",
            "We propose the Transformer, a network architecture based solely on attention mechanisms. Experiments on machine translation show superior quality.",
        ),
        paper(
            "arxiv:1810.04805",
            "BERT: Pre-training of Deep Bidirectional Transformers for Language Understanding",
            &["Jacob Devlin", "Ming-Wei Chang", "Kenton Lee", "Kristina Toutanova"],
            2019,
            "NAACL",
            "We introduce BERT, a language representation model that pre-trains deep bidirectional transformers on unlabeled text. It obtains state of the art results on language understanding benchmarks.",
        ),
        paper(
            "arxiv:1609.02907",
            "Semi-Supervised Classification with Graph Convolutional Networks",
            &["Thomas N. Kipf", "Max Welling"],
            2017,
            "ICLR",
            "We present a scalable approach for semi-supervised learning on graph-structured data based on graph convolutional networks. The model scales linearly in the number of graph edges.",
        ),
        paper(
            "arxiv:1710.10903",
            "Graph Attention Networks",
            &["Petar Velickovic", "Guillem Cucurull", "Arantxa Casanova"],
            2018,
            "ICLR",
            "We present graph attention networks, neural network architectures that operate on graph-structured data with masked self-attention layers.",
        ),
        paper(
            "arxiv:1810.00826",
            "How Powerful are Graph Neural Networks?",
            &["Keyulu Xu", "Weihua Hu", "Jure Leskovec", "Stefanie Jegelka"],
            2019,
            "ICLR",
            "Graph neural networks are an effective framework for representation learning of graphs. We characterize the discriminative power of popular graph neural network variants.",
        ),
        paper(
            "arxiv:2006.11239",
            "Denoising Diffusion Probabilistic Models",
            &["Jonathan Ho", "Ajay Jain", "Pieter Abbeel"],
            2020,
            "NeurIPS",
            "We present high quality image synthesis results using diffusion probabilistic models, a class of latent variable models inspired by nonequilibrium thermodynamics.",
        ),
        paper(
            "arxiv:1512.03385",
            "Deep Residual Learning for Image Recognition",
            &["Kaiming He", "Xiangyu Zhang", "Shaoqing Ren", "Jian Sun"],
            2016,
            "CVPR",
            "We present a residual learning framework to ease the training of very deep networks for image recognition. Residual networks won the ImageNet classification task.",
        ),
        paper(
            "arxiv:2010.11929",
            "An Image is Worth 16x16 Words: Transformers for Image Recognition at Scale",
            &["Alexey Dosovitskiy", "Lucas Beyer", "Alexander Kolesnikov"],
            2021,
            "ICLR",
            "We show that a pure transformer applied directly to sequences of image patches performs very well on image recognition tasks.",
        ),
        paper(
            "arxiv:2005.11401",
            "Retrieval-Augmented Generation for Knowledge-Intensive NLP Tasks",
            &["Patrick Lewis", "Ethan Perez", "Aleksandra Piktus"],
            2020,
            "NeurIPS",
            "We explore retrieval-augmented generation models which combine pre-trained parametric and non-parametric memory for language generation.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_ranks_by_overlap() {
        let ws = InMemoryWorkspace::with_demo_catalog();
        let results = ws.search("graph neural networks", "arxiv", 3).await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].id, "arxiv:1810.00826");
        assert!(results.iter().all(|p| p.source == "arxiv"));
    }

    #[tokio::test]
    async fn test_search_rejects_unknown_source() {
        let ws = InMemoryWorkspace::with_demo_catalog();
        let err = ws.search("graph", "dblp", 3).await.unwrap_err();
        assert!(err.to_string().contains("unsupported search source"));
    }

    #[tokio::test]
    async fn test_add_paper_requires_project() {
        let ws = InMemoryWorkspace::with_demo_catalog();
        assert!(ws.add_paper("prj_missing", "arxiv:1706.03762").await.is_err());

        let id = ws.create_project("GNN Survey", "").await.unwrap();
        ws.add_paper(&id, "arxiv:1706.03762").await.unwrap();
        ws.add_paper(&id, "arxiv:1706.03762").await.unwrap();
        assert_eq!(ws.project_papers(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_papers_keeps_insertion_order() {
        let ws = InMemoryWorkspace::with_demo_catalog();
        let id = ws.create_project("Reading", "").await.unwrap();
        ws.add_paper(&id, "arxiv:2006.11239").await.unwrap();
        ws.add_paper(&id, "local:draft").await.unwrap();

        let papers = ws.list_papers(&id).await.unwrap();
        assert_eq!(papers[0].title, "Denoising Diffusion Probabilistic Models");
        assert_eq!(papers[1], PaperSummary::from_id("local:draft"));
        assert!(ws.list_papers("prj_missing").await.is_err());
    }

    #[tokio::test]
    async fn test_explain_needs_abstract() {
        let ws = InMemoryWorkspace::with_demo_catalog();
        let text = ws
            .explain(&PaperSummary::from_id("arxiv:1706.03762"), "what is it?")
            .await
            .unwrap();
        assert!(text.starts_with("Attention Is All You Need (2017) in short: We propose the Transformer"));
        assert!(ws.explain(&PaperSummary::from_id("local:x"), "?").await.is_err());
    }

    #[tokio::test]
    async fn test_keyword_suggestion_skips_stopwords() {
        let ws = InMemoryWorkspace::with_demo_catalog();
        let applied = ws.suggest("arxiv:1706.03762").await.unwrap();
        assert_eq!(applied, 1);
        assert_eq!(ws.keywords_of("arxiv:1706.03762").await, vec!["attention"]);
        // 再次推荐不会重复应用
        assert_eq!(ws.suggest("arxiv:1706.03762").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_compile_needs_tex_entry() {
        let ws = InMemoryWorkspace::with_demo_catalog();
        let id = ws.create_project("Thesis", "").await.unwrap();
        let out = ws.compile(&id, "main.tex").await.unwrap();
        assert_eq!(out, format!("/projects/{id}/build/main.pdf"));
        assert!(ws.compile(&id, "main.md").await.is_err());
    }
}
