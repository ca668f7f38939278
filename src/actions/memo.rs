//! create_memo：为论文生成摘要笔记
//!
//! 给出 body 时写一条自由笔记；否则为解析出的每篇论文各写一条摘要笔记，多篇时按阅读顺序（年份）编号。

use async_trait::async_trait;

use crate::actions::keywords::subject_paper_id;
use crate::actions::params::{read_str, read_str_list, read_usize};
use crate::actions::registry::{
    Action, ActionContract, ActionKind, ActionOutcome, ParamSpec, ParamType, RetryClass, StateSlot,
};
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::Params;
use crate::services::{MemoDraft, MemoRef, PaperSummary, Services};

const MEMO_TAG: &str = "agent-summary";
const READING_ORDER_TAG: &str = "reading-order";

static CONTRACT: ActionContract = ActionContract {
    kind: ActionKind::CreateMemo,
    description: "Create summary memos. Without body, writes one summary memo per paper: explicit paper_ids, the top_k search results, the referenced paper, the papers from the request context, or the papers of the current project (in that order). Several papers are numbered in reading order.",
    params: &[
        ParamSpec {
            name: "title",
            ty: ParamType::String,
            required: false,
            description: "memo title (single memo only)",
        },
        ParamSpec {
            name: "body",
            ty: ParamType::String,
            required: false,
            description: "memo body (markdown)",
        },
        ParamSpec {
            name: "paper_id",
            ty: ParamType::String,
            required: false,
            description: "paper the memo refers to",
        },
        ParamSpec {
            name: "paper_ids",
            ty: ParamType::StringList,
            required: false,
            description: "papers to summarize, one memo each",
        },
        ParamSpec {
            name: "top_k",
            ty: ParamType::Integer { min: 1, max: Some(20) },
            required: false,
            description: "summarize the top k papers of the last search",
        },
    ],
    reads: &[
        StateSlot::LastPaper,
        StateSlot::LastResults,
        StateSlot::LastProject,
        StateSlot::ContextPapers,
    ],
    writes: &[StateSlot::Artifacts],
    retry: RetryClass::ReparameterizeOnly,
};

/// 论文摘要笔记正文；order 为阅读顺序编号（多篇时）
fn summary_body(paper: &PaperSummary, order: Option<usize>) -> String {
    let mut body = format!("# {}\n\n", paper.display_title());
    if let Some(order) = order {
        body.push_str(&format!("Reading order: {order}\n\n"));
    }
    if !paper.authors.is_empty() {
        body.push_str(&format!("- Authors: {}\n", paper.authors.join(", ")));
    }
    if let Some(year) = paper.year {
        body.push_str(&format!("- Year: {year}\n"));
    }
    if !paper.venue.is_empty() {
        body.push_str(&format!("- Venue: {}\n", paper.venue));
    }
    body.push_str(&format!("- ID: {}\n", paper.id));
    body.push_str("\n## Key points\n\n- Claim:\n- Method:\n- Result:\n");
    if paper.abstract_text.is_empty() {
        body.push_str("\n## Abstract\n\n(abstract not available)\n");
    } else {
        let snippet: String = paper.abstract_text.chars().take(1400).collect();
        body.push_str(&format!("\n## Abstract\n\n{snippet}\n"));
    }
    body.push_str("\n## Next checks\n\n- Differences from related work\n- Assumptions needed to reproduce\n");
    body
}

/// 阅读顺序：按年份从旧到新，无年份置后，同年保持原顺序
fn in_reading_order(mut papers: Vec<PaperSummary>) -> Vec<PaperSummary> {
    papers.sort_by_key(|p| p.year.map_or(i64::MAX, i64::from));
    papers
}

/// 摘要笔记的目标论文：显式 paper_ids > 上次结果前 top_k 篇 > 单篇目标 > 上下文论文 > 当前项目的论文
async fn memo_papers(
    params: &Params,
    state: &SessionState,
    services: &Services,
) -> Result<Vec<PaperSummary>, ActionError> {
    if let Some(ids) = read_str_list(params, "paper_ids") {
        return Ok(ids.iter().map(|id| state.known_paper(id)).collect());
    }
    if let Some(k) = read_usize(params, "top_k") {
        if state.last_results.is_empty() {
            return Err(ActionError::MissingState(
                "no search results to take top papers from".into(),
            ));
        }
        return Ok(state.last_results.iter().take(k).cloned().collect());
    }
    if let Ok(id) = subject_paper_id(params, state) {
        return Ok(vec![state.known_paper(&id)]);
    }
    if !state.context_papers.is_empty() {
        return Ok(state.context_papers.clone());
    }
    if let Some(project_id) = &state.last_project_id {
        let papers = services
            .projects
            .list_papers(project_id)
            .await
            .map_err(ActionError::service)?;
        if !papers.is_empty() {
            return Ok(papers);
        }
    }
    Err(ActionError::MissingState("no paper or body to write a memo about".into()))
}

fn memo_refs(paper: Option<&PaperSummary>, state: &SessionState) -> Vec<MemoRef> {
    let mut refs = Vec::new();
    if let Some(paper) = paper {
        refs.push(MemoRef {
            ref_type: "paper".into(),
            ref_id: paper.id.clone(),
        });
    }
    if let Some(project_id) = &state.last_project_id {
        refs.push(MemoRef {
            ref_type: "project".into(),
            ref_id: project_id.clone(),
        });
    }
    refs
}

pub struct CreateMemoAction;

impl CreateMemoAction {
    async fn write(
        &self,
        draft: MemoDraft,
        state: &mut SessionState,
        services: &Services,
    ) -> Result<String, ActionError> {
        let memo_id = services
            .memos
            .create_memo(draft)
            .await
            .map_err(ActionError::service)?;
        state.append("memo_ids", memo_id.as_str());
        Ok(memo_id)
    }
}

#[async_trait]
impl Action for CreateMemoAction {
    fn contract(&self) -> &'static ActionContract {
        &CONTRACT
    }

    async fn execute(
        &self,
        params: &Params,
        state: &mut SessionState,
        services: &Services,
    ) -> Result<ActionOutcome, ActionError> {
        CONTRACT.validate(params)?;

        if let Some(body) = read_str(params, "body") {
            let paper = subject_paper_id(params, state)
                .ok()
                .map(|id| state.known_paper(&id));
            let title = match (read_str(params, "title"), &paper) {
                (Some(title), _) => title.to_string(),
                (None, Some(paper)) => format!("Note: {}", paper.display_title()),
                (None, None) => "Agent memo".to_string(),
            };
            let draft = MemoDraft {
                title: title.clone(),
                body: body.to_string(),
                tags: vec![MEMO_TAG.to_string()],
                refs: memo_refs(paper.as_ref(), state),
            };
            let memo_id = self.write(draft, state, services).await?;
            let mut outcome = ActionOutcome::new(format!("created memo \"{title}\""))
                .with("memo_id", memo_id)
                .with("title", title);
            if let Some(paper) = paper {
                outcome = outcome.with("paper_id", paper.id);
            }
            return Ok(outcome);
        }

        let papers = in_reading_order(memo_papers(params, state, services).await?);
        if let [paper] = papers.as_slice() {
            let title = read_str(params, "title")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Summary: {}", paper.display_title()));
            let draft = MemoDraft {
                title: title.clone(),
                body: summary_body(paper, None),
                tags: vec![MEMO_TAG.to_string()],
                refs: memo_refs(Some(paper), state),
            };
            let memo_id = self.write(draft, state, services).await?;
            return Ok(ActionOutcome::new(format!("created memo \"{title}\""))
                .with("memo_id", memo_id)
                .with("title", title)
                .with("paper_id", paper.id.as_str()));
        }

        let mut memo_ids = Vec::with_capacity(papers.len());
        for (idx, paper) in papers.iter().enumerate() {
            let draft = MemoDraft {
                title: format!("Summary: {}", paper.display_title()),
                body: summary_body(paper, Some(idx + 1)),
                tags: vec![MEMO_TAG.to_string(), READING_ORDER_TAG.to_string()],
                refs: memo_refs(Some(paper), state),
            };
            memo_ids.push(self.write(draft, state, services).await?);
        }
        let paper_ids: Vec<String> = papers.into_iter().map(|p| p.id).collect();
        Ok(ActionOutcome::new(format!(
            "created {} summary memos in reading order",
            memo_ids.len()
        ))
        .with("count", memo_ids.len())
        .with("memo_ids", memo_ids)
        .with("paper_ids", paper_ids))
    }
}
