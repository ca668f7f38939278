//! answer_question：基于文库回答问题，或针对单篇论文解说（scope = "paper"）

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::actions::keywords::subject_paper_id;
use crate::actions::params::{read_str, read_usize};
use crate::actions::registry::{
    required_str, Action, ActionContract, ActionKind, ActionOutcome, ParamSpec, ParamType,
    RetryClass, StateSlot,
};
use crate::actions::OUTPUT_PREVIEW;
use crate::core::error::ActionError;
use crate::core::state::SessionState;
use crate::core::types::Params;
use crate::services::{PaperSummary, Services};

const DEFAULT_TOP_K: usize = 5;
/// 输出中回答文本的最大字符数
const ANSWER_PREVIEW_CHARS: usize = 600;
/// 解说退回摘要时引用的最大字符数
const ABSTRACT_FALLBACK_CHARS: usize = 1200;

static CONTRACT: ActionContract = ActionContract {
    kind: ActionKind::AnswerQuestion,
    description: "Answer a question using the papers in the personal library, or explain one paper (scope \"paper\").",
    params: &[
        ParamSpec {
            name: "question",
            ty: ParamType::String,
            required: true,
            description: "the question to answer",
        },
        ParamSpec {
            name: "top_k",
            ty: ParamType::Integer { min: 1, max: Some(20) },
            required: false,
            description: "number of papers to consult (default 5)",
        },
        ParamSpec {
            name: "scope",
            ty: ParamType::String,
            required: false,
            description: "\"library\" (default) or \"paper\" to explain a single paper",
        },
        ParamSpec {
            name: "paper_id",
            ty: ParamType::String,
            required: false,
            description: "paper to explain (default: the last referenced paper)",
        },
    ],
    reads: &[StateSlot::LastPaper, StateSlot::LastResults],
    writes: &[StateSlot::Artifacts],
    retry: RetryClass::Idempotent,
};

/// 论文书目信息头
fn paper_header(paper: &PaperSummary) -> String {
    let authors = if paper.authors.is_empty() {
        "unknown".to_string()
    } else {
        paper.authors.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
    };
    let year = paper.year.map_or_else(|| "unknown".to_string(), |y| y.to_string());
    format!("Paper: {}\nAuthors: {authors}\nYear: {year}", paper.display_title())
}

/// 解说失败时基于摘要的说明
fn abstract_explanation(paper: &PaperSummary) -> String {
    let abstract_text = paper.abstract_text.trim();
    if abstract_text.is_empty() {
        return format!(
            "{}\n\nThe paper was found, but its abstract is not available, so it cannot be summarized yet.",
            paper_header(paper)
        );
    }
    let snippet: String = abstract_text.chars().take(ABSTRACT_FALLBACK_CHARS).collect();
    format!(
        "{}\n\nOverview:\n{snippet}\n\nThis explanation is based on the abstract only.",
        paper_header(paper)
    )
}

pub struct AnswerQuestionAction;

impl AnswerQuestionAction {
    async fn explain_paper(
        &self,
        params: &Params,
        question: &str,
        state: &mut SessionState,
        services: &Services,
    ) -> Result<ActionOutcome, ActionError> {
        let paper = state.known_paper(&subject_paper_id(params, state)?);
        let (text, from_abstract) = match services.qa.explain(&paper, question).await {
            Ok(text) => (format!("{}\n\n{text}", paper_header(&paper)), false),
            Err(e) => {
                tracing::warn!(paper_id = %paper.id, error = %e, "paper explanation failed, using abstract");
                (abstract_explanation(&paper), true)
            }
        };
        state.record(
            "answer",
            json!({ "paper_id": paper.id, "from_abstract": from_abstract }),
        );

        let text: String = text.chars().take(ANSWER_PREVIEW_CHARS).collect();
        Ok(ActionOutcome::new(format!("explained \"{}\"", paper.display_title()))
            .with("answer", text)
            .with("scope", "paper")
            .with("from_abstract", from_abstract)
            .with(
                "citations",
                json!([{ "paper_id": paper.id, "title": paper.display_title() }]),
            ))
    }
}

#[async_trait]
impl Action for AnswerQuestionAction {
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
        let question = required_str(params, "question")?;
        match read_str(params, "scope").unwrap_or("library") {
            "library" => {}
            "paper" => return self.explain_paper(params, question, state, services).await,
            _ => return Err(ActionError::invalid("scope", "must be \"library\" or \"paper\"")),
        }
        let top_k = read_usize(params, "top_k").unwrap_or(DEFAULT_TOP_K);

        let answer = services
            .qa
            .ask(question, top_k)
            .await
            .map_err(ActionError::service)?;

        let text: String = answer.text.chars().take(ANSWER_PREVIEW_CHARS).collect();
        let citations: Vec<Value> = answer
            .citations
            .iter()
            .take(OUTPUT_PREVIEW)
            .map(|c| json!({ "paper_id": c.paper_id, "title": c.title }))
            .collect();
        state.record(
            "answer",
            json!({ "confidence": answer.confidence, "citations": answer.citations.len() }),
        );

        Ok(ActionOutcome::new(format!(
            "answered with {} citations (confidence {:.2})",
            answer.citations.len(),
            answer.confidence
        ))
        .with("answer", text)
        .with("confidence", answer.confidence)
        .with("citations", citations))
    }
}
