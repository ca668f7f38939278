//! Reply Composer：由计划、步骤日志与判定组装回复文本和跳转目标（纯函数）

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::actions::ActionKind;
use crate::core::types::{Plan, StepResult, StepStatus, Target, Verdict, Verification};

/// 阅读顺序中列出的论文数
const READING_ORDER_ITEMS: usize = 5;

/// 组装后的回复
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub target: Option<Target>,
}

static MD_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").expect("valid regex"));
static MD_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n]+)\*\*|__([^_\n]+)__").expect("valid regex"));
/// 强调内容两端不能是空白，开头的 * 前不能紧跟字母数字（避免吃掉 2 * 3 * 4、2*3*4）
static MD_ITALIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w*])\*([^*\s](?:[^*\n]*[^*\s])?)\*").expect("valid regex")
});
static MD_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`\n]*)`").expect("valid regex"));
static MD_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\s*)[-*+]\s+").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Markdown → 纯文本：去掉标题、强调与行内代码标记，列表符号换成 "・"
pub fn to_plain_text(text: &str) -> String {
    let s = MD_HEADING.replace_all(text, "");
    let s = MD_BULLET.replace_all(&s, "${1}・");
    let s = MD_BOLD.replace_all(&s, "${1}${2}");
    let s = MD_ITALIC.replace_all(&s, "${1}${2}");
    let s = MD_CODE.replace_all(&s, "${1}");
    let s = BLANK_RUNS.replace_all(&s, "\n\n");
    s.trim().to_string()
}

fn output_first_id(step: &StepResult, key: &str) -> Option<String> {
    step.output
        .as_ref()?
        .get(key)?
        .as_array()?
        .iter()
        .find_map(|v| v.as_str().map(str::to_string))
}

fn last_completed<'a>(completed: &[&'a StepResult], kinds: &[ActionKind]) -> Option<&'a StepResult> {
    completed.iter().rev().copied().find(|s| kinds.contains(&s.action))
}

/// 按固定优先级选择跳转目标：编译 > 项目关联 > 单篇论文操作 > 问答引用 > 检索
pub fn select_target(steps: &[StepResult]) -> Option<Target> {
    let completed: Vec<&StepResult> = steps.iter().filter(|s| s.is_completed()).collect();

    if let Some(id) = last_completed(&completed, &[ActionKind::CompileTex])
        .and_then(|s| s.output_str("project_id"))
    {
        return Some(Target::project(id));
    }
    if let Some(id) = last_completed(
        &completed,
        &[ActionKind::AddPaperToProject, ActionKind::CreateProject],
    )
    .and_then(|s| s.output_str("project_id"))
    {
        return Some(Target::project(id));
    }
    if let Some(step) = last_completed(
        &completed,
        &[
            ActionKind::SelectResult,
            ActionKind::SaveToLibrary,
            ActionKind::SuggestKeywords,
            ActionKind::FindRelated,
            ActionKind::CreateMemo,
        ],
    ) {
        let id = step
            .output_str("paper_id")
            .map(str::to_string)
            .or_else(|| output_first_id(step, "paper_ids"));
        if let Some(id) = id {
            return Some(Target::paper(id));
        }
    }
    if let Some(id) = last_completed(&completed, &[ActionKind::AnswerQuestion]).and_then(|s| {
        s.output
            .as_ref()?
            .get("citations")?
            .as_array()?
            .first()?
            .get("paper_id")?
            .as_str()
            .map(str::to_string)
    }) {
        return Some(Target::paper(id));
    }
    last_completed(&completed, &[ActionKind::SearchPapers])
        .and_then(|s| s.output_str("query"))
        .map(Target::search)
}

/// 检索 / 相关论文结果按年份排序（旧 → 新，无年份置后）
fn reading_order(steps: &[StepResult]) -> Vec<String> {
    let Some(top) = steps
        .iter()
        .rev()
        .filter(|s| s.is_completed())
        .find(|s| matches!(s.action, ActionKind::SearchPapers | ActionKind::FindRelated))
        .and_then(|s| s.output.as_ref()?.get("top")?.as_array().cloned())
    else {
        return Vec::new();
    };

    let mut papers: Vec<(Option<i64>, String)> = top
        .iter()
        .filter_map(|p| {
            let title = p.get("title")?.as_str()?.to_string();
            Some((p.get("year").and_then(Value::as_i64), title))
        })
        .collect();
    papers.sort_by_key(|(year, _)| year.unwrap_or(i64::MAX));
    papers
        .into_iter()
        .take(READING_ORDER_ITEMS)
        .map(|(year, title)| match year {
            Some(y) => format!("{title} ({y})"),
            None => title,
        })
        .collect()
}

fn headline(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Met => "Done.",
        Verdict::Partial => "Partly done.",
        Verdict::NotMet => "I could not complete the request.",
        Verdict::NotExecuted => "Here is the plan.",
    }
}

/// 组装回复；executed 为 false 时只列出计划
pub fn compose_reply(
    plan: &Plan,
    steps: &[StepResult],
    executed: bool,
    verification: &Verification,
) -> Reply {
    let mut lines: Vec<String> = Vec::new();

    if !executed {
        lines.push(format!("{} {}", headline(Verdict::NotExecuted), plan.summary));
        for (i, step) in plan.steps.iter().enumerate() {
            lines.push(format!("{}. {step}", i + 1));
        }
        lines.push("Nothing has been executed yet.".to_string());
        return Reply {
            text: to_plain_text(&lines.join("\n")),
            target: None,
        };
    }

    lines.push(format!("{} {}", headline(verification.verdict), verification.summary));

    if let Some(answer) = steps
        .iter()
        .rev()
        .filter(|s| s.is_completed() && s.action == ActionKind::AnswerQuestion)
        .find_map(|s| s.output_str("answer"))
    {
        lines.push(String::new());
        lines.push(answer.trim().to_string());
    }

    let done: Vec<&StepResult> = steps.iter().filter(|s| s.is_completed()).collect();
    if !done.is_empty() {
        lines.push(String::new());
        for step in &done {
            lines.push(format!("- {}", step.detail));
        }
    }

    let order = reading_order(steps);
    if !order.is_empty() {
        lines.push(String::new());
        lines.push("Suggested reading order:".to_string());
        for (i, title) in order.iter().enumerate() {
            lines.push(format!("{}. {title}", i + 1));
        }
    }

    let problems: Vec<&StepResult> = steps
        .iter()
        .filter(|s| s.status != StepStatus::Completed)
        .collect();
    if !problems.is_empty() {
        lines.push(String::new());
        for step in problems {
            match &step.error {
                Some(error) => lines.push(format!("- {} ({error})", step.detail)),
                None => lines.push(format!("- {}", step.detail)),
            }
        }
    }

    if !verification.missing.is_empty() {
        lines.push(String::new());
        lines.push("Still missing:".to_string());
        for item in &verification.missing {
            lines.push(format!("- {item}"));
        }
    }

    Reply {
        text: to_plain_text(&lines.join("\n")),
        target: select_target(steps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PlannedAction, TargetKind};
    use serde_json::json;

    fn completed(kind: ActionKind, output: Value) -> StepResult {
        let Value::Object(map) = output else { unreachable!() };
        StepResult::completed(kind, format!("{kind} ok"), map)
    }

    fn verification(verdict: Verdict) -> Verification {
        Verification {
            verdict,
            summary: "summary".into(),
            achieved: vec![],
            missing: vec![],
        }
    }

    #[test]
    fn test_plain_text() {
        let md = "## Result\n\n**Bold** and *it* with `code`\n- one\n* two";
        assert_eq!(to_plain_text(md), "Result\n\nBold and it with code\n・one\n・two");
    }

    #[test]
    fn test_plain_text_keeps_arithmetic() {
        assert_eq!(to_plain_text("2 * 3 * 4 = 24"), "2 * 3 * 4 = 24");
        assert_eq!(to_plain_text("a*b*c"), "a*b*c");
        assert_eq!(to_plain_text("*x* and (*y*)"), "x and (y)");
    }

    #[test]
    fn test_project_beats_search() {
        let steps = vec![
            completed(ActionKind::SearchPapers, json!({ "query": "gnn", "top": [] })),
            completed(ActionKind::CreateProject, json!({ "project_id": "prj_1" })),
        ];
        assert_eq!(select_target(&steps), Some(Target::project("prj_1")));
    }

    #[test]
    fn test_compile_beats_everything() {
        let steps = vec![
            completed(ActionKind::AddPaperToProject, json!({ "project_id": "prj_1" })),
            completed(ActionKind::CompileTex, json!({ "project_id": "prj_2" })),
        ];
        assert_eq!(select_target(&steps), Some(Target::project("prj_2")));
    }

    #[test]
    fn test_paper_target_from_saved_ids() {
        let steps = vec![
            completed(ActionKind::SearchPapers, json!({ "query": "gnn" })),
            completed(ActionKind::SaveToLibrary, json!({ "paper_ids": ["arxiv:1", "arxiv:2"] })),
        ];
        let target = select_target(&steps).unwrap();
        assert_eq!(target.kind, TargetKind::Paper);
        assert_eq!(target.id, "arxiv:1");
    }

    #[test]
    fn test_failed_steps_do_not_target() {
        let steps = vec![
            completed(ActionKind::SearchPapers, json!({ "query": "graph nets" })),
            StepResult::failed(ActionKind::CreateProject, "create_project failed", "service_error: down"),
        ];
        let target = select_target(&steps).unwrap();
        assert_eq!(target.path(), "/search?q=graph+nets");
        assert_eq!(select_target(&[]), None);
    }

    #[test]
    fn test_reading_order_sorted_by_year() {
        let steps = vec![completed(
            ActionKind::SearchPapers,
            json!({ "query": "q", "top": [
                { "id": "a", "title": "New", "year": 2021 },
                { "id": "b", "title": "Undated", "year": null },
                { "id": "c", "title": "Old", "year": 2015 }
            ] }),
        )];
        assert_eq!(reading_order(&steps), vec!["Old (2015)", "New (2021)", "Undated"]);
    }

    #[test]
    fn test_plan_only_reply() {
        let actions = vec![PlannedAction::new(ActionKind::SearchPapers)];
        let plan = Plan {
            summary: "search_papers".into(),
            steps: vec!["Search papers for \"x\"".into()],
            actions,
        };
        let reply = compose_reply(&plan, &[], false, &verification(Verdict::NotExecuted));
        assert!(reply.text.contains("1. Search papers"));
        assert!(reply.target.is_none());
    }

    #[test]
    fn test_reply_includes_answer_and_failures() {
        let steps = vec![
            completed(ActionKind::AnswerQuestion, json!({ "answer": "**GNNs** pass messages.", "citations": [] })),
            StepResult::failed(ActionKind::CreateMemo, "create_memo failed", "missing_state: no paper"),
            StepResult::halted(ActionKind::CreateMemo),
        ];
        let reply = compose_reply(&Plan::default(), &steps, true, &verification(Verdict::Partial));
        assert!(reply.text.starts_with("Partly done."));
        assert!(reply.text.contains("GNNs pass messages."));
        assert!(reply.text.contains("・create_memo failed (missing_state: no paper)"));
        assert!(reply.text.contains("execution halted after retry failure"));
    }
}
