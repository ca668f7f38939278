//! 意图识别（确定性规则）
//!
//! 纯函数：规范化文本 → 有序意图列表；触发词集合是配置数据（TriggerSets），不散落在代码里。
//! 同时提取检索 query、请求数量、项目标题与检索源提示，供关键词规划器组装动作。

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// query 的最大字符数
const MAX_QUERY_CHARS: usize = 200;
/// 请求数量的上限
const MAX_REQUESTED_COUNT: usize = 20;

/// 识别出的意图，声明顺序即规划优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Search,
    CreateContainer,
    Save,
    Memo,
    Keywords,
    Related,
    Compile,
    Question,
}

/// 触发词集合（英文 + 日文），可由 `[planner.triggers]` 覆盖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSets {
    pub search: Vec<String>,
    pub save: Vec<String>,
    /// 创建动词；与 container 同时出现才算创建意图
    pub create: Vec<String>,
    pub container: Vec<String>,
    pub memo: Vec<String>,
    pub keywords: Vec<String>,
    pub related: Vec<String>,
    pub compile: Vec<String>,
    pub question: Vec<String>,
    /// 生成 query 时剔除的单词
    pub filler_words: Vec<String>,
    /// 生成 query 时剔除的短语（先于单词处理）
    pub filler_phrases: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for TriggerSets {
    fn default() -> Self {
        Self {
            search: words(&[
                "search", "look up", "look for", "find papers", "papers on", "papers about",
                "検索", "探して", "調べて", "集めて", "収集",
            ]),
            save: words(&[
                "save", "add", "bookmark", "store", "keep", "保存", "追加", "登録", "ライブラリ",
            ]),
            create: words(&["create", "new", "make", "start", "作成", "新規", "作って"]),
            container: words(&["collection", "project", "folder", "プロジェクト", "コレクション"]),
            memo: words(&["memo", "memos", "note", "notes", "メモ"]),
            keywords: words(&["keyword", "keywords", "tag", "tags", "キーワード", "タグ"]),
            related: words(&[
                "related papers", "similar papers", "related work", "関連論文", "類似論文", "似た論文",
            ]),
            compile: words(&["compile", "latex", "tex", "pdf", "コンパイル"]),
            question: words(&[
                "what", "why", "how", "explain", "summarize", "summary", "?", "？", "教えて", "説明",
                "解説", "要約", "とは",
            ]),
            filler_words: words(&[
                "please", "me", "my", "some", "a", "an", "the", "for", "about", "on", "of", "papers",
                "paper", "articles", "results", "result", "top", "best", "search", "find", "look",
                "up", "and", "save", "them", "it", "to", "into", "i", "want", "need", "can", "you",
                "could",
            ]),
            filler_phrases: words(&["can you", "could you", "i want to", "i need", "please"]),
        }
    }
}

/// 关键词规划所需的全部请求特征
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAnalysis {
    pub intents: Vec<Intent>,
    pub query: String,
    pub count: Option<usize>,
    pub project_title: Option<String>,
    pub source: Option<String>,
    /// 要解说的论文标题（引号内的标题 / 「X」の論文）
    pub explain_target: Option<String>,
}

impl RequestAnalysis {
    pub fn has(&self, intent: Intent) -> bool {
        self.intents.contains(&intent)
    }
}

static COUNT_TOP_N: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btop[\s-]*(\d{1,2})\b").expect("valid regex"));
static COUNT_N_ITEMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2})\s*(?:本|件|papers?\b|results?\b|articles?\b)").expect("valid regex")
});
static COUNT_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:top|best|first)\s+(?:result|paper|hit|match|one)\b").expect("valid regex")
});

static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"プロジェクト(?:名)?(?:を|は)?[「"]([^"」]{1,80})[」"]"#,
        r#"[「"]([^"」]{1,80})[」"](?:という名前)?でプロジェクト"#,
        r#"(?i)\b(?:collection|project|folder)\s+(?:called|named|titled)\s+["「']?([^"」'\n,.;!?]{1,80})"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static TITLE_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:and|then|with)\s").expect("valid regex"));

static EXPLAIN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"[「"“]([^"”」]{1,200})[」"”]\s*の?論文"#,
        r"(.+?)の論文の(?:内容|要約|解説|説明)",
        r#"(?i)\b(?:paper|article)\s+(?:called\s+|titled\s+|named\s+)?[「"“]([^"”」]{1,200})[」"”]"#,
        r#"(?i)[「"“]([^"”」]{1,200})[」"”]\s+(?:paper|article)\b"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static TOPIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(.+?)に(?:関連|関する)(?:する)?論文",
        r"(?i)\b(?:papers?|articles?|work)\s+(?:on|about|regarding)\s+(.+?)(?:\s+(?:and|then)\s|[,.;!?]|$)",
        r"(?i)\b(?:search|look|find)\s+(?:for\s+|up\s+)?(.+?)(?:\s+(?:and|then)\s|[,.;!?]|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// 触发词匹配：两端为 ASCII 字母数字的触发词按词边界匹配，其余（日文、符号）按子串匹配
pub fn matches_trigger(text_lower: &str, trigger: &str) -> bool {
    let trigger = trigger.trim().to_lowercase();
    if trigger.is_empty() {
        return false;
    }
    let bounded = trigger.is_ascii()
        && trigger.starts_with(|c: char| c.is_ascii_alphanumeric())
        && trigger.ends_with(|c: char| c.is_ascii_alphanumeric());
    if !bounded {
        return text_lower.contains(&trigger);
    }
    text_lower.match_indices(&trigger).any(|(start, m)| {
        let before = text_lower[..start].chars().next_back();
        let after = text_lower[start + m.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn any_trigger(text_lower: &str, triggers: &[String]) -> bool {
    triggers.iter().any(|t| matches_trigger(text_lower, t))
}

/// 按优先级返回请求中出现的意图（不含默认问答）
pub fn detect_intents(text: &str, triggers: &TriggerSets) -> Vec<Intent> {
    let lower = text.to_lowercase();
    let creating = extract_project_title(text).is_some()
        || (any_trigger(&lower, &triggers.container) && any_trigger(&lower, &triggers.create));

    let checks = [
        (Intent::Search, any_trigger(&lower, &triggers.search)),
        (Intent::CreateContainer, creating),
        (Intent::Save, any_trigger(&lower, &triggers.save)),
        (Intent::Memo, any_trigger(&lower, &triggers.memo)),
        (Intent::Keywords, any_trigger(&lower, &triggers.keywords)),
        (Intent::Related, any_trigger(&lower, &triggers.related)),
        (Intent::Compile, any_trigger(&lower, &triggers.compile)),
        (Intent::Question, any_trigger(&lower, &triggers.question)),
    ];
    checks
        .into_iter()
        .filter_map(|(intent, hit)| hit.then_some(intent))
        .collect()
}

/// 请求中的数量："top 5" / "5 papers" / "3本"；"top result" 视为 1
pub fn extract_count(text: &str) -> Option<usize> {
    let n = COUNT_TOP_N
        .captures(text)
        .or_else(|| COUNT_N_ITEMS.captures(text))
        .and_then(|c| c[1].parse::<usize>().ok())
        .or_else(|| COUNT_SINGLE.is_match(text).then_some(1))?;
    Some(n.clamp(1, MAX_REQUESTED_COUNT))
}

/// 显式给出的项目标题
pub fn extract_project_title(text: &str) -> Option<String> {
    TITLE_PATTERNS.iter().find_map(|re| {
        let raw = re.captures(text)?.get(1)?.as_str();
        let title = match TITLE_TAIL.find(raw) {
            Some(m) => &raw[..m.start()],
            None => raw,
        };
        let title = title.trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}

/// 被点名解说的论文标题
pub fn extract_explain_target(text: &str) -> Option<String> {
    EXPLAIN_PATTERNS.iter().find_map(|re| {
        let raw = re.captures(text)?.get(1)?.as_str();
        let title = raw.trim_matches(|c: char| c.is_whitespace() || "。、".contains(c));
        (!title.is_empty()).then(|| truncate_chars(title, MAX_QUERY_CHARS))
    })
}

/// 检索源提示
pub fn extract_source(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    ["arxiv", "pubmed", "scholar"]
        .into_iter()
        .find(|s| matches_trigger(&lower, s))
        .map(str::to_string)
}

fn strip_fillers(text: &str, triggers: &TriggerSets) -> String {
    let mut lower = format!(" {} ", text.to_lowercase());
    for phrase in &triggers.filler_phrases {
        let phrase = format!(" {} ", phrase.trim().to_lowercase());
        while let Some(pos) = lower.find(&phrase) {
            lower.replace_range(pos..pos + phrase.len(), " ");
        }
    }
    // 保留原文大小写：按小写结果的词序逐个对照原文词
    let originals: Vec<&str> = text.split_whitespace().collect();
    let kept_lower: Vec<&str> = lower.split_whitespace().collect();
    let mut out = Vec::new();
    let mut cursor = 0;
    for word in kept_lower {
        let original = originals[cursor..]
            .iter()
            .position(|o| o.to_lowercase() == word)
            .map(|i| {
                cursor += i + 1;
                originals[cursor - 1]
            })
            .unwrap_or(word);
        let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
        let is_filler = triggers.filler_words.iter().any(|f| f.eq_ignore_ascii_case(bare));
        let is_number = !bare.is_empty() && bare.chars().all(|c| c.is_ascii_digit());
        if !bare.is_empty() && !is_filler && !is_number {
            out.push(original.trim_matches(|c: char| !c.is_alphanumeric() && c != '-'));
        }
    }
    out.join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect::<String>().trim().to_string()
}

/// 从请求文本生成检索 query：主题模式 > 项目标题 > 去除填充词后的全文 > 原文
pub fn normalize_query(text: &str, project_title: Option<&str>, triggers: &TriggerSets) -> String {
    let text = text.trim();
    for re in TOPIC_PATTERNS.iter() {
        if let Some(topic) = re.captures(text).and_then(|c| c.get(1)) {
            let topic = topic.as_str().trim_matches(|c: char| c.is_whitespace() || "。、".contains(c));
            let cleaned = strip_fillers(topic, triggers);
            if !cleaned.is_empty() {
                return truncate_chars(&cleaned, MAX_QUERY_CHARS);
            }
        }
    }
    if let Some(title) = project_title {
        return truncate_chars(title, MAX_QUERY_CHARS);
    }
    let cleaned = strip_fillers(text, triggers);
    if !cleaned.is_empty() {
        return truncate_chars(&cleaned, MAX_QUERY_CHARS);
    }
    truncate_chars(text, MAX_QUERY_CHARS)
}

/// 一次性分析请求
pub fn analyze(text: &str, triggers: &TriggerSets) -> RequestAnalysis {
    let project_title = extract_project_title(text);
    RequestAnalysis {
        intents: detect_intents(text, triggers),
        query: normalize_query(text, project_title.as_deref(), triggers),
        count: extract_count(text),
        project_title,
        source: extract_source(text),
        explain_target: extract_explain_target(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_boundary_triggers() {
        assert!(matches_trigger("please compile it", "compile"));
        assert!(!matches_trigger("show me context", "tex"));
        assert!(!matches_trigger("showcase", "how"));
        assert!(matches_trigger("what is this?", "?"));
        assert!(matches_trigger("論文を検索して", "検索"));
    }

    #[test]
    fn test_detect_scenario_intents() {
        let triggers = TriggerSets::default();
        let intents = detect_intents(
            "search for graph neural networks and save the top result into a new collection called GNN Reading",
            &triggers,
        );
        assert_eq!(intents, vec![Intent::Search, Intent::CreateContainer, Intent::Save]);
    }

    #[test]
    fn test_no_intent() {
        assert!(detect_intents("hello there", &TriggerSets::default()).is_empty());
    }

    #[test]
    fn test_japanese_request() {
        let text = "グラフニューラルネットワークに関連する論文を5本集めて、プロジェクト「GNN入門」を作成して";
        let a = analyze(text, &TriggerSets::default());
        assert!(a.has(Intent::Search));
        assert!(a.has(Intent::CreateContainer));
        assert_eq!(a.count, Some(5));
        assert_eq!(a.project_title.as_deref(), Some("GNN入門"));
        assert_eq!(a.query, "グラフニューラルネットワーク");
    }

    #[test]
    fn test_extract_count_variants() {
        assert_eq!(extract_count("give me the top 5"), Some(5));
        assert_eq!(extract_count("find 3 papers on gans"), Some(3));
        assert_eq!(extract_count("save the top result"), Some(1));
        assert_eq!(extract_count("save 99 papers"), Some(20));
        assert_eq!(extract_count("save them"), None);
    }

    #[test]
    fn test_extract_project_title() {
        assert_eq!(
            extract_project_title("put them in a new collection called GNN Reading").as_deref(),
            Some("GNN Reading")
        );
        assert_eq!(
            extract_project_title("create a project named Diffusion and add the top 3").as_deref(),
            Some("Diffusion")
        );
        assert_eq!(extract_project_title("「拡散モデル」でプロジェクトを作って").as_deref(), Some("拡散モデル"));
        assert_eq!(extract_project_title("create a project"), None);
    }

    #[test]
    fn test_normalize_query() {
        let t = TriggerSets::default();
        assert_eq!(
            normalize_query("search for graph neural networks and save the top result", None, &t),
            "graph neural networks"
        );
        assert_eq!(
            normalize_query("Find me 5 papers about Diffusion Models, please", None, &t),
            "Diffusion Models"
        );
        assert_eq!(normalize_query("hello there", None, &t), "hello there");
        assert_eq!(normalize_query("the", None, &t), "the");
    }

    #[test]
    fn test_explain_target() {
        assert_eq!(
            extract_explain_target("「Attention Is All You Need」の論文の内容を教えて").as_deref(),
            Some("Attention Is All You Need")
        );
        assert_eq!(
            extract_explain_target("BERTの論文の要約をお願い").as_deref(),
            Some("BERT")
        );
        assert_eq!(
            extract_explain_target("Explain the paper \"Graph Attention Networks\" to me").as_deref(),
            Some("Graph Attention Networks")
        );
        assert_eq!(extract_explain_target("How does the add and norm layer work?"), None);
    }

    #[test]
    fn test_source_hint() {
        assert_eq!(extract_source("search pubmed for crispr").as_deref(), Some("pubmed"));
        assert_eq!(extract_source("search for crispr"), None);
    }
}
