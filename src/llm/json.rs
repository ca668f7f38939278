//! 从 LLM 回复中提取 JSON 对象：优先 ```json 代码块，否则取最外层 `{...}`

/// 提取回复中的 JSON 对象文本；找不到时返回 None
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(block) = fenced_block(text) {
        if let Some(obj) = outer_object(block) {
            return Some(obj);
        }
    }
    outer_object(text)
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // 跳过语言标记（json / JSON / 空）
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        assert_eq!(extract_json(r#"{"a":1}"#), Some(r#"{"a":1}"#));
        assert_eq!(extract_json(r#"Sure! {"a":1} hope it helps"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extract_fenced_block() {
        let reply = "Plan:\n```json\n{\"actions\": []}\n```\nThe {braces} after are ignored";
        assert_eq!(extract_json(reply), Some("{\"actions\": []}"));
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }
}
