//! 宽松的参数读取：LLM 与调用方给出的参数形态不稳定（数字写成字符串、单值代替列表），
//! 这里统一规整；动作实现与重试替代构造共用。

use serde_json::Value;

use crate::core::types::Params;

/// null 或空白字符串视为未提供
pub fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// 非空字符串参数（去除首尾空白）
pub fn read_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 整数参数：接受 JSON 整数、整值浮点数或数字字符串
pub fn read_int(params: &Params, key: &str) -> Option<i64> {
    match params.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 非负整数参数
pub fn read_usize(params: &Params, key: &str) -> Option<usize> {
    read_int(params, key).and_then(|n| usize::try_from(n).ok())
}

/// 字符串列表参数：接受字符串数组（数字元素转为字符串）或单个字符串
pub fn read_str_list(params: &Params, key: &str) -> Option<Vec<String>> {
    match params.get(key)? {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Params {
        match v {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    #[test]
    fn test_read_int_lenient() {
        let p = params(json!({ "a": 3, "b": "4", "c": 5.0, "d": 5.5, "e": "x" }));
        assert_eq!(read_int(&p, "a"), Some(3));
        assert_eq!(read_int(&p, "b"), Some(4));
        assert_eq!(read_int(&p, "c"), Some(5));
        assert_eq!(read_int(&p, "d"), None);
        assert_eq!(read_int(&p, "e"), None);
        assert_eq!(read_int(&p, "missing"), None);
    }

    #[test]
    fn test_read_str_list_shapes() {
        let p = params(json!({ "ids": ["a", " b "], "one": "c", "bad": ["a", null], "blank": "  " }));
        assert_eq!(read_str_list(&p, "ids"), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(read_str_list(&p, "one"), Some(vec!["c".to_string()]));
        assert_eq!(read_str_list(&p, "bad"), None);
        assert_eq!(read_str_list(&p, "blank"), None);
    }

    #[test]
    fn test_blank_string_is_absent() {
        let p = params(json!({ "q": "  ", "n": null }));
        assert!(is_absent(&p["q"]));
        assert!(is_absent(&p["n"]));
        assert_eq!(read_str(&p, "q"), None);
    }
}
