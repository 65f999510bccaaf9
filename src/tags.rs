// src/tags.rs
//! 日记标签的纯函数操作。标签在库里是 JSONB 字符串数组, 这里只处理 `Vec<String>`。

use std::collections::BTreeSet;

/// 去首尾空白、丢弃空标签、去重 (保留第一次出现的位置)
pub fn normalize<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = BTreeSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

/// 解析 multipart 里的 `tags` 字段 (JSON 字符串数组), 格式错误按空列表处理
pub fn parse_field(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(tags) => normalize(tags),
        Err(e) => {
            tracing::warn!("Ignoring malformed tags field {:?}: {}", raw, e);
            Vec::new()
        }
    }
}

/// 解析列表筛选参数 `tags=a,b`
pub fn parse_filter(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| normalize(s.split(',').map(str::to_string)))
        .unwrap_or_default()
}

/// 从数据库取出的原始 JSON 中解码标签; 不是字符串数组则返回 None
pub fn decode(value: serde_json::Value) -> Option<Vec<String>> {
    serde_json::from_value(value).ok()
}

/// 所有条目标签的并集, 按字典序
pub fn collect_distinct<I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    lists
        .into_iter()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 把 `old` 换成 `new`; 条目不含 `old` 时返回 None (不需要写回)
pub fn rename(tags: &[String], old: &str, new: &str) -> Option<Vec<String>> {
    if !tags.iter().any(|t| t == old) {
        return None;
    }
    let mut updated: Vec<String> = tags.iter().filter(|t| *t != old).cloned().collect();
    if !updated.iter().any(|t| t == new) {
        updated.push(new.to_string());
    }
    updated.sort();
    Some(updated)
}

/// 删除 `tag`; 条目不含它时返回 None
pub fn remove(tags: &[String], tag: &str) -> Option<Vec<String>> {
    if !tags.iter().any(|t| t == tag) {
        return None;
    }
    let mut updated: Vec<String> = tags.iter().filter(|t| *t != tag).cloned().collect();
    updated.sort();
    Some(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn rename_does_not_duplicate_existing_target() {
        let tags = owned(&["old", "new"]);
        assert_eq!(rename(&tags, "old", "new"), Some(owned(&["new"])));
    }

    #[test]
    fn rename_sorts_result() {
        let tags = owned(&["zebra", "work"]);
        assert_eq!(
            rename(&tags, "zebra", "alpha"),
            Some(owned(&["alpha", "work"]))
        );
    }

    #[test]
    fn rename_skips_entries_without_tag() {
        assert_eq!(rename(&owned(&["category"]), "cat", "dog"), None);
    }

    #[test]
    fn remove_is_exact_membership() {
        assert_eq!(remove(&owned(&["category", "b", "a"]), "cat"), None);
        assert_eq!(
            remove(&owned(&["b", "cat", "a"]), "cat"),
            Some(owned(&["a", "b"]))
        );
    }

    #[test]
    fn distinct_tags_are_sorted() {
        let lists = vec![owned(&["work", "home"]), owned(&["Home", "work"]), vec![]];
        assert_eq!(collect_distinct(lists), owned(&["Home", "home", "work"]));
    }

    #[test]
    fn tags_field_parsing() {
        assert_eq!(parse_field(r#"[" a ", "b", "a", ""]"#), owned(&["a", "b"]));
        assert!(parse_field("not json").is_empty());
        assert!(parse_field("").is_empty());
        assert!(parse_field(r#"[1, 2]"#).is_empty());
    }

    #[test]
    fn filter_parsing() {
        assert_eq!(parse_filter(Some("a, b,,a")), owned(&["a", "b"]));
        assert!(parse_filter(Some("")).is_empty());
        assert!(parse_filter(None).is_empty());
    }

    #[test]
    fn decode_rejects_non_string_arrays() {
        assert_eq!(decode(serde_json::json!(["x"])), Some(owned(&["x"])));
        assert_eq!(decode(serde_json::json!([1])), None);
        assert_eq!(decode(serde_json::json!({"x": 1})), None);
    }
}
