//! # Configuration Keys
//!
//! Helpers for hierarchical configuration keys (`Section:Sub:Name`).
//!
//! Key lookups are case-insensitive. Child-key enumeration and ordering follow
//! the usual configuration-key rules: segment by segment, integers numerically and
//! before text, text case-insensitively, shorter paths first.

use crate::constants::KEY_DELIMITER;
use std::cmp::Ordering;

/// Case-folded form of a key used for lookups
#[must_use]
pub fn fold(key: &str) -> String {
    key.to_lowercase()
}

/// Join a parent path and a key with the hierarchy delimiter
#[must_use]
pub fn combine(parent: &str, key: &str) -> String {
    format!("{parent}{KEY_DELIMITER}{key}")
}

/// Next path segment of `key` after the first `prefix_len` bytes
fn segment(key: &str, prefix_len: usize) -> &str {
    let rest = &key[prefix_len..];
    rest.find(KEY_DELIMITER).map_or(rest, |end| &rest[..end])
}

fn starts_with_ignore_case(key: &str, prefix: &str) -> bool {
    key.get(..prefix.len())
        .is_some_and(|head| head.to_lowercase() == prefix.to_lowercase())
}

/// Compare two configuration keys segment by segment
#[must_use]
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    let mut left = a.split(KEY_DELIMITER).filter(|s| !s.is_empty());
    let mut right = b.split(KEY_DELIMITER).filter(|s| !s.is_empty());

    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => {
                let ordering = compare_segments(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    }
}

fn compare_segments(x: &str, y: &str) -> Ordering {
    match (x.parse::<i64>(), y.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => x
            .chars()
            .flat_map(char::to_uppercase)
            .cmp(y.chars().flat_map(char::to_uppercase)),
    }
}

/// Immediate child segments of `parent` found in `keys`, merged with `earlier` and sorted
///
/// With no parent every key contributes its first segment. Duplicates are kept.
pub fn child_keys<'a, I>(
    keys: I,
    earlier: impl IntoIterator<Item = String>,
    parent: Option<&str>,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = parent.map(|p| format!("{p}{KEY_DELIMITER}")).unwrap_or_default();

    let mut children: Vec<String> = keys
        .into_iter()
        .filter(|key| key.len() > prefix.len() && starts_with_ignore_case(key, &prefix))
        .map(|key| segment(key, prefix.len()).to_string())
        .collect();
    children.extend(earlier);
    children.sort_by(|a, b| compare_keys(a, b));
    children
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_numeric_segments() {
        assert_eq!(compare_keys("items:2", "items:10"), Ordering::Less);
        assert_eq!(compare_keys("10", "9"), Ordering::Greater);
    }

    #[test]
    fn test_numbers_sort_before_text() {
        assert_eq!(compare_keys("1", "a"), Ordering::Less);
        assert_eq!(compare_keys("b", "2"), Ordering::Greater);
    }

    #[test]
    fn test_text_is_case_insensitive() {
        assert_eq!(compare_keys("Alpha", "alpha"), Ordering::Equal);
        assert_eq!(compare_keys("alpha", "Beta"), Ordering::Less);
    }

    #[test]
    fn test_shorter_path_sorts_first() {
        assert_eq!(compare_keys("a:b", "a:b:c"), Ordering::Less);
        assert_eq!(compare_keys("a::b", "a:b"), Ordering::Equal);
    }

    #[test]
    fn test_child_keys_under_parent() {
        let keys = ["secrets:Db:Password", "secrets:Db:User", "secrets:Api", "other:X"];
        let children = child_keys(keys, Vec::new(), Some("SECRETS"));
        assert_eq!(children, vec!["Api", "Db", "Db"]);
    }

    #[test]
    fn test_child_keys_at_root_merges_earlier() {
        let keys = ["secrets:Db", "Logging:Level"];
        let children = child_keys(keys, vec!["Alpha".to_string()], None);
        assert_eq!(children, vec!["Alpha", "Logging", "secrets"]);
    }

    #[test]
    fn test_parent_itself_is_not_a_child() {
        let keys = ["secrets", "secrets:"];
        assert!(child_keys(keys, Vec::new(), Some("secrets")).is_empty());
    }

    #[test]
    fn test_combine() {
        assert_eq!(combine("secrets", "Db"), "secrets:Db");
    }
}
