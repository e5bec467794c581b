//! Scope set normalization
//!
//! A normalized scope set holds no scope implied by another one and is sorted
//! with [`scope_compare`]. Sorting puts each prefix scope directly in front of
//! the run of scopes it implies, so a single sweep that remembers the last kept
//! prefix scope is enough.

use super::pattern::{implies, is_prefix_scope, scope_compare, STAR};

/// Reduces a scope collection to its minimal equivalent, sorted set
///
/// # Examples
///
/// ```
/// use scopegate_authz::normalize_scopes;
///
/// assert_eq!(normalize_scopes(["abc", "ab*", "a", "ab"]), vec!["a", "ab*"]);
/// assert_eq!(normalize_scopes(["*", "test"]), vec!["*"]);
/// ```
pub fn normalize_scopes<I, S>(scopes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    normalize_owned(scopes.into_iter().map(|s| s.as_ref().to_string()).collect())
}

/// Normalizes an owned scope list without copying the strings
pub fn normalize_owned(mut scopes: Vec<String>) -> Vec<String> {
    if scopes.iter().any(|s| s == STAR) {
        return vec![STAR.to_string()];
    }

    scopes.sort_unstable_by(|a, b| scope_compare(a, b));
    sweep(scopes)
}

/// Merges two normalized, sorted scope sets into one normalized set
///
/// Runs in linear time; both inputs must already be normalized.
pub fn merge_scope_sets(a: &[String], b: &[String]) -> Vec<String> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if scope_compare(&a[i], &b[j]).is_le() {
            merged.push(a[i].clone());
            i += 1;
        } else {
            merged.push(b[j].clone());
            j += 1;
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);

    sweep(merged)
}

/// Drops duplicates and implied scopes from a sorted list
fn sweep(sorted: Vec<String>) -> Vec<String> {
    let mut kept: Vec<String> = Vec::with_capacity(sorted.len());
    // Index in `kept` of the most recent prefix scope
    let mut cover: Option<usize> = None;

    for scope in sorted {
        if let Some(idx) = cover {
            if implies(&kept[idx], &scope) {
                continue;
            }
        }
        if kept.last() == Some(&scope) {
            continue;
        }
        if is_prefix_scope(&scope) {
            cover = Some(kept.len());
        }
        kept.push(scope);
    }

    kept
}
