//! Scope matching rules
//!
//! A scope is an opaque, case-sensitive string. The only reserved syntax is a
//! trailing `*`, which makes the scope a prefix scope: it is satisfied by every
//! string that starts with its literal part.

use std::cmp::Ordering;

/// Literal every role activation scope starts with
pub const ASSUME_PREFIX: &str = "assume:";

/// The scope that implies every other scope
pub const STAR: &str = "*";

/// Splits a scope into its literal part and whether it is a prefix scope
///
/// # Examples
///
/// ```
/// use scopegate_authz::scope::split_wildcard;
///
/// assert_eq!(split_wildcard("queue:*"), ("queue:", true));
/// assert_eq!(split_wildcard("queue:create"), ("queue:create", false));
/// ```
pub fn split_wildcard(scope: &str) -> (&str, bool) {
    match scope.strip_suffix('*') {
        Some(literal) => (literal, true),
        None => (scope, false),
    }
}

/// Returns whether the scope ends with the prefix wildcard
pub fn is_prefix_scope(scope: &str) -> bool {
    scope.ends_with('*')
}

/// Checks whether a concrete `candidate` string satisfies `pattern`
///
/// An exact pattern is satisfied only by itself; a prefix pattern by every
/// string starting with its literal part.
pub fn satisfies(pattern: &str, candidate: &str) -> bool {
    match split_wildcard(pattern) {
        (literal, true) => candidate.starts_with(literal),
        (_, false) => pattern == candidate,
    }
}

/// Checks whether scope `a` implies scope `b`
///
/// `a` implies `b` when every string satisfying `b` also satisfies `a`. For a
/// prefix scope `b` this compares literal parts, so `q**` does not imply `q*`.
pub fn implies(a: &str, b: &str) -> bool {
    match split_wildcard(a) {
        (a_literal, true) => split_wildcard(b).0.starts_with(a_literal),
        (_, false) => a == b,
    }
}

/// Total order used for every sorted scope list
///
/// Literal parts compare byte-wise and, on equal literals, the prefix scope
/// sorts first. A prefix scope therefore sorts immediately before the
/// contiguous run of scopes it implies.
pub fn scope_compare(a: &str, b: &str) -> Ordering {
    let (a_literal, a_wildcard) = split_wildcard(a);
    let (b_literal, b_wildcard) = split_wildcard(b);

    a_literal
        .as_bytes()
        .cmp(b_literal.as_bytes())
        .then_with(|| b_wildcard.cmp(&a_wildcard))
}

/// Outcome of matching a role against an activation scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleMatch<'a> {
    /// Captured suffix bound to `<..>` (empty for non-parameterized roles)
    pub capture: &'a str,
    /// The query carried a trailing wildcard, so the capture is only a known
    /// prefix of the real value
    pub open: bool,
}

impl<'a> RoleMatch<'a> {
    /// A match whose capture is the complete value
    pub fn exact(capture: &'a str) -> Self {
        Self { capture, open: false }
    }

    /// A match whose capture is only a lower-bound prefix
    pub fn open(capture: &'a str) -> Self {
        Self { capture, open: true }
    }
}

/// Matches a role against the part of an `assume:` scope after `assume:`
///
/// Both sides may end in `*`. Two prefix strings overlap iff one literal is a
/// prefix of the other; the capture is the query's remainder beyond the role's
/// literal prefix, or empty when the role's literal is the longer one.
///
/// # Examples
///
/// ```
/// use scopegate_authz::scope::{match_role_against_assume_scope, RoleMatch};
///
/// assert_eq!(match_role_against_assume_scope("a*", "abc"), Some(RoleMatch::exact("bc")));
/// assert_eq!(match_role_against_assume_scope("a*", "abc*"), Some(RoleMatch::open("bc")));
/// assert_eq!(match_role_against_assume_scope("abc*", "a*"), Some(RoleMatch::open("")));
/// assert_eq!(match_role_against_assume_scope("abc", "abd"), None);
/// ```
pub fn match_role_against_assume_scope<'q>(
    role_id: &str,
    assume_suffix: &'q str,
) -> Option<RoleMatch<'q>> {
    let (role_literal, parameterized) = split_wildcard(role_id);
    let (query_literal, open) = split_wildcard(assume_suffix);

    match (parameterized, open) {
        (false, false) => (role_literal == query_literal).then_some(RoleMatch::exact("")),
        (true, false) => query_literal.strip_prefix(role_literal).map(RoleMatch::exact),
        (false, true) => role_literal
            .starts_with(query_literal)
            .then_some(RoleMatch::open("")),
        (true, true) => {
            if let Some(rest) = query_literal.strip_prefix(role_literal) {
                Some(RoleMatch::open(rest))
            } else if role_literal.starts_with(query_literal) {
                Some(RoleMatch::open(""))
            } else {
                None
            }
        }
    }
}

/// Matches a role against a full scope
///
/// Scopes starting with `assume:` are matched on their suffix. A prefix scope
/// whose literal is itself a prefix of `assume:` (`*`, `a*`, `assum*`,
/// `assume*`) activates every role with an empty open capture. Any other scope
/// activates nothing.
pub fn activate<'q>(role_id: &str, scope: &'q str) -> Option<RoleMatch<'q>> {
    if let Some(suffix) = scope.strip_prefix(ASSUME_PREFIX) {
        return match_role_against_assume_scope(role_id, suffix);
    }

    let (literal, wildcard) = split_wildcard(scope);
    (wildcard && ASSUME_PREFIX.starts_with(literal)).then_some(RoleMatch::open(""))
}

/// Byte offsets of every prefix of `s`, shortest first, including `s` itself
pub(crate) fn prefix_ends(s: &str) -> impl Iterator<Item = usize> + '_ {
    (0..=s.len()).filter(move |&end| s.is_char_boundary(end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfies() {
        assert!(satisfies("a", "a"));
        assert!(!satisfies("a", "ab"));
        assert!(satisfies("a*", "a"));
        assert!(satisfies("a*", "abc"));
        assert!(!satisfies("a*", "b"));
        assert!(satisfies("*", "anything"));
        assert!(!satisfies("A*", "a"));
    }

    #[test]
    fn test_implies() {
        assert!(implies("a", "a"));
        assert!(!implies("a", "a*"));
        assert!(implies("a*", "a*"));
        assert!(implies("a*", "ab*"));
        assert!(!implies("ab*", "a*"));
        assert!(implies("*", "a*"));
        assert!(!implies("q**", "q*"));
        assert!(implies("q*", "q**"));
    }

    #[test]
    fn test_scope_compare_groups_covered_scopes() {
        let mut scopes = vec!["b", "ab", "a", "a*", "abc*", "ab*", "*"];
        scopes.sort_by(|a, b| scope_compare(a, b));
        assert_eq!(scopes, vec!["*", "a*", "a", "ab*", "ab", "abc*", "b"]);
    }

    #[test]
    fn test_exact_role_exact_query() {
        assert_eq!(match_role_against_assume_scope("ab", "ab"), Some(RoleMatch::exact("")));
        assert_eq!(match_role_against_assume_scope("ab", "abc"), None);
        assert_eq!(match_role_against_assume_scope("a*b", "a*b"), Some(RoleMatch::exact("")));
    }

    #[test]
    fn test_parameterized_role_exact_query() {
        assert_eq!(match_role_against_assume_scope("a*", "a"), Some(RoleMatch::exact("")));
        assert_eq!(match_role_against_assume_scope("a*", "ab/c"), Some(RoleMatch::exact("b/c")));
        assert_eq!(match_role_against_assume_scope("*", "xyz"), Some(RoleMatch::exact("xyz")));
        assert_eq!(match_role_against_assume_scope("ab*", "a"), None);
    }

    #[test]
    fn test_exact_role_open_query() {
        assert_eq!(match_role_against_assume_scope("abc", "ab*"), Some(RoleMatch::open("")));
        assert_eq!(match_role_against_assume_scope("abc", "abc*"), Some(RoleMatch::open("")));
        assert_eq!(match_role_against_assume_scope("ab", "abc*"), None);
        assert_eq!(match_role_against_assume_scope("a*b", "a*b*"), Some(RoleMatch::open("")));
    }

    #[test]
    fn test_parameterized_role_open_query() {
        assert_eq!(match_role_against_assume_scope("a*", "a*b*"), Some(RoleMatch::open("*b")));
        assert_eq!(match_role_against_assume_scope("abc*", "a*"), Some(RoleMatch::open("")));
        assert_eq!(match_role_against_assume_scope("ab*", "ac*"), None);
    }

    #[test]
    fn test_activate_through_partial_assume_prefix() {
        for scope in ["*", "a*", "as*", "assum*", "assume*", "assume:*"] {
            assert_eq!(activate("client-id:root", scope), Some(RoleMatch::open("")), "{}", scope);
            assert_eq!(activate("repo:*", scope), Some(RoleMatch::open("")), "{}", scope);
        }
        assert_eq!(activate("a", "assume"), None);
        assert_eq!(activate("a", "b*"), None);
        assert_eq!(activate("a", "assume:a"), Some(RoleMatch::exact("")));
    }

    #[test]
    fn test_prefix_ends_respects_char_boundaries() {
        let ends: Vec<usize> = prefix_ends("aé").collect();
        assert_eq!(ends, vec![0, 1, 3]);
    }
}
