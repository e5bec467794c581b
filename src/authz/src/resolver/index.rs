//! Role lookup by activation scope

use crate::scope::{prefix_ends, split_wildcard, RoleMatch, ASSUME_PREFIX};
use std::collections::HashMap;

/// Lookup tables over a sorted role list
///
/// - `exact`: non-parameterized role ids
/// - `parameterized`: literal prefixes of parameterized role ids, probed with
///   every prefix of a query
/// - `by_literal`: every role's literal part, sorted, for wildcard queries
#[derive(Debug, Default)]
pub(crate) struct RoleIndex {
    exact: HashMap<String, usize>,
    parameterized: HashMap<String, usize>,
    by_literal: Vec<(String, usize)>,
    len: usize,
}

impl RoleIndex {
    /// Index role ids; a role's position in `role_ids` is its index
    pub(crate) fn new<'r, I>(role_ids: I) -> Self
    where
        I: IntoIterator<Item = &'r str>,
    {
        let mut index = Self::default();

        for (idx, role_id) in role_ids.into_iter().enumerate() {
            index.len += 1;
            let (literal, parameterized) = split_wildcard(role_id);
            if parameterized {
                index.parameterized.insert(literal.to_string(), idx);
            } else {
                index.exact.insert(literal.to_string(), idx);
            }
            index.by_literal.push((literal.to_string(), idx));
        }
        index.by_literal.sort_unstable();

        index
    }

    /// Every role activated by `scope`, with its capture
    pub(crate) fn matches<'q>(&self, scope: &'q str) -> Vec<(usize, RoleMatch<'q>)> {
        let mut found = Vec::new();

        if let Some(suffix) = scope.strip_prefix(ASSUME_PREFIX) {
            let (query, open) = split_wildcard(suffix);
            if open {
                self.open_matches(query, &mut found);
            } else {
                self.exact_matches(query, &mut found);
            }
            return found;
        }

        let (literal, wildcard) = split_wildcard(scope);
        if wildcard && ASSUME_PREFIX.starts_with(literal) {
            found.extend((0..self.len).map(|idx| (idx, RoleMatch::open(""))));
        }
        found
    }

    fn exact_matches<'q>(&self, query: &'q str, found: &mut Vec<(usize, RoleMatch<'q>)>) {
        if let Some(&idx) = self.exact.get(query) {
            found.push((idx, RoleMatch::exact("")));
        }
        for end in prefix_ends(query) {
            if let Some(&idx) = self.parameterized.get(&query[..end]) {
                found.push((idx, RoleMatch::exact(&query[end..])));
            }
        }
    }

    fn open_matches<'q>(&self, query: &'q str, found: &mut Vec<(usize, RoleMatch<'q>)>) {
        // Roles whose literal extends the query; nothing is known of the capture
        let start = self
            .by_literal
            .partition_point(|(literal, _)| literal.as_str() < query);
        found.extend(
            self.by_literal[start..]
                .iter()
                .take_while(|(literal, _)| literal.starts_with(query))
                .map(|&(_, idx)| (idx, RoleMatch::open(""))),
        );

        // Parameterized roles whose literal is a strict prefix of the query
        for end in prefix_ends(query).filter(|&end| end < query.len()) {
            if let Some(&idx) = self.parameterized.get(&query[..end]) {
                found.push((idx, RoleMatch::open(&query[end..])));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::scope::activate;

    fn roles() -> Vec<Role> {
        ["a", "a*", "a*b", "a*bc", "ab", "ab*", "abc", "b*", "c*", "é*"]
            .into_iter()
            .map(|id| Role::new(id, Vec::<String>::new()))
            .collect()
    }

    /// Same answer as matching every role one by one
    fn brute_force<'q>(roles: &[Role], scope: &'q str) -> Vec<(usize, RoleMatch<'q>)> {
        roles
            .iter()
            .enumerate()
            .filter_map(|(idx, role)| activate(&role.role_id, scope).map(|m| (idx, m)))
            .collect()
    }

    #[test]
    fn test_index_agrees_with_activate() {
        let roles = roles();
        let index = RoleIndex::new(roles.iter().map(|r| r.role_id.as_str()));
        let scopes = [
            "assume:a",
            "assume:ab",
            "assume:abc",
            "assume:a*",
            "assume:a*b",
            "assume:a*b*",
            "assume:ab*",
            "assume:b",
            "assume:bcd*",
            "assume:*",
            "assume:",
            "assume:éx",
            "assume:é*",
            "*",
            "assum*",
            "a*",
            "queue:*",
            "assume",
        ];

        for scope in scopes {
            let mut indexed = index.matches(scope);
            let mut expected = brute_force(&roles, scope);
            indexed.sort_by_key(|(idx, _)| *idx);
            expected.sort_by_key(|(idx, _)| *idx);
            assert_eq!(indexed, expected, "scope {}", scope);
        }
    }
}
