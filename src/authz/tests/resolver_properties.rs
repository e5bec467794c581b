//! Property-based tests for normalization and expansion
//!
//! ## Properties Verified
//!
//! - Normalization keeps exactly the strings a scope set is satisfied by
//! - Normalized sets hold no scope implied by another
//! - Merging two normalized sets equals normalizing their union
//! - Expansion is idempotent and monotone
//! - The service answers exactly like a resolver compiled from its roles

use proptest::prelude::*;
use scopegate_authz::scope::{implies, merge_scope_sets, normalize_scopes, satisfies};
use scopegate_authz::{CompiledResolver, InMemoryStore, ResolverConfig, Role, ScopeResolverService};
use std::sync::Arc;

fn arb_scope() -> impl Strategy<Value = String> {
    "(assume:)?[ab]{0,3}\\*?"
}

fn arb_scopes() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_scope(), 0..8)
}

/// Role sets without placeholders; these always validate
fn arb_roles() -> impl Strategy<Value = Vec<Role>> {
    prop::collection::vec(
        ("[ab]{1,2}\\*?", prop::collection::vec(arb_scope(), 0..3)),
        0..6,
    )
    .prop_map(|defs| {
        defs.into_iter()
            .map(|(id, scopes)| Role::new(id, scopes))
            .collect()
    })
}

fn compile(roles: &[Role]) -> CompiledResolver {
    CompiledResolver::compile(roles, ResolverConfig::default().max_expansion_steps)
}

fn covered(set: &[String], scope: &str) -> bool {
    set.iter().any(|s| implies(s, scope))
}

// ============================================================================
// Normalization
// ============================================================================

proptest! {
    /// Property: normalizing does not change which strings are granted
    #[test]
    fn prop_normalize_preserves_satisfaction(
        scopes in arb_scopes(),
        probe in "(assume:)?[ab]{0,4}",
    ) {
        let normalized = normalize_scopes(&scopes);
        prop_assert_eq!(
            scopes.iter().any(|s| satisfies(s, &probe)),
            normalized.iter().any(|s| satisfies(s, &probe))
        );
    }

    /// Property: no normalized scope implies another
    #[test]
    fn prop_normalize_is_minimal(scopes in arb_scopes()) {
        let normalized = normalize_scopes(&scopes);
        for (i, a) in normalized.iter().enumerate() {
            for (j, b) in normalized.iter().enumerate() {
                if i != j {
                    prop_assert!(!implies(a, b), "{} implies {}", a, b);
                }
            }
        }
        for scope in &scopes {
            prop_assert!(covered(&normalized, scope));
        }
    }

    /// Property: normalization is idempotent
    #[test]
    fn prop_normalize_idempotent(scopes in arb_scopes()) {
        let once = normalize_scopes(&scopes);
        prop_assert_eq!(normalize_scopes(&once), once);
    }

    /// Property: merging normalized sets equals normalizing the union
    #[test]
    fn prop_merge_matches_union(a in arb_scopes(), b in arb_scopes()) {
        let (a, b) = (normalize_scopes(&a), normalize_scopes(&b));
        let union: Vec<&String> = a.iter().chain(b.iter()).collect();
        prop_assert_eq!(merge_scope_sets(&a, &b), normalize_scopes(union));
    }
}

// ============================================================================
// Expansion
// ============================================================================

proptest! {
    /// Property: expanding an expansion changes nothing
    #[test]
    fn prop_resolve_idempotent(roles in arb_roles(), scopes in arb_scopes()) {
        let resolver = compile(&roles);
        let once = resolver.resolve(&scopes).unwrap();
        prop_assert_eq!(resolver.resolve(&once).unwrap(), once.clone());
        prop_assert_eq!(normalize_scopes(&once), once);
    }

    /// Property: every input scope is covered by its expansion
    #[test]
    fn prop_resolve_is_extensive(roles in arb_roles(), scopes in arb_scopes()) {
        let resolver = compile(&roles);
        let expanded = resolver.resolve(&scopes).unwrap();
        for scope in &scopes {
            prop_assert!(covered(&expanded, scope), "{} lost", scope);
        }
    }

    /// Property: adding input scopes never removes granted scopes
    #[test]
    fn prop_resolve_monotone(
        roles in arb_roles(),
        scopes in arb_scopes(),
        extra in arb_scopes(),
    ) {
        let resolver = compile(&roles);
        let small = resolver.resolve(&scopes).unwrap();
        let mut more = scopes.clone();
        more.extend(extra);
        let large = resolver.resolve(&more).unwrap();
        for scope in &small {
            prop_assert!(covered(&large, scope), "{} lost", scope);
        }
    }

    /// Property: the granted set does not depend on role order
    #[test]
    fn prop_resolve_ignores_role_order(roles in arb_roles(), scopes in arb_scopes()) {
        // Distinct ids only; with duplicates the last definition wins
        let mut seen = std::collections::HashSet::new();
        let roles: Vec<Role> = roles
            .into_iter()
            .filter(|r| seen.insert(r.role_id.clone()))
            .collect();
        let mut reversed = roles.clone();
        reversed.reverse();
        prop_assert_eq!(
            compile(&roles).resolve(&scopes).unwrap(),
            compile(&reversed).resolve(&scopes).unwrap()
        );
    }
}

// ============================================================================
// Service
// ============================================================================

proptest! {
    /// Property: a freshly set up service agrees with a direct compile
    #[test]
    fn prop_service_matches_compiled_resolver(roles in arb_roles(), scopes in arb_scopes()) {
        let expected = compile(&roles).resolve(&scopes).unwrap();

        let actual = tokio_test::block_on(async {
            let store = Arc::new(InMemoryStore::with_entries(roles, vec![]));
            let service = ScopeResolverService::new(
                ResolverConfig::default(),
                store.clone(),
                store,
            );
            service.setup(None).await.unwrap();
            service.resolve(&scopes).unwrap()
        });

        prop_assert_eq!(actual, expected);
    }
}
