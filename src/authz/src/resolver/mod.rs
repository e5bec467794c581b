//! Compiled scope resolver
//!
//! A [`CompiledResolver`] is built once from a role snapshot and never
//! changes afterwards. Resolution expands a scope set to its fixed point under
//! role activation and returns it normalized.
//!
//! # Example
//!
//! ```rust
//! use scopegate_authz::{build_resolver, ResolverConfig, Role};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let roles = vec![
//!     Role::new("client-id:ci", ["assume:project:alpha"]),
//!     Role::new("project:*", ["secrets:get:<..>/*", "queue:create-task"]),
//! ];
//! let resolver = build_resolver(&roles, &ResolverConfig::default())?;
//!
//! let scopes = resolver.resolve(&["assume:client-id:ci"])?;
//! assert!(scopes.contains(&"secrets:get:alpha/*".to_string()));
//! assert!(scopes.contains(&"queue:create-task".to_string()));
//! # Ok(())
//! # }
//! ```

mod index;

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::roles::{dedup_roles, validate_roles, Role};
use crate::scope::{
    normalize_owned, normalize_scopes, prefix_ends, split_wildcard, Template, ASSUME_PREFIX, STAR,
};
use index::RoleIndex;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, error, info};

/// A role together with its pre-split templates
#[derive(Debug)]
struct CompiledRole {
    role: Role,
    templates: Vec<Template>,
}

/// Immutable resolver over one role snapshot
#[derive(Debug)]
pub struct CompiledResolver {
    roles: Vec<CompiledRole>,
    index: RoleIndex,
    max_steps: usize,
    generation: u64,
}

impl CompiledResolver {
    /// Compile a role list without validating it
    ///
    /// Duplicate role ids keep their last definition. Use [`build_resolver`]
    /// unless the roles were validated already.
    pub fn compile(roles: &[Role], max_steps: usize) -> Self {
        let roles: Vec<CompiledRole> = dedup_roles(roles)
            .into_iter()
            .map(|role| CompiledRole {
                role: role.clone(),
                templates: role.templates(),
            })
            .collect();

        let index = RoleIndex::new(roles.iter().map(|c| c.role.role_id.as_str()));

        Self {
            roles,
            index,
            max_steps,
            generation: 0,
        }
    }

    /// Tag the resolver with a snapshot generation
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Snapshot generation this resolver was published as
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of distinct roles
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether the resolver has no roles
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Look up a role by id
    pub fn role(&self, role_id: &str) -> Option<&Role> {
        self.roles
            .binary_search_by(|c| c.role.role_id.as_str().cmp(role_id))
            .ok()
            .map(|idx| &self.roles[idx].role)
    }

    /// All roles, sorted by id
    pub fn roles(&self) -> impl Iterator<Item = &Role> + '_ {
        self.roles.iter().map(|c| &c.role)
    }

    /// Expand scopes to their normalized transitive closure
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::IterationLimitExceeded`] when expansion
    /// processes more scopes than the configured cap.
    pub fn resolve<S: AsRef<str>>(&self, scopes: &[S]) -> Result<Vec<String>> {
        let initial = normalize_scopes(scopes);
        if initial.iter().any(|s| s == STAR) {
            return Ok(initial);
        }

        let mut expansion = Expansion::default();
        for scope in initial {
            expansion.add(scope);
        }

        let mut steps = 0usize;
        while let Some(scope) = expansion.queue.pop_front() {
            steps += 1;
            if steps > self.max_steps {
                error!(limit = self.max_steps, "Scope expansion did not converge");
                return Err(ResolverError::IterationLimitExceeded {
                    limit: self.max_steps,
                });
            }

            if expansion.covered_by_other_prefix(&scope) {
                continue;
            }

            for (idx, matched) in self.index.matches(&scope) {
                for template in &self.roles[idx].templates {
                    let granted = template.render(matched.capture, matched.open);
                    if granted == STAR {
                        debug!(role = %self.roles[idx].role.role_id, "Expansion reached '*'");
                        return Ok(vec![STAR.to_string()]);
                    }
                    expansion.add(granted);
                }
            }
        }

        debug!(steps, scopes = expansion.seen.len(), "Expanded scopes");
        Ok(normalize_owned(expansion.seen.into_iter().collect()))
    }

    /// Expanded scopes of a single role
    ///
    /// Parameterized roles expand their own scopes; other roles expand
    /// `assume:<role_id>`. Returns `None` for an unknown role.
    pub fn expand_role(&self, role_id: &str) -> Result<Option<Vec<String>>> {
        let Some(role) = self.role(role_id) else {
            return Ok(None);
        };

        let expanded = if role.is_parameterized() {
            self.resolve(role.scopes.as_slice())?
        } else {
            self.resolve(&[format!("{}{}", ASSUME_PREFIX, role.role_id)])?
        };
        Ok(Some(expanded))
    }
}

/// Working set of one expansion
#[derive(Debug, Default)]
struct Expansion {
    seen: HashSet<String>,
    /// Literal parts of the prefix scopes in `seen`
    prefixes: HashSet<String>,
    queue: VecDeque<String>,
}

impl Expansion {
    fn add(&mut self, scope: String) {
        if self.seen.contains(&scope) {
            return;
        }
        let (literal, wildcard) = split_wildcard(&scope);
        if wildcard {
            self.prefixes.insert(literal.to_string());
        }
        self.seen.insert(scope.clone());
        self.queue.push_back(scope);
    }

    /// Whether another prefix scope already in the set implies `scope`
    ///
    /// Activation is monotone under implication, so such a scope cannot
    /// contribute anything new.
    fn covered_by_other_prefix(&self, scope: &str) -> bool {
        let (literal, wildcard) = split_wildcard(scope);
        prefix_ends(literal)
            .filter(|&end| !(wildcard && end == literal.len()))
            .any(|end| self.prefixes.contains(&literal[..end]))
    }
}

/// Validate and compile a role set
///
/// # Errors
///
/// Returns [`ResolverError::InvalidRoles`] when the roles fail validation.
pub fn build_resolver(roles: &[Role], config: &ResolverConfig) -> Result<CompiledResolver> {
    validate_roles(roles)?;
    let resolver = CompiledResolver::compile(roles, config.max_expansion_steps);
    info!(roles = resolver.len(), "Compiled scope resolver");
    Ok(resolver)
}
