//! Scope strings and the operations on them
//!
//! Scopes are plain strings; a trailing `*` turns a scope into a prefix scope.
//! This module holds the matching rules, placeholder templates, and scope set
//! normalization the resolver is built on.
//!
//! # Examples
//!
//! ```
//! use scopegate_authz::scope::{implies, normalize_scopes, satisfies};
//!
//! assert!(satisfies("queue:*", "queue:create-task"));
//! assert!(implies("queue:*", "queue:create-task:*"));
//! assert_eq!(normalize_scopes(["queue:a", "queue:*"]), vec!["queue:*"]);
//! ```

mod normalize;
mod pattern;
mod template;


pub use normalize::{merge_scope_sets, normalize_owned, normalize_scopes};
pub use pattern::{
    activate, implies, is_prefix_scope, match_role_against_assume_scope, satisfies,
    scope_compare, split_wildcard, RoleMatch, ASSUME_PREFIX, STAR,
};
pub(crate) use pattern::prefix_ends;
pub use template::{substitute, Template, PLACEHOLDER};
