//! Roles and role graph validation
//!
//! A role grants its scopes to anyone holding `assume:<roleId>`. Roles whose
//! id ends in `*` are parameterized and may substitute the matched suffix into
//! their scopes through `<..>`.
//!
//! # Example
//!
//! ```rust
//! use scopegate_authz::roles::{validate_roles, Role};
//!
//! let roles = vec![
//!     Role::new("client-id:ci", ["assume:project:*"]),
//!     Role::new("project:*", ["secrets:get:<..>/*"]),
//! ];
//! assert!(validate_roles(&roles).is_ok());
//! ```

pub mod graph;
pub mod types;


pub use graph::{validate_roles, CycleError, GraphError, RoleGraph};
pub use types::{Role, RoleDetails};

pub(crate) use types::dedup_roles;
