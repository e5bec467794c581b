//! # Scopegate Authorization Core
//!
//! Scope resolution engine for a multi-tenant access-control service.
//!
//! ## Features
//!
//! - **Prefix-wildcard scopes** with lexical implication and normalization
//! - **Role delegation** through `assume:<roleId>` scopes, including
//!   parameterized roles (`roleId*`) with `<..>` substitution
//! - **Termination proof** for the role graph, rejecting role sets whose
//!   expansion could grow without bound
//! - **Compiled resolver** computing the normalized transitive closure of a
//!   scope set against thousands of roles
//! - **Snapshot-swapping service** that rebuilds on change notifications while
//!   readers keep the snapshot they started with
//!
//! ## Example
//!
//! ```rust
//! use scopegate_authz::{build_resolver, ResolverConfig, Role};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let roles = vec![
//!     Role::new("client-id:ci", ["assume:project:*"]),
//!     Role::new("project:*", ["secrets:get:<..>/*"]),
//! ];
//!
//! let resolver = build_resolver(&roles, &ResolverConfig::default())?;
//! let scopes = resolver.resolve(&["assume:client-id:ci"])?;
//!
//! assert!(scopes.contains(&"secrets:get:*".to_string()));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod resolver;
pub mod roles;
pub mod scope;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::ResolverConfig;
pub use error::{ResolverError, Result};
pub use resolver::{build_resolver, CompiledResolver};
pub use roles::{validate_roles, CycleError, GraphError, Role, RoleDetails};
pub use scope::{normalize_scopes, scope_compare, RoleMatch};
pub use service::{ScopeResolverService, ServiceState, ServiceStats};
pub use store::{ChangeNotification, ClientSource, InMemoryStore, RoleSource};
pub use types::{Client, ClientDetails, ClientSnapshot, RoleSnapshot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
