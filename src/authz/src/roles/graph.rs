//! Termination check for the role delegation graph
//!
//! Plain roles can point at each other freely: expansion only ever adds
//! scopes from a finite set, so it reaches a fixed point. Parameterized roles
//! are different. A template like `assume:a<..>x` on role `a*` feeds the
//! captured suffix back into a longer activation scope, and expansion never
//! stops.
//!
//! The check works on a symbolic capture: the known prefix of a suffix that
//! is otherwise unconstrained. Only templates containing `<..>` carry the
//! capture forward; a constant template produces the same scopes whatever
//! the capture, so it adds nothing that could grow.
//!
//! 1. Build an over-approximate graph between capture-carrying roles with
//!    `petgraph` and keep the roles in non-trivial strongly connected
//!    components.
//! 2. From each such role, walk the component depth-first with an empty
//!    capture. Revisiting a role on the current path with a capture at least
//!    as long as its previous visit means the expansion can repeat forever.

use super::types::{dedup_roles, Role};
use crate::scope::{activate, Template};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Role graph validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A role id or scope template is malformed
    #[error("Invalid scope '{scope}' in role '{role_id}': {reason}")]
    InvalidScopeSyntax {
        role_id: String,
        scope: String,
        reason: String,
    },

    /// Parameterized roles feed each other without making progress
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// A non-terminating chain of parameterized roles
///
/// `path` starts and ends with the same role id.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub path: Vec<String>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Found cycle in roles: {}", self.path.join(" -> "))
    }
}

/// Parameterized role whose scopes mention `<..>`
#[derive(Debug)]
struct Carrier<'a> {
    role_id: &'a str,
    /// Only the templates that contain a placeholder
    templates: Vec<Template>,
}

/// Capture-carrying roles and the over-approximate edges between them
#[derive(Debug)]
pub struct RoleGraph<'a> {
    graph: DiGraph<Carrier<'a>, ()>,
    /// Strongly connected component id per node
    component: HashMap<NodeIndex, usize>,
    /// Nodes that lie on some cycle, sorted by role id
    cyclic: Vec<NodeIndex>,
}

impl<'a> RoleGraph<'a> {
    /// Build the graph from a role list
    ///
    /// Duplicate role ids keep their last definition.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidScopeSyntax`] for the first malformed role.
    pub fn build(roles: &'a [Role]) -> Result<Self, GraphError> {
        let roles = dedup_roles(roles);
        for role in &roles {
            role.validate()?;
        }

        let mut graph = DiGraph::new();
        for role in roles.iter().copied().filter(|r| r.is_parameterized()) {
            let templates: Vec<Template> = role
                .templates()
                .into_iter()
                .filter(Template::has_placeholder)
                .collect();
            if !templates.is_empty() {
                graph.add_node(Carrier {
                    role_id: &role.role_id,
                    templates,
                });
            }
        }

        let nodes: Vec<NodeIndex> = graph.node_indices().collect();
        for &from in &nodes {
            let produced: Vec<String> = graph[from]
                .templates
                .iter()
                .map(|t| t.render("", true))
                .collect();
            for &to in &nodes {
                if produced
                    .iter()
                    .any(|scope| activate(graph[to].role_id, scope).is_some())
                {
                    graph.update_edge(from, to, ());
                }
            }
        }

        let mut component = HashMap::with_capacity(nodes.len());
        let mut cyclic = Vec::new();
        for (id, scc) in tarjan_scc(&graph).into_iter().enumerate() {
            let nontrivial = scc.len() > 1;
            for node in scc {
                component.insert(node, id);
                if nontrivial || graph.contains_edge(node, node) {
                    cyclic.push(node);
                }
            }
        }
        cyclic.sort_by(|a, b| graph[*a].role_id.cmp(graph[*b].role_id));

        debug!(
            roles = roles.len(),
            carriers = graph.node_count(),
            cyclic = cyclic.len(),
            "Built role graph"
        );

        Ok(Self {
            graph,
            component,
            cyclic,
        })
    }

    /// Role ids that could take part in a non-terminating expansion
    pub fn cyclic_roles(&self) -> Vec<&str> {
        self.cyclic.iter().map(|n| self.graph[*n].role_id).collect()
    }

    /// Run the precise walk from every cyclic role
    ///
    /// # Errors
    ///
    /// Returns the first [`CycleError`] found, checking roles in id order.
    pub fn check(&self) -> Result<(), CycleError> {
        for &start in &self.cyclic {
            let mut walk = Walk {
                graph: self,
                path: Vec::new(),
                explored: HashSet::new(),
            };
            walk.visit(start, String::new())?;
        }
        Ok(())
    }
}

/// Depth-first state for one starting role
struct Walk<'g, 'a> {
    graph: &'g RoleGraph<'a>,
    /// Roles on the current path with their capture lengths
    path: Vec<(NodeIndex, usize)>,
    /// States whose subtree is already known to be clean
    explored: HashSet<(NodeIndex, String)>,
}

impl<'g, 'a> Walk<'g, 'a> {
    fn visit(&mut self, node: NodeIndex, capture: String) -> Result<(), CycleError> {
        if self.explored.contains(&(node, capture.clone())) {
            return Ok(());
        }

        let role_graph: &'g RoleGraph<'a> = self.graph;
        let graph = &role_graph.graph;
        let scc = role_graph.component[&node];
        self.path.push((node, capture.len()));

        let produced: Vec<String> = graph[node]
            .templates
            .iter()
            .map(|t| t.render(&capture, true))
            .collect();

        let mut targets: Vec<NodeIndex> = graph
            .neighbors(node)
            .filter(|n| role_graph.component[n] == scc)
            .collect();
        targets.sort_by(|a, b| graph[*a].role_id.cmp(graph[*b].role_id));

        for target in targets {
            for scope in &produced {
                let Some(matched) = activate(graph[target].role_id, scope) else {
                    continue;
                };
                let next_len = matched.capture.len();

                if let Some(pos) = self.path.iter().rposition(|(n, _)| *n == target) {
                    if next_len >= self.path[pos].1 {
                        let mut path: Vec<String> = self.path[pos..]
                            .iter()
                            .map(|(n, _)| graph[*n].role_id.to_string())
                            .collect();
                        path.push(graph[target].role_id.to_string());
                        return Err(CycleError { path });
                    }
                }

                self.visit(target, matched.capture.to_string())?;
            }
        }

        self.path.pop();
        self.explored.insert((node, capture));
        Ok(())
    }
}

/// Validate a role set: template syntax first, then termination
///
/// # Examples
///
/// ```
/// use scopegate_authz::{validate_roles, GraphError, Role};
///
/// assert!(validate_roles(&[Role::new("abc", ["assume:abc"])]).is_ok());
///
/// let err = validate_roles(&[Role::new("a*", ["assume:a<..>x"])]).unwrap_err();
/// assert_eq!(err.to_string(), "Found cycle in roles: a* -> a*");
/// assert!(matches!(err, GraphError::Cycle(_)));
/// ```
pub fn validate_roles(roles: &[Role]) -> Result<(), GraphError> {
    RoleGraph::build(roles)?.check()?;
    Ok(())
}
