use thiserror::Error;

use crate::graph::EntityGraph;

/// Required foreign keys that can never be satisfied in any creation order.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Dependency cycle between required foreign keys: {}", describe(.entities))]
pub struct DependencyCycleError {
    /// Every entity on the cycle, in traversal order
    pub entities: Vec<String>,
}

fn describe(entities: &[String]) -> String {
    let mut path = entities.join(" -> ");
    if let Some(first) = entities.first() {
        path.push_str(" -> ");
        path.push_str(first);
    }
    path
}

/// Resolve entity creation order using topological sort.
/// Entities referenced by required foreign keys must be created first;
/// unconstrained entities keep document order.
pub fn resolve_creation_order(graph: &EntityGraph) -> Result<Vec<String>, DependencyCycleError> {
    let mut order = Vec::with_capacity(graph.len());
    let mut visited = Vec::new();
    let mut in_stack = Vec::new();

    for name in graph.entity_names() {
        if !visited.iter().any(|v| v == name) {
            topo_sort(graph, name, &mut order, &mut visited, &mut in_stack)?;
        }
    }

    Ok(order)
}

/// Required dependencies of `name`, excluding self-references, deduplicated.
pub(super) fn required_dependencies<'a>(graph: &'a EntityGraph, name: &str) -> Vec<&'a str> {
    let mut targets: Vec<&str> = Vec::new();
    for dep in graph.dependencies(name) {
        if dep.required && dep.target != name && !targets.contains(&dep.target.as_str()) {
            targets.push(&dep.target);
        }
    }
    targets
}

/// Topological sort via DFS
fn topo_sort(
    graph: &EntityGraph,
    current: &str,
    order: &mut Vec<String>,
    visited: &mut Vec<String>,
    in_stack: &mut Vec<String>,
) -> Result<(), DependencyCycleError> {
    if let Some(start) = in_stack.iter().position(|n| n == current) {
        return Err(DependencyCycleError {
            entities: in_stack[start..].to_vec(),
        });
    }

    if visited.iter().any(|v| v == current) {
        return Ok(());
    }

    in_stack.push(current.to_string());

    for target in required_dependencies(graph, current) {
        // Dangling targets are reported by the integrity checks
        if graph.contains(target) {
            topo_sort(graph, target, order, visited, in_stack)?;
        }
    }

    in_stack.pop();
    visited.push(current.to_string());
    order.push(current.to_string());

    Ok(())
}
