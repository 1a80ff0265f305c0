//! Depth-first cycle search over field-to-field edges
//!
//! Each originating field gets its own walk. Revisiting a name that is still
//! on the current path means the origin reaches a loop, and the loop is
//! reported against the origin. Fully explored names are not walked twice
//! within one origin's search.

use std::collections::{HashMap, HashSet};

/// Directed edges between field names
pub type EdgeMap<'a> = HashMap<&'a str, Vec<&'a str>>;

/// A loop reachable from `origin`; `path` starts and ends with the repeated name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport<'a> {
    pub origin: &'a str,
    pub path: Vec<&'a str>,
}

impl CycleReport<'_> {
    pub fn describe(&self) -> String {
        self.path.join(" -> ")
    }
}

/// Finds, for each origin in `origins` order, the first loop it reaches
///
/// With `skip_self_edges`, an edge from a name to itself is ignored (used when
/// self-reference is reported separately).
pub fn find_cycles<'a>(
    origins: &[&'a str],
    edges: &EdgeMap<'a>,
    skip_self_edges: bool,
) -> Vec<CycleReport<'a>> {
    let mut reported = HashSet::new();
    let mut reports = Vec::new();

    for &origin in origins {
        if !reported.insert(origin) {
            continue;
        }
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if let Some(cycle) = walk(origin, edges, skip_self_edges, &mut path, &mut visited) {
            reports.push(CycleReport {
                origin,
                path: cycle,
            });
        }
    }

    reports
}

fn walk<'a>(
    node: &'a str,
    edges: &EdgeMap<'a>,
    skip_self_edges: bool,
    path: &mut Vec<&'a str>,
    visited: &mut HashSet<&'a str>,
) -> Option<Vec<&'a str>> {
    if let Some(start) = path.iter().position(|n| *n == node) {
        let mut cycle = path[start..].to_vec();
        cycle.push(node);
        return Some(cycle);
    }
    if !visited.insert(node) {
        return None;
    }

    path.push(node);
    for &next in edges.get(node).into_iter().flatten() {
        if skip_self_edges && next == node {
            continue;
        }
        if let Some(cycle) = walk(next, edges, skip_self_edges, path, visited) {
            return Some(cycle);
        }
    }
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges<'a, const N: usize>(pairs: [(&'a str, Vec<&'a str>); N]) -> EdgeMap<'a> {
        pairs.into_iter().collect()
    }

    #[test]
    fn test_two_node_loop_reported_for_both_origins() {
        let graph = edges([("a", vec!["b"]), ("b", vec!["a"])]);
        let reports = find_cycles(&["a", "b"], &graph, false);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].describe(), "a -> b -> a");
        assert_eq!(reports[1].describe(), "b -> a -> b");
    }

    #[test]
    fn test_origin_leading_into_loop_is_reported() {
        let graph = edges([("c", vec!["a"]), ("a", vec!["b"]), ("b", vec!["a"])]);
        let reports = find_cycles(&["c"], &graph, false);
        assert_eq!(reports[0].origin, "c");
        assert_eq!(reports[0].path, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_acyclic_diamond() {
        let graph = edges([("a", vec!["b", "c"]), ("b", vec!["d"]), ("c", vec!["d"])]);
        assert!(find_cycles(&["a", "b", "c"], &graph, false).is_empty());
    }

    #[test]
    fn test_self_edges() {
        let graph = edges([("a", vec!["a"])]);
        assert_eq!(find_cycles(&["a"], &graph, false).len(), 1);
        assert!(find_cycles(&["a"], &graph, true).is_empty());
    }
}
