//! Stateless chunk placement: pick up to `R` DataNodes from a cluster
//! snapshot, greedily balancing free space.
//!
//! Grounded on `master_impl.rs::assign_chunks`'s
//! `BinaryHeap<Reverse<(usize, String)>>` selection shape, with the sort
//! key changed from "current chunk load" to "available bytes descending"
//! per spec.md §4.3, and turned into a free function over an immutable
//! snapshot so it can be unit-tested without a running cluster.

use crate::cluster::NodeInfo;

/// Selects up to `replication_factor` nodes for a chunk of `size` bytes.
/// The first entry is the primary (client writes there first); the rest
/// are replication targets. Excludes node IDs in `exclude`.
pub fn select_placement(
    nodes: &[NodeInfo],
    size: u64,
    replication_factor: usize,
    exclude: &[String],
) -> Vec<NodeInfo> {
    let mut candidates: Vec<&NodeInfo> = nodes
        .iter()
        .filter(|n| n.alive && n.available_bytes >= size)
        .filter(|n| !exclude.iter().any(|id| id == &n.node_id))
        .collect();

    candidates.sort_by(|a, b| {
        b.available_bytes
            .cmp(&a.available_bytes)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });

    candidates
        .into_iter()
        .take(replication_factor)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, available: u64, alive: bool) -> NodeInfo {
        NodeInfo {
            node_id: id.to_string(),
            host: "h".to_string(),
            port: 1,
            available_bytes: available,
            used_bytes: 0,
            chunk_count: 0,
            last_heartbeat: 0,
            alive,
        }
    }

    #[test]
    fn prefers_most_free_space_with_deterministic_tie_break() {
        let nodes = vec![
            node("b", 100, true),
            node("a", 100, true),
            node("c", 200, true),
        ];
        let selected = select_placement(&nodes, 10, 2, &[]);
        let ids: Vec<&str> = selected.iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn filters_dead_and_undersized_nodes() {
        let nodes = vec![node("dead", 1000, false), node("small", 1, true)];
        let selected = select_placement(&nodes, 10, 3, &[]);
        assert!(selected.is_empty());
    }

    #[test]
    fn returns_fewer_than_r_when_not_enough_qualify() {
        let nodes = vec![node("a", 100, true)];
        let selected = select_placement(&nodes, 10, 3, &[]);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn excludes_listed_nodes() {
        let nodes = vec![node("a", 100, true), node("b", 90, true)];
        let selected = select_placement(&nodes, 10, 2, &["a".to_string()]);
        let ids: Vec<&str> = selected.iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }
}
