use crate::dataset::Dataset;
use crate::loader::{Edge, Node};

/// Out-degree of every node in `nodes`; nodes without outgoing edges get 0.
/// Integer addition makes the result independent of partitioning.
pub fn out_degrees(edges: &Dataset<Edge>, nodes: &Dataset<Node>) -> Dataset<(Node, u32)> {
    edges
        .map(|(follower, _)| (follower, 1u32))
        .union(&nodes.map(|node| (node, 0u32)))
        .aggregate_by_key(0u32, |a, b| a + b, |a, b| a + b)
}
