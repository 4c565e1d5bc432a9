//! Sink repair.
//!
//! A sink (out-degree 0) swallows whatever rank flows into it. Each sink is
//! given a back-edge to every node that follows it, and degrees are recomputed
//! over the augmented edge set.
//!
//! The augmented set is the plain union of original and back-edges. Should a
//! back-edge coincide with an existing forward edge the pair is kept twice and
//! that flow counts double downstream; nothing deduplicates it.

use crate::dataset::Dataset;
use crate::degree::out_degrees;
use crate::error::Result;
use crate::loader::{Edge, Node};

pub struct Augmented {
    pub edges: Dataset<Edge>,
    pub degrees: Dataset<(Node, u32)>,
    /// Sinks found before augmentation.
    pub sinks: usize,
    pub backlinks: usize,
}

pub fn sinks(degrees: &Dataset<(Node, u32)>) -> Dataset<Node> {
    degrees.filter(|&(_, degree)| degree == 0).keys()
}

/// `(s, x)` for every sink `s` and original edge `(x, s)`.
pub fn back_edges(edges: &Dataset<Edge>, sinks: &Dataset<Node>) -> Dataset<Edge> {
    edges
        .map(|(follower, followed)| (followed, follower))
        .join(&sinks.map(|sink| (sink, ())))
        .map(|(sink, (follower, ()))| (sink, follower))
}

/// Adds back-edges for every sink. Returns the inputs untouched when there are
/// no sinks.
pub fn augment(
    edges: &Dataset<Edge>,
    nodes: &Dataset<Node>,
    degrees: &Dataset<(Node, u32)>,
) -> Result<Augmented> {
    let sinks = sinks(degrees).cache();
    let sink_count = sinks.count()?;
    log::info!("This graph contains {} sink nodes", sink_count);

    if sink_count == 0 {
        return Ok(Augmented {
            edges: edges.clone(),
            degrees: degrees.clone(),
            sinks: 0,
            backlinks: 0,
        });
    }

    let back = back_edges(edges, &sinks).cache();
    let backlinks = back.count()?;
    log::info!("Added {} backlinks", backlinks);

    let edges = edges.union(&back).cache();
    let degrees = out_degrees(&edges, nodes).cache();
    Ok(Augmented {
        edges,
        degrees,
        sinks: sink_count,
        backlinks,
    })
}
