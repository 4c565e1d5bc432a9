//! Reading the follower graph.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::dataset::Dataset;
use crate::graphmap::GraphMMap;

pub type Node = u32;

/// `(follower, followed)`.
pub type Edge = (Node, Node);

/// Where the edge list lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// One `follower followed` pair per line.
    Text(PathBuf),
    /// `<prefix>.offsets` and `<prefix>.targets`, as written by `encode`.
    Binary(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Text(path) => write!(f, "{}", path.display()),
            Source::Binary(prefix) => write!(f, "{}.{{offsets,targets}}", prefix),
        }
    }
}

/// A line is an edge iff it holds exactly two whitespace separated node ids.
pub fn parse_edge(line: &str) -> Option<Edge> {
    let mut tokens = line.split_whitespace();
    let follower = tokens.next()?.parse().ok()?;
    let followed = tokens.next()?.parse().ok()?;
    match tokens.next() {
        Some(_) => None,
        None => Some((follower, followed)),
    }
}

/// Deduplicated edges of a text edge list. Malformed lines are dropped.
pub fn load_text(ctx: &Context, path: &Path) -> Dataset<Edge> {
    ctx.text_file(path)
        .flat_map(|line| parse_edge(&line))
        .distinct()
}

/// Deduplicated edges of a binary edge list; node `n`'s edges start out in
/// partition `n % partitions`.
pub fn load_binary(ctx: &Context, prefix: &str) -> Dataset<Edge> {
    let prefix = prefix.to_string();
    let peers = ctx.partitions();
    Dataset::from_source(ctx, peers, move || {
        let graph = GraphMMap::open(&prefix)?;
        let mut parts: Vec<Vec<Edge>> = (0..peers).map(|_| Vec::new()).collect();
        for node in 0..graph.nodes() {
            parts[node % peers].extend(graph.edges(node).map(|dst| (node as Node, dst)));
        }
        Ok(parts)
    })
    .distinct()
}

pub fn load(ctx: &Context, source: &Source) -> Dataset<Edge> {
    match source {
        Source::Text(path) => load_text(ctx, path),
        Source::Binary(prefix) => load_binary(ctx, prefix),
    }
}

/// Every id that appears on either end of an edge.
pub fn node_set(edges: &Dataset<Edge>) -> Dataset<Node> {
    edges.keys().union(&edges.values()).distinct()
}
