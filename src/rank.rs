//! The damped rank iteration and top-k selection.
//!
//! Each iteration computes, for every node `n`,
//!
//! ```text
//! R'(n) = decay + (1 - decay) * sum over edges (m, n) of R(m) / D(m)
//! ```
//!
//! from the current ranks `R` and out-degrees `D`, and stops once the largest
//! per-node change is at most `dmax` or `imax` iterations have run. Ranks start
//! at 1.0 and are not normalized.

use std::cmp::Ordering;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use time::OffsetDateTime;

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::loader::{Edge, Node};

pub const DECAY: f64 = 0.15;
pub const TOP_K: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankParams {
    /// Rank floor every node receives regardless of its followers.
    pub decay: f64,
    /// Convergence threshold on the largest per-node change.
    pub dmax: f64,
    /// Iteration cap.
    pub imax: usize,
}

impl Default for RankParams {
    fn default() -> Self {
        RankParams {
            decay: DECAY,
            dmax: 30.0,
            imax: 25,
        }
    }
}

impl RankParams {
    pub fn validate(&self) -> Result<()> {
        if !self.decay.is_finite() || !(0.0..=1.0).contains(&self.decay) {
            return Err(Error::InvalidParameter("decay must be in [0,1]".to_string()));
        }
        if self.dmax.is_nan() {
            return Err(Error::InvalidParameter("dmax must be a number".to_string()));
        }
        Ok(())
    }
}

pub struct RankRun {
    pub ranks: Dataset<(Node, f64)>,
    pub iterations: usize,
    /// Largest change of each iteration, in order.
    pub max_changes: Vec<f64>,
    /// Whether the loop stopped on `dmax` rather than `imax`.
    pub converged: bool,
}

pub struct RankIterator<'a> {
    edges: Dataset<Edge>,
    degrees: Dataset<(Node, u32)>,
    nodes: Dataset<Node>,
    params: RankParams,
    cancel: Option<Arc<AtomicBool>>,
    dump: Option<&'a mut dyn Write>,
}

impl<'a> RankIterator<'a> {
    pub fn new(
        edges: Dataset<Edge>,
        degrees: Dataset<(Node, u32)>,
        nodes: Dataset<Node>,
        params: RankParams,
    ) -> Self {
        RankIterator {
            edges: edges.cache(),
            degrees: degrees.cache(),
            nodes: nodes.cache(),
            params,
            cancel: None,
            dump: None,
        }
    }

    /// Checked before every iteration; once set, the run fails with
    /// `Error::Cancelled`.
    pub fn cancel_on(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Writes the full rank listing to `out` after every iteration.
    pub fn dump_to(mut self, out: &'a mut dyn Write) -> Self {
        self.dump = Some(out);
        self
    }

    pub fn run(mut self) -> Result<RankRun> {
        let decay = self.params.decay;
        let zeros = self.nodes.map(|node| (node, 0.0f64)).cache();
        let mut ranks = self.nodes.map(|node| (node, 1.0f64)).cache();
        let mut max_changes = Vec::new();
        let mut converged = false;

        for iteration in 0..self.params.imax {
            if let Some(flag) = &self.cancel {
                if flag.load(AtomicOrdering::SeqCst) {
                    log::info!("cancelled before iteration {}", iteration);
                    return Err(Error::Cancelled { iterations: iteration });
                }
            }

            let started = OffsetDateTime::now_utc();
            let next = step(&ranks, &self.edges, &self.degrees, &zeros, decay).cache();
            let change = max_change(&ranks, &next)?;
            ranks = next;
            max_changes.push(change);

            let elapsed = (OffsetDateTime::now_utc() - started).as_seconds_f64();
            log::info!("iteration {}: max change {} ({:.3}s)", iteration, change, elapsed);

            if let Some(out) = self.dump.as_mut() {
                dump(&mut **out, iteration, &ranks)?;
            }

            if change <= self.params.dmax {
                converged = true;
                break;
            }
        }

        Ok(RankRun {
            ranks,
            iterations: max_changes.len(),
            max_changes,
            converged,
        })
    }
}

/// Rank each node sends along each of its outgoing edges. A node with no
/// outgoing edges sends nothing.
pub fn shares(
    ranks: &Dataset<(Node, f64)>,
    degrees: &Dataset<(Node, u32)>,
) -> Dataset<(Node, f64)> {
    ranks.join(degrees).map(|(node, (rank, degree))| {
        let share = if degree == 0 { 0.0 } else { rank / f64::from(degree) };
        (node, share)
    })
}

/// One application of the update rule. `zeros` maps every node to 0.0 so that
/// nodes nobody follows keep a rank.
pub fn step(
    ranks: &Dataset<(Node, f64)>,
    edges: &Dataset<Edge>,
    degrees: &Dataset<(Node, u32)>,
    zeros: &Dataset<(Node, f64)>,
    decay: f64,
) -> Dataset<(Node, f64)> {
    edges
        .join(&shares(ranks, degrees))
        .map(|(_, (followed, share))| (followed, share))
        .union(zeros)
        .aggregate_by_key(0.0f64, |a, b| a + b, |a, b| a + b)
        .map_values(move |incoming| decay + (1.0 - decay) * incoming)
}

pub fn max_change(old: &Dataset<(Node, f64)>, new: &Dataset<(Node, f64)>) -> Result<f64> {
    old.join(new)
        .map(|(_, (before, after))| (before - after).abs())
        .aggregate(0.0f64, f64::max, f64::max)
}

fn dump(out: &mut dyn Write, iteration: usize, ranks: &Dataset<(Node, f64)>) -> Result<()> {
    let mut listing = ranks.collect()?;
    listing.sort_by_key(|&(node, _)| node);
    let failed = |e: std::io::Error| Error::Execution(format!("writing rank listing: {}", e));
    writeln!(out, "Social rank values after iteration {}:", iteration).map_err(failed)?;
    for (node, rank) in listing {
        writeln!(out, "{} {:.6}", node, rank).map_err(failed)?;
    }
    Ok(())
}

/// Descending rank, ties broken by ascending node id.
pub fn by_rank(a: &(Node, f64), b: &(Node, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

pub fn top_k(ranks: &Dataset<(Node, f64)>, k: usize) -> Result<Vec<(Node, f64)>> {
    ranks.take_ordered(k, by_rank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backlinks::augment;
    use crate::context::Context;
    use crate::degree::out_degrees;
    use crate::loader::node_set;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const EPS: f64 = 1e-12;

    type Graph = (Dataset<Edge>, Dataset<(Node, u32)>, Dataset<Node>);

    fn graph(ctx: &Context, edges: Vec<Edge>) -> Graph {
        let edges = ctx.parallelize(edges);
        let nodes = node_set(&edges);
        let degrees = out_degrees(&edges, &nodes);
        (edges, degrees, nodes)
    }

    fn params(dmax: f64, imax: usize) -> RankParams {
        RankParams { dmax, imax, ..RankParams::default() }
    }

    #[test]
    fn single_edge_single_iteration() {
        let ctx = Context::new(2, 2).unwrap();
        let (edges, degrees, nodes) = graph(&ctx, vec![(1, 2)]);
        let run = RankIterator::new(edges, degrees, nodes, params(30.0, 1)).run().unwrap();
        assert_eq!(run.iterations, 1);

        let top = top_k(&run.ranks, TOP_K).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, 2);
        assert!((top[0].1 - 1.0).abs() < EPS);
        assert_eq!(top[1].0, 1);
        assert!((top[1].1 - 0.15).abs() < EPS);
    }

    #[test]
    fn zero_iterations_keeps_uniform_ranks() {
        let ctx = Context::new(2, 3).unwrap();
        let (edges, degrees, nodes) = graph(&ctx, vec![(1, 2), (2, 3), (3, 1), (4, 1)]);
        let run = RankIterator::new(edges, degrees, nodes, params(30.0, 0)).run().unwrap();
        assert_eq!(run.iterations, 0);
        assert!(!run.converged);
        let mut ranks = run.ranks.collect().unwrap();
        ranks.sort_by_key(|&(n, _)| n);
        assert_eq!(ranks, vec![(1, 1.0), (2, 1.0), (3, 1.0), (4, 1.0)]);
    }

    #[test]
    fn isolated_node_settles_at_decay() {
        let ctx = Context::local().unwrap();
        let edges = ctx.parallelize(Vec::<Edge>::new());
        let nodes = ctx.parallelize(vec![7]);
        let degrees = out_degrees(&edges, &nodes);
        let run = RankIterator::new(edges, degrees, nodes, params(0.5, 25)).run().unwrap();

        assert_eq!(run.iterations, 2);
        assert!(run.converged);
        assert!((run.max_changes[0] - 0.85).abs() < EPS);
        assert_eq!(run.max_changes[1], 0.0);
        let ranks = run.ranks.collect().unwrap();
        assert_eq!(ranks.len(), 1);
        assert!((ranks[0].1 - 0.15).abs() < EPS);
    }

    #[test]
    fn stops_at_cap_without_convergence() {
        let ctx = Context::new(2, 2).unwrap();
        let (edges, degrees, nodes) = graph(&ctx, vec![(1, 2), (3, 2), (4, 2), (2, 1)]);
        let run = RankIterator::new(edges, degrees, nodes, params(-1.0, 4)).run().unwrap();
        assert_eq!(run.iterations, 4);
        assert_eq!(run.max_changes.len(), 4);
        assert!(!run.converged);
    }

    #[test]
    fn every_node_keeps_a_rank() {
        let ctx = Context::new(2, 3).unwrap();
        // 5 follows 6 but nobody follows 5; 6 is a sink
        let (edges, degrees, nodes) = graph(&ctx, vec![(1, 2), (2, 1), (5, 6)]);
        let run = RankIterator::new(edges, degrees, nodes, params(0.0, 3)).run().unwrap();
        let mut ranks = run.ranks.collect().unwrap();
        ranks.sort_by_key(|&(n, _)| n);
        let ids: Vec<Node> = ranks.iter().map(|&(n, _)| n).collect();
        assert_eq!(ids, vec![1, 2, 5, 6]);
        assert!(ranks.iter().all(|&(_, r)| r.is_finite() && r >= DECAY - EPS));
        assert!((ranks[2].1 - 0.15).abs() < EPS);
    }

    #[test]
    fn ties_break_on_node_id() {
        let mut xs = vec![(5, 0.5), (3, 2.0), (1, 0.5), (4, 2.0)];
        xs.sort_by(by_rank);
        assert_eq!(xs, vec![(3, 2.0), (4, 2.0), (1, 0.5), (5, 0.5)]);
    }

    #[test]
    fn top_k_caps_at_ten() {
        let ctx = Context::new(2, 4).unwrap();
        let ranks = ctx.parallelize((0..25u32).map(|n| (n, f64::from(n % 5))).collect());
        let top = top_k(&ranks, TOP_K).unwrap();
        assert_eq!(top.len(), 10);
        assert_eq!(&top[..5], &[(4, 4.0), (9, 4.0), (14, 4.0), (19, 4.0), (24, 4.0)]);
        assert_eq!(top[5], (3, 3.0));
    }

    #[test]
    fn dump_lists_every_node() {
        let ctx = Context::local().unwrap();
        let (edges, degrees, nodes) = graph(&ctx, vec![(1, 2)]);
        let mut out = Vec::new();
        RankIterator::new(edges, degrees, nodes, params(30.0, 1))
            .dump_to(&mut out)
            .run()
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Social rank values after iteration 0:\n1 0.150000\n2 1.000000\n");
    }

    #[test]
    fn cancelled_run_returns_no_result() {
        let ctx = Context::local().unwrap();
        let (edges, degrees, nodes) = graph(&ctx, vec![(1, 2), (2, 1)]);
        let flag = Arc::new(AtomicBool::new(true));
        let result = RankIterator::new(edges, degrees, nodes, params(-1.0, 5))
            .cancel_on(flag)
            .run();
        assert!(matches!(result, Err(Error::Cancelled { iterations: 0 })));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let mut rng = StdRng::seed_from_u64(17);
        let edges: Vec<Edge> = (0..400)
            .map(|_| (rng.gen_range(0..60), rng.gen_range(0..60)))
            .collect();

        let mut runs = Vec::new();
        for _ in 0..3 {
            let ctx = Context::new(4, 6).unwrap();
            let (edges, degrees, nodes) = graph(&ctx, edges.clone());
            let augmented = augment(&edges, &nodes, &degrees).unwrap();
            let run = RankIterator::new(augmented.edges, augmented.degrees, nodes, params(1e-3, 25))
                .run()
                .unwrap();
            runs.push((run.max_changes.clone(), top_k(&run.ranks, TOP_K).unwrap()));
        }
        assert_eq!(runs[0], runs[1]);
        assert_eq!(runs[1], runs[2]);
    }

    #[test]
    fn partitioning_does_not_change_top_k() {
        let mut rng = StdRng::seed_from_u64(23);
        let edges: Vec<Edge> = (0..120)
            .map(|_| (rng.gen_range(0..30), rng.gen_range(0..30)))
            .collect();

        let mut tops = Vec::new();
        for ctx in [Context::local().unwrap(), Context::new(4, 6).unwrap()] {
            let (edges, degrees, nodes) = graph(&ctx, edges.clone());
            let augmented = augment(&edges, &nodes, &degrees).unwrap();
            let run = RankIterator::new(augmented.edges, augmented.degrees, nodes, params(1e-6, 40))
                .run()
                .unwrap();
            tops.push(top_k(&run.ranks, TOP_K).unwrap());
        }

        assert_eq!(tops[0].len(), TOP_K);
        assert_eq!(tops[0].len(), tops[1].len());
        for (a, b) in tops[0].iter().zip(&tops[1]) {
            assert!((a.1 - b.1).abs() < 1e-9, "{:?} vs {:?}", a, b);
        }
    }

    #[test]
    fn rejects_bad_params() {
        assert!(RankParams::default().validate().is_ok());
        assert!(RankParams { decay: 1.5, ..RankParams::default() }.validate().is_err());
        assert!(RankParams { dmax: f64::NAN, ..RankParams::default() }.validate().is_err());
    }
}
