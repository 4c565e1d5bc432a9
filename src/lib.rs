//! SocialRank: a PageRank-style influence score over a follower graph.
//!
//! The edge list is loaded into a partitioned `Dataset`, sinks are optionally
//! repaired with back-edges, ranks are iterated to convergence or a cap, and
//! the ten best ranked nodes are returned.

pub mod backlinks;
pub mod context;
pub mod dataset;
pub mod degree;
pub mod encode;
pub mod error;
pub mod graphmap;
pub mod loader;
pub mod rank;
pub mod shuffle;
pub mod typedrw;

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use context::Context;
pub use dataset::Dataset;
pub use error::{Error, Result};
pub use loader::{Edge, Node, Source};
pub use rank::{RankParams, DECAY, TOP_K};

use rank::RankIterator;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: Source,
    /// Repair sinks with back-edges before ranking.
    pub use_backlinks: bool,
    pub params: RankParams,
    /// Write every node's rank after each iteration.
    pub debug: bool,
    pub workers: usize,
    pub partitions: usize,
}

impl Default for Config {
    /// An empty text path; set `source` before running.
    fn default() -> Self {
        Config {
            source: Source::Text(PathBuf::new()),
            use_backlinks: true,
            params: RankParams::default(),
            debug: false,
            workers: 1,
            partitions: 1,
        }
    }
}

impl Config {
    pub fn new(source: Source) -> Config {
        Config { source, ..Config::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidParameter("workers must be > 0".to_string()));
        }
        if self.partitions == 0 {
            return Err(Error::InvalidParameter("partitions must be > 0".to_string()));
        }
        self.params.validate()
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    /// Best ranked nodes, highest first.
    pub top: Vec<(Node, f64)>,
    pub iterations: usize,
    pub max_changes: Vec<f64>,
    pub converged: bool,
    pub nodes: usize,
    pub edges: usize,
    pub sinks: usize,
    pub backlinks: usize,
}

pub struct SocialRankJob {
    config: Config,
    cancel: Arc<AtomicBool>,
}

impl SocialRankJob {
    pub fn new(config: Config) -> SocialRankJob {
        SocialRankJob {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Setting the flag stops the run before its next iteration.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// A context sized by the job's `workers` and `partitions`.
    pub fn context(&self) -> Result<Context> {
        Context::new(self.config.workers, self.config.partitions)
    }

    /// Runs the job, sending any debug listing to stdout.
    pub fn run(&self, ctx: &Context) -> Result<Ranking> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.run_with_output(ctx, &mut out)
    }

    pub fn run_with_output<W: Write>(&self, ctx: &Context, out: &mut W) -> Result<Ranking> {
        self.config.validate()?;
        log::info!("Running with {} as input", self.config.source);

        let edges = loader::load(ctx, &self.config.source).cache();
        let nodes = loader::node_set(&edges).cache();
        let node_count = nodes.count()?;
        let edge_count = edges.count()?;
        log::info!("This graph contains {} nodes and {} edges", node_count, edge_count);

        let degrees = degree::out_degrees(&edges, &nodes).cache();
        let (edges, degrees, sinks, backlinks) = if self.config.use_backlinks {
            let augmented = backlinks::augment(&edges, &nodes, &degrees)?;
            (augmented.edges, augmented.degrees, augmented.sinks, augmented.backlinks)
        } else {
            (edges, degrees, 0, 0)
        };

        let mut iterator = RankIterator::new(edges, degrees, nodes, self.config.params)
            .cancel_on(self.cancel_handle());
        if self.config.debug {
            iterator = iterator.dump_to(out);
        }
        let run = iterator.run()?;
        let top = rank::top_k(&run.ranks, TOP_K)?;
        log::info!("*** Finished social network ranking! ***");

        Ok(Ranking {
            top,
            iterations: run.iterations,
            max_changes: run.max_changes,
            converged: run.converged,
            nodes: node_count,
            edges: edge_count,
            sinks,
            backlinks,
        })
    }
}

/// Builds a context for `config` and runs it.
pub fn run(config: Config) -> Result<Ranking> {
    let job = SocialRankJob::new(config);
    let ctx = job.context()?;
    job.run(&ctx)
}

/// Which top nodes two rankings share, and which only one of them has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub common: Vec<Node>,
    pub only_first: Vec<Node>,
    pub only_second: Vec<Node>,
}

/// Lists keep the order of the ranking they come from.
pub fn compare(first: &[(Node, f64)], second: &[(Node, f64)]) -> Comparison {
    let in_first: HashSet<Node> = first.iter().map(|&(n, _)| n).collect();
    let in_second: HashSet<Node> = second.iter().map(|&(n, _)| n).collect();
    Comparison {
        common: first.iter().map(|&(n, _)| n).filter(|n| in_second.contains(n)).collect(),
        only_first: first.iter().map(|&(n, _)| n).filter(|n| !in_second.contains(n)).collect(),
        only_second: second.iter().map(|&(n, _)| n).filter(|n| !in_first.contains(n)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::Ordering;

    fn config(path: &Path) -> Config {
        let mut config = Config::new(Source::Text(path.to_path_buf()));
        config.workers = 2;
        config.partitions = 3;
        config
    }

    fn run_quietly(config: Config) -> Result<Ranking> {
        let job = SocialRankJob::new(config);
        let ctx = job.context()?;
        job.run_with_output(&ctx, &mut io::sink())
    }

    #[test]
    fn single_edge_without_backlinks() {
        let dir = tempdir::TempDir::new("socialrank").unwrap();
        let path = dir.path().join("edges.txt");
        fs::write(&path, "1 2\n").unwrap();

        let mut config = config(&path);
        config.use_backlinks = false;
        config.params.imax = 1;
        let ranking = run_quietly(config).unwrap();

        assert_eq!(ranking.nodes, 2);
        assert_eq!(ranking.edges, 1);
        assert_eq!(ranking.iterations, 1);
        assert_eq!(ranking.top.len(), 2);
        assert_eq!(ranking.top[0].0, 2);
        assert!((ranking.top[0].1 - 1.0).abs() < 1e-12);
        assert_eq!(ranking.top[1].0, 1);
        assert!((ranking.top[1].1 - 0.15).abs() < 1e-12);
    }

    #[test]
    fn backlinks_repair_chain() {
        let dir = tempdir::TempDir::new("socialrank").unwrap();
        let path = dir.path().join("edges.txt");
        fs::write(&path, "1 2\n2 3\n").unwrap();

        let ranking = run_quietly(config(&path)).unwrap();
        assert_eq!(ranking.sinks, 1);
        assert_eq!(ranking.backlinks, 1);
        assert_eq!(ranking.top.len(), 3);
    }

    #[test]
    fn malformed_line_is_not_fatal() {
        let dir = tempdir::TempDir::new("socialrank").unwrap();
        let path = dir.path().join("edges.txt");
        fs::write(&path, "1 2\nabc\n2 1\n").unwrap();

        let ranking = run_quietly(config(&path)).unwrap();
        assert_eq!(ranking.edges, 2);
        assert_eq!(ranking.nodes, 2);
    }

    #[test]
    fn missing_input_aborts() {
        let config = config(Path::new("/nonexistent/socialrank/edges.txt"));
        assert!(matches!(run_quietly(config), Err(Error::Resource { .. })));
    }

    #[test]
    fn top_is_capped_and_ordered() {
        let dir = tempdir::TempDir::new("socialrank").unwrap();
        let path = dir.path().join("edges.txt");
        let lines: String = (1..=30).map(|i| format!("{} {}\n{} 0\n", i, i % 7 + 1, i)).collect();
        fs::write(&path, lines).unwrap();

        let ranking = run_quietly(config(&path)).unwrap();
        assert_eq!(ranking.top.len(), TOP_K);
        assert_eq!(ranking.top[0].0, 0);
        for pair in ranking.top.windows(2) {
            assert!(rank::by_rank(&pair[0], &pair[1]) != std::cmp::Ordering::Greater);
        }
    }

    #[test]
    fn debug_mode_writes_listing() {
        let dir = tempdir::TempDir::new("socialrank").unwrap();
        let path = dir.path().join("edges.txt");
        fs::write(&path, "1 2\n2 1\n").unwrap();

        let mut config = config(&path);
        config.debug = true;
        config.params.imax = 2;
        config.params.dmax = -1.0;
        let job = SocialRankJob::new(config);
        let ctx = job.context().unwrap();
        let mut out = Vec::new();
        job.run_with_output(&ctx, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("Social rank values")).count(), 2);
        assert!(text.contains("1 1.000000\n2 1.000000\n"));
    }

    #[test]
    fn cancelled_job_fails() {
        let dir = tempdir::TempDir::new("socialrank").unwrap();
        let path = dir.path().join("edges.txt");
        fs::write(&path, "1 2\n2 1\n").unwrap();

        let job = SocialRankJob::new(config(&path));
        job.cancel_handle().store(true, Ordering::SeqCst);
        let ctx = job.context().unwrap();
        let result = job.run_with_output(&ctx, &mut io::sink());
        assert!(matches!(result, Err(Error::Cancelled { .. })));
    }

    #[test]
    fn default_config_matches_job_defaults() {
        let config = Config::default();
        assert_eq!(config.source, Source::Text(PathBuf::new()));
        assert!(config.use_backlinks);
        assert!(!config.debug);
        assert_eq!((config.workers, config.partitions), (1, 1));
        assert_eq!(config.params, RankParams { decay: 0.15, dmax: 30.0, imax: 25 });
        assert!(config.validate().is_ok());

        let binary = Config::new(Source::Binary("graph".to_string()));
        assert_eq!(binary, Config { source: Source::Binary("graph".to_string()), ..config });
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = Config::new(Source::Text("edges.txt".into()));
        config.params.decay = -0.5;
        assert!(matches!(config.validate(), Err(Error::InvalidParameter(_))));
        config.params.decay = DECAY;
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn compare_splits_rankings() {
        let with = [(1, 3.0), (2, 2.0), (3, 1.0)];
        let without = [(4, 5.0), (2, 4.0), (1, 0.5)];
        let comparison = compare(&with, &without);
        assert_eq!(comparison.common, vec![1, 2]);
        assert_eq!(comparison.only_first, vec![3]);
        assert_eq!(comparison.only_second, vec![4]);
    }
}
