//! Execution context: the worker pool datasets evaluate on, and the sources
//! datasets start from.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::dataset::{Data, Dataset};
use crate::error::{Error, Result};

/// Handle on a worker pool plus the number of partitions wide operators
/// shuffle into. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Context {
    pool: Arc<ThreadPool>,
    partitions: usize,
}

impl Context {
    pub fn new(workers: usize, partitions: usize) -> Result<Context> {
        if workers == 0 {
            return Err(Error::InvalidParameter("workers must be > 0".to_string()));
        }
        if partitions == 0 {
            return Err(Error::InvalidParameter("partitions must be > 0".to_string()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("socialrank-worker-{}", index))
            .build()?;
        Ok(Context { pool: Arc::new(pool), partitions })
    }

    /// One worker, one partition. Right for small graphs and tests.
    pub fn local() -> Result<Context> {
        Context::new(1, 1)
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub(crate) fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Distributes `data` over the default number of partitions.
    pub fn parallelize<T: Data>(&self, data: Vec<T>) -> Dataset<T> {
        self.parallelize_with(data, self.partitions)
    }

    pub fn parallelize_with<T: Data>(&self, data: Vec<T>, partitions: usize) -> Dataset<T> {
        let partitions = partitions.max(1);
        let data = Arc::new(data);
        Dataset::from_source(self, partitions, move || Ok(split(data.to_vec(), partitions)))
    }

    /// Lines of a text file, any line ending. The file is read when an
    /// action first needs it; failure to read is a `Resource` error. Each line
    /// is decoded on its own, invalid UTF-8 becoming U+FFFD.
    pub fn text_file<P: AsRef<Path>>(&self, path: P) -> Dataset<String> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let partitions = self.partitions;
        Dataset::from_source(self, partitions, move || {
            let contents = fs::read(&path).map_err(|e| Error::resource(&path, e))?;
            let lines: Vec<String> = contents
                .split(|&b| b == b'\n' || b == b'\r')
                .filter(|line| !line.is_empty())
                .map(|line| String::from_utf8_lossy(line).into_owned())
                .collect();
            Ok(split(lines, partitions))
        })
    }
}

/// Cuts `data` into exactly `partitions` contiguous runs, the last ones
/// possibly empty.
pub(crate) fn split<T>(data: Vec<T>, partitions: usize) -> Vec<Vec<T>> {
    let partitions = partitions.max(1);
    let chunk = (data.len() + partitions - 1) / partitions;
    let mut parts: Vec<Vec<T>> = Vec::with_capacity(partitions);
    let mut iter = data.into_iter();
    for _ in 0..partitions {
        parts.push(iter.by_ref().take(chunk).collect());
    }
    parts
}
