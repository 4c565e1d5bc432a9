//! Lazy, partitioned collections.
//!
//! A `Dataset<T>` is a recipe for producing a list of partitions. Operators
//! only compose recipes; the work happens when an action (`collect`, `count`,
//! `take_ordered`, `aggregate`, `glom`) asks for the partitions. Narrow
//! operators transform each partition independently on the context's pool;
//! wide operators (`distinct`, `join`, `aggregate_by_key`) first exchange
//! records by key so equal keys share a partition.
//!
//! Combiners handed to `aggregate` and `aggregate_by_key` must be associative
//! and commutative: partial results are merged in an order the caller does not
//! control.

use std::cmp::Ordering;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::shuffle::{exchange, fold_keyed, hash_of, FixedMap, FixedSet};

/// Anything a dataset can hold.
pub trait Data: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> Data for T {}

type Compute<T> = dyn Fn() -> Result<Vec<Vec<T>>> + Send + Sync;

pub struct Dataset<T> {
    ctx: Context,
    partitions: usize,
    compute: Arc<Compute<T>>,
}

impl<T> Clone for Dataset<T> {
    fn clone(&self) -> Self {
        Dataset {
            ctx: self.ctx.clone(),
            partitions: self.partitions,
            compute: Arc::clone(&self.compute),
        }
    }
}

enum Cached<T> {
    Pending(Dataset<T>),
    Ready(Vec<Vec<T>>),
}

impl<T: Data> Dataset<T> {
    /// A dataset whose partitions come from `compute`, invoked once per action.
    pub fn from_source<F>(ctx: &Context, partitions: usize, compute: F) -> Dataset<T>
    where
        F: Fn() -> Result<Vec<Vec<T>>> + Send + Sync + 'static,
    {
        Dataset {
            ctx: ctx.clone(),
            partitions,
            compute: Arc::new(compute),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions
    }

    pub fn map_partitions<U, F>(&self, f: F) -> Dataset<U>
    where
        U: Data,
        F: Fn(Vec<T>) -> Vec<U> + Send + Sync + 'static,
    {
        let parent = self.clone();
        Dataset::from_source(&self.ctx, self.partitions, move || {
            let parts = parent.glom()?;
            Ok(parent.ctx.install(|| parts.into_par_iter().map(|part| f(part)).collect()))
        })
    }

    pub fn map<U, F>(&self, f: F) -> Dataset<U>
    where
        U: Data,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.map_partitions(move |part| part.into_iter().map(&f).collect())
    }

    pub fn flat_map<U, I, F>(&self, f: F) -> Dataset<U>
    where
        U: Data,
        I: IntoIterator<Item = U>,
        F: Fn(T) -> I + Send + Sync + 'static,
    {
        self.map_partitions(move |part| part.into_iter().flat_map(&f).collect())
    }

    pub fn filter<F>(&self, f: F) -> Dataset<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.map_partitions(move |part| part.into_iter().filter(|x| f(x)).collect())
    }

    /// Multiset concatenation: duplicates survive, partitions are appended.
    pub fn union(&self, other: &Dataset<T>) -> Dataset<T> {
        let (left, right) = (self.clone(), other.clone());
        Dataset::from_source(&self.ctx, self.partitions + other.partitions, move || {
            let mut parts = left.glom()?;
            parts.extend(right.glom()?);
            Ok(parts)
        })
    }

    /// Keeps the partitions after their first evaluation and drops the
    /// lineage that produced them.
    pub fn cache(&self) -> Dataset<T> {
        let state = Arc::new(Mutex::new(Cached::Pending(self.clone())));
        Dataset::from_source(&self.ctx, self.partitions, move || {
            let mut state = state
                .lock()
                .map_err(|_| Error::Execution("cached dataset lock poisoned".to_string()))?;
            let parts = match &*state {
                Cached::Ready(parts) => return Ok(parts.clone()),
                Cached::Pending(parent) => parent.glom()?,
            };
            *state = Cached::Ready(parts.clone());
            Ok(parts)
        })
    }

    /// Evaluates the dataset, returning its partitions.
    pub fn glom(&self) -> Result<Vec<Vec<T>>> {
        (self.compute)()
    }

    pub fn collect(&self) -> Result<Vec<T>> {
        Ok(self.glom()?.into_iter().flatten().collect())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.glom()?.iter().map(Vec::len).sum())
    }

    /// The `k` least elements under `cmp`. Each partition contributes its own
    /// `k` least before the final selection.
    pub fn take_ordered<F>(&self, k: usize, cmp: F) -> Result<Vec<T>>
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync,
    {
        let parts = self.glom()?;
        let mut best: Vec<T> = self.ctx.install(|| {
            parts
                .into_par_iter()
                .flat_map_iter(|mut part| {
                    part.sort_by(&cmp);
                    part.truncate(k);
                    part
                })
                .collect()
        });
        best.sort_by(&cmp);
        best.truncate(k);
        Ok(best)
    }

    /// Folds every partition from a copy of `zero` with `seq`, then merges the
    /// partial results with `comb`.
    pub fn aggregate<U, S, C>(&self, zero: U, seq: S, comb: C) -> Result<U>
    where
        U: Data,
        S: Fn(U, T) -> U + Send + Sync,
        C: Fn(U, U) -> U,
    {
        let parts = self.glom()?;
        let partials: Vec<U> = self.ctx.install(|| {
            parts
                .into_par_iter()
                .map(|part| part.into_iter().fold(zero.clone(), &seq))
                .collect()
        });
        Ok(partials.into_iter().fold(zero, comb))
    }
}

impl<T: Data + Hash + Eq> Dataset<T> {
    /// Removes duplicate elements, comparing whole values.
    pub fn distinct(&self) -> Dataset<T> {
        let parent = self.clone();
        let peers = self.ctx.partitions();
        Dataset::from_source(&self.ctx, peers, move || {
            let parts = parent.glom()?;
            Ok(parent.ctx.install(|| {
                let local: Vec<Vec<T>> = parts.into_par_iter().map(dedup).collect();
                exchange(local, peers, |x| hash_of(x))
                    .into_par_iter()
                    .map(dedup)
                    .collect()
            }))
        })
    }
}

fn dedup<T: Clone + Hash + Eq>(part: Vec<T>) -> Vec<T> {
    let mut seen: FixedSet<T> = FixedSet::default();
    part.into_iter().filter(|x| seen.insert(x.clone())).collect()
}

impl<K, V> Dataset<(K, V)>
where
    K: Data + Hash + Eq,
    V: Data,
{
    pub fn keys(&self) -> Dataset<K> {
        self.map(|(k, _)| k)
    }

    pub fn values(&self) -> Dataset<V> {
        self.map(|(_, v)| v)
    }

    pub fn map_values<U, F>(&self, f: F) -> Dataset<(K, U)>
    where
        U: Data,
        F: Fn(V) -> U + Send + Sync + 'static,
    {
        self.map(move |(k, v)| (k, f(v)))
    }

    /// Folds the values of each key: `seq` within a partition starting from
    /// `zero`, then `comb` across partitions. Keys without values are absent.
    pub fn aggregate_by_key<U, S, C>(&self, zero: U, seq: S, comb: C) -> Dataset<(K, U)>
    where
        U: Data,
        S: Fn(U, V) -> U + Send + Sync + 'static,
        C: Fn(U, U) -> U + Send + Sync + 'static,
    {
        let parent = self.clone();
        let peers = self.ctx.partitions();
        Dataset::from_source(&self.ctx, peers, move || {
            let parts = parent.glom()?;
            Ok(parent.ctx.install(|| {
                let partial: Vec<Vec<(K, U)>> = parts
                    .into_par_iter()
                    .map(|part| fold_keyed(part, |v| seq(zero.clone(), v), &seq))
                    .collect();
                exchange(partial, peers, |(k, _)| hash_of(k))
                    .into_par_iter()
                    .map(|bucket| fold_keyed(bucket, |u| u, &comb))
                    .collect()
            }))
        })
    }

    /// Inner equi-join: one output per pair of matching records.
    pub fn join<W: Data>(&self, other: &Dataset<(K, W)>) -> Dataset<(K, (V, W))> {
        let (left, right) = (self.clone(), other.clone());
        let peers = self.ctx.partitions();
        Dataset::from_source(&self.ctx, peers, move || {
            let lparts = left.glom()?;
            let rparts = right.glom()?;
            Ok(left.ctx.install(|| {
                let lparts = exchange(lparts, peers, |(k, _)| hash_of(k));
                let rparts = exchange(rparts, peers, |(k, _)| hash_of(k));
                lparts
                    .into_par_iter()
                    .zip(rparts.into_par_iter())
                    .map(|(lpart, rpart)| {
                        let mut table: FixedMap<K, Vec<W>> = FixedMap::default();
                        for (k, w) in rpart {
                            table.entry(k).or_insert_with(Vec::new).push(w);
                        }
                        let mut out = Vec::new();
                        for (k, v) in lpart {
                            if let Some(matches) = table.get(&k) {
                                for w in matches {
                                    out.push((k.clone(), (v.clone(), w.clone())));
                                }
                            }
                        }
                        out
                    })
                    .collect()
            }))
        })
    }
}
