//! Moving records between partitions.
//!
//! Wide operators route every record to one of `peers` buckets by a hash of
//! its key, so that all records sharing a key meet in the same partition.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasherDefault, Hash, Hasher};

use rayon::prelude::*;

/// Zero-seeded hasher state. Bucket assignment and map iteration order repeat
/// exactly from one run to the next.
pub type FixedState = BuildHasherDefault<DefaultHasher>;
pub type FixedMap<K, V> = HashMap<K, V, FixedState>;
pub type FixedSet<T> = HashSet<T, FixedState>;

pub fn hash_of<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Redistributes `parts` into `peers` buckets, record `r` landing in bucket
/// `route(&r) % peers`. Within a bucket, records from partition `i` precede
/// those from partition `i + 1` and keep their relative order.
///
/// Must be called from inside the context's pool.
pub fn exchange<T, F>(parts: Vec<Vec<T>>, peers: usize, route: F) -> Vec<Vec<T>>
where
    T: Send,
    F: Fn(&T) -> u64 + Sync,
{
    let peers = peers.max(1);
    let split: Vec<Vec<Vec<T>>> = parts
        .into_par_iter()
        .map(|part| {
            let mut buckets: Vec<Vec<T>> = (0..peers).map(|_| Vec::new()).collect();
            for record in part {
                let index = (route(&record) % peers as u64) as usize;
                buckets[index].push(record);
            }
            buckets
        })
        .collect();

    let mut out: Vec<Vec<T>> = (0..peers).map(|_| Vec::new()).collect();
    for buckets in split {
        for (dst, bucket) in out.iter_mut().zip(buckets) {
            dst.extend(bucket);
        }
    }
    out
}

/// Folds records sharing a key: the first value seen for a key goes through
/// `init`, later ones are merged in arrival order.
pub fn fold_keyed<K, X, A, I, M>(records: Vec<(K, X)>, init: I, merge: M) -> Vec<(K, A)>
where
    K: Hash + Eq,
    I: Fn(X) -> A,
    M: Fn(A, X) -> A,
{
    let mut acc: FixedMap<K, Option<A>> = FixedMap::default();
    for (key, value) in records {
        let slot = acc.entry(key).or_insert(None);
        *slot = Some(match slot.take() {
            Some(folded) => merge(folded, value),
            None => init(value),
        });
    }
    acc.into_iter()
        .filter_map(|(key, folded)| folded.map(|folded| (key, folded)))
        .collect()
}
