//! Exact-match indexing and threshold clustering.
//!
//! Exact grouping is a fingerprint → bucket map: O(n), and transitive by
//! construction (a shared key means all members are mutually equal).
//!
//! Threshold grouping is single-linkage: a new entity joins the first group
//! whose *seed* it matches at or above the threshold, otherwise it becomes a
//! new seed. A member is therefore guaranteed similar to its seed but not
//! necessarily to every other member; the cost is O(n * groups) instead of
//! O(n^2) exhaustive pairwise clustering, and report consumers may see
//! groups where not every pair clears the threshold on its own.

use ahash::AHashMap;

use crate::error::Error;

/// Insertion-ordered fingerprint → bucket map. Bucket order follows the
/// first entity seen with each fingerprint, so grouping never depends on
/// hash-map iteration order.
#[derive(Debug)]
pub struct FingerprintIndex<T> {
    buckets: Vec<(String, Vec<T>)>,
    by_key: AHashMap<String, usize>,
}

impl<T> Default for FingerprintIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FingerprintIndex<T> {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            by_key: AHashMap::new(),
        }
    }

    pub fn insert(&mut self, fingerprint: String, item: T) {
        match self.by_key.get(&fingerprint) {
            Some(&idx) => self.buckets[idx].1.push(item),
            None => {
                self.by_key.insert(fingerprint.clone(), self.buckets.len());
                self.buckets.push((fingerprint, vec![item]));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// All buckets in first-seen order, singletons included. Callers filter
    /// for `len() >= 2` when they only want duplicate groups.
    pub fn into_buckets(self) -> Vec<(String, Vec<T>)> {
        self.buckets
    }
}

/// Single-linkage threshold clusterer (see module docs for the tradeoff).
/// The threshold bound is inclusive: a score exactly at the threshold
/// matches. Determinism requires feeding entities in a canonical order;
/// the engine inserts in input order, single-threaded.
#[derive(Debug)]
pub struct SimilarityClusterer<T> {
    threshold: f64,
    clusters: Vec<Vec<T>>,
}

impl<T> SimilarityClusterer<T> {
    pub fn new(threshold: f64) -> Result<Self, Error> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidConfiguration(format!(
                "similarity threshold must be within [0, 1], got {threshold}"
            )));
        }
        Ok(Self {
            threshold,
            clusters: Vec::new(),
        })
    }

    /// Attach `item` to the first cluster whose seed scores at or above the
    /// threshold, or start a new cluster with it as seed.
    pub fn insert<S>(&mut self, item: T, score: S)
    where
        S: Fn(&T, &T) -> f64,
    {
        self.insert_prefiltered(item, |_, _| true, score);
    }

    /// Like `insert`, but seeds failing the cheap `prefilter` predicate are
    /// skipped without computing the similarity score.
    pub fn insert_prefiltered<P, S>(&mut self, item: T, prefilter: P, score: S)
    where
        P: Fn(&T, &T) -> bool,
        S: Fn(&T, &T) -> f64,
    {
        for cluster in &mut self.clusters {
            let seed = &cluster[0];
            if !prefilter(seed, &item) {
                continue;
            }
            if score(seed, &item) >= self.threshold {
                cluster.push(item);
                return;
            }
        }
        self.clusters.push(vec![item]);
    }

    /// Clusters with at least two members, in seed-creation order.
    pub fn into_clusters(self) -> Vec<Vec<T>> {
        self.clusters
            .into_iter()
            .filter(|c| c.len() >= 2)
            .collect()
    }
}
