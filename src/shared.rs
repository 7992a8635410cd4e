//! Thread-safe wrapper: one writer, lock-free readers.
//!
//! Inserts are serialized through a mutex around the working index. After
//! each insert call the writer publishes an immutable snapshot via
//! [`ArcSwap`]; searches run against the latest snapshot and never block on,
//! or observe, an insert in progress.
//!
//! Publishing clones the layer graphs; the metric (and any embeddings it
//! holds, e.g. a [`VectorStore`](crate::VectorStore)) is shared by every
//! snapshot, not copied. Bulk loads should still go through
//! [`SharedIndex::insert_batch`], which publishes once per batch.

use crate::error::Result;
use crate::graph::Element;
use crate::index::HnswIndex;
use crate::metric::Metric;
use crate::search::Neighbor;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// An [`HnswIndex`] shared between one writer and many readers.
pub struct SharedIndex<E, M> {
    /// Working copy; holding the lock is the right to insert
    writer: Mutex<HnswIndex<E, M>>,
    /// Last published state, read without locking
    published: ArcSwap<HnswIndex<E, M>>,
}

impl<E: Element, M> fmt::Debug for SharedIndex<E, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedIndex")
            .field("published", &*self.published.load())
            .finish_non_exhaustive()
    }
}

impl<E: Element, M> SharedIndex<E, M> {
    /// Wrap an index, publishing its current state.
    pub fn new(index: HnswIndex<E, M>) -> Self {
        let published = ArcSwap::from_pointee(index.clone());
        Self {
            writer: Mutex::new(index),
            published,
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<HnswIndex<E, M>> {
        self.published.load_full()
    }

    /// Search the latest snapshot with the default `ef_search`.
    pub fn search<Q>(&self, query: &Q, k: usize) -> Result<Vec<Neighbor<E>>>
    where
        Q: ?Sized,
        M: Metric<Q, E>,
    {
        self.published.load().search(query, k)
    }

    /// Search the latest snapshot with an explicit `ef`.
    pub fn search_with_ef<Q>(&self, query: &Q, k: usize, ef: usize) -> Result<Vec<Neighbor<E>>>
    where
        Q: ?Sized,
        M: Metric<Q, E>,
    {
        self.published.load().search_with_ef(query, k, ef)
    }

    /// Consume the wrapper, returning the working index.
    pub fn into_inner(self) -> HnswIndex<E, M> {
        self.writer.into_inner()
    }

    fn publish(&self, index: &HnswIndex<E, M>) {
        self.published.store(Arc::new(index.clone()));
    }
}

impl<E: Element, M: Metric<E, E>> SharedIndex<E, M> {
    /// Insert one element and publish the result.
    ///
    /// Blocks while another insert is running.
    pub fn insert(&self, element: E) -> Result<usize> {
        let mut index = self.writer.lock();
        let level = index.insert(element)?;
        self.publish(&index);
        Ok(level)
    }

    /// Insert elements in order and publish once.
    ///
    /// On error, the elements inserted before the failure are still
    /// published before the error is returned.
    pub fn insert_batch<I>(&self, elements: I) -> Result<usize>
    where
        I: IntoIterator<Item = E>,
    {
        let mut index = self.writer.lock();
        let mut count = 0;
        let mut outcome = Ok(());
        for e in elements {
            if let Err(err) = index.insert(e) {
                outcome = Err(err);
                break;
            }
            count += 1;
        }
        if count > 0 {
            self.publish(&index);
        }
        outcome.map(|()| count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::metric::{Distance, TryMetric, VectorStore};
    use crate::params::HnswParams;

    type FnMetric = fn(&u32, &u32) -> f32;

    fn abs_diff(a: &u32, b: &u32) -> f32 {
        a.abs_diff(*b) as f32
    }

    fn shared() -> SharedIndex<u32, FnMetric> {
        let params = HnswParams::with_m(4).with_layers(3).with_seed(9);
        SharedIndex::new(HnswIndex::new(params, abs_diff as FnMetric).unwrap())
    }

    #[test]
    fn test_insert_publishes_snapshot() {
        let index = shared();
        let before = index.snapshot();
        assert_eq!(before.len(), 1);

        index.insert(5).unwrap();
        assert_eq!(index.snapshot().len(), 2);
        // Old snapshot is unaffected
        assert_eq!(before.len(), 1);

        let hits = index.search(&6u32, 1).unwrap();
        assert_eq!(hits[0].element, 5);
    }

    #[test]
    fn test_snapshots_share_metric() {
        let mut store = VectorStore::new(2, Distance::Euclidean);
        for id in 0..8u32 {
            store.insert(id, vec![id as f32, 1.0]).unwrap();
        }
        let index = SharedIndex::new(HnswIndex::new(HnswParams::with_m(2).with_layers(2).with_seed(4), store).unwrap());

        let before = index.snapshot();
        index.insert(3).unwrap();
        index.insert_batch(4..8).unwrap();
        let after = index.snapshot();

        assert_eq!(after.len(), 6);
        assert!(std::ptr::eq(before.metric(), after.metric()));
        assert_eq!(after.metric().len(), 8);
    }

    #[test]
    fn test_batch_publishes_partial_progress() {
        let metric = TryMetric(|a: &u32, b: &u32| {
            if *a == 3 || *b == 3 {
                return Err(Error::Metric("no vector for 3".into()));
            }
            Ok(a.abs_diff(*b) as f32)
        });
        let index = SharedIndex::new(HnswIndex::new(HnswParams::with_m(2).with_layers(2).with_seed(1), metric).unwrap());

        let err = index.insert_batch([1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, Error::Metric(_)));

        let snapshot = index.snapshot();
        assert!(snapshot.contains(&1));
        assert!(snapshot.contains(&2));
        assert!(!snapshot.contains(&3));
        assert!(!snapshot.contains(&4));
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let index = shared();
        index.insert_batch(1..=50).unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                for e in 51..=100 {
                    index.insert(e).unwrap();
                }
            });
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let snapshot = index.snapshot();
                        assert!(snapshot.check_invariants().is_ok());
                        let hits = snapshot.search(&25u32, 3).unwrap();
                        assert_eq!(hits.len(), 3);
                    }
                });
            }
        });

        let final_index = index.into_inner();
        assert_eq!(final_index.len(), 101);
    }
}
