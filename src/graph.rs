//! Per-layer adjacency structure.
//!
//! A [`LayerGraph`] is an undirected, unweighted graph over element IDs.
//! Distances are never stored; they are recomputed through the metric on
//! demand. Adjacency is kept in ordered maps so that iteration order (and
//! therefore every graph built from a fixed seed) is deterministic.
//!
//! Mutation during insert goes through a [`StagedLayer`]: a copy-on-write
//! overlay that reads through to the committed graph and records only the
//! adjacency entries it touches. The overlay is turned into a [`LayerDelta`]
//! and applied once the whole insert has been planned.

use std::collections::{btree_set, BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::iter;
use std::ops::Bound;

/// An element identifier.
///
/// Elements are opaque to the index: they are compared, copied and handed to
/// the metric, nothing else. `Ord` provides the deterministic tie-break for
/// equal distances.
pub trait Element: Copy + Ord + Debug {}

impl<T: Copy + Ord + Debug> Element for T {}

/// Undirected graph for one hierarchy level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerGraph<E> {
    /// Anchor element; present from creation and returned as the placeholder
    /// neighborhood of unknown elements.
    anchor: E,
    /// element -> neighbors (symmetric)
    adjacency: BTreeMap<E, BTreeSet<E>>,
}

impl<E: Element> LayerGraph<E> {
    /// Create a layer seeded with a single anchor element.
    pub fn new(anchor: E) -> Self {
        let mut adjacency = BTreeMap::new();
        adjacency.insert(anchor, BTreeSet::new());
        Self { anchor, adjacency }
    }

    /// The anchor element.
    pub fn anchor(&self) -> E {
        self.anchor
    }

    /// Add an element without edges. Returns false if it was already present.
    pub fn add_node(&mut self, u: E) -> bool {
        if self.adjacency.contains_key(&u) {
            return false;
        }
        self.adjacency.insert(u, BTreeSet::new());
        true
    }

    /// Check if an element is present.
    pub fn contains(&self, u: &E) -> bool {
        self.adjacency.contains_key(u)
    }

    /// Add an undirected edge, inserting missing endpoints.
    ///
    /// Self-loops are ignored and repeated insertion is idempotent.
    /// Returns true if the edge is new.
    pub fn add_edge(&mut self, u: E, v: E) -> bool {
        if u == v {
            self.add_node(u);
            return false;
        }
        let added = self.adjacency.entry(u).or_default().insert(v);
        self.adjacency.entry(v).or_default().insert(u);
        added
    }

    /// Remove an undirected edge. Endpoints stay in the layer.
    /// Returns true if the edge existed.
    pub fn remove_edge(&mut self, u: &E, v: &E) -> bool {
        let removed = self.adjacency.get_mut(u).is_some_and(|set| set.remove(v));
        if let Some(set) = self.adjacency.get_mut(v) {
            set.remove(u);
        }
        removed
    }

    /// Neighbors of `u`.
    ///
    /// An element that is not in this layer yields the anchor instead of
    /// nothing, so a caller always has at least one candidate to measure.
    pub fn neighbors(&self, u: &E) -> Neighbors<'_, E> {
        match self.adjacency.get(u) {
            Some(set) => Neighbors::Adjacent(set.iter()),
            None => Neighbors::Anchor(iter::once(self.anchor)),
        }
    }

    /// Number of edges at `u` (0 if absent).
    pub fn degree(&self, u: &E) -> usize {
        self.adjacency.get(u).map_or(0, BTreeSet::len)
    }

    /// Number of elements in the layer.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Always false: the anchor is present from creation.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Elements in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = E> + '_ {
        self.adjacency.keys().copied()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Snapshot of all edges as `(u, v)` with `u < v`, in ascending order.
    ///
    /// This is the export surface for renderers and for any caller that
    /// needs to mutate the graph while walking its edges.
    pub fn edges(&self) -> Vec<(E, E)> {
        self.adjacency
            .iter()
            .flat_map(|(&u, set)| {
                set.range((Bound::Excluded(u), Bound::Unbounded))
                    .map(move |&v| (u, v))
            })
            .collect()
    }

    /// Largest degree in the layer.
    pub fn max_degree(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).max().unwrap_or(0)
    }

    /// Start a copy-on-write overlay over this layer.
    pub(crate) fn stage(&self) -> StagedLayer<'_, E> {
        StagedLayer {
            base: self,
            touched: BTreeMap::new(),
        }
    }

    /// Write back the adjacency entries recorded by a [`StagedLayer`].
    pub(crate) fn apply(&mut self, delta: LayerDelta<E>) {
        self.adjacency.extend(delta.entries);
    }
}

/// Iterator over a neighborhood, see [`LayerGraph::neighbors`].
#[derive(Debug, Clone)]
pub enum Neighbors<'a, E> {
    /// Element is present: its adjacency set.
    Adjacent(btree_set::Iter<'a, E>),
    /// Element is absent: the layer anchor.
    Anchor(iter::Once<E>),
}

impl<E: Copy> Iterator for Neighbors<'_, E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        match self {
            Neighbors::Adjacent(it) => it.next().copied(),
            Neighbors::Anchor(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Neighbors::Adjacent(it) => it.size_hint(),
            Neighbors::Anchor(it) => it.size_hint(),
        }
    }
}

/// Pending edits to one layer, produced by [`StagedLayer::commit`].
#[derive(Debug, Clone)]
pub(crate) struct LayerDelta<E> {
    entries: BTreeMap<E, BTreeSet<E>>,
}

/// Copy-on-write view of a layer used while planning an insert.
///
/// Every edit keeps both endpoints' entries in `touched`, so writing the
/// touched entries back leaves the adjacency symmetric.
#[derive(Debug)]
pub(crate) struct StagedLayer<'a, E> {
    base: &'a LayerGraph<E>,
    touched: BTreeMap<E, BTreeSet<E>>,
}

impl<E: Element> StagedLayer<'_, E> {
    fn entry(&mut self, u: E) -> &mut BTreeSet<E> {
        let base = self.base;
        self.touched
            .entry(u)
            .or_insert_with(|| base.adjacency.get(&u).cloned().unwrap_or_default())
    }

    fn current(&self, u: &E) -> Option<&BTreeSet<E>> {
        self.touched.get(u).or_else(|| self.base.adjacency.get(u))
    }

    pub(crate) fn add_node(&mut self, u: E) {
        self.entry(u);
    }

    pub(crate) fn add_edge(&mut self, u: E, v: E) {
        if u == v {
            self.add_node(u);
            return;
        }
        self.entry(u).insert(v);
        self.entry(v).insert(u);
    }

    /// Current neighbors of `u` as an owned list.
    pub(crate) fn neighbors(&self, u: &E) -> Vec<E> {
        self.current(u)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn degree(&self, u: &E) -> usize {
        self.current(u).map_or(0, BTreeSet::len)
    }

    /// Replace the edge set of `u` with exactly `keep`.
    pub(crate) fn set_neighbors(&mut self, u: E, keep: &[E]) {
        let keep: BTreeSet<E> = keep.iter().copied().filter(|&v| v != u).collect();
        let dropped: Vec<E> = self
            .neighbors(&u)
            .into_iter()
            .filter(|v| !keep.contains(v))
            .collect();
        for v in dropped {
            self.entry(u).remove(&v);
            self.entry(v).remove(&u);
        }
        for v in keep {
            self.add_edge(u, v);
        }
    }

    pub(crate) fn commit(self) -> LayerDelta<E> {
        LayerDelta {
            entries: self.touched,
        }
    }
}
