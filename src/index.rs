//! Hierarchical Navigable Small World (HNSW) index.
//!
//! # Algorithm Overview
//!
//! The index is a fixed-height stack of [`LayerGraph`]s:
//! - Layer 0 contains every element
//! - Higher layers contain exponentially fewer elements (each a subset of the one below)
//! - Search starts at the entrance point in the top layer, greedily descends
//!   with `ef = 1`, then runs one wide search in layer 0
//!
//! Every layer is seeded with the anchor element at creation, so the index is
//! searchable before the first insert. The layer count never grows: a drawn
//! level above the top layer is clamped to it.
//!
//! # Insert atomicity
//!
//! Insert is planned against copy-on-write overlays of each touched layer.
//! All metric calls happen while planning; the overlays are only written back
//! once every layer has been planned, so a failing metric leaves the graph,
//! the entrance point and the random state exactly as they were.

use crate::error::{Error, Result};
use crate::graph::{Element, LayerDelta, LayerGraph};
use crate::metric::Metric;
use crate::params::HnswParams;
use crate::search::{search_layer, select_neighbors, truncate_nearest, Neighbor};
use std::fmt;
use std::sync::Arc;

/// HNSW index over elements of type `E`, measured by metric `M`.
///
/// # Example
///
/// ```
/// use nhnsw::{HnswIndex, HnswParams};
///
/// # fn main() -> nhnsw::Result<()> {
/// let metric = |a: &u32, b: &u32| a.abs_diff(*b) as f32;
/// let mut index = HnswIndex::new(HnswParams::with_m(4).with_layers(3).with_seed(1), metric)?;
/// for id in 1..=50u32 {
///     index.insert(id)?;
/// }
/// let hits = index.search(&21u32, 3)?;
/// assert_eq!(hits[0].element, 21);
/// # Ok(())
/// # }
/// ```
pub struct HnswIndex<E, M> {
    /// Construction parameters (immutable)
    params: HnswParams,
    /// Distance provider, shared between clones
    metric: Arc<M>,
    /// Element seeded into every layer at creation
    anchor: E,
    /// layers[0] is the base layer, layers[len-1] the top
    layers: Vec<LayerGraph<E>>,
    /// Entry for searches; always present in the top layer
    entrance_point: E,
    /// Random state for level generation
    rng: fastrand::Rng,
}

impl<E: Element, M> Clone for HnswIndex<E, M> {
    fn clone(&self) -> Self {
        Self {
            params: self.params,
            metric: Arc::clone(&self.metric),
            anchor: self.anchor,
            layers: self.layers.clone(),
            entrance_point: self.entrance_point,
            rng: self.rng.clone(),
        }
    }
}

impl<E: Element, M> fmt::Debug for HnswIndex<E, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HnswIndex")
            .field("params", &self.params)
            .field("anchor", &self.anchor)
            .field("entrance_point", &self.entrance_point)
            .field("layer_sizes", &self.layers.iter().map(LayerGraph::len).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<E: Element + Default, M> HnswIndex<E, M> {
    /// Create an empty index anchored at `E::default()` (element `0` for integers).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if `params` fail validation.
    pub fn new(params: HnswParams, metric: M) -> Result<Self> {
        Self::with_anchor(params, metric, E::default())
    }
}

impl<E: Element, M> HnswIndex<E, M> {
    /// Create an empty index whose layers are seeded with `anchor`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if `params` fail validation.
    pub fn with_anchor(params: HnswParams, metric: M, anchor: E) -> Result<Self> {
        params.validate()?;

        let rng = match params.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        Ok(Self {
            params,
            metric: Arc::new(metric),
            anchor,
            layers: (0..params.layers).map(|_| LayerGraph::new(anchor)).collect(),
            entrance_point: anchor,
            rng,
        })
    }

    /// Get index parameters.
    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    /// Get the metric provider.
    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Get the anchor element.
    pub fn anchor(&self) -> E {
        self.anchor
    }

    /// Get the entrance point.
    pub fn entrance_point(&self) -> E {
        self.entrance_point
    }

    /// Get number of layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Index of the top (sparsest) layer.
    pub fn top_layer(&self) -> usize {
        self.layers.len() - 1
    }

    /// Get a layer by level, 0 being the base.
    pub fn layer(&self, level: usize) -> Option<&LayerGraph<E>> {
        self.layers.get(level)
    }

    /// Iterate layers from the base upwards.
    pub fn layers(&self) -> impl Iterator<Item = &LayerGraph<E>> {
        self.layers.iter()
    }

    /// Number of elements, including the anchor.
    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    /// Always false: the anchor is present from creation.
    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    /// Check if an element has been inserted (or is the anchor).
    pub fn contains(&self, element: &E) -> bool {
        self.layers[0].contains(element)
    }

    /// Highest layer containing `element`.
    pub fn level_of(&self, element: &E) -> Option<usize> {
        self.layers.iter().rposition(|layer| layer.contains(element))
    }

    /// Draw a level: `floor(-ln(U) * mL)` with `U` uniform in (0, 1], clamped to the top layer.
    fn random_level(rng: &mut fastrand::Rng, level_factor: f64, top_layer: usize) -> usize {
        let u = 1.0 - rng.f64();
        let level = (-u.ln() * level_factor).floor();
        // float -> int casts saturate
        (level as usize).min(top_layer)
    }

    /// Verify the structural invariants of the index.
    ///
    /// Checks that every layer is a subset of the one below, that degrees
    /// respect `m` / `m0`, that adjacency is symmetric without self-loops,
    /// and that the entrance point lives in the top layer.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` naming the first violated property.
    pub fn check_invariants(&self) -> Result<()> {
        for (level, layer) in self.layers.iter().enumerate() {
            if !layer.contains(&self.anchor) {
                return Err(Error::invalid_arg(
                    "anchor",
                    format!("anchor {:?} missing from layer {}", self.anchor, level),
                ));
            }

            if level > 0 {
                let below = &self.layers[level - 1];
                if let Some(orphan) = layer.nodes().find(|e| !below.contains(e)) {
                    return Err(Error::invalid_arg(
                        "layers",
                        format!("{:?} is in layer {} but not layer {}", orphan, level, level - 1),
                    ));
                }
            }

            let bound = self.params.max_degree(level);
            for u in layer.nodes() {
                let degree = layer.degree(&u);
                if degree > bound {
                    return Err(Error::invalid_arg(
                        "degree",
                        format!("{:?} has degree {} > {} in layer {}", u, degree, bound, level),
                    ));
                }
                for v in layer.neighbors(&u) {
                    if v == u {
                        return Err(Error::invalid_arg(
                            "edges",
                            format!("self-loop at {:?} in layer {}", u, level),
                        ));
                    }
                    if !layer.contains(&v) || !layer.neighbors(&v).any(|w| w == u) {
                        return Err(Error::invalid_arg(
                            "edges",
                            format!("edge {:?} -> {:?} not symmetric in layer {}", u, v, level),
                        ));
                    }
                }
            }
        }

        if !self.layers[self.top_layer()].contains(&self.entrance_point) {
            return Err(Error::invalid_arg(
                "entrance_point",
                format!("{:?} is not in the top layer", self.entrance_point),
            ));
        }

        Ok(())
    }
}

impl<E: Element, M: Metric<E, E>> HnswIndex<E, M> {
    /// Insert an element.
    ///
    /// Re-inserting an element that is already present does not duplicate it;
    /// its edges are recomputed and merged within the degree bounds.
    ///
    /// # Returns
    ///
    /// The top layer the element was wired into.
    ///
    /// # Errors
    ///
    /// Any metric error. The index is left unchanged in that case.
    pub fn insert(&mut self, q: E) -> Result<usize> {
        let mut rng = self.rng.clone();
        let top = self.top_layer();
        let level = Self::random_level(&mut rng, self.params.level_factor, top);
        let max_visited = self.params.max_visited;

        let mut ep = self.entrance_point;
        let mut new_entrance = self.entrance_point;

        // Greedy descent through the layers above the element's level
        for lc in ((level + 1)..=top).rev() {
            let w = search_layer(&self.layers[lc], &*self.metric, &q, &[ep], 1, max_visited)?;
            if let Some(nearest) = w.first() {
                ep = nearest.element;
            }
            if lc == top {
                new_entrance = ep;
            }
        }

        // Plan the wiring for [level, 0] without touching the committed graph
        let mut deltas: Vec<(usize, LayerDelta<E>)> = Vec::with_capacity(level + 1);
        for lc in (0..=level).rev() {
            let layer = &self.layers[lc];
            let bound = self.params.max_degree(lc);

            let w = search_layer(layer, &*self.metric, &q, &[ep], self.params.ef_construction, max_visited)?;
            let neighbors = truncate_nearest(&q, &w, self.params.m);

            let mut stage = layer.stage();
            stage.add_node(q);
            for n in &neighbors {
                stage.add_edge(q, n.element);
            }

            // Re-insertion can push q itself over the bound
            let mut shrink: Vec<E> = neighbors.iter().map(|n| n.element).collect();
            shrink.push(q);
            for e in shrink {
                let e_neighbors = stage.neighbors(&e);
                if e_neighbors.len() > bound {
                    let keep = select_neighbors(&*self.metric, &e, e_neighbors, bound)?;
                    let keep: Vec<E> = keep.iter().map(|n| n.element).collect();
                    stage.set_neighbors(e, &keep);
                }
            }

            tracing::trace!(
                element = ?q,
                layer = lc,
                neighbors = neighbors.len(),
                degree = stage.degree(&q),
                "planned layer wiring"
            );

            if let Some(nearest) = w.first() {
                ep = nearest.element;
            }
            if lc == top {
                new_entrance = ep;
            }
            deltas.push((lc, stage.commit()));
        }

        for (lc, delta) in deltas {
            self.layers[lc].apply(delta);
        }
        self.entrance_point = new_entrance;
        self.rng = rng;

        tracing::debug!(element = ?q, level, entrance = ?new_entrance, "inserted element");
        Ok(level)
    }

    /// Insert elements in order, stopping at the first error.
    ///
    /// Elements before the failing one stay inserted; the failing one leaves
    /// no trace.
    ///
    /// # Returns
    ///
    /// Number of elements inserted.
    pub fn insert_batch<I>(&mut self, elements: I) -> Result<usize>
    where
        I: IntoIterator<Item = E>,
    {
        let mut count = 0;
        for e in elements {
            self.insert(e)?;
            count += 1;
        }
        Ok(count)
    }
}

impl<E: Element, M> HnswIndex<E, M> {
    /// Search for the `k` approximate nearest neighbors using the default `ef_search`.
    pub fn search<Q>(&self, query: &Q, k: usize) -> Result<Vec<Neighbor<E>>>
    where
        Q: ?Sized,
        M: Metric<Q, E>,
    {
        self.search_with_ef(query, k, self.params.ef_search)
    }

    /// Search for approximate nearest neighbors.
    ///
    /// # Arguments
    ///
    /// * `query` - Query in any representation the metric accepts
    /// * `k` - Number of results to return
    /// * `ef` - Size of dynamic candidate list (raised to `k` if smaller)
    ///
    /// # Returns
    ///
    /// At most `k` neighbors sorted by distance (closest first). Never
    /// mutates the index.
    pub fn search_with_ef<Q>(&self, query: &Q, k: usize, ef: usize) -> Result<Vec<Neighbor<E>>>
    where
        Q: ?Sized,
        M: Metric<Q, E>,
    {
        if k == 0 {
            return Ok(Vec::new());
        }
        let max_visited = self.params.max_visited;

        let mut ep = self.entrance_point;
        for lc in (1..=self.top_layer()).rev() {
            let w = search_layer(&self.layers[lc], &*self.metric, query, &[ep], 1, max_visited)?;
            if let Some(nearest) = w.first() {
                ep = nearest.element;
            }
        }

        let mut results = search_layer(&self.layers[0], &*self.metric, query, &[ep], ef.max(k), max_visited)?;
        results.truncate(k);
        Ok(results)
    }
}
