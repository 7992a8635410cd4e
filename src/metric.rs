//! Metric providers: the distance functions the index is built over.
//!
//! The index never looks inside an element. It only hands pairs of
//! `(query, element)` to a [`Metric`] and orders the answers, lower first.
//!
//! Three ways to supply a metric:
//!
//! - Any closure `Fn(&Q, &E) -> f32` is an infallible metric.
//! - [`TryMetric`] wraps a closure returning `Result<f32>` for providers that
//!   can fail (e.g. a lookup that may miss).
//! - [`VectorStore`] maps `u32` elements to embeddings and scores them with a
//!   [`Distance`] using the SIMD kernels below. It also accepts raw `[f32]`
//!   queries that are not stored in the index.
//!
//! # Distance Metrics
//!
//! - **DotProduct**: scored as `-dot(a, b)`.
//! - **Cosine**: scored as `1 - cos(a, b)`. Range: [0, 2].
//! - **Euclidean**: L2 distance. Range: [0, inf).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use wide::f32x8;

/// A distance function between a query of type `Q` and an element of type `E`.
///
/// Lower is closer. Implementations should be deterministic and symmetric
/// when `Q == E`; the search terminates without the triangle inequality but
/// recall depends on it.
pub trait Metric<Q: ?Sized, E> {
    /// Distance from `query` to `element`.
    fn distance(&self, query: &Q, element: &E) -> Result<f32>;
}

impl<Q: ?Sized, E, F> Metric<Q, E> for F
where
    F: Fn(&Q, &E) -> f32,
{
    fn distance(&self, query: &Q, element: &E) -> Result<f32> {
        Ok(self(query, element))
    }
}

/// Adapter for fallible distance closures.
///
/// ```
/// use nhnsw::{Error, Metric, TryMetric};
///
/// let metric = TryMetric(|a: &u32, b: &u32| {
///     if *b == 13 {
///         return Err(Error::not_found(b));
///     }
///     Ok(a.abs_diff(*b) as f32)
/// });
/// assert_eq!(metric.distance(&1u32, &4u32).unwrap(), 3.0);
/// assert!(metric.distance(&1u32, &13u32).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TryMetric<F>(pub F);

impl<Q: ?Sized, E, F> Metric<Q, E> for TryMetric<F>
where
    F: Fn(&Q, &E) -> Result<f32>,
{
    fn distance(&self, query: &Q, element: &E) -> Result<f32> {
        (self.0)(query, element)
    }
}

/// Evaluate a metric, rejecting NaN so candidate ordering stays total.
pub(crate) fn measure<Q, E, M>(metric: &M, query: &Q, element: &E) -> Result<f32>
where
    Q: ?Sized,
    E: std::fmt::Debug,
    M: Metric<Q, E> + ?Sized,
{
    let dist = metric.distance(query, element)?;
    if dist.is_nan() {
        return Err(Error::Metric(format!("distance to {:?} is NaN", element)));
    }
    Ok(dist)
}

/// Vector distance metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    /// Dot product: sum(a[i] * b[i]). Higher similarity means lower score.
    DotProduct,
    /// Cosine similarity converted to a distance.
    Cosine,
    /// Euclidean distance: sqrt(sum((a[i] - b[i])^2)).
    Euclidean,
}

impl Distance {
    /// Score two vectors in "lower is closer" form.
    ///
    /// # Errors
    ///
    /// Returns `Error::WrongDimension` if the vectors have different lengths.
    pub fn dissimilarity(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(Error::WrongDimension {
                expected: a.len(),
                got: b.len(),
            });
        }

        let score = match self {
            Distance::DotProduct => -dot_product_simd(a, b),
            // Zero vectors score 1.0 (cosine similarity 0)
            Distance::Cosine => 1.0 - cosine_similarity_simd(a, b),
            Distance::Euclidean => euclidean_distance_simd(a, b),
        };

        Ok(score)
    }
}

/// Sum `f(a_chunk, b_chunk)` over 8-wide lanes, then `tail` over the remainder.
#[inline]
fn lanes<F, T>(a: &[f32], b: &[f32], body: F, tail: T) -> f32
where
    F: Fn(f32x8, f32x8) -> f32x8,
    T: Fn(f32, f32) -> f32,
{
    debug_assert_eq!(a.len(), b.len());

    let mut acc = f32x8::ZERO;
    let a_chunks = a.chunks_exact(8);
    let b_chunks = b.chunks_exact(8);
    let a_rest = a_chunks.remainder();
    let b_rest = b_chunks.remainder();

    for (ca, cb) in a_chunks.zip(b_chunks) {
        let mut la = [0.0f32; 8];
        let mut lb = [0.0f32; 8];
        la.copy_from_slice(ca);
        lb.copy_from_slice(cb);
        acc = acc + body(f32x8::from(la), f32x8::from(lb));
    }

    let head: f32 = acc.to_array().iter().sum();
    head + a_rest.iter().zip(b_rest).map(|(&x, &y)| tail(x, y)).sum::<f32>()
}

/// Dot product using `f32x8` lanes.
pub fn dot_product_simd(a: &[f32], b: &[f32]) -> f32 {
    lanes(a, b, |x, y| x * y, |x, y| x * y)
}

/// Cosine similarity using `f32x8` lanes. Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity_simd(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot_product_simd(a, a).sqrt();
    let norm_b = dot_product_simd(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product_simd(a, b) / (norm_a * norm_b)
}

/// Euclidean (L2) distance using `f32x8` lanes. Not squared.
pub fn euclidean_distance_simd(a: &[f32], b: &[f32]) -> f32 {
    let squared = lanes(
        a,
        b,
        |x, y| {
            let d = x - y;
            d * d
        },
        |x, y| (x - y) * (x - y),
    );
    squared.sqrt()
}

/// Embedding storage that doubles as a metric over `u32` element IDs.
///
/// Elements without a stored vector fail with `Error::NotFound`, which makes
/// this the natural provider for indexes whose embeddings arrive lazily.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    distance: Distance,
    vectors: HashMap<u32, Vec<f32>>,
}

impl VectorStore {
    /// Create an empty store for vectors of the given dimension.
    pub fn new(dimension: usize, distance: Distance) -> Self {
        Self {
            dimension,
            distance,
            vectors: HashMap::new(),
        }
    }

    /// Store (or replace) the vector for `id`.
    pub fn insert(&mut self, id: u32, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::WrongDimension {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        self.vectors.insert(id, vector);
        Ok(())
    }

    /// Vector stored for `id`, if any.
    pub fn get(&self, id: u32) -> Option<&[f32]> {
        self.vectors.get(&id).map(Vec::as_slice)
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Distance metric.
    pub fn distance_kind(&self) -> Distance {
        self.distance
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    fn lookup(&self, id: u32) -> Result<&[f32]> {
        self.get(id).ok_or_else(|| Error::not_found(id))
    }
}

impl Metric<u32, u32> for VectorStore {
    fn distance(&self, query: &u32, element: &u32) -> Result<f32> {
        self.distance
            .dissimilarity(self.lookup(*query)?, self.lookup(*element)?)
    }
}

impl Metric<[f32], u32> for VectorStore {
    fn distance(&self, query: &[f32], element: &u32) -> Result<f32> {
        if query.len() != self.dimension {
            return Err(Error::WrongDimension {
                expected: self.dimension,
                got: query.len(),
            });
        }
        self.distance.dissimilarity(query, self.lookup(*element)?)
    }
}
