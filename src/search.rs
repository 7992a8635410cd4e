//! Single-layer beam search and neighbor selection.
//!
//! [`search_layer`] is the primitive both construction and queries are built
//! on. It keeps three sets:
//!
//! - `visited`: every element already measured
//! - `candidates`: min-heap frontier, closest first
//! - `nearest`: max-heap of the best `ef` results, farthest on top
//!
//! The loop pops the closest candidate and stops as soon as it is strictly
//! farther than the worst retained result. On a navigable graph no remaining
//! candidate can improve the result set after that point.

use crate::error::{Error, Result};
use crate::graph::{Element, LayerGraph};
use crate::metric::{measure, Metric};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap};

/// A scored element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor<E> {
    /// The element.
    pub element: E,
    /// Distance to the query (lower is closer).
    pub distance: f32,
}

/// Heap entry ordered by `(distance, element)` ascending.
///
/// Distances are never NaN (rejected by `measure`), so `total_cmp` agrees
/// with the numeric order; the element breaks ties deterministically.
#[derive(Debug, Clone, Copy)]
struct Candidate<E> {
    element: E,
    distance: f32,
}

impl<E: Element> PartialEq for Candidate<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E: Element> Eq for Candidate<E> {}

impl<E: Element> PartialOrd for Candidate<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E: Element> Ord for Candidate<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.element.cmp(&other.element))
    }
}

impl<E> From<Candidate<E>> for Neighbor<E> {
    fn from(c: Candidate<E>) -> Self {
        Neighbor {
            element: c.element,
            distance: c.distance,
        }
    }
}

/// Search one layer for the `ef` elements closest to `query`.
///
/// # Arguments
///
/// * `layer` - Graph to search
/// * `metric` - Distance provider
/// * `query` - Query; any representation the metric accepts
/// * `entry_points` - Starting elements, expected to be present in `layer`
/// * `ef` - Size of the dynamic candidate list (at least 1)
/// * `max_visited` - Optional cap on measured elements; hitting it ends the
///   search early with the best results found so far
///
/// # Returns
///
/// Between 1 and `ef` neighbors sorted closest first.
///
/// # Errors
///
/// `Error::InvalidArgument` for `ef == 0` or no entry points, and any error
/// raised by the metric.
pub fn search_layer<Q, E, M>(
    layer: &LayerGraph<E>,
    metric: &M,
    query: &Q,
    entry_points: &[E],
    ef: usize,
    max_visited: Option<usize>,
) -> Result<Vec<Neighbor<E>>>
where
    Q: ?Sized,
    E: Element,
    M: Metric<Q, E> + ?Sized,
{
    if ef == 0 {
        return Err(Error::invalid_arg("ef", "must be at least 1"));
    }
    if entry_points.is_empty() {
        return Err(Error::invalid_arg("entry_points", "at least one entry point is required"));
    }

    let mut visited: BTreeSet<E> = BTreeSet::new();
    let mut candidates: BinaryHeap<Reverse<Candidate<E>>> = BinaryHeap::with_capacity(ef + 1);
    let mut nearest: BinaryHeap<Candidate<E>> = BinaryHeap::with_capacity(ef + 1);

    for &ep in entry_points {
        if !visited.insert(ep) {
            continue;
        }
        let c = Candidate {
            element: ep,
            distance: measure(metric, query, &ep)?,
        };
        candidates.push(Reverse(c));
        nearest.push(c);
        if nearest.len() > ef {
            nearest.pop();
        }
    }

    'search: while let Some(Reverse(current)) = candidates.pop() {
        // nearest is never empty here: it was seeded and only shrinks to ef >= 1
        let worst = match nearest.peek() {
            Some(w) => *w,
            None => break,
        };
        if current.distance > worst.distance {
            break;
        }

        for neighbor in layer.neighbors(&current.element) {
            if visited.contains(&neighbor) {
                continue;
            }
            if max_visited.is_some_and(|limit| visited.len() >= limit) {
                tracing::debug!(
                    visited = visited.len(),
                    ef,
                    "layer search stopped at visit budget"
                );
                break 'search;
            }
            visited.insert(neighbor);

            let distance = measure(metric, query, &neighbor)?;
            let worst_distance = nearest.peek().map_or(f32::INFINITY, |w| w.distance);
            if distance < worst_distance || nearest.len() < ef {
                let c = Candidate {
                    element: neighbor,
                    distance,
                };
                candidates.push(Reverse(c));
                nearest.push(c);
                if nearest.len() > ef {
                    nearest.pop();
                }
            }
        }
    }

    Ok(nearest.into_sorted_vec().into_iter().map(Neighbor::from).collect())
}

/// Keep the `m` closest of already-scored candidates, excluding `query`.
///
/// Duplicates are collapsed and ties are broken by element order.
pub fn truncate_nearest<E: Element>(query: &E, scored: &[Neighbor<E>], m: usize) -> Vec<Neighbor<E>> {
    let unique: BTreeSet<Candidate<E>> = scored
        .iter()
        .filter(|n| n.element != *query)
        .map(|n| Candidate {
            element: n.element,
            distance: n.distance,
        })
        .collect();

    let mut seen = BTreeSet::new();
    unique
        .into_iter()
        .filter(|c| seen.insert(c.element))
        .take(m)
        .map(Neighbor::from)
        .collect()
}

/// Select the `m` candidates closest to `query`.
///
/// This is plain truncation: candidates are sorted by distance to `query`
/// and the first `m` are kept. `query` itself is discarded if present. The
/// result is the `m` nearest, with no diversity guarantee.
pub fn select_neighbors<E, M, I>(metric: &M, query: &E, candidates: I, m: usize) -> Result<Vec<Neighbor<E>>>
where
    E: Element,
    M: Metric<E, E> + ?Sized,
    I: IntoIterator<Item = E>,
{
    let unique: BTreeSet<E> = candidates.into_iter().filter(|c| c != query).collect();
    let mut scored = Vec::with_capacity(unique.len());
    for element in unique {
        scored.push(Neighbor {
            element,
            distance: measure(metric, query, &element)?,
        });
    }
    Ok(truncate_nearest(query, &scored, m))
}
