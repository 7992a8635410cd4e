//! Flat Navigable Small World (NSW) utilities.
//!
//! A single-layer small-world graph is built Watts-Strogatz style: start from
//! a ring lattice and randomly rewire a fraction `p` of its edges. Greedy
//! routing on such a graph is the building block HNSW stacks into layers.

use crate::error::{Error, Result};
use crate::graph::{Element, LayerGraph};
use crate::metric::{measure, Metric};

/// Ring lattice over `0..n`: node `i` is connected to `i ± 1 ..= i ± d/2 (mod n)`.
///
/// # Errors
///
/// `Error::InvalidArgument` if `n == 0`.
pub fn ring_lattice(n: u32, d: u32) -> Result<LayerGraph<u32>> {
    if n == 0 {
        return Err(Error::invalid_arg("n", "ring lattice needs at least one node"));
    }

    let mut graph = LayerGraph::new(0);
    for i in 0..n {
        graph.add_node(i);
        for offset in 1..=(d / 2) {
            graph.add_edge(i, ring_offset(i, offset, n));
        }
    }
    Ok(graph)
}

/// `(i + offset) mod n` without overflowing `u32`.
fn ring_offset(i: u32, offset: u32, n: u32) -> u32 {
    // Result is < n, so it fits back into u32
    ((u64::from(i) + u64::from(offset)) % u64::from(n)) as u32
}

/// Rewire each edge with probability `p`.
///
/// For a rewired edge `(u, v)`, `v` is replaced by a node drawn uniformly from
/// those not already adjacent to `u` (and not `u`). Edges whose endpoint has
/// no such node are left alone. The edge list is snapshotted up front, so
/// edges created here are never themselves rewired.
///
/// # Returns
///
/// Number of edges rewired.
pub fn rewire<E: Element>(graph: &mut LayerGraph<E>, p: f64, rng: &mut fastrand::Rng) -> Result<usize> {
    if !(0.0..=1.0).contains(&p) {
        return Err(Error::invalid_arg("p", format!("must be in [0, 1], got {}", p)));
    }

    let nodes: Vec<E> = graph.nodes().collect();
    let edges = graph.edges();
    let mut rewired = 0;

    for (u, v) in edges {
        if rng.f64() >= p {
            continue;
        }
        let choices: Vec<E> = nodes
            .iter()
            .copied()
            .filter(|&w| w != u && !graph.neighbors(&u).any(|n| n == w))
            .collect();
        if choices.is_empty() {
            continue;
        }
        let w = choices[rng.usize(..choices.len())];
        graph.remove_edge(&u, &v);
        graph.add_edge(u, w);
        rewired += 1;
    }

    Ok(rewired)
}

/// Ring lattice of `n` nodes and degree `d`, rewired with probability `p`.
pub fn small_world(n: u32, d: u32, p: f64, rng: &mut fastrand::Rng) -> Result<LayerGraph<u32>> {
    let mut graph = ring_lattice(n, d)?;
    rewire(&mut graph, p, rng)?;
    Ok(graph)
}

/// Greedy routing: from `enter`, repeatedly move to the closest neighbor
/// that is strictly closer to `query`, until none is.
///
/// Returns the local minimum reached. Distances strictly decrease at every
/// step, so the walk terminates on any finite graph.
pub fn greedy_search<Q, E, M>(graph: &LayerGraph<E>, metric: &M, query: &Q, enter: E) -> Result<E>
where
    Q: ?Sized,
    E: Element,
    M: Metric<Q, E> + ?Sized,
{
    let mut current = enter;
    let mut best = measure(metric, query, &current)?;

    loop {
        let mut next = None;
        for friend in graph.neighbors(&current) {
            let d = measure(metric, query, &friend)?;
            if d < best {
                best = d;
                next = Some(friend);
            }
        }
        match next {
            Some(friend) => current = friend,
            None => return Ok(current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs_diff(a: &u32, b: &u32) -> f32 {
        a.abs_diff(*b) as f32
    }

    #[test]
    fn test_ring_lattice_degrees() {
        let graph = ring_lattice(10, 4).unwrap();
        assert_eq!(graph.len(), 10);
        assert_eq!(graph.edge_count(), 20);
        for i in 0..10 {
            assert_eq!(graph.degree(&i), 4);
        }
        let neighbors: Vec<u32> = graph.neighbors(&0).collect();
        assert_eq!(neighbors, vec![1, 2, 8, 9]);
    }

    #[test]
    fn test_ring_lattice_degenerate() {
        let graph = ring_lattice(1, 4).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.edge_count(), 0);

        assert!(ring_lattice(0, 2).is_err());
    }

    #[test]
    fn test_ring_offset_wraps_near_u32_max() {
        let n = u32::MAX;
        assert_eq!(ring_offset(n - 1, 1, n), 0);
        assert_eq!(ring_offset(n - 1, 3, n), 2);
        assert_eq!(ring_offset(n - 2, 1, n), n - 1);
        assert_eq!(ring_offset(7, 5, 10), 2);
    }

    #[test]
    fn test_rewire_preserves_edge_count() {
        let mut graph = ring_lattice(40, 4).unwrap();
        let mut rng = fastrand::Rng::with_seed(3);
        let rewired = rewire(&mut graph, 0.2, &mut rng).unwrap();

        assert!(rewired > 0);
        assert_eq!(graph.edge_count(), 80);
        assert_eq!(graph.len(), 40);
        for (u, v) in graph.edges() {
            assert_ne!(u, v);
        }
    }

    #[test]
    fn test_rewire_probability_bounds() {
        let mut graph = ring_lattice(10, 2).unwrap();
        let before = graph.clone();
        let mut rng = fastrand::Rng::with_seed(1);

        assert_eq!(rewire(&mut graph, 0.0, &mut rng).unwrap(), 0);
        assert_eq!(graph, before);

        assert!(rewire(&mut graph, 1.5, &mut rng).is_err());
        assert!(rewire(&mut graph, -0.1, &mut rng).is_err());
    }

    #[test]
    fn test_rewire_complete_graph_is_stuck() {
        // Every node is adjacent to every other: nothing to rewire to
        let mut graph = ring_lattice(5, 4).unwrap();
        let before = graph.clone();
        let mut rng = fastrand::Rng::with_seed(8);
        assert_eq!(rewire(&mut graph, 1.0, &mut rng).unwrap(), 0);
        assert_eq!(graph, before);
    }

    #[test]
    fn test_greedy_search_on_lattice() {
        let graph = ring_lattice(40, 4).unwrap();
        assert_eq!(greedy_search(&graph, &abs_diff, &20u32, 0).unwrap(), 20);
        assert_eq!(greedy_search(&graph, &abs_diff, &20u32, 39).unwrap(), 20);
    }

    #[test]
    fn test_greedy_search_local_minimum() {
        // 0 - 10 - 3: from 0 toward 3, 10 is farther, so the walk stops at 0
        let mut graph = LayerGraph::new(0u32);
        graph.add_edge(0, 10);
        graph.add_edge(10, 3);
        assert_eq!(greedy_search(&graph, &abs_diff, &3u32, 0).unwrap(), 0);
    }

    #[test]
    fn test_greedy_search_small_world() {
        let mut rng = fastrand::Rng::with_seed(42);
        let graph = small_world(60, 6, 0.1, &mut rng).unwrap();
        let found = greedy_search(&graph, &abs_diff, &30u32, 0).unwrap();
        assert!(graph.contains(&found));
    }
}
