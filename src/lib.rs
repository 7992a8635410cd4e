//! nhnsw - Metric-agnostic HNSW graph index
//!
//! nhnsw builds and queries a Hierarchical Navigable Small World graph: a
//! stack of proximity graphs that answers approximate nearest-neighbor
//! queries in sub-linear time.
//!
//! # Core Philosophy
//!
//! - **Metric-agnostic**: elements are opaque IDs; all geometry comes from a [`Metric`]
//! - **Deterministic**: a fixed seed and metric produce bit-identical graphs
//! - **All-or-nothing inserts**: a failing metric never leaves a half-wired element
//! - **Read-heavy concurrency**: [`SharedIndex`] readers never block on the writer
//!
//! # Example
//!
//! ```
//! use nhnsw::{Distance, HnswIndex, HnswParams, VectorStore};
//!
//! # fn main() -> nhnsw::Result<()> {
//! let mut store = VectorStore::new(2, Distance::Euclidean);
//! for id in 0..20u32 {
//!     store.insert(id, vec![id as f32, 0.0])?;
//! }
//!
//! let params = HnswParams::with_m(4).with_layers(3).with_seed(7);
//! let mut index = HnswIndex::new(params, store)?;
//! index.insert_batch(1..20)?;
//!
//! // Query with a vector that is not part of the index
//! let hits = index.search(&[12.2f32, 0.0][..], 2)?;
//! assert_eq!(hits[0].element, 12);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod graph;
pub mod index;
pub mod metric;
pub mod nsw;
pub mod params;
pub mod search;
pub mod shared;

pub use error::{Error, Result};
pub use graph::{Element, LayerGraph, Neighbors};
pub use index::HnswIndex;
pub use metric::{Distance, Metric, TryMetric, VectorStore};
pub use params::HnswParams;
pub use search::{search_layer, select_neighbors, Neighbor};
pub use shared::SharedIndex;
