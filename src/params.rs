//! Construction parameters for an HNSW index.
//!
//! Parameters are immutable once an index is created. They can be built in
//! code with the `with_*` setters or loaded from a JSON document; missing
//! JSON fields fall back to [`HnswParams::default`], except `m0`, which
//! follows `m`.
//!
//! ```json
//! { "layers": 4, "m": 8, "ef_construction": 32, "level_factor": 0.5, "seed": 7 }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// HNSW index parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParamsFile")]
pub struct HnswParams {
    /// Height of the layer stack. Fixed for the lifetime of the index;
    /// every layer is seeded with the anchor element at creation.
    pub layers: usize,
    /// Maximum number of neighbors per node in layers above 0 (M in the paper).
    pub m: usize,
    /// Maximum number of neighbors per node in layer 0. Never smaller than `m`.
    pub m0: usize,
    /// Size of the dynamic candidate list during construction.
    /// Should be at least `m`.
    pub ef_construction: usize,
    /// Default candidate list width for queries.
    pub ef_search: usize,
    /// Level normalization factor (mL). An element reaches layer `k` with
    /// probability `exp(-k / mL)`.
    pub level_factor: f64,
    /// Seed for level generation. `None` draws a fresh seed.
    pub seed: Option<u64>,
    /// Upper bound on nodes visited by one layer search. `None` is unbounded.
    pub max_visited: Option<usize>,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            layers: 10,
            m: 5,
            m0: 5,
            ef_construction: 5,
            ef_search: 5,
            level_factor: 3.0,
            seed: None,
            max_visited: None,
        }
    }
}

/// On-disk form of [`HnswParams`]: every field optional, `m0` unset means `m`.
#[derive(Deserialize)]
#[serde(default)]
struct ParamsFile {
    layers: usize,
    m: usize,
    m0: Option<usize>,
    ef_construction: usize,
    ef_search: usize,
    level_factor: f64,
    seed: Option<u64>,
    max_visited: Option<usize>,
}

impl Default for ParamsFile {
    fn default() -> Self {
        let d = HnswParams::default();
        Self {
            layers: d.layers,
            m: d.m,
            m0: None,
            ef_construction: d.ef_construction,
            ef_search: d.ef_search,
            level_factor: d.level_factor,
            seed: d.seed,
            max_visited: d.max_visited,
        }
    }
}

impl From<ParamsFile> for HnswParams {
    fn from(raw: ParamsFile) -> Self {
        Self {
            layers: raw.layers,
            m: raw.m,
            m0: raw.m0.unwrap_or(raw.m),
            ef_construction: raw.ef_construction,
            ef_search: raw.ef_search,
            level_factor: raw.level_factor,
            seed: raw.seed,
            max_visited: raw.max_visited,
        }
    }
}

impl HnswParams {
    /// Create parameters with a specific M value.
    ///
    /// `m0` follows `m`; the candidate widths are scaled from it the same way
    /// for construction (`4*M`) and search (`2*M`).
    pub fn with_m(m: usize) -> Self {
        Self {
            m,
            m0: m,
            ef_construction: m * 4,
            ef_search: m * 2,
            ..Self::default()
        }
    }

    /// Set the number of layers.
    pub fn with_layers(mut self, layers: usize) -> Self {
        self.layers = layers;
        self
    }

    /// Set the layer-0 degree bound.
    pub fn with_m0(mut self, m0: usize) -> Self {
        self.m0 = m0;
        self
    }

    /// Set ef_construction.
    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    /// Set ef_search.
    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    /// Set the level normalization factor (mL).
    pub fn with_level_factor(mut self, level_factor: f64) -> Self {
        self.level_factor = level_factor;
        self
    }

    /// Fix the random seed used for level generation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Bound the number of nodes a single layer search may visit.
    pub fn with_max_visited(mut self, max_visited: usize) -> Self {
        self.max_visited = Some(max_visited);
        self
    }

    /// Degree bound for the given layer.
    pub fn max_degree(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m0
        } else {
            self.m
        }
    }

    /// Check the parameters, failing on the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.layers < 1 {
            return Err(Error::invalid_arg("layers", "must be at least 1"));
        }
        if self.m < 1 {
            return Err(Error::invalid_arg("m", "must be at least 1"));
        }
        if self.m0 < self.m {
            return Err(Error::invalid_arg(
                "m0",
                format!("must be at least m ({}), got {}", self.m, self.m0),
            ));
        }
        if self.ef_construction < 1 {
            return Err(Error::invalid_arg("ef_construction", "must be at least 1"));
        }
        if self.ef_search < 1 {
            return Err(Error::invalid_arg("ef_search", "must be at least 1"));
        }
        if !(self.level_factor.is_finite() && self.level_factor > 0.0) {
            return Err(Error::invalid_arg(
                "level_factor",
                format!("must be a positive finite number, got {}", self.level_factor),
            ));
        }
        if self.max_visited == Some(0) {
            return Err(Error::invalid_arg("max_visited", "must be at least 1"));
        }
        Ok(())
    }

    /// Parse and validate parameters from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: HnswParams = serde_json::from_str(json)
            .map_err(|e| Error::Serialization(format!("invalid HNSW params: {}", e)))?;
        params.validate()?;
        Ok(params)
    }

    /// Serialize the parameters to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("failed to serialize HNSW params: {}", e)))
    }

    /// Load and validate parameters from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(Error::io_err(path, "failed to read HNSW params"))?;
        Self::from_json(&contents)
    }
}
