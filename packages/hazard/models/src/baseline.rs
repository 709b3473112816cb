//! Historical-mean yield baselines and their alignment to other grids.
//!
//! A baseline is computed once over one grid (usually the global ISIMIP
//! grid) and reused for hazards and exposures loaded over a subset of it.
//! Values are matched to a target grid by exact centroid coordinates, never
//! by position.

use std::collections::{BTreeMap, HashMap};

use crop_risk_crop_models::CropIrr;
use serde::{Deserialize, Serialize};

use crate::{Centroids, HazardModelError, YearRange};

/// Historical-mean yields per crop/irrigation category, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldBaseline {
    /// Years the baselines average.
    pub yearrange: YearRange,
    /// Categories in order of first appearance.
    pub categories: Vec<CropIrr>,
    /// Grid the baselines refer to.
    pub centroids: Centroids,
    /// Mean yield per centroid, by category.
    pub means: BTreeMap<CropIrr, Vec<f64>>,
}

impl YieldBaseline {
    /// Baseline of `key` re-indexed onto `grid`: entry `i` is the mean at
    /// the baseline centroid with the same coordinates as `grid[i]`.
    ///
    /// # Errors
    ///
    /// * [`HazardModelError::MissingCategory`] if `key` has no baseline.
    /// * [`HazardModelError::Shape`] if the stored means do not have one value
    ///   per stored centroid.
    /// * [`HazardModelError::UnmatchedCentroid`] if a point of `grid` is not
    ///   on the baseline grid.
    pub fn aligned_mean(&self, key: CropIrr, grid: &Centroids) -> Result<Vec<f64>, HazardModelError> {
        let means = self
            .means
            .get(&key)
            .ok_or_else(|| HazardModelError::MissingCategory {
                key: key.to_string(),
            })?;
        if means.len() != self.centroids.len() {
            return Err(HazardModelError::Shape {
                message: format!(
                    "baseline {key} has {} values for {} centroids",
                    means.len(),
                    self.centroids.len()
                ),
            });
        }

        let lookup = CoordinateLookup::new(&self.centroids);
        grid.iter()
            .map(|c| {
                lookup
                    .find(c.lat, c.lon)
                    .map(|i| means[i])
                    .ok_or(HazardModelError::UnmatchedCentroid {
                        lat: c.lat,
                        lon: c.lon,
                    })
            })
            .collect()
    }
}

/// Exact-coordinate index over a centroid registry.
#[derive(Debug, Clone, Default)]
pub struct CoordinateLookup {
    positions: HashMap<(u64, u64), usize>,
}

impl CoordinateLookup {
    /// Indexes every centroid. When coordinates repeat, the first index wins.
    #[must_use]
    pub fn new(centroids: &Centroids) -> Self {
        let mut positions = HashMap::with_capacity(centroids.len());
        for (i, c) in centroids.iter().enumerate() {
            positions.entry(coordinate_key(c.lat, c.lon)).or_insert(i);
        }
        Self { positions }
    }

    /// Registers `(lat, lon)` under `index` unless already present. Returns
    /// the index the coordinates map to.
    pub fn insert(&mut self, lat: f64, lon: f64, index: usize) -> usize {
        *self.positions.entry(coordinate_key(lat, lon)).or_insert(index)
    }

    /// Index of the centroid at exactly `(lat, lon)`.
    #[must_use]
    pub fn find(&self, lat: f64, lon: f64) -> Option<usize> {
        self.positions.get(&coordinate_key(lat, lon)).copied()
    }
}

// Adding 0.0 folds -0.0 into 0.0 so both hash alike.
fn coordinate_key(lat: f64, lon: f64) -> (u64, u64) {
    ((lat + 0.0).to_bits(), (lon + 0.0).to_bits())
}
