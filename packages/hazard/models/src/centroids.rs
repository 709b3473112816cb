//! Centroid registry shared by hazard and exposure data.
//!
//! Exposure records reference centroids by index; the registry itself is an
//! immutable value that is cloned or subset, never mutated behind a caller's
//! back.

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// A representative geographic point for one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Centroid {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// ISO 3166 numeric country code, if the point has been tagged.
    pub region_id: Option<u32>,
}

impl Centroid {
    /// Creates an untagged centroid.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            region_id: None,
        }
    }

    /// Sets the region identifier.
    #[must_use]
    pub const fn with_region(mut self, region_id: u32) -> Self {
        self.region_id = Some(region_id);
        self
    }
}

/// Ordered set of centroids. A centroid's position is its index in the
/// hazard intensity matrix columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Centroids {
    points: Vec<Centroid>,
}

impl Centroids {
    /// Creates a registry from an ordered list of points.
    #[must_use]
    pub const fn new(points: Vec<Centroid>) -> Self {
        Self { points }
    }

    /// Builds the centroids of a regular grid, latitude-major, from the
    /// given coordinate axes.
    #[must_use]
    pub fn from_grid(lats: &[f64], lons: &[f64]) -> Self {
        let points = lats
            .iter()
            .flat_map(|&lat| lons.iter().map(move |&lon| Centroid::new(lat, lon)))
            .collect();
        Self { points }
    }

    /// Number of centroids.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the centroid at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Centroid> {
        self.points.get(index)
    }

    /// Iterates over all centroids in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, Centroid> {
        self.points.iter()
    }

    /// Returns the centroids as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Centroid] {
        &self.points
    }

    /// Replaces the region identifiers of all centroids.
    ///
    /// With `overwrite` unset, centroids that already carry a region keep it.
    /// Extra or missing entries in `region_ids` are ignored.
    pub fn set_region_ids(&mut self, region_ids: &[Option<u32>], overwrite: bool) {
        for (point, region_id) in self.points.iter_mut().zip(region_ids) {
            if overwrite || point.region_id.is_none() {
                point.region_id = *region_id;
            }
        }
    }

    /// Returns a new registry with the centroids at `indices`, in that order.
    ///
    /// Out-of-range indices are skipped.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            points: indices
                .iter()
                .filter_map(|&i| self.points.get(i).copied())
                .collect(),
        }
    }

    /// Indices of the centroids tagged with `region_id`.
    #[must_use]
    pub fn indices_in_region(&self, region_id: u32) -> Vec<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.region_id == Some(region_id))
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of the centroids inside `bbox` (edges inclusive).
    #[must_use]
    pub fn indices_in_bbox(&self, bbox: &BoundingBox) -> Vec<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| bbox.contains(p.lon, p.lat))
            .map(|(i, _)| i)
            .collect()
    }

    /// Minimum and maximum latitude, or `None` when empty.
    #[must_use]
    pub fn lat_range(&self) -> Option<(f64, f64)> {
        min_max(self.points.iter().map(|p| p.lat))
    }

    /// Minimum and maximum longitude, or `None` when empty.
    #[must_use]
    pub fn lon_range(&self) -> Option<(f64, f64)> {
        min_max(self.points.iter().map(|p| p.lon))
    }
}

impl<'a> IntoIterator for &'a Centroids {
    type Item = &'a Centroid;
    type IntoIter = std::slice::Iter<'a, Centroid>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_latitude_major() {
        let centroids = Centroids::from_grid(&[50.0, 49.5], &[5.0, 5.5, 6.0]);
        assert_eq!(centroids.len(), 6);
        assert_eq!(centroids.get(1), Some(&Centroid::new(50.0, 5.5)));
        assert_eq!(centroids.get(3), Some(&Centroid::new(49.5, 5.0)));
    }

    #[test]
    fn region_tagging_respects_overwrite() {
        let mut centroids = Centroids::new(vec![
            Centroid::new(0.0, 0.0).with_region(250),
            Centroid::new(1.0, 1.0),
        ]);
        centroids.set_region_ids(&[Some(276), Some(276)], false);
        assert_eq!(centroids.indices_in_region(250), vec![0]);
        assert_eq!(centroids.indices_in_region(276), vec![1]);

        centroids.set_region_ids(&[Some(276), Some(276)], true);
        assert_eq!(centroids.indices_in_region(276), vec![0, 1]);
    }

    #[test]
    fn bbox_filter_is_inclusive() {
        let centroids = Centroids::from_grid(&[42.0, 55.0, 56.0], &[-5.0, 16.0]);
        let bbox = BoundingBox::new(-5.0, 42.0, 16.0, 55.0);
        assert_eq!(centroids.indices_in_bbox(&bbox), vec![0, 1, 2, 3]);
    }

    #[test]
    fn ranges() {
        let centroids = Centroids::from_grid(&[47.2, 47.6], &[8.4, 8.9]);
        assert_eq!(centroids.lat_range(), Some((47.2, 47.6)));
        assert_eq!(centroids.lon_range(), Some((8.4, 8.9)));
        assert_eq!(Centroids::default().lat_range(), None);
    }
}
