//! Nearest-centroid assignment.
//!
//! Centroids are indexed as points on the unit sphere, where the nearest
//! point by chord length is also the nearest by great-circle distance. The
//! haversine distance to the winner is then checked against a threshold.

use crop_risk_exposure_models::Exposures;
use crop_risk_hazard_models::Centroids;
use geo::{Distance, Haversine, Point};
use rstar::RTree;
use rstar::primitives::GeomWithData;

/// Default maximum distance between an exposure point and its centroid.
pub const DEFAULT_THRESHOLD_KM: f64 = 100.0;

type IndexedCentroid = GeomWithData<[f64; 3], usize>;

/// R-tree over the centroids of a hazard.
pub struct CentroidIndex {
    tree: RTree<IndexedCentroid>,
    coords: Vec<(f64, f64)>,
}

impl CentroidIndex {
    /// Indexes every centroid by its position.
    #[must_use]
    pub fn new(centroids: &Centroids) -> Self {
        let entries = centroids
            .iter()
            .enumerate()
            .map(|(i, c)| GeomWithData::new(unit_vector(c.lat, c.lon), i))
            .collect();
        let coords = centroids.iter().map(|c| (c.lat, c.lon)).collect();
        Self {
            tree: RTree::bulk_load(entries),
            coords,
        }
    }

    /// Number of indexed centroids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The nearest centroid and its distance in km.
    #[must_use]
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<(usize, f64)> {
        let entry = self.tree.nearest_neighbor(&unit_vector(lat, lon))?;
        let (c_lat, c_lon) = self.coords[entry.data];
        let meters = Haversine.distance(Point::new(lon, lat), Point::new(c_lon, c_lat));
        Some((entry.data, meters / 1000.0))
    }
}

/// Points each exposure record at its nearest centroid within
/// `threshold_km`. Records farther away are left unassigned. Returns the
/// number of unassigned records.
pub fn assign_centroids(exposures: &mut Exposures, index: &CentroidIndex, threshold_km: f64) -> usize {
    let mut unassigned = 0;
    for record in &mut exposures.records {
        record.centroid = index
            .nearest(record.lat, record.lon)
            .filter(|&(_, km)| km <= threshold_km)
            .map(|(i, _)| i);
        if record.centroid.is_none() {
            unassigned += 1;
        }
    }

    if unassigned > 0 {
        log::warn!(
            "{unassigned} of {} exposure points have no centroid within {threshold_km} km",
            exposures.len()
        );
    } else {
        log::debug!("Assigned centroids to {} exposure points", exposures.len());
    }
    unassigned
}

fn unit_vector(lat: f64, lon: f64) -> [f64; 3] {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}
