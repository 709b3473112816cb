#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial indexes for crop risk grids.
//!
//! [`CentroidIndex`] links exposure points to their nearest hazard centroid
//! and [`RegionIndex`] tags points with the country polygon containing
//! them. Both are R-trees built once and queried per point.

pub mod centroid_index;
pub mod region_index;

pub use centroid_index::{CentroidIndex, DEFAULT_THRESHOLD_KM, assign_centroids};
pub use region_index::RegionIndex;

/// Errors that can occur while building spatial indexes.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A feature lacks the property holding its region id.
    #[error("Feature {index} has no numeric '{property}' property")]
    MissingProperty {
        /// Position of the feature in the collection.
        index: usize,
        /// Property name.
        property: String,
    },

    /// The document is not a `FeatureCollection` of polygons.
    #[error("Unsupported GeoJSON: {message}")]
    Unsupported {
        /// Description of what was found.
        message: String,
    },
}
