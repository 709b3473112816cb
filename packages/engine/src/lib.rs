#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Impact computation.
//!
//! [`compute_impact`] combines a hazard, an exposure set, and an impact
//! function registry into an [`ImpactResult`]: a sparse events × points
//! impact matrix plus per-event frequencies, from which per-event totals,
//! expected annual impact per point, and the aggregated average annual
//! impact are derived.

pub mod calc;
pub mod matrix;
pub mod result;

use crop_risk_crop_models::HazardType;
use crop_risk_impact_funcs::ImpactFuncError;

pub use calc::compute_impact;
pub use matrix::ImpactMatrix;
pub use result::{ImpactResult, ImpactSummary};

/// Errors that can occur while computing impacts.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An exposure record names an impact function that is not registered.
    #[error("No impact function {id} registered for hazard type {haz_type}")]
    MissingFunction {
        /// Hazard type of the hazard being applied.
        haz_type: HazardType,
        /// Requested function id.
        id: u32,
    },

    /// An exposure record points past the hazard's centroids.
    #[error("Exposure point {point} references centroid {centroid}, hazard has {n_centroids}")]
    CentroidOutOfRange {
        /// Exposure point index.
        point: usize,
        /// Referenced centroid.
        centroid: usize,
        /// Number of hazard centroids.
        n_centroids: usize,
    },

    /// An event name is not part of the result.
    #[error("Unknown event '{name}'")]
    UnknownEvent {
        /// Requested event name.
        name: String,
    },

    /// A point index is not part of the result.
    #[error("Point {index} out of range for {n_points} points")]
    PointOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of points.
        n_points: usize,
    },

    /// A point index was requested more than once.
    #[error("Point {index} selected more than once")]
    DuplicatePoint {
        /// Repeated index.
        index: usize,
    },

    /// A registered impact function is invalid.
    #[error(transparent)]
    ImpactFunc(#[from] ImpactFuncError),
}
