#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Relative crop yield hazard sets.
//!
//! Raw simulated yields are turned into hazard intensities in two steps:
//!
//! 1. Every historical simulation file contributes its per-centroid mean
//!    yield to the baseline of its crop/irrigation category
//!    ([`historical_mean`]).
//! 2. Each yield row is expressed as a relative anomaly against that
//!    baseline ([`anomaly`]).
//!
//! File access goes through the [`source::HazardSource`] trait so the
//! algorithms never touch a file format directly.

pub mod anomaly;
pub mod file_name;
pub mod historical_mean;
pub mod progress;
pub mod source;

use crop_risk_crop_models::CropIrr;
use crop_risk_hazard_models::HazardModelError;

pub use anomaly::{relative_yield_from_baseline, to_relative_anomaly, to_relative_yield};
pub use file_name::HazardFileInfo;
pub use historical_mean::{
    HistoricalBaseline, HistoricalMeanAccumulator, HistoricalMeanSet, aggregate_historical_means,
};
pub use source::{CsvHazardSource, HazardSource};

/// Errors that can occur while building hazard sets.
#[derive(Debug, thiserror::Error)]
pub enum HazardError {
    /// More files were accumulated into a category than were counted.
    #[error("Category {key} is full: all {capacity} rows are already filled")]
    Capacity {
        /// Category key.
        key: CropIrr,
        /// Allocated row count.
        capacity: usize,
    },

    /// A category was finalized before every allocated row was filled.
    #[error("Category {key} finalized with {filled} of {capacity} rows filled")]
    PartialAggregation {
        /// Category key.
        key: CropIrr,
        /// Rows filled so far.
        filled: usize,
        /// Allocated row count.
        capacity: usize,
    },

    /// A file's category was not seen during initialization.
    #[error("Category {key} was not counted during initialization")]
    UnknownCategory {
        /// Category key.
        key: CropIrr,
    },

    /// Array lengths disagree.
    #[error("Dimension mismatch: {message}")]
    DimensionMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// A file name does not follow the ISIMIP naming convention.
    #[error("Invalid hazard file name '{name}': {reason}")]
    InvalidFileName {
        /// The offending file name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// File content could not be interpreted.
    #[error("Invalid hazard file format: {message}")]
    Format {
        /// Description of what went wrong.
        message: String,
    },

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Hazard construction or selection failed.
    #[error(transparent)]
    Model(#[from] HazardModelError),
}
