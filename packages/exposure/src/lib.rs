#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crop production exposures.
//!
//! Loading ([`source`]), region scoping and country totals ([`region`]),
//! unit conversion to kcal and USD ([`convert`]), and country-wise bias
//! correction against FAOSTAT production ([`normalize`]). FAOSTAT tables
//! are read by [`fao`]. Crop production can also be derived from ISIMIP
//! land use and yield baselines ([`isimip`]), and SPAM tables are read by
//! [`spam`].

pub mod convert;
pub mod fao;
pub mod isimip;
pub mod normalize;
pub mod region;
pub mod source;
pub mod spam;

use crop_risk_hazard_models::HazardModelError;

pub use convert::{mean_of_exposures, value_to_kcal, value_to_usd};
pub use fao::{FaoTable, PriceTable, ProductionTable};
pub use isimip::{LandUseTable, crop_production_exposure, full_exposure_set, grid_cell_area_ha};
pub use normalize::{FaoNormalization, normalize_with_fao};
pub use region::{aggregate_countries, select_by_region};
pub use source::{CsvExposureSource, ExposureSource};
pub use spam::{SpamLoadConfig, SpamSource, SpamTechnology, SpamVariable};

/// Errors that can occur while loading or transforming exposures.
#[derive(Debug, thiserror::Error)]
pub enum ExposureError {
    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Exposures that must share one grid do not.
    #[error("Exposure grids differ: {message}")]
    GridMismatch {
        /// Description of the difference.
        message: String,
    },

    /// A required column is absent from an input table.
    #[error("Missing column '{name}'")]
    MissingColumn {
        /// Column name.
        name: String,
    },

    /// A crop-specific conversion was applied to exposures with no crop.
    #[error("Exposures have no crop type")]
    MissingCrop,

    /// A cell does not hold a number where one is required.
    #[error("Invalid value '{value}' in column '{column}'")]
    InvalidValue {
        /// Column name.
        column: String,
        /// Cell content.
        value: String,
    },

    /// Unknown loader parameters.
    #[error("Invalid input parameter(s). {message}")]
    InvalidParameter {
        /// The rejected parameters.
        message: String,
    },

    /// An input holds no usable data for the request.
    #[error("No data: {message}")]
    NoData {
        /// What was requested.
        message: String,
    },

    /// A yield baseline does not cover the requested category or cells.
    #[error(transparent)]
    Baseline(#[from] HazardModelError),
}
