#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Exposure data types.
//!
//! An exposure is a set of located values (crop production, its caloric
//! content, or its market value) that hazards act upon. Each record points
//! at the hazard centroid it draws intensities from and at the impact
//! function that translates intensity into a damage fraction.

use std::path::PathBuf;

use crop_risk_crop_models::{Crop, Irrigation};
use crop_risk_hazard_models::{BoundingBox, YearRange};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Impact function id assigned to records that do not name one.
pub const DEFAULT_IMPF_ID: u32 = 1;

/// Unit of exposure values.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum ValueUnit {
    /// Tonnes of crop production per year.
    #[default]
    #[serde(rename = "t/y")]
    #[strum(serialize = "t/y")]
    TonnesPerYear,
    /// Market value in US dollars per year.
    #[serde(rename = "USD/y")]
    #[strum(serialize = "USD/y")]
    UsdPerYear,
    /// Caloric content per year.
    #[serde(rename = "kcal/y")]
    #[strum(serialize = "kcal/y")]
    KcalPerYear,
    /// Value of production in US dollars (SPAM `V_agg`).
    #[serde(rename = "USD")]
    #[strum(serialize = "USD")]
    Usd,
    /// Area in hectares (SPAM `A` and `H`).
    #[serde(rename = "Ha")]
    #[strum(serialize = "Ha")]
    Hectares,
    /// Production in metric tonnes (SPAM `P`).
    #[serde(rename = "mt")]
    #[strum(serialize = "mt")]
    MetricTonnes,
    /// Yield in kilograms per hectare (SPAM `Y`).
    #[serde(rename = "kg/Ha")]
    #[strum(serialize = "kg/Ha")]
    KgPerHectare,
}

impl ValueUnit {
    /// Whether values are annual crop production or derived from it, i.e.
    /// usable as the unit of an impact run.
    #[must_use]
    pub const fn is_annual(self) -> bool {
        matches!(
            self,
            Self::TonnesPerYear | Self::UsdPerYear | Self::KcalPerYear
        )
    }
}

/// One exposed grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureRecord {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// ISO 3166 numeric country code; `0` or `None` means no country.
    pub region_id: Option<u32>,
    /// Exposed value in the unit of the owning [`Exposures`]. May be `NaN`
    /// where the source has no data.
    pub value: f64,
    /// Index of the hazard centroid this record draws intensities from.
    pub centroid: Option<usize>,
    /// Impact function id within the hazard type.
    pub impf_id: u32,
    /// Production in tonnes per year, kept when `value` is converted to
    /// another unit.
    pub tonnes_per_year: Option<f64>,
}

impl ExposureRecord {
    /// Creates an unassigned record with the default impact function.
    #[must_use]
    pub const fn new(lat: f64, lon: f64, value: f64) -> Self {
        Self {
            lat,
            lon,
            region_id: None,
            value,
            centroid: None,
            impf_id: DEFAULT_IMPF_ID,
            tonnes_per_year: None,
        }
    }

    /// Sets the region id.
    #[must_use]
    pub const fn with_region(mut self, region_id: u32) -> Self {
        self.region_id = Some(region_id);
        self
    }

    /// Sets the assigned centroid.
    #[must_use]
    pub const fn with_centroid(mut self, centroid: usize) -> Self {
        self.centroid = Some(centroid);
        self
    }

    /// Sets the impact function id.
    #[must_use]
    pub const fn with_impf_id(mut self, impf_id: u32) -> Self {
        self.impf_id = impf_id;
        self
    }
}

/// A set of exposure records sharing one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exposures {
    /// Records in point order. A record's position is its point index in
    /// impact results.
    pub records: Vec<ExposureRecord>,
    /// Crop the values refer to, if known.
    pub crop: Option<Crop>,
    /// Irrigation regime the values refer to, if known.
    pub irr: Option<Irrigation>,
    /// Unit of every `value`.
    pub value_unit: ValueUnit,
    /// Free-text provenance.
    pub description: String,
    /// Years the values represent.
    pub ref_year: Option<YearRange>,
}

impl Exposures {
    /// Creates exposures in tonnes per year with no metadata.
    #[must_use]
    pub const fn new(records: Vec<ExposureRecord>) -> Self {
        Self {
            records,
            crop: None,
            irr: None,
            value_unit: ValueUnit::TonnesPerYear,
            description: String::new(),
            ref_year: None,
        }
    }

    /// Sets crop and irrigation.
    #[must_use]
    pub const fn with_crop(mut self, crop: Crop, irr: Irrigation) -> Self {
        self.crop = Some(crop);
        self.irr = Some(irr);
        self
    }

    /// Sets the value unit.
    #[must_use]
    pub const fn with_unit(mut self, value_unit: ValueUnit) -> Self {
        self.value_unit = value_unit;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record values in point order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.value)
    }

    /// Sum of all values, skipping `NaN`.
    #[must_use]
    pub fn total_value(&self) -> f64 {
        self.values().filter(|v| !v.is_nan()).sum()
    }

    /// Number of records without an assigned centroid.
    #[must_use]
    pub fn unassigned_count(&self) -> usize {
        self.records.iter().filter(|r| r.centroid.is_none()).count()
    }

    /// Same metadata with a different record list.
    #[must_use]
    pub fn with_records(&self, records: Vec<ExposureRecord>) -> Self {
        Self {
            records,
            crop: self.crop,
            irr: self.irr,
            value_unit: self.value_unit,
            description: self.description.clone(),
            ref_year: self.ref_year,
        }
    }
}

/// Where and how to load one exposure file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureLoadConfig {
    /// Path of the exposure file.
    pub path: PathBuf,
    /// Crop the file holds.
    #[serde(default)]
    pub crop: Option<Crop>,
    /// Irrigation regime the file holds.
    #[serde(default)]
    pub irr: Option<Irrigation>,
    /// Unit of the stored values.
    #[serde(default)]
    pub unit: ValueUnit,
    /// Optional spatial subset.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    /// Impact function id given to every record.
    #[serde(default = "default_impf_id")]
    pub impf_id: u32,
}

const fn default_impf_id() -> u32 {
    DEFAULT_IMPF_ID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_unit_labels() {
        assert_eq!(ValueUnit::KcalPerYear.to_string(), "kcal/y");
        assert_eq!("kg/Ha".parse::<ValueUnit>().unwrap(), ValueUnit::KgPerHectare);
        assert!(ValueUnit::UsdPerYear.is_annual());
        assert!(!ValueUnit::Hectares.is_annual());
        assert_eq!("USD/y".parse::<ValueUnit>().unwrap(), ValueUnit::UsdPerYear);
        assert_eq!(
            serde_json::to_string(&ValueUnit::TonnesPerYear).unwrap(),
            "\"t/y\""
        );
    }

    #[test]
    fn total_value_skips_nan() {
        let exp = Exposures::new(vec![
            ExposureRecord::new(0.0, 0.0, 2.0),
            ExposureRecord::new(0.0, 1.0, f64::NAN),
            ExposureRecord::new(0.0, 2.0, 3.5),
        ]);
        assert!((exp.total_value() - 5.5).abs() < 1e-12);
        assert_eq!(exp.unassigned_count(), 3);
    }

    #[test]
    fn with_records_keeps_metadata() {
        let exp = Exposures::new(vec![ExposureRecord::new(0.0, 0.0, 1.0)])
            .with_crop(Crop::Whe, Irrigation::Firr)
            .with_unit(ValueUnit::UsdPerYear)
            .with_description("test");
        let empty = exp.with_records(Vec::new());
        assert!(empty.is_empty());
        assert_eq!(empty.crop, Some(Crop::Whe));
        assert_eq!(empty.value_unit, ValueUnit::UsdPerYear);
        assert_eq!(empty.description, "test");
    }

    #[test]
    fn load_config_defaults() {
        let config: ExposureLoadConfig =
            serde_json::from_str(r#"{ "path": "exp.csv", "crop": "mai" }"#).unwrap();
        assert_eq!(config.unit, ValueUnit::TonnesPerYear);
        assert_eq!(config.impf_id, DEFAULT_IMPF_ID);
        assert_eq!(config.crop, Some(Crop::Mai));
        assert!(config.bbox.is_none());
    }
}
