#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crop, irrigation, and hazard-type taxonomy.
//!
//! This crate defines the canonical identifiers used across the crop risk
//! workspace. Hazard file names, exposure files, impact functions, and FAO
//! statistics all key their data by these types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Crop types simulated by the ISIMIP global gridded crop models.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Crop {
    /// Maize
    Mai,
    /// Rice
    Ric,
    /// Wheat
    Whe,
    /// Soybeans
    Soy,
    /// Rice, first growing season
    Ri1,
    /// Rice, second growing season
    Ri2,
    /// Spring wheat
    Swh,
    /// Winter wheat
    Wwh,
}

impl Crop {
    /// Returns the crop this variant aggregates into for statistics that are
    /// only published per main crop (FAO prices, caloric content).
    #[must_use]
    pub const fn base(self) -> Self {
        match self {
            Self::Mai => Self::Mai,
            Self::Ric | Self::Ri1 | Self::Ri2 => Self::Ric,
            Self::Whe | Self::Swh | Self::Wwh => Self::Whe,
            Self::Soy => Self::Soy,
        }
    }

    /// Name of the crop group in the land-use input files.
    #[must_use]
    pub const fn input_name(self) -> &'static str {
        match self.base() {
            Self::Mai => "maize",
            Self::Ric => "rice",
            Self::Soy => "oil_crops_soybean",
            _ => "temperate_cereals",
        }
    }

    /// Item name used by FAOSTAT price and production tables.
    #[must_use]
    pub const fn fao_name(self) -> &'static str {
        match self.base() {
            Self::Mai => "Maize",
            Self::Ric => "Rice, paddy",
            Self::Soy => "Soybeans",
            _ => "Wheat",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn print_name(self) -> &'static str {
        match self {
            Self::Mai => "Maize",
            Self::Ric => "Rice",
            Self::Whe => "Wheat",
            Self::Soy => "Soybeans",
            Self::Ri1 => "Rice 1st season",
            Self::Ri2 => "Rice 2nd season",
            Self::Swh => "Spring Wheat",
            Self::Wwh => "Winter Wheat",
        }
    }

    /// Caloric content in kcal per ton of crop.
    ///
    /// `biomass` selects the "as purchased" conversion (FAO-normalized
    /// production). Otherwise the dry-matter conversion is used, which
    /// corrects for the net water content and suits raw crop model yields.
    /// Factors follow Mueller et al. (2021).
    #[must_use]
    pub fn kcal_per_ton(self, biomass: bool) -> f64 {
        let (kcal_per_ton, water_content) = match self.base() {
            Self::Mai => (3.56e6, 0.12),
            Self::Ric => (2.80e6, 0.13),
            Self::Soy => (3.35e6, 0.09),
            _ => (3.34e6, 0.12),
        };
        if biomass {
            kcal_per_ton
        } else {
            kcal_per_ton / (1.0 - water_content)
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Mai,
            Self::Ric,
            Self::Whe,
            Self::Soy,
            Self::Ri1,
            Self::Ri2,
            Self::Swh,
            Self::Wwh,
        ]
    }
}

/// Irrigation regime of a crop simulation or land-use layer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Irrigation {
    /// Full irrigation
    Firr,
    /// No irrigation (rainfed)
    Noirr,
    /// Irrigated and rainfed together
    Combined,
}

impl Irrigation {
    /// Long name used in land-use variable names (e.g. `maize_rainfed`).
    #[must_use]
    pub const fn long_name(self) -> &'static str {
        match self {
            Self::Firr => "irrigated",
            Self::Noirr => "rainfed",
            Self::Combined => "combined",
        }
    }

    /// The concrete regimes this value stands for.
    #[must_use]
    pub const fn components(self) -> &'static [Self] {
        match self {
            Self::Firr => &[Self::Firr],
            Self::Noirr => &[Self::Noirr],
            Self::Combined => &[Self::Firr, Self::Noirr],
        }
    }
}

/// Hazard types handled by the workspace.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum HazardType {
    /// Relative crop yield anomaly
    #[serde(rename = "RC")]
    #[strum(serialize = "RC")]
    RelativeCropyield,
    /// Agricultural drought (standardized precipitation index)
    #[serde(rename = "DR")]
    #[strum(serialize = "DR")]
    Drought,
}

/// A crop and irrigation combination, e.g. `whe-noirr`.
///
/// Historical-mean baselines and hazard sets are grouped by this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CropIrr {
    /// Crop type.
    pub crop: Crop,
    /// Irrigation regime.
    pub irr: Irrigation,
}

impl CropIrr {
    /// Creates a new key.
    #[must_use]
    pub const fn new(crop: Crop, irr: Irrigation) -> Self {
        Self { crop, irr }
    }
}

impl std::fmt::Display for CropIrr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.crop, self.irr)
    }
}

/// Error returned when a string is not a valid `<crop>-<irr>` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCropIrrError {
    /// The string that failed to parse.
    pub value: String,
}

impl std::fmt::Display for InvalidCropIrrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid crop-irrigation key '{}': expected e.g. 'whe-noirr'",
            self.value
        )
    }
}

impl std::error::Error for InvalidCropIrrError {}

impl FromStr for CropIrr {
    type Err = InvalidCropIrrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidCropIrrError {
            value: s.to_string(),
        };
        let (crop, irr) = s.split_once('-').ok_or_else(err)?;
        Ok(Self {
            crop: crop.parse().map_err(|_| err())?,
            irr: irr.parse().map_err(|_| err())?,
        })
    }
}

impl From<CropIrr> for String {
    fn from(value: CropIrr) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for CropIrr {
    type Error = InvalidCropIrrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_irr_display_and_parse() {
        let key: CropIrr = "whe-noirr".parse().unwrap();
        assert_eq!(key, CropIrr::new(Crop::Whe, Irrigation::Noirr));
        assert_eq!(key.to_string(), "whe-noirr");
    }

    #[test]
    fn crop_irr_rejects_garbage() {
        assert!("whe".parse::<CropIrr>().is_err());
        assert!("xyz-firr".parse::<CropIrr>().is_err());
        assert!("mai-sometimes".parse::<CropIrr>().is_err());
    }

    #[test]
    fn crop_irr_orders_by_crop_then_irrigation() {
        let firr: CropIrr = "whe-firr".parse().unwrap();
        let noirr: CropIrr = "whe-noirr".parse().unwrap();
        let maize: CropIrr = "mai-noirr".parse().unwrap();
        assert!(maize < firr);
        assert!(firr < noirr);
    }

    #[test]
    fn hazard_type_codes() {
        assert_eq!(HazardType::RelativeCropyield.to_string(), "RC");
        assert_eq!("DR".parse::<HazardType>().unwrap(), HazardType::Drought);
    }

    #[test]
    fn seasonal_variants_share_base_statistics() {
        assert_eq!(Crop::Swh.fao_name(), "Wheat");
        assert_eq!(Crop::Ri2.input_name(), "rice");
        assert!((Crop::Wwh.kcal_per_ton(true) - 3.34e6).abs() < f64::EPSILON);
    }

    #[test]
    fn drymatter_exceeds_biomass_kcal() {
        for crop in Crop::all() {
            assert!(crop.kcal_per_ton(false) > crop.kcal_per_ton(true));
        }
        assert!((Crop::Mai.kcal_per_ton(false) - 3.56e6 / 0.88).abs() < 1e-6);
    }

    #[test]
    fn combined_irrigation_components() {
        assert_eq!(
            Irrigation::Combined.components(),
            &[Irrigation::Firr, Irrigation::Noirr]
        );
        assert_eq!(Irrigation::Noirr.long_name(), "rainfed");
    }
}
