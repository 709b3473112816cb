//! ISIMIP crop yield file-name parsing.
//!
//! Yield files are named
//! `{ag}_{cl}_{bias}_{scenario}_{soc}_{co2}_yield-{crop}-{irr}_{rest}.{ext}`,
//! e.g. `pepic_miroc5_ewembi_historical_2005soc_co2_yield-whe-firr_global_annual_1861_2005.nc`.
//! Everything after the yield token varies between data providers and is
//! kept verbatim.

use std::str::FromStr;

use crop_risk_crop_models::CropIrr;

use crate::HazardError;

/// Metadata encoded in a crop yield file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HazardFileInfo {
    /// The full file name as given.
    pub file_name: String,
    /// Global gridded crop model.
    pub ag_model: String,
    /// Climate model.
    pub cl_model: String,
    /// Bias-correction tag.
    pub bias_correction: String,
    /// Climate scenario.
    pub scenario: String,
    /// Socio-economic setting.
    pub soc: String,
    /// CO2 fertilization setting.
    pub co2: String,
    /// Crop and irrigation category.
    pub crop_irr: CropIrr,
    /// Trailing name parts (region tag, years, ...).
    pub rest: Vec<String>,
}

impl HazardFileInfo {
    /// Whether the file holds a historical simulation.
    #[must_use]
    pub fn is_historical(&self) -> bool {
        self.scenario == "historical"
    }
}

impl FromStr for HazardFileInfo {
    type Err = HazardError;

    fn from_str(file_name: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| HazardError::InvalidFileName {
            name: file_name.to_string(),
            reason: reason.to_string(),
        };

        let stem = file_name
            .rsplit_once('.')
            .map_or(file_name, |(stem, _ext)| stem);
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 7 {
            return Err(invalid("expected at least 7 '_'-separated parts"));
        }

        let crop_irr = parts[6]
            .strip_prefix("yield-")
            .ok_or_else(|| invalid("seventh part must start with 'yield-'"))?
            .parse::<CropIrr>()
            .map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            file_name: file_name.to_string(),
            ag_model: parts[0].to_string(),
            cl_model: parts[1].to_string(),
            bias_correction: parts[2].to_string(),
            scenario: parts[3].to_string(),
            soc: parts[4].to_string(),
            co2: parts[5].to_string(),
            crop_irr,
            rest: parts[7..].iter().map(ToString::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crop_risk_crop_models::{Crop, Irrigation};

    use super::*;

    #[test]
    fn parses_demo_file_name() {
        let info: HazardFileInfo =
            "gepic_gfdl-esm2m_ewembi_historical_2005soc_co2_yield-whe-noirr_global_DEMO_TJANJIN_annual_1861_2005.nc"
                .parse()
                .unwrap();
        assert_eq!(info.ag_model, "gepic");
        assert_eq!(info.cl_model, "gfdl-esm2m");
        assert_eq!(info.crop_irr, CropIrr::new(Crop::Whe, Irrigation::Noirr));
        assert!(info.is_historical());
        assert_eq!(info.rest.last().map(String::as_str), Some("2005"));
    }

    #[test]
    fn parses_name_without_extension() {
        let info: HazardFileInfo = "lpjml_ipsl-cm5a-lr_ewembi_rcp60_2005soc_co2_yield-mai-firr_annual"
            .parse()
            .unwrap();
        assert_eq!(info.scenario, "rcp60");
        assert!(!info.is_historical());
        assert_eq!(info.crop_irr.to_string(), "mai-firr");
    }

    #[test]
    fn rejects_short_names() {
        assert!(matches!(
            "landuse_2005.nc".parse::<HazardFileInfo>(),
            Err(HazardError::InvalidFileName { .. })
        ));
    }

    #[test]
    fn rejects_missing_yield_token() {
        assert!(
            "a_b_c_historical_2005soc_co2_area-whe-firr_x.nc"
                .parse::<HazardFileInfo>()
                .is_err()
        );
        assert!(
            "a_b_c_historical_2005soc_co2_yield-whe-sometimes_x.nc"
                .parse::<HazardFileInfo>()
                .is_err()
        );
    }
}
