//! Run configuration, read from a TOML file.
//!
//! ```toml
//! [hist_mean]
//! input_dir = "data/isimip/hist"
//! yearrange = [1980, 2005]
//! output = "out/hist_mean.json"
//!
//! [impact]
//! hist_mean = "out/hist_mean.json"
//! unit = "USD/y"
//! price_file = "data/FAOSTAT_data_producer_prices.csv"
//! output = "out/impact.json"
//!
//! [impact.hazard]
//! input_dir = "data/isimip/rcp60"
//! yearrange = [2006, 2099]
//! ag_model = "lpjml"
//! cl_model = "ipsl-cm5a-lr"
//! scenario = "rcp60"
//! soc = "2005soc"
//! co2 = "co2"
//! crop = "whe"
//! irr = "noirr"
//!
//! [impact.exposure]
//! path = "data/exposure/whe-noirr.csv"
//! crop = "whe"
//! irr = "noirr"
//!
//! [spam]
//! input_dir = "data/spam"
//! variable = "H"
//! technology = "TI"
//! country = "CHE"
//! output = "out/spam.json"
//! ```
//!
//! Instead of `[impact.exposure]`, `[impact.land_use]` derives the exposure
//! from ISIMIP land use and the baseline.

use std::path::{Path, PathBuf};

use crop_risk_exposure::SpamLoadConfig;
use crop_risk_exposure::isimip::DEFAULT_RESOLUTION_DEG;
use crop_risk_exposure_models::{ExposureLoadConfig, ValueUnit};
use crop_risk_hazard_models::{BoundingBox, HazardLoadConfig, YearRange};
use crop_risk_spatial::DEFAULT_THRESHOLD_KM;
use serde::Deserialize;

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Settings of the `hist-mean` command.
    pub hist_mean: Option<HistMeanConfig>,
    /// Settings of the `impact` command.
    pub impact: Option<ImpactConfig>,
    /// Settings of the `spam` command.
    pub spam: Option<SpamConfig>,
}

impl RunConfig {
    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema.
    pub fn from_path(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| format!("Failed to parse {}: {e}", path.display()).into())
    }

    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the schema.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::de::from_str(content)
    }
}

/// Historical-mean baseline job.
#[derive(Debug, Clone, Deserialize)]
pub struct HistMeanConfig {
    /// Directory holding the historical yield files.
    pub input_dir: PathBuf,
    /// File names to process. When empty, every historical file in
    /// `input_dir` is used.
    #[serde(default)]
    pub files: Vec<String>,
    /// Years averaged into the baseline.
    pub yearrange: YearRange,
    /// Optional spatial subset.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    /// Where the baseline JSON is written.
    pub output: PathBuf,
}

/// Impact job.
#[derive(Debug, Clone, Deserialize)]
pub struct ImpactConfig {
    /// Yield file to turn into a relative yield hazard.
    pub hazard: HazardLoadConfig,
    /// Baseline written by `hist-mean`.
    pub hist_mean: PathBuf,
    /// Exposure file.
    #[serde(default)]
    pub exposure: Option<ExposureLoadConfig>,
    /// Land use to derive the exposure from when no exposure file is given.
    #[serde(default)]
    pub land_use: Option<LandUseConfig>,
    /// Unit to compute impacts in; values are converted from t/y.
    #[serde(default)]
    pub unit: ValueUnit,
    /// FAOSTAT producer prices, required for `USD/y`.
    #[serde(default)]
    pub price_file: Option<PathBuf>,
    /// Years the producer prices are averaged over.
    #[serde(default = "default_price_years")]
    pub price_years: YearRange,
    /// Use as-purchased rather than dry-matter caloric content for `kcal/y`.
    #[serde(default = "default_biomass")]
    pub biomass: bool,
    /// Country polygons used to tag hazard centroids.
    #[serde(default)]
    pub regions_geojson: Option<PathBuf>,
    /// Property of each polygon feature holding its numeric region id.
    #[serde(default = "default_region_property")]
    pub region_property: String,
    /// Replace region ids already present in the hazard file with the
    /// polygon lookup.
    #[serde(default = "default_overwrite_regions")]
    pub overwrite_regions: bool,
    /// Restrict the run to one region id.
    #[serde(default)]
    pub region: Option<u32>,
    /// Restrict the run to these events.
    #[serde(default)]
    pub events: Option<Vec<String>>,
    /// Maximum distance between an exposure point and its centroid.
    #[serde(default = "default_threshold_km")]
    pub threshold_km: f64,
    /// Where the impact summary JSON is written.
    pub output: PathBuf,
}

/// ISIMIP land use turned into crop production.
#[derive(Debug, Clone, Deserialize)]
pub struct LandUseConfig {
    /// Land-use fraction table.
    pub path: PathBuf,
    /// Years the fractions are averaged over; the baseline years when
    /// omitted.
    #[serde(default)]
    pub yearrange: Option<YearRange>,
    /// Grid spacing in degrees.
    #[serde(default = "default_resolution_deg")]
    pub resolution_deg: f64,
    /// Optional spatial subset.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

/// SPAM table extraction job.
#[derive(Debug, Clone, Deserialize)]
pub struct SpamConfig {
    /// Table and area to load.
    #[serde(flatten)]
    pub load: SpamLoadConfig,
    /// Where the exposure JSON is written.
    pub output: PathBuf,
}

fn default_price_years() -> YearRange {
    YearRange::new(2008, 2018).unwrap_or(YearRange::single(2018))
}

const fn default_biomass() -> bool {
    true
}

fn default_region_property() -> String {
    "ISO_N3".to_string()
}

const fn default_overwrite_regions() -> bool {
    true
}

const fn default_resolution_deg() -> f64 {
    DEFAULT_RESOLUTION_DEG
}

const fn default_threshold_km() -> f64 {
    DEFAULT_THRESHOLD_KM
}

#[cfg(test)]
mod tests {
    use crop_risk_crop_models::{Crop, Irrigation};

    use super::*;

    const CONFIG: &str = r#"
[hist_mean]
input_dir = "data/hist"
yearrange = [1980, 2005]
output = "out/hist_mean.json"

[impact]
hist_mean = "out/hist_mean.json"
unit = "USD/y"
price_file = "data/prices.csv"
region = 156
events = ["2002", "2003"]
output = "out/impact.json"

[impact.hazard]
input_dir = "data/rcp60"
yearrange = [2006, 2010]
ag_model = "lpjml"
cl_model = "ipsl-cm5a-lr"
scenario = "rcp60"
soc = "2005soc"
co2 = "co2"
crop = "whe"
irr = "noirr"

[impact.exposure]
path = "data/exposure.csv"
crop = "whe"
irr = "noirr"
"#;

    #[test]
    fn parses_full_config() {
        let config = RunConfig::parse(CONFIG).unwrap();
        let hist = config.hist_mean.unwrap();
        assert_eq!(hist.yearrange, YearRange::new(1980, 2005).unwrap());
        assert!(hist.files.is_empty());

        let impact = config.impact.unwrap();
        assert_eq!(impact.unit, ValueUnit::UsdPerYear);
        assert_eq!(impact.region, Some(156));
        assert_eq!(impact.price_years, YearRange::new(2008, 2018).unwrap());
        assert!((impact.threshold_km - DEFAULT_THRESHOLD_KM).abs() < f64::EPSILON);
        assert_eq!(impact.region_property, "ISO_N3");
        assert_eq!(impact.hazard.crop, Crop::Whe);
        assert_eq!(impact.hazard.irr, Irrigation::Noirr);
        assert_eq!(impact.hazard.bias_correction, "ewembi");
        assert_eq!(impact.exposure.unwrap().crop, Some(Crop::Whe));
        assert!(impact.overwrite_regions);
    }

    #[test]
    fn sections_are_optional() {
        let config = RunConfig::parse("").unwrap();
        assert!(config.hist_mean.is_none());
        assert!(config.impact.is_none());
    }

    #[test]
    fn rejects_inverted_year_range() {
        let bad = "[hist_mean]\ninput_dir = \"x\"\nyearrange = [2005, 1980]\noutput = \"y\"\n";
        assert!(RunConfig::parse(bad).is_err());
    }

    #[test]
    fn land_use_replaces_exposure_file() {
        let doc = CONFIG.replace(
            "[impact.exposure]\npath = \"data/exposure.csv\"\ncrop = \"whe\"\nirr = \"noirr\"\n",
            "[impact.land_use]\npath = \"data/landuse.csv\"\n",
        );
        let impact = RunConfig::parse(&doc).unwrap().impact.unwrap();
        assert!(impact.exposure.is_none());
        let land_use = impact.land_use.unwrap();
        assert!(land_use.yearrange.is_none());
        assert!((land_use.resolution_deg - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_spam_section() {
        let doc = "[spam]\ninput_dir = \"data/spam\"\ncountry = \"CHE\"\noutput = \"out/spam.json\"\n";
        let spam = RunConfig::parse(doc).unwrap().spam.unwrap();
        assert_eq!(spam.load.variable, "V_agg");
        assert_eq!(spam.load.technology, "TA");
        assert_eq!(spam.load.country.as_deref(), Some("CHE"));
        assert_eq!(spam.output, PathBuf::from("out/spam.json"));
    }
}
