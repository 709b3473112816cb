#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hazard data types: centroids, events, and intensity matrices.
//!
//! A [`Hazard`] holds one intensity row per event and one column per
//! centroid. The shape invariant is checked whenever a hazard is built or its
//! intensity replaced, so downstream code can index without re-validating.

pub mod baseline;
pub mod centroids;
pub mod intensity;

use std::path::PathBuf;

use crop_risk_crop_models::{Crop, HazardType, Irrigation};
use serde::{Deserialize, Serialize};

pub use baseline::{CoordinateLookup, YieldBaseline};
pub use centroids::{Centroid, Centroids};
pub use intensity::IntensityMatrix;

/// Errors raised by hazard constructors and selections.
#[derive(Debug, Clone, PartialEq)]
pub enum HazardModelError {
    /// Matrix dimensions disagree with the event or centroid count.
    Shape {
        /// Description of the mismatch.
        message: String,
    },
    /// No event falls in the requested year range.
    EmptyYearRange {
        /// The requested range.
        range: YearRange,
    },
    /// A selected event name does not exist.
    UnknownEvent {
        /// The missing event name.
        name: String,
    },
    /// A year range whose start lies after its end.
    InvalidYearRange {
        /// First year.
        start: i32,
        /// Last year.
        end: i32,
    },
    /// A baseline holds no values for the requested category.
    MissingCategory {
        /// The category key, e.g. `whe-noirr`.
        key: String,
    },
    /// A grid point has no counterpart on the reference grid.
    UnmatchedCentroid {
        /// Latitude of the point.
        lat: f64,
        /// Longitude of the point.
        lon: f64,
    },
}

impl std::fmt::Display for HazardModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shape { message } => write!(f, "shape mismatch: {message}"),
            Self::EmptyYearRange { range } => write!(f, "no events in year range {range}"),
            Self::UnknownEvent { name } => write!(f, "unknown event '{name}'"),
            Self::InvalidYearRange { start, end } => {
                write!(f, "invalid year range {start}-{end}: start after end")
            }
            Self::MissingCategory { key } => write!(f, "no baseline for category {key}"),
            Self::UnmatchedCentroid { lat, lon } => {
                write!(f, "no reference grid cell at lat {lat}, lon {lon}")
            }
        }
    }
}

impl std::error::Error for HazardModelError {}

/// Geographic bounding box `[lon min, lat min, lon max, lat max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    /// Western edge.
    pub lon_min: f64,
    /// Southern edge.
    pub lat_min: f64,
    /// Eastern edge.
    pub lon_max: f64,
    /// Northern edge.
    pub lat_max: f64,
}

impl BoundingBox {
    /// Global agricultural land extent.
    pub const GLOBAL: Self = Self::new(-180.0, -85.0, 180.0, 85.0);

    /// Creates a bounding box from its edges.
    #[must_use]
    pub const fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Self {
        Self {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        }
    }

    /// Whether the point lies inside the box, edges inclusive.
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.lon_min..=self.lon_max).contains(&lon) && (self.lat_min..=self.lat_max).contains(&lat)
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([lon_min, lat_min, lon_max, lat_max]: [f64; 4]) -> Self {
        Self::new(lon_min, lat_min, lon_max, lat_max)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.lon_min, b.lat_min, b.lon_max, b.lat_max]
    }
}

/// Inclusive range of years, e.g. `(1980, 2005)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 2]", into = "[i32; 2]")]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    /// Creates a range.
    ///
    /// # Errors
    ///
    /// Returns [`HazardModelError::InvalidYearRange`] if `start > end`.
    pub const fn new(start: i32, end: i32) -> Result<Self, HazardModelError> {
        if start > end {
            return Err(HazardModelError::InvalidYearRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering a single year.
    #[must_use]
    pub const fn single(year: i32) -> Self {
        Self {
            start: year,
            end: year,
        }
    }

    /// First year.
    #[must_use]
    pub const fn start(self) -> i32 {
        self.start
    }

    /// Last year.
    #[must_use]
    pub const fn end(self) -> i32 {
        self.end
    }

    /// Whether `year` lies in the range.
    #[must_use]
    pub const fn contains(self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl TryFrom<[i32; 2]> for YearRange {
    type Error = HazardModelError;

    fn try_from([start, end]: [i32; 2]) -> Result<Self, Self::Error> {
        Self::new(start, end)
    }
}

impl From<YearRange> for [i32; 2] {
    fn from(r: YearRange) -> Self {
        [r.start, r.end]
    }
}

/// One hazard realization, usually one simulated year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event name, e.g. `"2002"`.
    pub name: String,
    /// Year the event represents, if any.
    pub year: Option<i32>,
}

impl Event {
    /// An annual event named after its year.
    #[must_use]
    pub fn from_year(year: i32) -> Self {
        Self {
            name: year.to_string(),
            year: Some(year),
        }
    }
}

/// A hazard set: events × centroids intensities plus per-event frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Hazard {
    haz_type: HazardType,
    units: String,
    events: Vec<Event>,
    frequency: Vec<f64>,
    centroids: Centroids,
    intensity: IntensityMatrix,
}

impl Hazard {
    /// Creates a hazard with uniform event frequency `1 / n_events`, i.e.
    /// each event is one of `n` equally likely annual realizations.
    ///
    /// # Errors
    ///
    /// Returns [`HazardModelError::Shape`] if the intensity matrix does not
    /// have one row per event and one column per centroid.
    pub fn new(
        haz_type: HazardType,
        events: Vec<Event>,
        centroids: Centroids,
        intensity: IntensityMatrix,
    ) -> Result<Self, HazardModelError> {
        check_shape(&events, &centroids, &intensity)?;
        let frequency = uniform_frequency(events.len());
        Ok(Self {
            haz_type,
            units: String::new(),
            events,
            frequency,
            centroids,
            intensity,
        })
    }

    /// Replaces the per-event frequencies.
    ///
    /// # Errors
    ///
    /// Returns [`HazardModelError::Shape`] if the length differs from the
    /// event count.
    pub fn with_frequency(mut self, frequency: Vec<f64>) -> Result<Self, HazardModelError> {
        if frequency.len() != self.events.len() {
            return Err(HazardModelError::Shape {
                message: format!(
                    "{} frequencies for {} events",
                    frequency.len(),
                    self.events.len()
                ),
            });
        }
        self.frequency = frequency;
        Ok(self)
    }

    /// Replaces the intensity matrix, keeping events and centroids.
    ///
    /// # Errors
    ///
    /// Returns [`HazardModelError::Shape`] if the new matrix has a different
    /// shape.
    pub fn with_intensity(mut self, intensity: IntensityMatrix) -> Result<Self, HazardModelError> {
        check_shape(&self.events, &self.centroids, &intensity)?;
        self.intensity = intensity;
        Ok(self)
    }

    /// Sets the hazard type.
    #[must_use]
    pub const fn with_haz_type(mut self, haz_type: HazardType) -> Self {
        self.haz_type = haz_type;
        self
    }

    /// Sets the intensity unit label.
    #[must_use]
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// Hazard type.
    #[must_use]
    pub const fn haz_type(&self) -> HazardType {
        self.haz_type
    }

    /// Intensity unit label.
    #[must_use]
    pub fn units(&self) -> &str {
        &self.units
    }

    /// Number of events.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.events.len()
    }

    /// Events in row order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Event names in row order.
    #[must_use]
    pub fn event_names(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.name.as_str()).collect()
    }

    /// Row index of the named event.
    #[must_use]
    pub fn event_index(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|e| e.name == name)
    }

    /// Per-event annual frequency.
    #[must_use]
    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    /// Centroid registry.
    #[must_use]
    pub const fn centroids(&self) -> &Centroids {
        &self.centroids
    }

    /// Mutable centroid registry, for region tagging. The number of
    /// centroids cannot change through this reference.
    pub const fn centroids_mut(&mut self) -> &mut Centroids {
        &mut self.centroids
    }

    /// Intensity matrix.
    #[must_use]
    pub const fn intensity(&self) -> &IntensityMatrix {
        &self.intensity
    }

    /// Returns the subset of events named in `event_names` (in that order)
    /// and of centroids tagged with `region_id`. `None` keeps everything
    /// along that axis. Selected events keep their original frequency.
    ///
    /// # Errors
    ///
    /// Returns [`HazardModelError::UnknownEvent`] if a name is not present.
    pub fn select(
        &self,
        event_names: Option<&[&str]>,
        region_id: Option<u32>,
    ) -> Result<Self, HazardModelError> {
        let rows: Vec<usize> = match event_names {
            Some(names) => names
                .iter()
                .map(|name| {
                    self.event_index(name)
                        .ok_or_else(|| HazardModelError::UnknownEvent {
                            name: (*name).to_string(),
                        })
                })
                .collect::<Result<_, _>>()?,
            None => (0..self.events.len()).collect(),
        };
        let columns: Vec<usize> = match region_id {
            Some(region) => self.centroids.indices_in_region(region),
            None => (0..self.centroids.len()).collect(),
        };

        Ok(Self {
            haz_type: self.haz_type,
            units: self.units.clone(),
            events: rows.iter().map(|&r| self.events[r].clone()).collect(),
            frequency: rows.iter().map(|&r| self.frequency[r]).collect(),
            centroids: self.centroids.select(&columns),
            intensity: self.intensity.select_rows(&rows).select_columns(&columns),
        })
    }

    /// Per-centroid mean intensity over the events whose year lies in
    /// `years`.
    ///
    /// `NaN` intensities are skipped. A centroid with no finite value in the
    /// range gets a mean of `0.0`, meaning "no baseline".
    ///
    /// # Errors
    ///
    /// Returns [`HazardModelError::EmptyYearRange`] if no event falls in the
    /// range.
    #[allow(clippy::cast_precision_loss)]
    pub fn calc_mean(&self, years: YearRange) -> Result<Vec<f64>, HazardModelError> {
        let rows: Vec<usize> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.year.is_some_and(|y| years.contains(y)))
            .map(|(i, _)| i)
            .collect();
        if rows.is_empty() {
            return Err(HazardModelError::EmptyYearRange { range: years });
        }

        let n = self.centroids.len();
        let mut sums = vec![0.0; n];
        let mut counts = vec![0_usize; n];
        for &row in &rows {
            for (c, value) in self.intensity.row(row).iter().enumerate() {
                if !value.is_nan() {
                    sums[c] += value;
                    counts[c] += 1;
                }
            }
        }

        Ok(sums
            .into_iter()
            .zip(counts)
            .map(|(sum, count)| if count == 0 { 0.0 } else { sum / count as f64 })
            .collect())
    }
}

fn check_shape(
    events: &[Event],
    centroids: &Centroids,
    intensity: &IntensityMatrix,
) -> Result<(), HazardModelError> {
    if intensity.n_events() != events.len() || intensity.n_centroids() != centroids.len() {
        return Err(HazardModelError::Shape {
            message: format!(
                "intensity is {}x{} but hazard has {} events and {} centroids",
                intensity.n_events(),
                intensity.n_centroids(),
                events.len(),
                centroids.len()
            ),
        });
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn uniform_frequency(n_events: usize) -> Vec<f64> {
    if n_events == 0 {
        return Vec::new();
    }
    vec![1.0 / n_events as f64; n_events]
}

/// Everything needed to locate and subset one ISIMIP crop yield file.
///
/// File names follow
/// `{ag_model}_{cl_model}_{bias_correction}_{scenario}_{soc}_{co2}_yield-{crop}-{irr}_{fn_str_var}_{first}_{last}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardLoadConfig {
    /// Directory holding the input files.
    pub input_dir: PathBuf,
    /// Years to load as events.
    pub yearrange: YearRange,
    /// Optional spatial subset.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    /// Global gridded crop model, e.g. `"lpjml"`.
    pub ag_model: String,
    /// Climate model, e.g. `"ipsl-cm5a-lr"`.
    pub cl_model: String,
    /// Bias-correction tag of the climate forcing.
    #[serde(default = "default_bias_correction")]
    pub bias_correction: String,
    /// Climate scenario, e.g. `"historical"` or `"rcp60"`.
    pub scenario: String,
    /// Socio-economic setting, e.g. `"2005soc"`.
    pub soc: String,
    /// CO2 fertilization setting, e.g. `"co2"`.
    pub co2: String,
    /// Crop type.
    pub crop: Crop,
    /// Irrigation regime.
    pub irr: Irrigation,
    /// Variable part of the file name, e.g. `"global_annual"`.
    #[serde(default = "default_fn_str_var")]
    pub fn_str_var: String,
    /// Years covered by the file; derived from the scenario when omitted.
    #[serde(default)]
    pub file_years: Option<YearRange>,
}

fn default_bias_correction() -> String {
    "ewembi".to_string()
}

fn default_fn_str_var() -> String {
    "global_annual".to_string()
}

impl HazardLoadConfig {
    /// Years covered by the input file.
    #[must_use]
    pub fn file_years(&self) -> YearRange {
        self.file_years.unwrap_or_else(|| {
            if self.scenario == "historical" {
                YearRange {
                    start: 1861,
                    end: 2005,
                }
            } else {
                YearRange {
                    start: 2006,
                    end: 2099,
                }
            }
        })
    }

    /// File name without extension.
    #[must_use]
    pub fn file_stem(&self) -> String {
        let years = self.file_years();
        format!(
            "{}_{}_{}_{}_{}_{}_yield-{}-{}_{}_{}_{}",
            self.ag_model,
            self.cl_model,
            self.bias_correction,
            self.scenario,
            self.soc,
            self.co2,
            self.crop,
            self.irr,
            self.fn_str_var,
            years.start,
            years.end
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hazard() -> Hazard {
        let events = (2001..=2003).map(Event::from_year).collect();
        let centroids = Centroids::new(vec![
            Centroid::new(50.0, 8.0).with_region(276),
            Centroid::new(47.0, 2.0).with_region(250),
            Centroid::new(52.0, 10.0).with_region(276),
        ]);
        let intensity = IntensityMatrix::new(
            3,
            3,
            vec![1.0, 2.0, 3.0, 3.0, f64::NAN, 5.0, 5.0, f64::NAN, 7.0],
        )
        .unwrap();
        Hazard::new(HazardType::RelativeCropyield, events, centroids, intensity).unwrap()
    }

    #[test]
    fn rejects_mismatched_shape() {
        let events = vec![Event::from_year(2001)];
        let centroids = Centroids::from_grid(&[0.0], &[0.0, 1.0]);
        let intensity = IntensityMatrix::zeros(2, 2);
        assert!(matches!(
            Hazard::new(HazardType::Drought, events, centroids, intensity),
            Err(HazardModelError::Shape { .. })
        ));
    }

    #[test]
    fn default_frequency_is_uniform() {
        let haz = hazard();
        assert_eq!(haz.size(), 3);
        for f in haz.frequency() {
            assert!((f - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn select_by_event_and_region() {
        let haz = hazard();
        let sel = haz.select(Some(&["2002"][..]), Some(276)).unwrap();
        assert_eq!(sel.event_names(), vec!["2002"]);
        assert_eq!(sel.centroids().len(), 2);
        assert_eq!(sel.intensity().values(), &[3.0, 5.0]);
        assert!((sel.frequency()[0] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn select_unknown_event_fails() {
        assert!(matches!(
            hazard().select(Some(&["1999"][..]), None),
            Err(HazardModelError::UnknownEvent { .. })
        ));
    }

    #[test]
    fn calc_mean_skips_nan_and_years_outside_range() {
        let haz = hazard();
        let mean = haz.calc_mean(YearRange::new(2002, 2003).unwrap()).unwrap();
        assert_eq!(mean, vec![4.0, 0.0, 6.0]);

        let full = haz.calc_mean(YearRange::new(2001, 2005).unwrap()).unwrap();
        assert!((full[0] - 3.0).abs() < 1e-12);
        assert!((full[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn calc_mean_empty_range() {
        assert!(matches!(
            hazard().calc_mean(YearRange::single(1990)),
            Err(HazardModelError::EmptyYearRange { .. })
        ));
    }

    #[test]
    fn year_range_validation() {
        assert!(YearRange::new(2005, 2001).is_err());
        let parsed: YearRange = serde_json::from_str("[1980, 2005]").unwrap();
        assert_eq!(parsed.start(), 1980);
        assert!(serde_json::from_str::<YearRange>("[2005, 1980]").is_err());
    }

    #[test]
    fn bbox_serializes_as_array() {
        let bbox: BoundingBox = serde_json::from_str("[-5, 42, 16, 55]").unwrap();
        assert!(bbox.contains(0.0, 50.0));
        assert!(!bbox.contains(17.0, 50.0));
        assert_eq!(serde_json::to_string(&bbox).unwrap(), "[-5.0,42.0,16.0,55.0]");
    }

    #[test]
    fn composes_isimip_file_stem() {
        let config = HazardLoadConfig {
            input_dir: PathBuf::from("data"),
            yearrange: YearRange::new(2001, 2005).unwrap(),
            bbox: None,
            ag_model: "lpjml".to_string(),
            cl_model: "ipsl-cm5a-lr".to_string(),
            bias_correction: default_bias_correction(),
            scenario: "historical".to_string(),
            soc: "2005soc".to_string(),
            co2: "co2".to_string(),
            crop: Crop::Whe,
            irr: Irrigation::Noirr,
            fn_str_var: "annual_FR_DE_DEMO".to_string(),
            file_years: None,
        };
        assert_eq!(
            config.file_stem(),
            "lpjml_ipsl-cm5a-lr_ewembi_historical_2005soc_co2_yield-whe-noirr_annual_FR_DE_DEMO_1861_2005"
        );
    }
}
