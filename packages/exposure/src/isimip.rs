//! Crop production exposures from ISIMIP land use and yield baselines.
//!
//! Production of a cell is its crop area times its historical mean yield:
//!
//! ```text
//! production [t/y] = mean land-use fraction × cell area [ha] × yield [t/(ha y)]
//! ```
//!
//! Land-use fractions come as CSV with one row per cell and year and one
//! column per `<crop group>_<irrigation>` variable, e.g.
//! `temperate_cereals_irrigated`:
//!
//! ```text
//! lat,lon,region_id,year,temperate_cereals_irrigated,temperate_cereals_rainfed
//! 52.25,9.75,276,1980,0.02,0.31
//! ```
//!
//! `region_id` is optional. Empty cells read as `NaN`.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crop_risk_crop_models::{Crop, CropIrr, Irrigation};
use crop_risk_exposure_models::{ExposureRecord, Exposures, ValueUnit};
use crop_risk_hazard_models::{
    BoundingBox, Centroid, Centroids, CoordinateLookup, YearRange, YieldBaseline,
};

use crate::ExposureError;

/// Kilometres per degree of latitude.
const ONE_LAT_KM: f64 = 111.12;

/// Grid spacing of the ISIMIP land-use input, in degrees.
pub const DEFAULT_RESOLUTION_DEG: f64 = 0.5;

const NON_VARIABLE_COLUMNS: [&str; 4] = ["lat", "lon", "region_id", "year"];

/// Area of a square grid cell of `resolution_deg` centred at `lat`, in
/// hectares.
#[must_use]
pub fn grid_cell_area_ha(lat: f64, resolution_deg: f64) -> f64 {
    (ONE_LAT_KM * resolution_deg).powi(2) * lat.to_radians().cos() * 100.0
}

/// Yearly land-use area fractions per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct LandUseTable {
    centroids: Centroids,
    resolution_deg: f64,
    /// variable -> year -> fraction per cell
    fractions: BTreeMap<String, BTreeMap<i32, Vec<f64>>>,
}

impl LandUseTable {
    /// Reads a land-use CSV file.
    ///
    /// # Errors
    ///
    /// See [`LandUseTable::read`].
    pub fn from_path(path: &Path, bbox: Option<&BoundingBox>) -> Result<Self, ExposureError> {
        let file = std::fs::File::open(path)?;
        let table = Self::read(std::io::BufReader::new(file), bbox)?;
        log::debug!(
            "{}: {} land-use cells, variables {:?}",
            path.display(),
            table.centroids.len(),
            table.variables()
        );
        Ok(table)
    }

    /// Parses land-use rows, keeping cells inside `bbox`. Cells keep the
    /// order of their first row.
    ///
    /// # Errors
    ///
    /// * [`ExposureError::MissingColumn`] if `lat`, `lon`, or `year` is absent.
    /// * [`ExposureError::InvalidValue`] for an unparsable coordinate, year,
    ///   or fraction.
    /// * [`ExposureError::Csv`] on malformed rows.
    pub fn read(reader: impl Read, bbox: Option<&BoundingBox>) -> Result<Self, ExposureError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ExposureError::MissingColumn {
                    name: name.to_string(),
                })
        };
        let lat_col = column("lat")?;
        let lon_col = column("lon")?;
        let year_col = column("year")?;
        let region_col = headers.iter().position(|h| h == "region_id");
        let variables: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !NON_VARIABLE_COLUMNS.contains(h))
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut points: Vec<Centroid> = Vec::new();
        let mut lookup = CoordinateLookup::default();
        let mut cells: Vec<(usize, i32, Vec<f64>)> = Vec::new();

        for result in reader.records() {
            let record = result?;
            let number = |col: usize| -> Result<f64, ExposureError> {
                let cell = record.get(col).unwrap_or_default();
                if cell.is_empty() {
                    return Ok(f64::NAN);
                }
                cell.parse().map_err(|_| ExposureError::InvalidValue {
                    column: headers.get(col).unwrap_or_default().to_string(),
                    value: cell.to_string(),
                })
            };

            let (lat, lon) = (number(lat_col)?, number(lon_col)?);
            if bbox.is_some_and(|b| !b.contains(lon, lat)) {
                continue;
            }
            let year_cell = record.get(year_col).unwrap_or_default();
            let year: i32 = year_cell.parse().map_err(|_| ExposureError::InvalidValue {
                column: "year".to_string(),
                value: year_cell.to_string(),
            })?;

            let index = lookup.insert(lat, lon, points.len());
            if index == points.len() {
                let mut point = Centroid::new(lat, lon);
                point.region_id = region_col
                    .and_then(|c| record.get(c)?.parse().ok())
                    .filter(|&id: &u32| id != 0);
                points.push(point);
            }
            let values = variables
                .iter()
                .map(|(col, _)| number(*col))
                .collect::<Result<Vec<_>, _>>()?;
            cells.push((index, year, values));
        }

        let n_cells = points.len();
        let mut fractions: BTreeMap<String, BTreeMap<i32, Vec<f64>>> = BTreeMap::new();
        for (index, year, values) in cells {
            for ((_, name), value) in variables.iter().zip(values) {
                fractions
                    .entry(name.clone())
                    .or_default()
                    .entry(year)
                    .or_insert_with(|| vec![f64::NAN; n_cells])[index] = value;
            }
        }

        Ok(Self {
            centroids: Centroids::new(points),
            resolution_deg: DEFAULT_RESOLUTION_DEG,
            fractions,
        })
    }

    /// Sets the grid spacing used for cell areas.
    #[must_use]
    pub const fn with_resolution(mut self, resolution_deg: f64) -> Self {
        self.resolution_deg = resolution_deg;
        self
    }

    /// Cells in table order.
    #[must_use]
    pub const fn centroids(&self) -> &Centroids {
        &self.centroids
    }

    /// Variable names.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        self.fractions.keys().map(String::as_str).collect()
    }

    /// Per-cell mean fraction of `variable` over `years`. `NaN` entries are
    /// skipped; a cell without any value in range gets `0.0`.
    ///
    /// # Errors
    ///
    /// * [`ExposureError::MissingColumn`] if the variable is absent.
    /// * [`ExposureError::NoData`] if no year of the table lies in `years`.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_fraction(&self, variable: &str, years: YearRange) -> Result<Vec<f64>, ExposureError> {
        let by_year = self
            .fractions
            .get(variable)
            .ok_or_else(|| ExposureError::MissingColumn {
                name: variable.to_string(),
            })?;

        let mut sums = vec![0.0; self.centroids.len()];
        let mut counts = vec![0_usize; self.centroids.len()];
        let mut any_year = false;
        for (_, row) in by_year.range(years.start()..=years.end()) {
            any_year = true;
            for (i, &value) in row.iter().enumerate() {
                if !value.is_nan() {
                    sums[i] += value;
                    counts[i] += 1;
                }
            }
        }
        if !any_year {
            return Err(ExposureError::NoData {
                message: format!("{variable} has no land use in {years}"),
            });
        }

        Ok(sums
            .into_iter()
            .zip(counts)
            .map(|(sum, count)| if count == 0 { 0.0 } else { sum / count as f64 })
            .collect())
    }

    /// Crop area in hectares per cell, averaged over `years`.
    ///
    /// # Errors
    ///
    /// See [`LandUseTable::mean_fraction`].
    pub fn crop_area_ha(&self, variable: &str, years: YearRange) -> Result<Vec<f64>, ExposureError> {
        let fraction = self.mean_fraction(variable, years)?;
        Ok(self
            .centroids
            .iter()
            .zip(fraction)
            .map(|(c, f)| f * grid_cell_area_ha(c.lat, self.resolution_deg))
            .collect())
    }
}

/// Name of the land-use variable holding `crop` under `irr`.
#[must_use]
pub fn land_use_variable(crop: Crop, irr: Irrigation) -> String {
    format!("{}_{}", crop.input_name(), irr.long_name())
}

/// Crop production in t/y on every land-use cell.
///
/// The crop area of each irrigation component of `irr` is multiplied by the
/// baseline yield of that component; `Combined` sums irrigated and rainfed
/// production. Non-finite products count as zero.
///
/// # Errors
///
/// * [`ExposureError::MissingColumn`] or [`ExposureError::NoData`] if the
///   land use lacks the crop or the years.
/// * [`ExposureError::Baseline`] if the baseline lacks a component or a
///   land-use cell.
pub fn crop_production_exposure(
    land_use: &LandUseTable,
    baseline: &YieldBaseline,
    crop: Crop,
    irr: Irrigation,
    years: YearRange,
) -> Result<Exposures, ExposureError> {
    let mut production = vec![0.0; land_use.centroids().len()];
    for &component in irr.components() {
        let area = land_use.crop_area_ha(&land_use_variable(crop, component), years)?;
        let yields = baseline.aligned_mean(CropIrr::new(crop, component), land_use.centroids())?;
        for ((total, a), y) in production.iter_mut().zip(area).zip(yields) {
            let value = a * y;
            if value.is_finite() {
                *total += value;
            }
        }
    }

    let records = land_use
        .centroids()
        .iter()
        .zip(production)
        .map(|(c, value)| {
            let mut record = ExposureRecord::new(c.lat, c.lon, value);
            record.region_id = c.region_id;
            record
        })
        .collect();

    let mut exposures = Exposures::new(records)
        .with_crop(crop, irr)
        .with_unit(ValueUnit::TonnesPerYear)
        .with_description(format!(
            "Crop production exposure from ISIMIP {} {irr} {} {}",
            crop.print_name(),
            years.start(),
            years.end()
        ));
    exposures.ref_year = Some(years);

    log::info!(
        "Crop production {} {irr} {years}: {:.1} t/y on {} cells",
        crop.print_name(),
        exposures.total_value(),
        exposures.len()
    );
    Ok(exposures)
}

/// Production exposures for every category of `baseline`, in category
/// order.
///
/// # Errors
///
/// See [`crop_production_exposure`].
pub fn full_exposure_set(
    land_use: &LandUseTable,
    baseline: &YieldBaseline,
    years: YearRange,
) -> Result<Vec<Exposures>, ExposureError> {
    baseline
        .categories
        .iter()
        .map(|key| crop_production_exposure(land_use, baseline, key.crop, key.irr, years))
        .collect()
}
