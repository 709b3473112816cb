//! Loading yield hazards from disk.
//!
//! The [`HazardSource`] trait is the seam between the hazard algorithms and
//! file formats. [`CsvHazardSource`] reads the gridded CSV interchange
//! layout:
//!
//! ```text
//! lat,lon,region_id,1980,1981,...
//! 39.75,116.25,156,5.91,6.02,...
//! ```
//!
//! One row per centroid, one column per year. `region_id` is optional and
//! empty cells are read as missing (`NaN`).

use std::io::Read;
use std::path::{Path, PathBuf};

use crop_risk_crop_models::HazardType;
use crop_risk_hazard_models::{
    BoundingBox, Centroid, Centroids, Event, Hazard, HazardLoadConfig, IntensityMatrix, YearRange,
};

use crate::HazardError;

/// Unit label of simulated yields.
pub const YIELD_UNITS: &str = "t / y / ha";

/// A backend that can produce a [`Hazard`] from a stored yield file.
pub trait HazardSource {
    /// File extension (without dot) of files this source reads.
    fn extension(&self) -> &'static str;

    /// Loads one file, keeping only centroids inside `bbox` and events whose
    /// year lies in `years`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn load_file(
        &self,
        path: &Path,
        bbox: Option<&BoundingBox>,
        years: Option<YearRange>,
    ) -> Result<Hazard, HazardError>;

    /// Resolves the file named by `config` and loads it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn load(&self, config: &HazardLoadConfig) -> Result<Hazard, HazardError> {
        let path = self.path_for(config);
        log::info!("Loading hazard from {}", path.display());
        self.load_file(&path, config.bbox.as_ref(), Some(config.yearrange))
    }

    /// Full path of the file named by `config`.
    fn path_for(&self, config: &HazardLoadConfig) -> PathBuf {
        config
            .input_dir
            .join(format!("{}.{}", config.file_stem(), self.extension()))
    }
}

/// Reads gridded yields stored as CSV.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvHazardSource;

impl CsvHazardSource {
    /// Parses the CSV layout from any reader.
    ///
    /// # Errors
    ///
    /// * [`HazardError::Csv`] on malformed CSV.
    /// * [`HazardError::Format`] on missing columns or non-numeric cells.
    pub fn read(
        reader: impl Read,
        bbox: Option<&BoundingBox>,
        years: Option<YearRange>,
    ) -> Result<Hazard, HazardError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = reader.headers()?.clone();

        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let lat_col = column("lat").ok_or_else(|| missing_column("lat"))?;
        let lon_col = column("lon").ok_or_else(|| missing_column("lon"))?;
        let region_col = column("region_id");

        // Year columns, in file order, restricted to the requested range.
        let mut year_cols = Vec::new();
        for (i, header) in headers.iter().enumerate() {
            if i == lat_col || i == lon_col || Some(i) == region_col {
                continue;
            }
            let year = header.parse::<i32>().map_err(|_| HazardError::Format {
                message: format!("column '{header}' is not a year"),
            })?;
            if years.is_none_or(|range| range.contains(year)) {
                year_cols.push((i, year));
            }
        }

        let mut points = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();
        for (line, result) in reader.records().enumerate() {
            let record = result?;
            let lat = parse_cell(record.get(lat_col), line, "lat")?;
            let lon = parse_cell(record.get(lon_col), line, "lon")?;
            if bbox.is_some_and(|b| !b.contains(lon, lat)) {
                continue;
            }

            let mut centroid = Centroid::new(lat, lon);
            if let Some(col) = region_col
                && let Some(cell) = record.get(col).filter(|c| !c.is_empty())
            {
                let region = cell.parse::<u32>().map_err(|_| HazardError::Format {
                    message: format!("row {line}: invalid region_id '{cell}'"),
                })?;
                centroid = centroid.with_region(region);
            }
            points.push(centroid);

            columns.push(
                year_cols
                    .iter()
                    .map(|&(col, _)| parse_cell(record.get(col), line, "yield"))
                    .collect::<Result<_, _>>()?,
            );
        }

        let n_centroids = points.len();
        let rows = (0..year_cols.len())
            .map(|e| columns.iter().map(|c| c[e]).collect())
            .collect();
        let intensity = IntensityMatrix::from_rows(rows, n_centroids)?;
        let events = year_cols
            .iter()
            .map(|&(_, year)| Event::from_year(year))
            .collect();
        let centroids = Centroids::new(points);

        if let (Some(lat), Some(lon)) = (centroids.lat_range(), centroids.lon_range()) {
            log::debug!("Lat. range: {:+.3} to {:+.3}", lat.0, lat.1);
            log::debug!("Lon. range: {:+.3} to {:+.3}", lon.0, lon.1);
        }

        Ok(
            Hazard::new(HazardType::RelativeCropyield, events, centroids, intensity)?
                .with_units(YIELD_UNITS),
        )
    }
}

impl HazardSource for CsvHazardSource {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn load_file(
        &self,
        path: &Path,
        bbox: Option<&BoundingBox>,
        years: Option<YearRange>,
    ) -> Result<Hazard, HazardError> {
        let file = std::fs::File::open(path)?;
        let hazard = Self::read(std::io::BufReader::new(file), bbox, years)?;
        log::debug!(
            "{}: {} events x {} centroids",
            path.display(),
            hazard.size(),
            hazard.centroids().len()
        );
        Ok(hazard)
    }
}

fn missing_column(name: &str) -> HazardError {
    HazardError::Format {
        message: format!("missing '{name}' column"),
    }
}

fn parse_cell(cell: Option<&str>, line: usize, what: &str) -> Result<f64, HazardError> {
    match cell {
        None | Some("" | "NaN" | "nan") => Ok(f64::NAN),
        Some(cell) => cell.parse::<f64>().map_err(|_| HazardError::Format {
            message: format!("row {line}: invalid {what} value '{cell}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
lat,lon,region_id,1980,1981,1982
39.75,116.25,156,5.0,6.0,
39.75,116.75,156,4.0,4.0,4.0
10.25,-70.25,,1.0,2.0,3.0
";

    #[test]
    fn reads_grid_as_events_by_centroids() {
        let hazard = CsvHazardSource::read(CSV.as_bytes(), None, None).unwrap();
        assert_eq!(hazard.size(), 3);
        assert_eq!(hazard.centroids().len(), 3);
        assert_eq!(hazard.event_names(), vec!["1980", "1981", "1982"]);
        assert_eq!(hazard.intensity().row(1), &[6.0, 4.0, 2.0]);
        assert!(hazard.intensity().get(2, 0).is_nan());
        assert_eq!(hazard.centroids().get(0).unwrap().region_id, Some(156));
        assert_eq!(hazard.centroids().get(2).unwrap().region_id, None);
        assert_eq!(hazard.units(), YIELD_UNITS);
    }

    #[test]
    fn filters_by_bbox_and_years() {
        let bbox = BoundingBox::new(110.0, 30.0, 120.0, 45.0);
        let years = YearRange::new(1981, 1982).unwrap();
        let hazard = CsvHazardSource::read(CSV.as_bytes(), Some(&bbox), Some(years)).unwrap();
        assert_eq!(hazard.event_names(), vec!["1981", "1982"]);
        assert_eq!(hazard.centroids().len(), 2);
        assert_eq!(hazard.intensity().row(0), &[6.0, 4.0]);
        assert!((hazard.frequency()[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_year_columns() {
        let csv = "lat,lon,yield\n0,0,1\n";
        assert!(matches!(
            CsvHazardSource::read(csv.as_bytes(), None, None),
            Err(HazardError::Format { .. })
        ));
    }

    #[test]
    fn rejects_missing_coordinates() {
        let csv = "lon,1980\n0,1\n";
        assert!(matches!(
            CsvHazardSource::read(csv.as_bytes(), None, None),
            Err(HazardError::Format { .. })
        ));
    }

    #[test]
    fn resolves_path_from_load_config() {
        let config: HazardLoadConfig = serde_json::from_str(
            r#"{
                "input_dir": "/data/isimip",
                "yearrange": [2001, 2005],
                "ag_model": "lpjml",
                "cl_model": "ipsl-cm5a-lr",
                "scenario": "historical",
                "soc": "2005soc",
                "co2": "co2",
                "crop": "whe",
                "irr": "noirr"
            }"#,
        )
        .unwrap();
        assert_eq!(
            CsvHazardSource.path_for(&config),
            PathBuf::from(
                "/data/isimip/lpjml_ipsl-cm5a-lr_ewembi_historical_2005soc_co2_yield-whe-noirr_global_annual_1861_2005.csv"
            )
        );
    }
}
