//! Loading exposures from disk.
//!
//! [`CsvExposureSource`] reads one record per row:
//!
//! ```text
//! lat,lon,region_id,value
//! 39.75,116.25,156,1520.4
//! ```
//!
//! `region_id` is optional. An empty `value` cell is read as `NaN`, the
//! convention for cells without cropland.

use std::io::Read;

use crop_risk_exposure_models::{ExposureLoadConfig, ExposureRecord, Exposures};
use serde::Deserialize;

use crate::ExposureError;

/// A backend that can produce [`Exposures`] from stored data.
pub trait ExposureSource {
    /// Loads the exposures described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be read or parsed.
    fn load(&self, config: &ExposureLoadConfig) -> Result<Exposures, ExposureError>;
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    lat: f64,
    lon: f64,
    #[serde(default)]
    region_id: Option<u32>,
    #[serde(default)]
    value: Option<f64>,
}

/// Reads exposures stored as CSV.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExposureSource;

impl CsvExposureSource {
    /// Parses exposure records from any reader, applying the subset and
    /// metadata of `config`.
    ///
    /// # Errors
    ///
    /// * [`ExposureError::MissingColumn`] if `lat`, `lon`, or `value` is
    ///   absent.
    /// * [`ExposureError::Csv`] on malformed rows.
    pub fn read(
        reader: impl Read,
        config: &ExposureLoadConfig,
    ) -> Result<Exposures, ExposureError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?;
        for name in ["lat", "lon", "value"] {
            if !headers.iter().any(|h| h == name) {
                return Err(ExposureError::MissingColumn {
                    name: name.to_string(),
                });
            }
        }

        let mut records = Vec::new();
        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            if config.bbox.is_some_and(|b| !b.contains(row.lon, row.lat)) {
                continue;
            }
            let mut record = ExposureRecord::new(row.lat, row.lon, row.value.unwrap_or(f64::NAN))
                .with_impf_id(config.impf_id);
            record.region_id = row.region_id;
            records.push(record);
        }

        let mut exposures = Exposures::new(records).with_unit(config.unit);
        exposures.crop = config.crop;
        exposures.irr = config.irr;
        exposures.description = format!("Exposures from {}", config.path.display());

        log::info!(
            "Loaded {} exposure points, total value: {:.3} {}",
            exposures.len(),
            exposures.total_value(),
            exposures.value_unit
        );

        Ok(exposures)
    }
}

impl ExposureSource for CsvExposureSource {
    fn load(&self, config: &ExposureLoadConfig) -> Result<Exposures, ExposureError> {
        let file = std::fs::File::open(&config.path)?;
        Self::read(std::io::BufReader::new(file), config)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crop_risk_crop_models::{Crop, Irrigation};
    use crop_risk_exposure_models::ValueUnit;
    use crop_risk_hazard_models::BoundingBox;

    use super::*;

    fn config() -> ExposureLoadConfig {
        ExposureLoadConfig {
            path: PathBuf::from("exp.csv"),
            crop: Some(Crop::Whe),
            irr: Some(Irrigation::Noirr),
            unit: ValueUnit::TonnesPerYear,
            bbox: None,
            impf_id: 1,
        }
    }

    const CSV: &str = "\
lat,lon,region_id,value
39.75,116.25,156,100.0
39.75,116.75,156,
-33.25,151.25,36,40.5
";

    #[test]
    fn reads_records_and_metadata() {
        let exp = CsvExposureSource::read(CSV.as_bytes(), &config()).unwrap();
        assert_eq!(exp.len(), 3);
        assert_eq!(exp.crop, Some(Crop::Whe));
        assert_eq!(exp.records[0].region_id, Some(156));
        assert!(exp.records[1].value.is_nan());
        assert!((exp.total_value() - 140.5).abs() < 1e-12);
        assert!(exp.records.iter().all(|r| r.centroid.is_none()));
    }

    #[test]
    fn region_column_is_optional() {
        let csv = "lat,lon,value\n0.25,0.25,3\n";
        let exp = CsvExposureSource::read(csv.as_bytes(), &config()).unwrap();
        assert_eq!(exp.records[0].region_id, None);
    }

    #[test]
    fn applies_bbox() {
        let mut config = config();
        config.bbox = Some(BoundingBox::new(100.0, 0.0, 140.0, 60.0));
        let exp = CsvExposureSource::read(CSV.as_bytes(), &config).unwrap();
        assert_eq!(exp.len(), 2);
    }

    #[test]
    fn requires_value_column() {
        let csv = "lat,lon\n0,0\n";
        assert!(matches!(
            CsvExposureSource::read(csv.as_bytes(), &config()),
            Err(ExposureError::MissingColumn { name }) if name == "value"
        ));
    }
}
