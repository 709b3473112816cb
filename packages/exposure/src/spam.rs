//! SPAM (Spatial Production Allocation Model) agricultural exposures.
//!
//! SPAM publishes one global table per variable and technology, named
//! `spam2005V3r2_global_{variable}_{technology}.csv`, with one row per 5'
//! grid cell:
//!
//! ```text
//! iso3,name_cntr,name_adm1,name_adm2,x,y,whea_a,rice_a,...
//! CHE,Switzerland,Zurich,Zurich,8.375,47.458,1203.5,0.0,...
//! ```
//!
//! A row's exposed value is the sum of its crop columns. Every column that
//! is not one of the identification columns counts as a crop column. An
//! optional numeric `region_id` column carries the ISO 3166 numeric code;
//! without it, rows are left untagged.

use std::io::Read;
use std::path::PathBuf;

use crop_risk_exposure_models::{DEFAULT_IMPF_ID, ExposureRecord, Exposures, ValueUnit};
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::ExposureError;

/// Columns that identify a cell rather than hold a crop value.
const ID_COLUMNS: [&str; 14] = [
    "iso3",
    "prod_level",
    "alloc_key",
    "cell5m",
    "x",
    "y",
    "rec_type",
    "tech_type",
    "unit",
    "name_cntr",
    "name_adm1",
    "name_adm2",
    "region_id",
    "year_data",
];

/// Quantity stored in a SPAM table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum SpamVariable {
    /// Value of production, aggregated over crops.
    #[strum(serialize = "V_agg")]
    ValueOfProduction,
    /// Physical area.
    #[strum(serialize = "A")]
    PhysicalArea,
    /// Harvested area.
    #[strum(serialize = "H")]
    HarvestedArea,
    /// Production.
    #[strum(serialize = "P")]
    Production,
    /// Yield.
    #[strum(serialize = "Y")]
    Yield,
}

impl SpamVariable {
    /// Unit of the stored values.
    #[must_use]
    pub const fn unit(self) -> ValueUnit {
        match self {
            Self::ValueOfProduction => ValueUnit::Usd,
            Self::PhysicalArea | Self::HarvestedArea => ValueUnit::Hectares,
            Self::Production => ValueUnit::MetricTonnes,
            Self::Yield => ValueUnit::KgPerHectare,
        }
    }
}

/// Farming system a SPAM table covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum SpamTechnology {
    /// All systems.
    #[strum(serialize = "TA")]
    All,
    /// Irrigated.
    #[strum(serialize = "TI")]
    Irrigated,
    /// Rainfed, high inputs.
    #[strum(serialize = "TH")]
    RainfedHighInputs,
    /// Rainfed, low inputs.
    #[strum(serialize = "TL")]
    RainfedLowInputs,
    /// Rainfed, subsistence.
    #[strum(serialize = "TS")]
    Subsistence,
    /// All rainfed.
    #[strum(serialize = "TR")]
    Rainfed,
}

impl SpamTechnology {
    /// Human-readable scope of the technology.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::All => "all technologies together, ie complete crop",
            Self::Irrigated => "irrigated portion of crop",
            Self::RainfedHighInputs => "rainfed high inputs portion of crop",
            Self::RainfedLowInputs => "rainfed low inputs portion of crop",
            Self::Subsistence => "rainfed subsistence portion of crop",
            Self::Rainfed => "rainfed portion of crop (= TA - TI, or TH + TL + TS)",
        }
    }
}

/// Which SPAM table to read and which cells to keep.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpamLoadConfig {
    /// Directory holding the SPAM tables.
    pub input_dir: PathBuf,
    /// Variable code, e.g. `"V_agg"`.
    #[serde(default = "default_variable")]
    pub variable: String,
    /// Technology code, e.g. `"TA"`.
    #[serde(default = "default_technology")]
    pub technology: String,
    /// Country by ISO 3166 alpha-3 code or SPAM country name.
    #[serde(default)]
    pub country: Option<String>,
    /// First-level administrative unit name.
    #[serde(default)]
    pub name_adm1: Option<String>,
    /// Second-level administrative unit name.
    #[serde(default)]
    pub name_adm2: Option<String>,
    /// Impact function id given to every record.
    #[serde(default = "default_impf_id")]
    pub impf_id: u32,
}

fn default_variable() -> String {
    SpamVariable::ValueOfProduction.to_string()
}

fn default_technology() -> String {
    SpamTechnology::All.to_string()
}

const fn default_impf_id() -> u32 {
    DEFAULT_IMPF_ID
}

impl SpamLoadConfig {
    /// Global value of production over all technologies.
    #[must_use]
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            variable: default_variable(),
            technology: default_technology(),
            country: None,
            name_adm1: None,
            name_adm2: None,
            impf_id: DEFAULT_IMPF_ID,
        }
    }

    /// Parsed variable and technology.
    ///
    /// # Errors
    ///
    /// Returns [`ExposureError::InvalidParameter`] if either code is unknown.
    pub fn parameters(&self) -> Result<(SpamVariable, SpamTechnology), ExposureError> {
        let variable = self.variable.parse::<SpamVariable>();
        let technology = self.technology.parse::<SpamTechnology>();
        match (variable, technology) {
            (Ok(variable), Ok(technology)) => Ok((variable, technology)),
            _ => Err(ExposureError::InvalidParameter {
                message: format!(
                    "variable '{}', technology '{}'",
                    self.variable, self.technology
                ),
            }),
        }
    }

    /// Name of the table for `variable` and `technology`.
    #[must_use]
    pub fn file_name(variable: SpamVariable, technology: SpamTechnology) -> String {
        format!("spam2005V3r2_global_{variable}_{technology}.csv")
    }
}

/// One parsed SPAM row.
struct SpamRow {
    iso3: String,
    name_cntr: String,
    name_adm1: String,
    name_adm2: String,
    record: ExposureRecord,
}

/// Reads SPAM tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpamSource;

impl SpamSource {
    /// Loads the table named by `config` from its input directory.
    ///
    /// # Errors
    ///
    /// See [`SpamSource::read`]; also fails if the file cannot be opened.
    pub fn load(config: &SpamLoadConfig) -> Result<Exposures, ExposureError> {
        let (variable, technology) = config.parameters()?;
        let path = config
            .input_dir
            .join(SpamLoadConfig::file_name(variable, technology));
        let file = std::fs::File::open(&path)?;
        Self::read(std::io::BufReader::new(file), config)
    }

    /// Parses a SPAM table and keeps the cells of the configured area.
    ///
    /// A country, first- or second-level unit missing from the data is
    /// logged and ignored, so an unknown country yields the global table.
    ///
    /// # Errors
    ///
    /// * [`ExposureError::InvalidParameter`] for an unknown variable or
    ///   technology code.
    /// * [`ExposureError::MissingColumn`] if `x` or `y` is absent.
    /// * [`ExposureError::Csv`] on malformed rows.
    pub fn read(reader: impl Read, config: &SpamLoadConfig) -> Result<Exposures, ExposureError> {
        let (variable, technology) = config.parameters()?;
        let mut rows = read_rows(reader, config.impf_id)?;

        let mut area = Vec::new();
        if let Some(country) = &config.country {
            if rows.iter().any(|r| r.iso3 == *country) {
                rows.retain(|r| r.iso3 == *country);
                area.push(country.as_str());
            } else if rows.iter().any(|r| r.name_cntr == *country) {
                rows.retain(|r| r.name_cntr == *country);
                area.push(country.as_str());
            } else {
                log::warn!("Country name not found in data: {country}");
            }
        }
        if let Some(adm1) = &config.name_adm1 {
            if rows.iter().any(|r| r.name_adm1 == *adm1) {
                rows.retain(|r| r.name_adm1 == *adm1);
                area.push(adm1.as_str());
            } else {
                log::warn!("Admin1 not found in data: {adm1}");
            }
        }
        if let Some(adm2) = &config.name_adm2 {
            if rows.iter().any(|r| r.name_adm2 == *adm2) {
                rows.retain(|r| r.name_adm2 == *adm2);
                area.push(adm2.as_str());
            } else {
                log::warn!("Admin2 not found in data: {adm2}");
            }
        }

        let area = area_label(config, &area);
        let exposures = Exposures::new(rows.into_iter().map(|r| r.record).collect())
            .with_unit(variable.unit())
            .with_description(format!(
                "SPAM agrar exposure for variable {variable} and technology {technology}\n{}",
                technology.description()
            ));

        let fmt_range = |range: Option<(f64, f64)>| {
            range.map_or_else(
                || "empty".to_string(),
                |(lo, hi)| format!("{lo:+.3} to {hi:+.3}"),
            )
        };
        log::info!("Lat. range: {}.", fmt_range(min_max(exposures.records.iter().map(|r| r.lat))));
        log::info!("Lon. range: {}.", fmt_range(min_max(exposures.records.iter().map(|r| r.lon))));
        log::info!(
            "Total {variable} {technology} {area}: {:.1} {}.",
            exposures.total_value(),
            exposures.value_unit
        );

        Ok(exposures)
    }
}

/// `"global"` when no filter applied, otherwise the country followed by the
/// applied unit names. The country slot stays empty when only units are
/// given, e.g. `" Ucayali"`.
fn area_label(config: &SpamLoadConfig, applied: &[&str]) -> String {
    if applied.is_empty() {
        return "global".to_string();
    }
    let country_applied = config
        .country
        .as_deref()
        .is_some_and(|c| applied.first() == Some(&c));
    if country_applied {
        applied.join(" ")
    } else {
        format!(" {}", applied.join(" "))
    }
}

fn read_rows(reader: impl Read, impf_id: u32) -> Result<Vec<SpamRow>, ExposureError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
        column(name).ok_or_else(|| ExposureError::MissingColumn {
            name: name.to_string(),
        })
    };
    let lon_col = required("x")?;
    let lat_col = required("y")?;
    let iso3_col = column("iso3");
    let cntr_col = column("name_cntr");
    let adm1_col = column("name_adm1");
    let adm2_col = column("name_adm2");
    let region_col = column("region_id");
    let crop_cols: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !ID_COLUMNS.contains(h))
        .map(|(i, _)| i)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let text = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .unwrap_or_default()
                .to_string()
        };
        let number = |col: usize| -> Result<f64, ExposureError> {
            let cell = record.get(col).unwrap_or_default();
            cell.parse().map_err(|_| ExposureError::InvalidValue {
                column: headers.get(col).unwrap_or_default().to_string(),
                value: cell.to_string(),
            })
        };

        let value: f64 = crop_cols
            .iter()
            .filter_map(|&c| record.get(c)?.parse::<f64>().ok())
            .filter(|v| !v.is_nan())
            .sum();
        let mut exposure = ExposureRecord::new(number(lat_col)?, number(lon_col)?, value)
            .with_impf_id(impf_id);
        exposure.region_id = region_col
            .and_then(|c| record.get(c)?.parse().ok())
            .filter(|&id: &u32| id != 0);

        rows.push(SpamRow {
            iso3: text(iso3_col),
            name_cntr: text(cntr_col),
            name_adm1: text(adm1_col),
            name_adm2: text(adm2_col),
            record: exposure,
        });
    }
    Ok(rows)
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
