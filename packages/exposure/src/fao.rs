//! FAOSTAT tables.
//!
//! Producer prices (USD per tonne) and production quantities (tonnes) are
//! both published as long-format CSV with one row per country, item, and
//! year. Countries are identified by their M49 code, which coincides with
//! the ISO 3166 numeric code used as region id.

use std::io::Read;
use std::path::Path;

use crop_risk_crop_models::Crop;
use crop_risk_hazard_models::YearRange;

use crate::ExposureError;

const AREA_CODE_COLUMNS: [&str; 2] = ["Area Code (M49)", "Area Code"];

/// One observation.
#[derive(Debug, Clone, PartialEq)]
pub struct FaoRecord {
    /// M49 country code.
    pub area_code: u32,
    /// FAOSTAT item name, e.g. `"Wheat"`.
    pub item: String,
    /// Observation year.
    pub year: i32,
    /// Observed value.
    pub value: f64,
}

/// A FAOSTAT table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaoTable {
    records: Vec<FaoRecord>,
}

/// Producer prices in USD per tonne.
pub type PriceTable = FaoTable;

/// Production quantities in tonnes.
pub type ProductionTable = FaoTable;

impl FaoTable {
    /// Creates a table from parsed records.
    #[must_use]
    pub const fn new(records: Vec<FaoRecord>) -> Self {
        Self { records }
    }

    /// Reads a FAOSTAT CSV export from disk.
    ///
    /// # Errors
    ///
    /// See [`FaoTable::read`].
    pub fn from_path(path: &Path) -> Result<Self, ExposureError> {
        let file = std::fs::File::open(path)?;
        let table = Self::read(std::io::BufReader::new(file))?;
        log::debug!("{}: {} FAOSTAT records", path.display(), table.len());
        Ok(table)
    }

    /// Parses a FAOSTAT CSV export.
    ///
    /// Rows without a numeric value are skipped; FAOSTAT leaves the value
    /// empty for missing observations.
    ///
    /// # Errors
    ///
    /// * [`ExposureError::MissingColumn`] if the area code, `Item`, `Year`,
    ///   or `Value` column is absent.
    /// * [`ExposureError::Csv`] on malformed CSV.
    pub fn read(reader: impl Read) -> Result<Self, ExposureError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
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
        let area_col = AREA_CODE_COLUMNS
            .iter()
            .find_map(|name| headers.iter().position(|h| h == *name))
            .ok_or_else(|| ExposureError::MissingColumn {
                name: AREA_CODE_COLUMNS[0].to_string(),
            })?;
        let item_col = column("Item")?;
        let year_col = column("Year")?;
        let value_col = column("Value")?;

        let mut records = Vec::new();
        let mut skipped = 0_usize;
        for result in reader.records() {
            let row = result?;
            let parsed = parse_record(&row, [area_col, item_col, year_col, value_col]);
            match parsed {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            log::debug!("Skipped {skipped} FAOSTAT rows without a usable value");
        }

        Ok(Self { records })
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mean value for one country and crop over `years`.
    #[must_use]
    pub fn country_mean(&self, area_code: u32, crop: Crop, years: YearRange) -> Option<f64> {
        mean(
            self.matching(crop, years)
                .filter(|r| r.area_code == area_code)
                .map(|r| r.value),
        )
    }

    /// Mean value over all countries for one crop over `years`.
    #[must_use]
    pub fn world_mean(&self, crop: Crop, years: YearRange) -> Option<f64> {
        mean(self.matching(crop, years).map(|r| r.value))
    }

    fn matching(&self, crop: Crop, years: YearRange) -> impl Iterator<Item = &FaoRecord> {
        let item = crop.fao_name();
        self.records
            .iter()
            .filter(move |r| r.item == item && years.contains(r.year))
    }
}

fn parse_record(row: &csv::StringRecord, [area, item, year, value]: [usize; 4]) -> Option<FaoRecord> {
    Some(FaoRecord {
        // M49 codes are exported with a leading apostrophe to keep
        // spreadsheet tools from dropping zeros.
        area_code: row.get(area)?.trim_start_matches('\'').parse().ok()?,
        item: row.get(item)?.to_string(),
        year: row.get(year)?.parse().ok()?,
        value: row.get(value)?.parse().ok()?,
    })
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICES: &str = "\
Domain Code,Domain,Area Code (M49),Area,Element Code,Element,Item Code,Item,Year Code,Year,Unit,Value,Flag
PP,Producer Prices,'276,Germany,5532,Producer Price (USD/tonne),15,Wheat,2008,2008,USD,250.0,
PP,Producer Prices,'276,Germany,5532,Producer Price (USD/tonne),15,Wheat,2009,2009,USD,150.0,
PP,Producer Prices,'276,Germany,5532,Producer Price (USD/tonne),56,Maize,2009,2009,USD,180.0,
PP,Producer Prices,'250,France,5532,Producer Price (USD/tonne),15,Wheat,2009,2009,USD,300.0,
PP,Producer Prices,'250,France,5532,Producer Price (USD/tonne),15,Wheat,2010,2010,USD,,M
";

    fn years() -> YearRange {
        YearRange::new(2008, 2018).unwrap()
    }

    #[test]
    fn parses_faostat_export() {
        let table = FaoTable::read(PRICES.as_bytes()).unwrap();
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn country_and_world_means() {
        let table = FaoTable::read(PRICES.as_bytes()).unwrap();
        assert_eq!(table.country_mean(276, Crop::Whe, years()), Some(200.0));
        assert_eq!(table.country_mean(276, Crop::Wwh, years()), Some(200.0));
        assert_eq!(table.country_mean(36, Crop::Whe, years()), None);
        let world = table.world_mean(Crop::Whe, years()).unwrap();
        assert!((world - 700.0 / 3.0).abs() < 1e-9);
        assert_eq!(table.world_mean(Crop::Soy, years()), None);
    }

    #[test]
    fn year_range_is_inclusive() {
        let table = FaoTable::read(PRICES.as_bytes()).unwrap();
        let mean = table.country_mean(276, Crop::Whe, YearRange::single(2008));
        assert_eq!(mean, Some(250.0));
    }

    #[test]
    fn accepts_plain_area_code_column() {
        let csv = "Area Code,Item,Year,Value\n4,Maize,2010,12.5\n";
        let table = FaoTable::read(csv.as_bytes()).unwrap();
        assert_eq!(table.country_mean(4, Crop::Mai, years()), Some(12.5));
    }

    #[test]
    fn requires_value_column() {
        let csv = "Area Code,Item,Year\n4,Maize,2010\n";
        assert!(matches!(
            FaoTable::read(csv.as_bytes()),
            Err(ExposureError::MissingColumn { name }) if name == "Value"
        ));
    }
}
