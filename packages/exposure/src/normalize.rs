//! Country-wise bias correction of simulated production against FAOSTAT.

use crop_risk_exposure_models::{ExposureRecord, Exposures, ValueUnit};
use crop_risk_hazard_models::YearRange;

use crate::ExposureError;
use crate::fao::ProductionTable;
use crate::region::aggregate_countries;

/// Result of [`normalize_with_fao`].
#[derive(Debug, Clone)]
pub struct FaoNormalization {
    /// Region ids, sorted.
    pub countries: Vec<u32>,
    /// FAO / model production ratio per country.
    pub ratio: Vec<f64>,
    /// Normalized fully irrigated production, in t/y.
    pub firr: Exposures,
    /// Normalized rainfed production, in t/y.
    pub noirr: Exposures,
    /// Mean FAO production per country.
    pub fao_production: Vec<f64>,
    /// Combined model production per country before normalization.
    pub model_production: Vec<f64>,
}

impl FaoNormalization {
    /// Ratio applied to one country, if it is present.
    #[must_use]
    pub fn ratio_of(&self, region_id: u32) -> Option<f64> {
        self.countries
            .binary_search(&region_id)
            .ok()
            .map(|i| self.ratio[i])
    }
}

/// Scales irrigated and rainfed production so that each country's combined
/// production matches its mean FAOSTAT production over `years`.
///
/// The ratio is FAO / model per country. Countries without model production
/// or without FAO data keep a ratio of `1`. Exposures in other units are
/// normalized on their stored tonnage and returned in t/y.
///
/// # Errors
///
/// * [`ExposureError::MissingCrop`] if `firr` has no crop.
/// * [`ExposureError::GridMismatch`] if the two sets differ in length or
///   region tagging.
pub fn normalize_with_fao(
    firr: &Exposures,
    noirr: &Exposures,
    production: &ProductionTable,
    years: YearRange,
) -> Result<FaoNormalization, ExposureError> {
    let crop = firr.crop.ok_or(ExposureError::MissingCrop)?;
    if firr.len() != noirr.len()
        || firr
            .records
            .iter()
            .zip(&noirr.records)
            .any(|(a, b)| a.region_id != b.region_id)
    {
        return Err(ExposureError::GridMismatch {
            message: "irrigated and rainfed exposures must share one grid".to_string(),
        });
    }

    let firr = in_tonnes(firr);
    let noirr = in_tonnes(noirr);

    let firr_totals = aggregate_countries(&firr);
    let noirr_totals = aggregate_countries(&noirr);

    let countries: Vec<u32> = firr_totals.iter().map(|&(region, _)| region).collect();
    let mut model_production: Vec<f64> = firr_totals
        .iter()
        .zip(&noirr_totals)
        .map(|(&(_, a), &(_, b))| a + b)
        .collect();
    let mut fao_production = vec![0.0; countries.len()];
    let mut ratio = vec![1.0; countries.len()];

    for (i, &region) in countries.iter().enumerate() {
        if let Some(fao) = production.country_mean(region, crop, years) {
            fao_production[i] = fao;
        }
        if model_production[i] == 0.0 {
            model_production[i] = fao_production[i];
        } else if fao_production[i] != 0.0 {
            ratio[i] = fao_production[i] / model_production[i];
        }
    }

    let scale = |exposures: &Exposures| {
        let records = exposures
            .records
            .iter()
            .map(|r| {
                let i = countries
                    .binary_search(&r.region_id.unwrap_or(0))
                    .unwrap_or_default();
                ExposureRecord {
                    value: r.value * ratio[i],
                    ..*r
                }
            })
            .collect();
        let mut scaled = exposures.with_records(records);
        scaled.description = format!("{} normalized", exposures.description)
            .trim()
            .to_string();
        scaled
    };

    let firr_norm = scale(&firr);
    let noirr_norm = scale(&noirr);
    log::info!(
        "Normalized {crop} production of {} countries against FAOSTAT {years}",
        countries.len()
    );

    Ok(FaoNormalization {
        countries,
        ratio,
        firr: firr_norm,
        noirr: noirr_norm,
        fao_production,
        model_production,
    })
}

fn in_tonnes(exposures: &Exposures) -> Exposures {
    if exposures.value_unit == ValueUnit::TonnesPerYear {
        return exposures.clone();
    }
    let records = exposures
        .records
        .iter()
        .map(|r| ExposureRecord {
            value: r.tonnes_per_year.unwrap_or(f64::NAN),
            ..*r
        })
        .collect();
    exposures
        .with_records(records)
        .with_unit(ValueUnit::TonnesPerYear)
}

#[cfg(test)]
mod tests {
    use crop_risk_crop_models::{Crop, Irrigation};

    use super::*;
    use crate::convert::value_to_kcal;
    use crate::fao::{FaoRecord, FaoTable};

    fn exposures(irr: Irrigation, values: [f64; 4]) -> Exposures {
        Exposures::new(vec![
            ExposureRecord::new(50.0, 8.0, values[0]).with_region(276),
            ExposureRecord::new(51.0, 9.0, values[1]).with_region(276),
            ExposureRecord::new(47.0, 2.0, values[2]).with_region(250),
            ExposureRecord::new(35.0, 33.0, values[3]).with_region(196),
        ])
        .with_crop(Crop::Mai, irr)
        .with_description("maize")
    }

    fn production() -> ProductionTable {
        let record = |area_code, year, value| FaoRecord {
            area_code,
            item: "Maize".to_string(),
            year,
            value,
        };
        FaoTable::new(vec![
            record(276, 2008, 300.0),
            record(276, 2009, 500.0),
            record(196, 2009, 50.0),
        ])
    }

    fn years() -> YearRange {
        YearRange::new(2008, 2018).unwrap()
    }

    #[test]
    fn scales_to_fao_production() {
        let firr = exposures(Irrigation::Firr, [100.0, 50.0, 10.0, 0.0]);
        let noirr = exposures(Irrigation::Noirr, [50.0, 0.0, 30.0, 0.0]);
        let norm = normalize_with_fao(&firr, &noirr, &production(), years()).unwrap();

        assert_eq!(norm.countries, vec![196, 250, 276]);
        // Germany: FAO 400, model 200.
        assert!((norm.ratio_of(276).unwrap() - 2.0).abs() < 1e-12);
        assert!((norm.firr.records[0].value - 200.0).abs() < 1e-12);
        assert!((norm.noirr.records[0].value - 100.0).abs() < 1e-12);
        // France: no FAO data.
        assert!((norm.ratio_of(250).unwrap() - 1.0).abs() < 1e-12);
        // Cyprus: no model production.
        assert!((norm.ratio_of(196).unwrap() - 1.0).abs() < 1e-12);
        assert!((norm.model_production[0] - 50.0).abs() < 1e-12);
        assert_eq!(norm.firr.description, "maize normalized");
    }

    #[test]
    fn normalized_total_matches_fao() {
        let firr = exposures(Irrigation::Firr, [100.0, 50.0, 10.0, 0.0]);
        let noirr = exposures(Irrigation::Noirr, [50.0, 0.0, 30.0, 0.0]);
        let norm = normalize_with_fao(&firr, &noirr, &production(), years()).unwrap();
        let germany: f64 = norm
            .firr
            .records
            .iter()
            .chain(&norm.noirr.records)
            .filter(|r| r.region_id == Some(276))
            .map(|r| r.value)
            .sum();
        assert!((germany - 400.0).abs() < 1e-9);
    }

    #[test]
    fn normalizes_stored_tonnage() {
        let firr = value_to_kcal(&exposures(Irrigation::Firr, [100.0, 50.0, 10.0, 0.0]), true)
            .unwrap();
        let noirr = exposures(Irrigation::Noirr, [50.0, 0.0, 30.0, 0.0]);
        let norm = normalize_with_fao(&firr, &noirr, &production(), years()).unwrap();
        assert_eq!(norm.firr.value_unit, ValueUnit::TonnesPerYear);
        assert!((norm.firr.records[0].value - 200.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_mismatched_grids() {
        let firr = exposures(Irrigation::Firr, [1.0; 4]);
        let noirr = firr.with_records(firr.records[..3].to_vec());
        assert!(matches!(
            normalize_with_fao(&firr, &noirr, &production(), years()),
            Err(ExposureError::GridMismatch { .. })
        ));
    }
}
